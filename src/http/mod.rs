//! HTTP request plumbing: configuration, dispatch and response classification.

mod classify;
pub mod content_type;
mod key_values;
mod request;
mod transport;

pub use classify::classify;
pub use content_type::ContentType;
pub use key_values::KeyValues;
pub use request::{Hook, Outcome, Payload, Request, RequestConfig, RequestError};
#[cfg(test)]
pub use transport::MockTransport;
pub use transport::{
    Method, OutgoingRequest, RawResponse, ReqwestTransport, Transport, TransportError,
};
