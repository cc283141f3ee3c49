//! Caller-facing observers for request outcomes.

use log::{info, warn};

use crate::response::Response;

/// Observes the outcomes of a logical send.
///
/// `on_success` fires at most once per logical send, on the transition to
/// the succeeded state. `on_error` fires for every failed physical attempt
/// (transport failure or non-2xx status).
pub trait Listener<E, S>: Send + Sync {
    fn on_success(&self, _response: &Response<S>) {}

    fn on_error(&self, _response: &Response<E>) {}
}

/// Listener that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopListener;

impl<E, S> Listener<E, S> for NoopListener {}

/// Listener that writes a summary line for every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogListener;

impl<E, S> Listener<E, S> for LogListener {
    fn on_success(&self, response: &Response<S>) {
        info!(
            "Request succeeded: Status Code: {} Url: {}",
            response.status_code, response.url
        );
    }

    fn on_error(&self, response: &Response<E>) {
        warn!(
            "Request failed: Status Code: {} Url: {}",
            response.status_code, response.url
        );
    }
}
