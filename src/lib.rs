//! REST client with response classification, timed retries and a
//! submit-then-poll client for durable functions.

pub mod codec;
pub mod durable;
pub mod http;
pub mod listener;
pub mod response;
pub mod retry;
