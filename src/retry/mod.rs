//! Retry scheduling: re-issue a request on a timer until it is accepted.

mod retryable;
mod scheduler;
mod state;

pub use retryable::{RetryableRequest, Validator};
pub use scheduler::{
    Attempt, DEFAULT_RETRY_AFTER, DEFAULT_TICK, RetryError, RetryPolicy, RetryScheduler, Verdict,
};
pub use state::RetryState;
