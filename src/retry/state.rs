//! Retry bookkeeping for one logical send.

use std::time::Duration;

use crate::http::Payload;

/// State of the retry loop. Every transition is an explicit method so the
/// loop can be driven by any clock.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RetryState {
    succeeded: bool,
    in_flight: bool,
    payload: Option<Payload>,
    elapsed: Duration,
    attempts: u32,
}

impl RetryState {
    /// Starts a new logical send, retaining `payload` for every retry.
    pub fn begin(&mut self, payload: Payload) {
        self.succeeded = false;
        self.in_flight = false;
        self.elapsed = Duration::ZERO;
        self.attempts = 0;
        self.payload = Some(payload);
    }

    /// Marks an attempt as in flight and returns the retained payload.
    pub fn start_attempt(&mut self) -> Payload {
        self.in_flight = true;
        self.attempts += 1;
        self.payload.clone().unwrap_or_default()
    }

    pub fn finish_attempt(&mut self) {
        self.in_flight = false;
    }

    /// Advances the timer by `delta`. Returns true when more than `interval`
    /// has elapsed since the last attempt ended, resetting the timer.
    ///
    /// The timer only runs while no attempt is in flight and the send has
    /// not succeeded.
    pub fn tick(&mut self, delta: Duration, interval: Duration) -> bool {
        if self.succeeded || self.in_flight {
            return false;
        }
        self.elapsed = self.elapsed.saturating_add(delta);
        if self.elapsed > interval {
            self.elapsed = Duration::ZERO;
            return true;
        }
        false
    }

    /// Records success. Returns true only on the transition from "not
    /// succeeded" to "succeeded"; the retained payload is released.
    pub fn mark_succeeded(&mut self) -> bool {
        if self.succeeded {
            return false;
        }
        self.succeeded = true;
        self.payload = None;
        self.elapsed = Duration::ZERO;
        true
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Physical attempts made in the current logical send.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
