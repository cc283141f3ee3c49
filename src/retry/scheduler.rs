//! Timer-driven retry loop.
//!
//! The loop re-issues an [`Attempt`] with the retained payload until the
//! attempt accepts a response, the optional attempt bound is reached, or the
//! scheduler is cancelled. Time is measured with `tokio::time`, so tests can
//! drive it with a paused clock.

use async_trait::async_trait;
use log::{debug, info};
use std::fmt;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::state::RetryState;
use crate::http::{Payload, RequestError};
use crate::listener::Listener;
use crate::response::Response;

/// Default delay added to the request timeout before retrying.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_millis(500);

/// Default period of the retry clock.
pub const DEFAULT_TICK: Duration = Duration::from_millis(100);

/// How and when failed attempts are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay after the per-attempt timeout before the next attempt.
    pub retry_after: Duration,
    /// Per-attempt timeout, normally taken from the request configuration.
    pub timeout: Duration,
    /// Upper bound on physical attempts. `None` retries forever.
    pub max_attempts: Option<NonZeroU32>,
    /// Period of the retry clock.
    pub tick: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_after: DEFAULT_RETRY_AFTER,
            timeout: Duration::ZERO,
            max_attempts: None,
            tick: DEFAULT_TICK,
        }
    }
}

impl RetryPolicy {
    /// Time that must elapse after an attempt before the next one.
    pub fn interval(&self) -> Duration {
        self.timeout.saturating_add(self.retry_after)
    }
}

/// Result of one physical attempt as judged by the attempt's own predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict<S, E> {
    /// Final success; ends the logical send.
    Accepted(Response<S>),
    /// A response arrived but is not (yet) a success. Retry silently.
    Rejected,
    /// Transport failure or error status. Reported, then retried.
    Failed(Response<E>),
}

/// One retryable unit of work.
#[async_trait]
pub trait Attempt: Send {
    type Success: Send;
    type Failure: Send + fmt::Debug;

    /// Performs one physical attempt with the retained payload.
    async fn attempt(
        &mut self,
        payload: &Payload,
    ) -> Result<Verdict<Self::Success, Self::Failure>, RequestError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RetryError<E>
where
    E: fmt::Debug,
{
    /// The request could not be started; nothing was retried.
    #[error(transparent)]
    Aborted(#[from] RequestError),
    /// The attempt bound was reached without success.
    #[error("request did not succeed after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        last_error: Option<Response<E>>,
    },
    #[error("request was cancelled")]
    Cancelled,
}

/// Drives an [`Attempt`] on a timer until it succeeds.
#[derive(Debug)]
pub struct RetryScheduler {
    policy: RetryPolicy,
    state: RetryState,
    cancel: CancellationToken,
}

impl RetryScheduler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::default(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut RetryPolicy {
        &mut self.policy
    }

    pub fn state(&self) -> &RetryState {
        &self.state
    }

    pub fn has_succeeded(&self) -> bool {
        self.state.succeeded()
    }

    /// Token that tears the scheduler down when cancelled. A cancelled
    /// scheduler stops ticking and abandons any attempt in flight.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs one logical send to completion.
    #[tracing::instrument(skip_all, fields(interval = ?self.policy.interval()))]
    pub async fn run<A: Attempt>(
        &mut self,
        attempt: &mut A,
        payload: Payload,
        listener: &dyn Listener<A::Failure, A::Success>,
    ) -> Result<Response<A::Success>, RetryError<A::Failure>> {
        let cancel = self.cancel.clone();
        if cancel.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        self.state.begin(payload);
        let interval = self.policy.interval();
        let mut ticker = tokio::time::interval(self.policy.tick.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_error = None;

        loop {
            let payload = self.state.start_attempt();
            let verdict = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                verdict = attempt.attempt(&payload) => Some(verdict),
            };
            self.state.finish_attempt();

            match verdict {
                None => return Err(RetryError::Cancelled),
                Some(Err(e)) => return Err(RetryError::Aborted(e)),
                Some(Ok(Verdict::Accepted(response))) => {
                    if self.state.mark_succeeded() {
                        info!("Retry request succeeded after {} attempt(s)", self.state.attempts());
                        listener.on_success(&response);
                    }
                    return Ok(response);
                }
                Some(Ok(Verdict::Rejected)) => {
                    debug!("Response not accepted yet, waiting to retry");
                }
                Some(Ok(Verdict::Failed(response))) => {
                    listener.on_error(&response);
                    last_error = Some(response);
                }
            }

            if let Some(max) = self.policy.max_attempts {
                if self.state.attempts() >= max.get() {
                    return Err(RetryError::Exhausted {
                        attempts: self.state.attempts(),
                        last_error,
                    });
                }
            }

            ticker.reset();
            let mut last_tick = Instant::now();
            loop {
                let cancelled = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => true,
                    _ = ticker.tick() => false,
                };
                if cancelled {
                    return Err(RetryError::Cancelled);
                }
                let now = Instant::now();
                let waited = self.state.elapsed().saturating_add(now - last_tick);
                if self.state.tick(now - last_tick, interval) {
                    info!("Retrying request after {:?}", waited);
                    break;
                }
                last_tick = now;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::NoopListener;
    use crate::response::Body;
    use crate::test_utils::Recorder;
    use std::collections::VecDeque;

    /// Replays a scripted list of verdicts and records the payloads it saw.
    struct Scripted {
        verdicts: VecDeque<Verdict<String, String>>,
        payloads: Vec<Payload>,
        started: Vec<Instant>,
    }

    impl Scripted {
        fn new(verdicts: Vec<Verdict<String, String>>) -> Self {
            Self {
                verdicts: verdicts.into(),
                payloads: Vec::new(),
                started: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl Attempt for Scripted {
        type Success = String;
        type Failure = String;

        async fn attempt(
            &mut self,
            payload: &Payload,
        ) -> Result<Verdict<String, String>, RequestError> {
            self.payloads.push(payload.clone());
            self.started.push(Instant::now());
            Ok(self.verdicts.pop_front().unwrap_or(Verdict::Rejected))
        }
    }

    fn ok(text: &str) -> Response<String> {
        Response::new(false, 200, "http://test/", None, Body::Text(text.to_string()))
    }

    fn failed() -> Response<String> {
        Response::new(true, 0, "http://test/", None, Body::Empty)
    }

    #[test]
    fn test_policy_interval() {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(2),
            retry_after: Duration::from_millis(500),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.interval(), Duration::from_millis(2500));

        let policy = RetryPolicy {
            timeout: Duration::from_secs(u64::MAX),
            retry_after: Duration::from_secs(1),
            ..RetryPolicy::default()
        };
        assert_eq!(policy.interval(), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_with_huge_timeout_does_not_overflow() {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(u64::MAX),
            retry_after: Duration::from_secs(1),
            ..RetryPolicy::default()
        };
        let mut scheduler = RetryScheduler::new(policy);
        let mut attempt = Scripted::new(vec![Verdict::Accepted(ok("done"))]);

        let response = scheduler
            .run(&mut attempt, Payload::None, &NoopListener)
            .await
            .unwrap();
        assert_eq!(response.body.as_text(), Some("done"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_succeeds_first_attempt() {
        let mut scheduler = RetryScheduler::new(RetryPolicy::default());
        let mut attempt = Scripted::new(vec![Verdict::Accepted(ok("done"))]);
        let recorder = Recorder::default();

        let response = scheduler
            .run(&mut attempt, Payload::None, &recorder)
            .await
            .unwrap();

        assert_eq!(response.body.as_text(), Some("done"));
        assert_eq!(attempt.payloads.len(), 1);
        assert_eq!(recorder.successes(), 1);
        assert!(scheduler.has_succeeded());
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_run_retries_with_identical_payload() {
        let mut scheduler = RetryScheduler::new(RetryPolicy::default());
        let mut attempt = Scripted::new(vec![
            Verdict::Rejected,
            Verdict::Failed(failed()),
            Verdict::Rejected,
            Verdict::Accepted(ok("done")),
        ]);
        let recorder = Recorder::default();
        let payload = Payload::Bytes(b"same bytes".to_vec());

        scheduler
            .run(&mut attempt, payload.clone(), &recorder)
            .await
            .unwrap();

        assert_eq!(attempt.payloads, vec![payload; 4]);
        assert_eq!(recorder.successes(), 1);
        assert_eq!(recorder.errors(), 1);
        assert_eq!(scheduler.state().attempts(), 4);
        assert_eq!(scheduler.state().payload(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_timeout_plus_retry_after() {
        let policy = RetryPolicy {
            timeout: Duration::from_secs(1),
            retry_after: Duration::from_millis(500),
            tick: Duration::from_millis(100),
            ..RetryPolicy::default()
        };
        let mut scheduler = RetryScheduler::new(policy);
        let mut attempt = Scripted::new(vec![Verdict::Rejected, Verdict::Accepted(ok("done"))]);

        scheduler
            .run(&mut attempt, Payload::None, &NoopListener)
            .await
            .unwrap();

        let gap = attempt.started[1] - attempt.started[0];
        assert!(gap > Duration::from_millis(1500), "gap was {:?}", gap);
        assert!(gap <= Duration::from_millis(1700), "gap was {:?}", gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exhausts_bound() {
        let policy = RetryPolicy {
            max_attempts: NonZeroU32::new(3),
            ..RetryPolicy::default()
        };
        let mut scheduler = RetryScheduler::new(policy);
        let mut attempt = Scripted::new(vec![
            Verdict::Failed(failed()),
            Verdict::Failed(failed()),
            Verdict::Rejected,
        ]);

        let result = scheduler.run(&mut attempt, Payload::None, &NoopListener).await;

        match result {
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.is_some_and(|r| r.is_error));
            }
            other => panic!("expected exhausted, got {:?}", other),
        }
        assert!(!scheduler.has_succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_aborts_on_request_error() {
        struct Broken;

        #[async_trait]
        impl Attempt for Broken {
            type Success = String;
            type Failure = String;

            async fn attempt(
                &mut self,
                _payload: &Payload,
            ) -> Result<Verdict<String, String>, RequestError> {
                Err(RequestError::InvalidUri("nope".into()))
            }
        }

        let mut scheduler = RetryScheduler::new(RetryPolicy::default());
        let result = scheduler.run(&mut Broken, Payload::None, &NoopListener).await;
        assert!(matches!(
            result,
            Err(RetryError::Aborted(RequestError::InvalidUri(_)))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_unbounded_retries() {
        let mut scheduler = RetryScheduler::new(RetryPolicy::default());
        let token = scheduler.cancel_token();
        let mut attempt = Scripted::new(Vec::new());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            token.cancel();
        });

        let result = scheduler.run(&mut attempt, Payload::None, &NoopListener).await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        // One attempt every 600ms of virtual time for 5 seconds.
        assert!(attempt.payloads.len() >= 8, "attempts: {}", attempt.payloads.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_scheduler_does_not_start() {
        let mut scheduler = RetryScheduler::new(RetryPolicy::default());
        scheduler.cancel_token().cancel();
        let mut attempt = Scripted::new(vec![Verdict::Accepted(ok("done"))]);

        let result = scheduler.run(&mut attempt, Payload::None, &NoopListener).await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert!(attempt.payloads.is_empty());
    }
}
