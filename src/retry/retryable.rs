//! Request that retries until its validation predicate accepts a response.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use super::scheduler::{Attempt, RetryError, RetryPolicy, RetryScheduler, Verdict};
use crate::http::{Outcome, Payload, Request, RequestError, ReqwestTransport, Transport};
use crate::listener::{Listener, NoopListener};
use crate::response::Response;
use tokio_util::sync::CancellationToken;

/// Decides whether a successful response counts as final success.
pub type Validator<S> = Arc<dyn Fn(&Response<S>) -> bool + Send + Sync>;

struct Validated<E, S, T: Transport> {
    request: Request<T>,
    validator: Option<Validator<S>>,
    _types: PhantomData<fn() -> E>,
}

impl<E, S, T: Transport> Validated<E, S, T> {
    fn validate(&self, response: &Response<S>) -> bool {
        match &self.validator {
            Some(validator) => validator(response),
            None => !response.is_error,
        }
    }
}

#[async_trait]
impl<E, S, T> Attempt for Validated<E, S, T>
where
    E: DeserializeOwned + Default + Send + fmt::Debug + 'static,
    S: DeserializeOwned + Default + Send + 'static,
    T: Transport,
{
    type Success = S;
    type Failure = E;

    async fn attempt(&mut self, payload: &Payload) -> Result<Verdict<S, E>, RequestError> {
        Ok(match self.request.send::<E, S>(payload).await? {
            Outcome::Success(response) if self.validate(&response) => Verdict::Accepted(response),
            Outcome::Success(_) => Verdict::Rejected,
            Outcome::Error(response) => Verdict::Failed(response),
        })
    }
}

/// A request re-issued on a timer, with a byte-identical payload, until the
/// validation predicate accepts a response.
///
/// Retries are unbounded unless [`RetryPolicy::max_attempts`] is set.
pub struct RetryableRequest<E, S, T: Transport = ReqwestTransport> {
    inner: Validated<E, S, T>,
    scheduler: RetryScheduler,
    listener: Arc<dyn Listener<E, S>>,
}

impl<E, S, T> RetryableRequest<E, S, T>
where
    E: DeserializeOwned + Default + Send + fmt::Debug + 'static,
    S: DeserializeOwned + Default + Send + 'static,
    T: Transport,
{
    pub fn new(request: Request<T>, policy: RetryPolicy) -> Self {
        Self {
            inner: Validated {
                request,
                validator: None,
                _types: PhantomData,
            },
            scheduler: RetryScheduler::new(policy),
            listener: Arc::new(NoopListener),
        }
    }

    /// Replaces the default predicate (accept any non-error response).
    pub fn with_validator(mut self, validator: Validator<S>) -> Self {
        self.inner.validator = Some(validator);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn Listener<E, S>>) -> Self {
        self.listener = listener;
        self
    }

    pub fn request(&self) -> &Request<T> {
        &self.inner.request
    }

    pub fn has_succeeded(&self) -> bool {
        self.scheduler.has_succeeded()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.scheduler.cancel_token()
    }

    /// Sends the request and keeps retrying until it is accepted.
    #[tracing::instrument(skip_all)]
    pub async fn send(&mut self, payload: Payload) -> Result<Response<S>, RetryError<E>> {
        self.scheduler.policy_mut().timeout = self
            .inner
            .request
            .config()
            .timeout_duration()
            .unwrap_or_default();
        self.scheduler
            .run(&mut self.inner, payload, self.listener.as_ref())
            .await
    }
}
