//! Durable function client: submit an orchestration, then poll its status
//! endpoint until it completes.
//!
//! # Protocol
//!
//! 1. **Submit**: POST to the function. The response body must hold exactly
//!    one instance id; otherwise the POST is retried on the next tick.
//! 2. **Poll**: GET the status endpoint derived from the id until the
//!    instance reports `runtimeStatus == "Completed"`.
//! 3. The instance `output` is delivered as a `Typed<Vec<S>>` response
//!    carrying the metadata of the final poll.
//!
//! Both phases run on the same [`RetryScheduler`], so they share its timing,
//! attempt bound and cancellation.

mod function;
mod instance;
mod phase;

pub use function::{FunctionApp, LOCALHOST};
pub use instance::{COMPLETED, DurableInstance};
pub use phase::{DurableState, Phase, extract_instance_id, status_url};

use async_trait::async_trait;
use log::{debug, error};
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::http::{Outcome, Payload, Request, RequestError, ReqwestTransport, Transport};
use crate::listener::{Listener, NoopListener};
use crate::response::{Body, Response};
use crate::retry::{Attempt, RetryError, RetryPolicy, RetryScheduler, Verdict};

pub const DEFAULT_TASK_HUB: &str = "SampleHubJs";
pub const DEFAULT_CONNECTION: &str = "Storage";

struct DurablePoll<E, S, T: Transport> {
    request: Request<T>,
    app: FunctionApp,
    task_hub: String,
    connection: String,
    state: DurableState,
    _types: PhantomData<fn() -> (E, S)>,
}

impl<E, S, T> DurablePoll<E, S, T>
where
    E: DeserializeOwned + Default + Send + fmt::Debug + 'static,
    S: DeserializeOwned + Default + Send + 'static,
    T: Transport,
{
    async fn submit(&mut self, payload: &Payload) -> Result<Verdict<Vec<S>, E>, RequestError> {
        let url = self.request.uri().inspect_err(|e| error!("{}", e))?;
        let outgoing = self
            .request
            .prepare(Phase::Submitting.method(), url, payload)
            .await;

        match self.request.dispatch::<E, String>(outgoing).await {
            Outcome::Error(response) => Ok(Verdict::Failed(response)),
            Outcome::Success(response) => {
                self.state
                    .accept_submit(response.body.as_text().unwrap_or_default());
                // Submit acceptance only advances the phase; it is never
                // reported as the final success.
                Ok(Verdict::Rejected)
            }
        }
    }

    async fn poll(&mut self, payload: &Payload) -> Result<Verdict<Vec<S>, E>, RequestError> {
        let app = &self.app;
        let status = self
            .state
            .status_url(|| app.host(), &self.task_hub, &self.connection)
            .unwrap_or_default();
        let url = Url::parse(&status)
            .map_err(|_| RequestError::InvalidUri(status))
            .inspect_err(|e| error!("{}", e))?;
        let outgoing = self
            .request
            .prepare(Phase::Polling.method(), url, payload)
            .await;

        match self.request.dispatch::<E, DurableInstance<S>>(outgoing).await {
            Outcome::Error(response) => Ok(Verdict::Failed(response)),
            Outcome::Success(response) => {
                let Response {
                    is_error,
                    status_code,
                    url,
                    headers,
                    body,
                } = response;
                match body {
                    Body::Typed(instance) if instance.is_completed() => {
                        Ok(Verdict::Accepted(Response::new(
                            is_error,
                            status_code,
                            url,
                            headers,
                            Body::Typed(instance.output),
                        )))
                    }
                    body => {
                        debug!(
                            "Durable instance {:?} not completed (status: {:?})",
                            self.state.instance_id(),
                            body.as_typed().map(|i| i.runtime_status.as_str())
                        );
                        Ok(Verdict::Rejected)
                    }
                }
            }
        }
    }
}

#[async_trait]
impl<E, S, T> Attempt for DurablePoll<E, S, T>
where
    E: DeserializeOwned + Default + Send + fmt::Debug + 'static,
    S: DeserializeOwned + Default + Send + 'static,
    T: Transport,
{
    type Success = Vec<S>;
    type Failure = E;

    async fn attempt(&mut self, payload: &Payload) -> Result<Verdict<Vec<S>, E>, RequestError> {
        match self.state.phase() {
            Phase::Submitting => self.submit(payload).await,
            Phase::Polling => self.poll(payload).await,
        }
    }
}

/// Client for a long-running durable function.
///
/// A send that is dropped or exhausted before completing keeps its phase
/// and instance id: the next send resumes polling the same instance. Only a
/// send after a completed one starts a new orchestration.
pub struct DurableFunction<E, S, T: Transport = ReqwestTransport> {
    poll: DurablePoll<E, S, T>,
    scheduler: RetryScheduler,
    listener: Arc<dyn Listener<E, Vec<S>>>,
}

impl<E, S, T> DurableFunction<E, S, T>
where
    E: DeserializeOwned + Default + Send + fmt::Debug + 'static,
    S: DeserializeOwned + Default + Send + 'static,
    T: Transport,
{
    pub fn new(request: Request<T>, app: FunctionApp, policy: RetryPolicy) -> Self {
        Self {
            poll: DurablePoll {
                request: app.bind(request),
                app,
                task_hub: DEFAULT_TASK_HUB.to_string(),
                connection: DEFAULT_CONNECTION.to_string(),
                state: DurableState::default(),
                _types: PhantomData,
            },
            scheduler: RetryScheduler::new(policy),
            listener: Arc::new(NoopListener),
        }
    }

    pub fn with_task_hub(mut self, task_hub: impl Into<String>) -> Self {
        self.poll.task_hub = task_hub.into();
        self
    }

    pub fn with_connection(mut self, connection: impl Into<String>) -> Self {
        self.poll.connection = connection.into();
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn Listener<E, Vec<S>>>) -> Self {
        self.listener = listener;
        self
    }

    pub fn app(&self) -> &FunctionApp {
        &self.poll.app
    }

    pub fn request(&self) -> &Request<T> {
        &self.poll.request
    }

    pub fn phase(&self) -> Phase {
        self.poll.state.phase()
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.poll.state.instance_id()
    }

    pub fn has_succeeded(&self) -> bool {
        self.scheduler.has_succeeded()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.scheduler.cancel_token()
    }

    /// Submits the orchestration (or resumes polling a pending one) and
    /// waits for its output.
    #[tracing::instrument(skip_all, fields(function = %self.poll.app.function))]
    pub async fn send(&mut self, payload: Payload) -> Result<Response<Vec<S>>, RetryError<E>> {
        if self.scheduler.has_succeeded() {
            self.poll.state.reset();
        }
        self.scheduler.policy_mut().timeout = self
            .poll
            .request
            .config()
            .timeout_duration()
            .unwrap_or_default();
        self.scheduler
            .run(&mut self.poll, payload, self.listener.as_ref())
            .await
    }
}
