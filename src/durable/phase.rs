//! Submit/poll phase tracking for a durable function call.

use tracing::{error, info};
use regex::Regex;
use std::sync::LazyLock;

use crate::http::Method;

static INSTANCE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)[a-z0-9-]+").expect("instance id pattern is valid"));

/// Status endpoint the poll phase is redirected to.
pub fn status_url(host: &str, instance_id: &str, task_hub: &str, connection: &str) -> String {
    format!(
        "{}/runtime/webhooks/DurableTaskExtension/instances/{}?taskHub={}&connection={}",
        host, instance_id, task_hub, connection
    )
}

/// Extracts the instance id from a submit response body. The body must
/// contain exactly one run of `[a-z0-9-]` characters.
pub fn extract_instance_id(body: &str) -> Option<String> {
    let mut runs = INSTANCE_ID.find_iter(body);
    let id = runs.next()?;
    if runs.next().is_some() {
        return None;
    }
    Some(id.as_str().to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Starting the orchestration with a POST.
    #[default]
    Submitting,
    /// Polling the status endpoint with GET.
    Polling,
}

impl Phase {
    pub fn method(self) -> Method {
        match self {
            Phase::Submitting => Method::Post,
            Phase::Polling => Method::Get,
        }
    }
}

/// Phase, captured instance id and cached host of one durable call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DurableState {
    phase: Phase,
    instance_id: Option<String>,
    resolved_host: Option<String>,
}

impl DurableState {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.instance_id.as_deref()
    }

    /// Handles the body of an accepted submit response. Moves to
    /// [`Phase::Polling`] when it holds a single well-formed instance id;
    /// otherwise the phase is unchanged. Returns whether the phase advanced.
    pub fn accept_submit(&mut self, body: &str) -> bool {
        if self.phase == Phase::Polling {
            return false;
        }
        match extract_instance_id(body) {
            Some(id) => {
                info!("Got instance id: {}", id);
                self.instance_id = Some(id);
                self.phase = Phase::Polling;
                true
            }
            None => {
                error!("Unexpected instance id format: {:?}", body);
                false
            }
        }
    }

    /// Status URL for the captured instance, resolving the host once.
    /// `None` before an instance id was captured.
    pub fn status_url(
        &mut self,
        resolve_host: impl FnOnce() -> String,
        task_hub: &str,
        connection: &str,
    ) -> Option<String> {
        let id = self.instance_id.as_deref()?;
        let host = self.resolved_host.get_or_insert_with(resolve_host);
        Some(status_url(host, id, task_hub, connection))
    }

    /// Back to [`Phase::Submitting`] with no id and no cached host.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
