//! Function app host resolution and authentication.

use log::debug;
use std::fmt;
use std::sync::Arc;

use crate::http::{Hook, OutgoingRequest, Request, Transport};

/// Host used when the account is local.
pub const LOCALHOST: &str = "http://localhost:7071";

/// Where a function app lives and how to call it.
#[derive(Clone, PartialEq, Eq)]
pub struct FunctionApp {
    /// Account name; `localhost`, `127.0.0.1` or empty select the local host.
    pub account: String,
    pub route_prefix: String,
    pub function: String,
    /// Replaces the resolved host, e.g. for a custom domain.
    pub host_override: Option<String>,
    code: Option<String>,
}

impl Default for FunctionApp {
    fn default() -> Self {
        Self {
            account: "localhost".to_string(),
            route_prefix: "api".to_string(),
            function: "hello".to_string(),
            host_override: None,
            code: None,
        }
    }
}

impl fmt::Debug for FunctionApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionApp")
            .field("account", &self.account)
            .field("route_prefix", &self.route_prefix)
            .field("function", &self.function)
            .field("host_override", &self.host_override)
            .field("code", &self.code.as_ref().map(|_| "***"))
            .finish()
    }
}

impl FunctionApp {
    pub fn new(account: impl Into<String>, function: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            function: function.into(),
            ..Self::default()
        }
    }

    pub fn with_route_prefix(mut self, route_prefix: impl Into<String>) -> Self {
        self.route_prefix = route_prefix.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host_override = Some(host.into());
        self
    }

    /// Sets the function key sent in the `code` header. Blank codes are ignored.
    pub fn set_code(&mut self, code: impl Into<String>) {
        let code = code.into().trim().to_string();
        self.code = (!code.is_empty()).then_some(code);
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.set_code(code);
        self
    }

    pub fn is_local(&self) -> bool {
        self.account.is_empty()
            || self.account.eq_ignore_ascii_case("localhost")
            || self.account == "127.0.0.1"
    }

    /// Base URL of the function host.
    pub fn host(&self) -> String {
        if let Some(host) = &self.host_override {
            host.trim_end_matches('/').to_string()
        } else if self.is_local() {
            LOCALHOST.to_string()
        } else {
            format!("https://{}.azurewebsites.net", self.account)
        }
    }

    /// Base API of the function: host, route prefix and function name.
    pub fn api(&self) -> String {
        if self.route_prefix.is_empty() {
            format!("{}/{}", self.host(), self.function)
        } else {
            format!("{}/{}/{}", self.host(), self.route_prefix, self.function)
        }
    }

    /// Pre-dispatch hook adding the `code` header, when a code is set.
    pub fn hook(&self) -> Option<Hook> {
        let code = self.code.clone()?;
        Some(Arc::new(move |request: &mut OutgoingRequest| {
            request.headers.set("code", code.clone());
        }))
    }

    /// Points `request` at this function app.
    pub fn bind<T: Transport>(&self, request: Request<T>) -> Request<T> {
        debug!("Binding request to function app {:?}", self);
        let request = request.with_api(self.api());
        match self.hook() {
            Some(hook) => request.with_hook(hook),
            None => request,
        }
    }
}
