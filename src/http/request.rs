//! Request executor: composes, dispatches and classifies one logical request.

use log::{Level, debug, error, log};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::classify::classify;
use super::content_type::ContentType;
use super::key_values::KeyValues;
use super::transport::{Method, OutgoingRequest, RawResponse, ReqwestTransport, Transport};
use crate::response::{Body, Response};

/// Static configuration of a request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    pub method: Method,
    /// Absolute URL, or a path appended to the base API.
    pub url_endpoint: String,
    pub params: KeyValues,
    pub headers: KeyValues,
    /// Upload text used when no explicit payload is passed to `send`.
    pub body: String,
    pub content_type: ContentType,
    /// Per-attempt timeout in whole seconds; `0` disables it.
    pub timeout: u64,
    /// Try to decode JSON-looking bodies even when the response
    /// `Content-Type` does not say JSON.
    pub auto_detect: bool,
    /// Log request/response summaries at info level instead of debug.
    pub logging: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            method: Method::Get,
            url_endpoint: String::new(),
            params: KeyValues::new(),
            headers: KeyValues::new(),
            body: String::new(),
            content_type: ContentType::Json,
            timeout: 0,
            auto_detect: true,
            logging: false,
        }
    }
}

impl RequestConfig {
    pub fn new(method: Method, url_endpoint: impl Into<String>) -> Self {
        Self {
            method,
            url_endpoint: url_endpoint.into(),
            ..Self::default()
        }
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}

/// Upload payload passed to a send.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Payload {
    /// Use the configured body text, if any.
    #[default]
    None,
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// Terminal result of one physical exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<E, S> {
    Success(Response<S>),
    Error(Response<E>),
}

impl<E, S> Outcome<E, S> {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The endpoint could not be turned into an absolute URI. The request
    /// was never started.
    #[error("failed to create absolute URI for request: {0}")]
    InvalidUri(String),
}

/// Mutates the outgoing request right before dispatch.
pub type Hook = Arc<dyn Fn(&mut OutgoingRequest) + Send + Sync>;

/// One configured request bound to a transport.
pub struct Request<T: Transport = ReqwestTransport> {
    config: RequestConfig,
    api: String,
    transport: T,
    hook: Option<Hook>,
}

impl<T: Transport> Request<T> {
    pub fn new(config: RequestConfig, transport: T) -> Self {
        Self {
            config,
            api: String::new(),
            transport,
            hook: None,
        }
    }

    /// Sets the base API used when the endpoint is not an absolute URL.
    pub fn with_api(mut self, api: impl Into<String>) -> Self {
        self.api = api.into();
        self
    }

    pub fn with_hook(mut self, hook: Hook) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    pub fn api(&self) -> &str {
        &self.api
    }

    pub fn add_query_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config.params.set(key, value);
    }

    pub fn add_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.config.headers.set(key, value);
    }

    /// Composes the target URI from the endpoint, the given base API and the
    /// query parameters.
    pub fn compose_uri(&self, api: &str) -> Result<Url, RequestError> {
        let endpoint = self.config.url_endpoint.as_str();
        let query = self.config.params.to_query_string();

        let uri = if endpoint.starts_with("http") {
            format!("{}{}", endpoint, query)
        } else if api.find('?').is_some_and(|i| i > 0) {
            api.to_string()
        } else if endpoint.is_empty() {
            format!("{}{}", api, query)
        } else {
            format!(
                "{}/{}{}",
                api.trim_end_matches('/'),
                endpoint.trim_start_matches('/'),
                query
            )
        };

        Url::parse(&uri).map_err(|_| RequestError::InvalidUri(uri))
    }

    pub fn uri(&self) -> Result<Url, RequestError> {
        self.compose_uri(&self.api)
    }

    /// Builds the outgoing request for `url` using `method`.
    pub async fn prepare(&self, method: Method, url: Url, payload: &Payload) -> OutgoingRequest {
        let mut headers = self.config.headers.clone();
        if !headers.contains_key_ignore_case("content-type") {
            headers.set("Content-Type", self.config.content_type.mime());
        }

        let mut request = OutgoingRequest {
            method,
            url,
            headers,
            body: self.upload(method, payload).await,
            timeout: self.config.timeout_duration(),
        };

        if let Some(hook) = &self.hook {
            hook(&mut request);
        }
        request
    }

    async fn upload(&self, method: Method, payload: &Payload) -> Option<Vec<u8>> {
        if !method.allows_body() {
            return None;
        }
        match payload {
            Payload::Bytes(bytes) if !bytes.is_empty() => Some(bytes.clone()),
            Payload::File(path) if !path.as_os_str().is_empty() => {
                match tokio::fs::read(path).await {
                    Ok(bytes) => Some(bytes),
                    Err(e) => {
                        error!("Error reading upload file {:?}: {}", path, e);
                        None
                    }
                }
            }
            _ if !self.config.body.is_empty() => {
                debug!("Upload text:\n\"{}\"", self.config.body);
                Some(self.config.body.as_bytes().to_vec())
            }
            _ => None,
        }
    }

    /// Dispatches a prepared request and classifies the response against the
    /// error type `E` or success type `S`.
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    pub async fn dispatch<E, S>(&self, request: OutgoingRequest) -> Outcome<E, S>
    where
        E: DeserializeOwned + Default + 'static,
        S: DeserializeOwned + Default + 'static,
    {
        let url = request.url.to_string();
        let method = request.method;

        match self.transport.execute(request).await {
            Ok(raw) if raw.is_success() => {
                let response = self.to_response::<S>(&url, raw);
                self.log_response(Level::Info, "Response success", &response);
                Outcome::Success(response)
            }
            Ok(raw) => {
                let response = self.to_response::<E>(&url, raw);
                self.log_response(Level::Warn, &format!("{} Request error", method), &response);
                Outcome::Error(response)
            }
            Err(e) => {
                log!(
                    self.level(Level::Warn),
                    "{} Request error\nUrl: {} Error: {}",
                    method,
                    url,
                    e
                );
                Outcome::Error(Response::new(true, 0, url, None, Body::Empty))
            }
        }
    }

    /// Composes, prepares and dispatches the request with the configured method.
    pub async fn send<E, S>(&self, payload: &Payload) -> Result<Outcome<E, S>, RequestError>
    where
        E: DeserializeOwned + Default + 'static,
        S: DeserializeOwned + Default + 'static,
    {
        let url = self.uri().inspect_err(|e| error!("{}", e))?;
        let request = self.prepare(self.config.method, url, payload).await;
        Ok(self.dispatch(request).await)
    }

    fn to_response<B>(&self, url: &str, raw: RawResponse) -> Response<B>
    where
        B: DeserializeOwned + Default + 'static,
    {
        let body = classify::<B>(
            &raw.text,
            &raw.bytes,
            raw.content_type(),
            self.config.auto_detect,
        );
        Response::new(false, raw.status, url, Some(raw.headers), body)
    }

    /// Summaries stay at debug unless `logging` is on; errors always pass.
    fn level(&self, level: Level) -> Level {
        if self.config.logging || level == Level::Error {
            level
        } else {
            Level::Debug
        }
    }

    fn log_response<B>(&self, level: Level, message: &str, response: &Response<B>) {
        log!(
            self.level(level),
            "{}\nStatus Code: {} Url: {} Body: {}",
            message,
            response.status_code,
            response.url,
            response.body.kind()
        );
    }
}
