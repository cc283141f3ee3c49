//! Transport capability: issues one physical HTTP request.
//!
//! The [`Transport`] trait is the seam between request logic and the network.
//! [`ReqwestTransport`] is the production implementation; tests substitute
//! `MockTransport`.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use super::key_values::KeyValues;
use crate::response::Headers;

/// Request methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Create,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Create => "CREATE",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }

    /// GET and HEAD never carry an upload body.
    pub fn allows_body(self) -> bool {
        !matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "CREATE" => Ok(Method::Create),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            other => anyhow::bail!("Unsupported HTTP method '{}'", other),
        }
    }
}

/// A fully prepared request, ready for dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: Url,
    pub headers: KeyValues,
    pub body: Option<Vec<u8>>,
    /// Per-attempt timeout. `None` means no timeout.
    pub timeout: Option<Duration>,
}

/// What came back from the server for one exchange.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Headers,
    /// Body as text. Empty when the body is empty or not valid UTF-8.
    pub text: String,
    pub bytes: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, headers: Headers, bytes: Vec<u8>) -> Self {
        let text = String::from_utf8(bytes.clone()).unwrap_or_default();
        Self {
            status,
            headers,
            text,
            bytes,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The `Content-Type` response header, or an empty string.
    pub fn content_type(&self) -> &str {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .map(|(_, value)| value.as_str())
            .unwrap_or_default()
    }
}

/// Network-level failure: no HTTP response was received.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Other(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_connect() {
            TransportError::Connect(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues the request. HTTP error statuses are returned as `Ok`; only
    /// network-level failures are `Err`.
    async fn execute(&self, request: OutgoingRequest) -> Result<RawResponse, TransportError>;
}

/// Transport backed by a reqwest [`Client`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        let client = Client::builder()
            .user_agent("restpoll")
            .build()
            .unwrap_or_else(|_| Client::new());
        Self::new(client)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, url = %request.url))]
    async fn execute(&self, request: OutgoingRequest) -> Result<RawResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .map_err(|e| TransportError::Other(e.to_string()))?;

        let mut builder = self.client.request(method, request.url.clone());
        for (key, value) in request.headers.iter() {
            builder = builder.header(key, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let bytes = response.bytes().await?.to_vec();

        debug!("{} {} -> {} ({} bytes)", request.method, request.url, status, bytes.len());
        Ok(RawResponse::new(status, headers, bytes))
    }
}
