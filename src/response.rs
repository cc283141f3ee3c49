//! Typed envelope describing the outcome of one HTTP exchange.
//!
//! A [`Response`] always carries the exchange metadata (error flag, status,
//! URL, headers). The body is one of the closed set of [`Body`] variants, so
//! a caller can inspect the metadata even when the body failed to decode.

use std::collections::BTreeMap;
use std::fmt;

/// Response headers keyed as received from the transport.
pub type Headers = BTreeMap<String, String>;

/// The classified body of a response.
#[derive(Debug, Clone, PartialEq)]
pub enum Body<T> {
    /// No body was returned.
    Empty,
    /// Body kept as an opaque string.
    Text(String),
    /// Body decoded into the caller's declared type.
    Typed(T),
    /// Raw bytes, used when there is no text but a binary payload exists.
    Binary(Vec<u8>),
}

impl<T> Body<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_typed(&self) -> Option<&T> {
        match self {
            Body::Typed(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_typed(self) -> Option<T> {
        match self {
            Body::Typed(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Body::Binary(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Short name of the active variant, used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Body::Empty => "empty",
            Body::Text(_) => "text",
            Body::Typed(_) => "typed",
            Body::Binary(_) => "binary",
        }
    }
}

/// Immutable outcome of one HTTP exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    /// True only for transport-level failures (no HTTP response was received).
    pub is_error: bool,
    /// HTTP status code, `0` when the transport failed.
    pub status_code: u16,
    pub url: String,
    /// Headers as received. Always `None` when `is_error` is set.
    pub headers: Option<Headers>,
    pub body: Body<T>,
}

impl<T> Response<T> {
    pub fn new(
        is_error: bool,
        status_code: u16,
        url: impl Into<String>,
        headers: Option<Headers>,
        body: Body<T>,
    ) -> Self {
        Self {
            is_error,
            status_code,
            url: url.into(),
            headers: if is_error { None } else { headers },
            body,
        }
    }

    /// Looks up a response header, trying the exact key before an ASCII
    /// case-insensitive match.
    pub fn header(&self, key: &str) -> Option<&str> {
        let headers = self.headers.as_ref()?;
        headers
            .get(key)
            .or_else(|| {
                headers
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(key))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }

    /// Re-wraps the envelope metadata around a different body.
    pub fn with_body<U>(self, body: Body<U>) -> Response<U> {
        Response {
            is_error: self.is_error,
            status_code: self.status_code,
            url: self.url,
            headers: self.headers,
            body,
        }
    }
}

impl<T> fmt::Display for Response<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Status Code: {} Url: {} Response Headers:",
            self.status_code, self.url
        )?;
        if let Some(headers) = &self.headers {
            for (key, value) in headers.iter().rev() {
                write!(f, "\n{}:\"{}\"", key, value)?;
            }
        }
        Ok(())
    }
}
