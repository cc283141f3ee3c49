//! Content-type presets and the media types the classifier recognises.

use std::fmt;
use std::str::FromStr;

pub const RAW_DATA: &str = "application/octet-stream";
pub const TEXT: &str = "text/plain";
pub const JSON: &str = "application/json";
pub const XML: &str = "application/xml";
pub const XML_TEXT: &str = "text/xml";
pub const HTML: &str = "text/html";

/// Declared content type of a request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentType {
    RawData,
    Text,
    #[default]
    Json,
    Xml,
    Html,
}

impl ContentType {
    pub fn mime(self) -> &'static str {
        match self {
            ContentType::RawData => RAW_DATA,
            ContentType::Text => TEXT,
            ContentType::Json => JSON,
            ContentType::Xml => XML,
            ContentType::Html => HTML,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

impl FromStr for ContentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" | "rawdata" | "binary" | RAW_DATA => Ok(ContentType::RawData),
            "text" | TEXT => Ok(ContentType::Text),
            "json" | JSON => Ok(ContentType::Json),
            "xml" | XML => Ok(ContentType::Xml),
            "html" | HTML => Ok(ContentType::Html),
            other => anyhow::bail!(
                "Unknown content type '{}'. Expected one of: raw, text, json, xml, html.",
                other
            ),
        }
    }
}

/// Returns the media type token of a `Content-Type` header value, i.e.
/// everything before the first `;`.
pub fn media_type(header: &str) -> &str {
    header.split(';').next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime() {
        assert_eq!(ContentType::Json.mime(), "application/json");
        assert_eq!(ContentType::RawData.mime(), "application/octet-stream");
        assert_eq!(ContentType::Html.to_string(), "text/html");
        assert_eq!(ContentType::default(), ContentType::Json);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("json".parse::<ContentType>().unwrap(), ContentType::Json);
        assert_eq!("XML".parse::<ContentType>().unwrap(), ContentType::Xml);
        assert_eq!(
            "text/plain".parse::<ContentType>().unwrap(),
            ContentType::Text
        );
        assert!("yaml".parse::<ContentType>().is_err());
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type("application/json; charset=utf-8"), JSON);
        assert_eq!(media_type("text/xml"), XML_TEXT);
        assert_eq!(media_type(""), "");
    }
}
