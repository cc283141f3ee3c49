//! Response body classification by content negotiation.

use log::debug;
use serde::de::DeserializeOwned;
use std::any::TypeId;

use super::content_type::{JSON, XML, XML_TEXT, media_type};
use crate::codec::{decode_json, decode_xml};
use crate::response::Body;

/// Classifies a response body into a [`Body`] variant for the expected type `T`.
///
/// - `T = String`: the text is returned as [`Body::Text`] (or [`Body::Empty`]),
///   no decoding is attempted.
/// - Non-empty text is decoded according to the media type of
///   `content_type`: JSON or XML into [`Body::Typed`]. Unknown media types
///   fall back to JSON when `auto_detect` is set and the text looks like a
///   JSON object or array, otherwise the text is kept as [`Body::Text`].
/// - Without text, a non-empty byte payload becomes [`Body::Binary`].
///
/// Decode failures never surface: the typed value falls back to `T::default()`.
pub fn classify<T>(text: &str, bytes: &[u8], content_type: &str, auto_detect: bool) -> Body<T>
where
    T: DeserializeOwned + Default + 'static,
{
    if TypeId::of::<T>() == TypeId::of::<String>() {
        return if text.is_empty() {
            Body::Empty
        } else {
            Body::Text(text.to_string())
        };
    }

    if !text.is_empty() {
        return match media_type(content_type) {
            JSON => Body::Typed(decode_json(text)),
            XML | XML_TEXT => Body::Typed(decode_xml(text)),
            _ if auto_detect && looks_like_json(text) => {
                debug!("Attempting to parse JSON detected in response body");
                Body::Typed(decode_json(text))
            }
            _ => Body::Text(text.to_string()),
        };
    }

    if !bytes.is_empty() {
        return Body::Binary(bytes.to_vec());
    }

    Body::Empty
}

fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::content_type::RAW_DATA;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Default, PartialEq)]
    struct Message {
        message: String,
    }

    #[test]
    fn test_string_type_returns_text() {
        let body: Body<String> = classify(r#"{"message":"hi"}"#, b"", JSON, true);
        assert_eq!(body, Body::Text(r#"{"message":"hi"}"#.to_string()));
    }

    #[test]
    fn test_string_type_empty_text_is_empty() {
        let body: Body<String> = classify("", b"\x00\x01", JSON, true);
        assert_eq!(body, Body::Empty);
    }

    #[test]
    fn test_json_media_type() {
        let body: Body<Message> = classify(
            r#"{"message":"hi"}"#,
            b"",
            "application/json; charset=utf-8",
            false,
        );
        assert_eq!(
            body,
            Body::Typed(Message {
                message: "hi".into()
            })
        );
    }

    #[test]
    fn test_xml_media_types() {
        let xml = "<item><message>hi</message></item>";
        for header in [XML, XML_TEXT] {
            let body: Body<Message> = classify(xml, b"", header, false);
            assert_eq!(
                body,
                Body::Typed(Message {
                    message: "hi".into()
                })
            );
        }
    }

    #[test]
    fn test_auto_detect_object_and_array() {
        let body: Body<Message> = classify(r#" {"message":"hi"} "#, b"", "text/plain", true);
        assert_eq!(body.as_typed().map(|m| m.message.as_str()), Some("hi"));

        let body: Body<Vec<String>> = classify(r#"["x","y"]"#, b"", "", true);
        assert_eq!(body, Body::Typed(vec!["x".to_string(), "y".to_string()]));
    }

    #[test]
    fn test_auto_detect_disabled_keeps_text() {
        let body: Body<Message> = classify(r#"{"message":"hi"}"#, b"", "text/plain", false);
        assert_eq!(body, Body::Text(r#"{"message":"hi"}"#.to_string()));
    }

    #[test]
    fn test_unrecognised_text_stays_text() {
        let body: Body<Message> = classify("plain words", b"", "text/plain", true);
        assert_eq!(body, Body::Text("plain words".to_string()));
    }

    #[test]
    fn test_malformed_json_decodes_to_default() {
        let body: Body<Message> = classify("{broken", b"", JSON, true);
        assert_eq!(body, Body::Typed(Message::default()));
    }

    #[test]
    fn test_binary_without_text() {
        let body: Body<Message> = classify("", &[0xff, 0xfe], RAW_DATA, true);
        assert_eq!(body, Body::Binary(vec![0xff, 0xfe]));
    }

    #[test]
    fn test_empty() {
        let body: Body<Message> = classify("", b"", "", true);
        assert_eq!(body, Body::Empty);
    }
}
