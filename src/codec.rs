//! Body decoding for JSON and XML payloads.
//!
//! Decoding never fails outward: a body that does not match the declared
//! type is logged and replaced by `T::default()`, so the surrounding
//! response envelope is always delivered.

use log::error;
use serde::de::DeserializeOwned;
use std::any::type_name;

/// Decodes JSON text into `T`, falling back to `T::default()`.
pub fn decode_json<T: DeserializeOwned + Default>(text: &str) -> T {
    match serde_json::from_str::<T>(text) {
        Ok(value) => value,
        Err(e) => {
            error!("Parse JSON type {} failed: {}", type_name::<T>(), e);
            T::default()
        }
    }
}

/// Decodes XML text into `T`, falling back to `T::default()`.
pub fn decode_xml<T: DeserializeOwned + Default>(text: &str) -> T {
    match quick_xml::de::from_str::<T>(text) {
        Ok(value) => value,
        Err(e) => {
            error!("Parse XML type {} failed: {}", type_name::<T>(), e);
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Default, PartialEq)]
    struct Message {
        message: String,
    }

    #[test]
    fn test_decode_json() {
        let msg: Message = decode_json(r#"{"message": "hi"}"#);
        assert_eq!(msg.message, "hi");
    }

    #[test]
    fn test_decode_json_malformed_falls_back_to_default() {
        let msg: Message = decode_json("{not json");
        assert_eq!(msg, Message::default());
    }

    #[test]
    fn test_decode_json_wrong_shape_falls_back_to_default() {
        let values: Vec<u32> = decode_json(r#"{"message": "hi"}"#);
        assert!(values.is_empty());
    }

    #[test]
    fn test_decode_xml() {
        let msg: Message = decode_xml("<item><message>hello xml</message></item>");
        assert_eq!(msg.message, "hello xml");
    }

    #[test]
    fn test_decode_xml_malformed_falls_back_to_default() {
        let msg: Message = decode_xml("<item><message>oops</item>");
        assert_eq!(msg, Message::default());
    }
}
