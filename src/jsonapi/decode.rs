// src/jsonapi/decode.rs

//! Typed decoding of inlined resources.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, Result};

/// Decode an inlined resource into a domain record.
///
/// Errors carry the resource's `type` and `id` so a failed run points at the
/// offending record.
pub fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    let context = describe(&value);
    serde_json::from_value(value).map_err(|e| AppError::decode(context, e))
}

/// Short `"<type> <id>"` label for log lines and errors.
pub fn describe(value: &Value) -> String {
    let kind = value.get("type").and_then(Value::as_str).unwrap_or("resource");
    let id = value.get("id").and_then(Value::as_str).unwrap_or("?");
    format!("{kind} {id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, serde::Deserialize)]
    #[allow(dead_code)]
    struct Named {
        id: String,
        name: String,
    }

    #[test]
    fn test_decode_error_has_context() {
        let err = decode::<Named>(json!({ "id": "12", "type": "Tag" })).unwrap_err();
        match err {
            AppError::Decode { context, message } => {
                assert_eq!(context, "Tag 12");
                assert!(message.contains("name"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_describe_without_fields() {
        assert_eq!(describe(&json!({})), "resource ?");
    }
}
