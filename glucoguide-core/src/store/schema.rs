use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::{DocPath, Document};

/// A stored document that does not match its kind's schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {kind} document at {path}: {message}")]
pub struct SchemaError {
    pub kind: &'static str,
    pub path: String,
    pub message: String,
}

impl SchemaError {
    pub fn new(kind: &'static str, path: &DocPath, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.to_string(),
            message: message.into(),
        }
    }
}

/// Typed view of one document kind.
///
/// `decode` validates and coerces a raw document; anything missing a required
/// key is rejected rather than rendered partially.
pub trait DocumentSchema: Sized {
    const KIND: &'static str;

    fn decode(path: &DocPath, data: &Document) -> Result<Self, SchemaError>;

    fn encode(&self) -> Document;
}

/// Deserializes a raw document through serde, tagging failures with the kind and path.
pub fn decode_fields<T: DeserializeOwned>(
    kind: &'static str,
    path: &DocPath,
    data: &Document,
) -> Result<T, SchemaError> {
    serde_json::from_value(Value::Object(data.clone()))
        .map_err(|e| SchemaError::new(kind, path, e.to_string()))
}

/// Serializes a value into a document body. Non-object values encode as empty.
pub fn encode_fields<T: Serialize>(value: &T) -> Document {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            tracing::error!(?other, "value did not encode as an object");
            Document::new()
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to encode document");
            Document::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        name: String,
        dose: String,
    }

    fn path() -> DocPath {
        DocPath::parse("medicines/m1").unwrap()
    }

    #[test]
    fn test_decode_fields_reports_missing_key() {
        let data = json!({"name": "Insulin"}).as_object().cloned().unwrap();
        let err = decode_fields::<Sample>("medicine", &path(), &data).unwrap_err();
        assert_eq!(err.kind, "medicine");
        assert_eq!(err.path, "medicines/m1");
        assert!(err.message.contains("dose"));
    }

    #[test]
    fn test_encode_fields() {
        let sample = Sample {
            name: "Insulin".to_string(),
            dose: "10 units".to_string(),
        };
        let doc = encode_fields(&sample);
        assert_eq!(doc["name"], "Insulin");
        assert_eq!(
            decode_fields::<Sample>("medicine", &path(), &doc).unwrap(),
            sample
        );
    }
}
