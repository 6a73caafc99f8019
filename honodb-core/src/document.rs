// honodb-core/src/document.rs
use crate::error::{HonoError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Name of the identifier field every document carries
pub const ID_FIELD: &str = "id";

/// Document identifier: a string or an integral number.
///
/// Untagged, so it appears in documents as a plain value: `{"id": 2}` or `{"id": "s100"}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(untagged)]
pub enum DocumentId {
    Int(i64),
    String(String),
}

impl DocumentId {
    /// Random UUID v4 string id
    pub fn generate() -> Self {
        DocumentId::String(Uuid::new_v4().to_string())
    }

    /// Convert a JSON value into an id. Only strings and integers qualify.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(DocumentId::String(s.clone())),
            Value::Number(n) => n.as_i64().map(DocumentId::Int).ok_or_else(|| {
                HonoError::InvalidDocument(format!("id must be an integer or a string, got {}", n))
            }),
            other => Err(HonoError::InvalidDocument(format!(
                "id must be an integer or a string, got {}",
                other
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DocumentId::Int(i) => Value::from(*i),
            DocumentId::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Int(i) => write!(f, "{}", i),
            DocumentId::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// A stored document: a JSON object with a valid `id` field.
///
/// `fields` keeps the `id` entry and the original key order, so encoding a
/// decoded document reproduces its bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Document {
    pub id: DocumentId,
    pub fields: Map<String, Value>,
}

impl Document {
    /// Build a document from a decoded payload
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(fields) => Self::from_map(fields),
            other => Err(HonoError::InvalidDocument(format!(
                "document must be an object, got {}",
                type_name(&other)
            ))),
        }
    }

    pub fn from_map(fields: Map<String, Value>) -> Result<Self> {
        let id = match fields.get(ID_FIELD) {
            Some(v) => DocumentId::from_value(v)?,
            None => {
                return Err(HonoError::InvalidDocument(
                    "document has no id field".to_string(),
                ))
            }
        };
        Ok(Document { id, fields })
    }

    /// Decode one chunk line
    pub fn decode(line: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(line)?;
        Self::from_value(value)
    }

    /// Encode as a single JSON line, without the trailing newline
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.fields)?)
    }

    /// Field lookup with dot notation ("address.city", "items.0")
    pub fn get(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut value = self.fields.get(first)?;
        for part in parts {
            value = crate::value_utils::step_into(value, part)?;
        }
        Some(value)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl TryFrom<Value> for Document {
    type Error = HonoError;

    fn try_from(value: Value) -> Result<Self> {
        Document::from_value(value)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_string_and_int_ids() {
        let doc = Document::from_value(json!({"id": "s100", "name": "foo"})).unwrap();
        assert_eq!(doc.id, DocumentId::String("s100".into()));

        let doc = Document::from_value(json!({"id": 7})).unwrap();
        assert_eq!(doc.id, DocumentId::Int(7));
    }

    #[test]
    fn test_invalid_ids_rejected() {
        for payload in [
            json!({"name": "no id"}),
            json!({"id": 1.5}),
            json!({"id": null}),
            json!({"id": [1]}),
            json!([1, 2]),
        ] {
            let err = Document::from_value(payload).unwrap_err();
            assert!(matches!(err, HonoError::InvalidDocument(_)), "{:?}", err);
        }
    }

    #[test]
    fn test_encode_preserves_key_order() {
        let line = br#"{"name":"foo","id":"s1","age":3}"#;
        let doc = Document::decode(line).unwrap();
        assert_eq!(doc.encode().unwrap().as_bytes(), &line[..]);
    }

    #[test]
    fn test_dotted_get() {
        let doc = Document::from_value(json!({
            "id": 1,
            "address": {"city": "Budapest"},
            "tags": ["a", "b"]
        }))
        .unwrap();

        assert_eq!(doc.get("address.city"), Some(&json!("Budapest")));
        assert_eq!(doc.get("tags.1"), Some(&json!("b")));
        assert_eq!(doc.get("address.zip"), None);
        assert_eq!(doc.get("id.x"), None);
        assert_eq!(doc.get(""), None);
    }

    #[test]
    fn test_serde_goes_through_validation() {
        let doc: Document = serde_json::from_str(r#"{"id":"x","n":1}"#).unwrap();
        assert_eq!(serde_json::to_string(&doc).unwrap(), r#"{"id":"x","n":1}"#);
        assert!(serde_json::from_str::<Document>(r#"{"n":1}"#).is_err());
    }

    #[test]
    fn test_generated_id_is_string() {
        assert!(matches!(DocumentId::generate(), DocumentId::String(s) if s.len() == 36));
    }
}
