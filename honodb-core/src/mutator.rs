// src/mutator.rs
//! Insert validation and update merge rules

use serde_json::Value;

use crate::document::{type_name, Document, DocumentId, ID_FIELD};
use crate::error::{HonoError, Result};
use crate::index::CollectionIndex;

/// Validation and merge logic shared by the insert and update verbs
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentMutator {
    /// Give id-less inserts a generated UUID instead of rejecting them
    pub generate_missing_ids: bool,
}

impl DocumentMutator {
    pub fn new(generate_missing_ids: bool) -> Self {
        DocumentMutator {
            generate_missing_ids,
        }
    }

    /// Turn an insert payload into a document whose id is not yet indexed
    pub fn validate_insert(&self, payload: Value, index: &CollectionIndex) -> Result<Document> {
        let mut fields = match payload {
            Value::Object(fields) => fields,
            other => {
                return Err(HonoError::InvalidDocument(format!(
                    "document must be an object, got {}",
                    type_name(&other)
                )))
            }
        };

        if self.generate_missing_ids && !fields.contains_key(ID_FIELD) {
            // id goes first, like a user-supplied one usually does
            let mut with_id = serde_json::Map::with_capacity(fields.len() + 1);
            with_id.insert(ID_FIELD.to_string(), DocumentId::generate().to_value());
            with_id.append(&mut fields);
            fields = with_id;
        }

        let doc = Document::from_map(fields)?;
        if index.contains(&doc.id) {
            return Err(HonoError::DuplicateId(doc.id.to_string()));
        }
        Ok(doc)
    }

    /// Check an update payload: an object whose `id`, if present, is unchanged
    pub fn validate_patch(&self, patch: &Value) -> Result<()> {
        let obj = patch.as_object().ok_or_else(|| {
            HonoError::Parse(format!("update data must be an object, got {}", type_name(patch)))
        })?;
        if let Some(id) = obj.get(ID_FIELD) {
            // any other shape can never equal an existing id
            DocumentId::from_value(id).map_err(|_| HonoError::ImmutableId {
                existing: "<any>".to_string(),
                attempted: id.to_string(),
            })?;
        }
        Ok(())
    }

    /// Shallow merge: keys of `patch` overwrite or extend `existing`
    ///
    /// Returns the merged document and whether anything changed.
    pub fn merge(&self, existing: &Document, patch: &Value) -> Result<(Document, bool)> {
        self.validate_patch(patch)?;
        let obj = patch.as_object().ok_or_else(|| {
            HonoError::Parse("update data must be an object".to_string())
        })?;

        if let Some(id) = obj.get(ID_FIELD) {
            let attempted = DocumentId::from_value(id)?;
            if attempted != existing.id {
                return Err(HonoError::ImmutableId {
                    existing: existing.id.to_string(),
                    attempted: attempted.to_string(),
                });
            }
        }

        let mut merged = existing.clone();
        let mut changed = false;
        for (key, value) in obj {
            if key == ID_FIELD {
                continue;
            }
            if merged.fields.get(key) != Some(value) {
                merged.fields.insert(key.clone(), value.clone());
                changed = true;
            }
        }
        Ok((merged, changed))
    }
}
