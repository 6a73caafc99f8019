// honodb-core/src/collection_core/mutations.rs
// Insert / update / delete verbs of a collection

use serde_json::Value;
use tracing::debug;

use super::{group_by_chunk, Collection};
use crate::document::DocumentId;
use crate::error::{HonoError, Result};
use crate::query::Condition;
use crate::storage::{ChunkBackend, Location};

/// Result of insert_many: one entry per input document, in input order
#[derive(Debug)]
pub struct InsertManyResult {
    pub inserted_ids: Vec<DocumentId>,
    pub inserted_count: usize,
    pub results: Vec<Result<Location>>,
}

impl<B: ChunkBackend> Collection<B> {
    // ========== INSERT ==========

    /// Validate, append and index one document
    pub fn insert_one(&self, payload: Value) -> Result<Location> {
        let _guard = self.write_lock.lock();
        self.insert_locked(payload).map(|(_, location)| location)
    }

    /// Insert each document independently; one failure does not stop the rest
    ///
    /// The write lock is held for the whole batch, so ids inserted earlier in
    /// the batch count as duplicates for later items.
    pub fn insert_many(&self, payloads: Vec<Value>) -> InsertManyResult {
        let _guard = self.write_lock.lock();
        let mut inserted_ids = Vec::new();
        let mut results = Vec::with_capacity(payloads.len());

        for payload in payloads {
            match self.insert_locked(payload) {
                Ok((id, location)) => {
                    inserted_ids.push(id);
                    results.push(Ok(location));
                }
                Err(e) => results.push(Err(e)),
            }
        }

        InsertManyResult {
            inserted_count: inserted_ids.len(),
            inserted_ids,
            results,
        }
    }

    fn insert_locked(&self, payload: Value) -> Result<(DocumentId, Location)> {
        let doc = {
            let index = self.index.read();
            self.mutator.validate_insert(payload, &index)?
        };
        let location = self.store.append(&doc)?;
        debug!(collection = %self.name, id = %doc.id, at = %location, "inserted");
        self.index.write().put(doc.id.clone(), location.clone());
        Ok((doc.id, location))
    }

    // ========== UPDATE ==========

    /// Update the first match - returns (matched_count, modified_count)
    ///
    /// No match is `NotFound`.
    pub fn update_one(&self, condition: &Value, patch: &Value) -> Result<(u64, u64)> {
        self.update(condition, patch, true)
    }

    /// Update all matches - returns (matched_count, modified_count)
    pub fn update_many(&self, condition: &Value, patch: &Value) -> Result<(u64, u64)> {
        self.update(condition, patch, false)
    }

    fn update(&self, condition: &Value, patch: &Value, first_only: bool) -> Result<(u64, u64)> {
        let condition = Condition::parse(condition)?;
        self.mutator.validate_patch(patch)?;

        let _guard = self.write_lock.lock();
        let targets = self.select(&condition, first_only)?;
        if targets.is_empty() {
            return self.nothing_matched(&condition, first_only).map(|n| (n, n));
        }

        // Merge everything up front so a rejected patch writes nothing
        let mut merged = Vec::with_capacity(targets.len());
        for (location, doc) in targets {
            let (updated, changed) = self.mutator.merge(&doc, patch)?;
            merged.push((location, updated, changed));
        }

        let matched = merged.len() as u64;
        let mut modified = 0u64;

        // Back to front: a relocation only shifts lines after the moved record
        for (location, doc, changed) in merged.into_iter().rev() {
            if !changed {
                continue;
            }
            let new_location = self.store.rewrite(&location, &doc)?;
            let mut index = self.index.write();
            if new_location != location {
                index.compact_chunk(location.chunk, &[location.line]);
            }
            index.put(doc.id, new_location);
            modified += 1;
        }

        debug!(collection = %self.name, matched, modified, "updated");
        Ok((matched, modified))
    }

    // ========== DELETE ==========

    /// Delete the first match - returns deleted_count. No match is `NotFound`.
    pub fn delete_one(&self, condition: &Value) -> Result<u64> {
        self.delete(condition, true)
    }

    /// Delete all matches - returns deleted_count
    pub fn delete_many(&self, condition: &Value) -> Result<u64> {
        self.delete(condition, false)
    }

    fn delete(&self, condition: &Value, first_only: bool) -> Result<u64> {
        let condition = Condition::parse(condition)?;

        let _guard = self.write_lock.lock();
        let targets = self.select(&condition, first_only)?;
        if targets.is_empty() {
            return self.nothing_matched(&condition, first_only);
        }

        let locations: Vec<Location> = targets.into_iter().map(|(loc, _)| loc).collect();
        for (chunk, lines) in group_by_chunk(&locations) {
            self.store.remove_lines(chunk, &lines)?;
            self.index.write().compact_chunk(chunk, &lines);
        }

        let deleted = locations.len() as u64;
        debug!(collection = %self.name, deleted, "deleted");
        Ok(deleted)
    }

    fn nothing_matched(&self, condition: &Condition, first_only: bool) -> Result<u64> {
        if first_only {
            Err(HonoError::NotFound(format!(
                "no document in {} matches {}",
                self.name,
                condition.source()
            )))
        } else {
            Ok(0)
        }
    }
}
