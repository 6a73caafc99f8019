// src/index.rs
// Primary-key index: document id -> physical location

use std::collections::{BTreeMap, BTreeSet};

use ahash::AHashMap;
use serde::Serialize;
use tracing::warn;

use crate::document::{Document, DocumentId};
use crate::error::{HonoError, Result};
use crate::storage::Location;

/// A record the index builder could not decode
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    pub chunk: String,
    pub line: usize,
    pub reason: String,
}

/// Outcome of rebuilding an index from chunk replay
#[derive(Debug, Clone, Default, Serialize)]
pub struct RebuildReport {
    /// Decoded records, including superseded copies
    pub records: usize,
    /// Older copies of ids that appear more than once; the last copy won
    pub superseded: Vec<Location>,
    pub skipped: Vec<SkippedRecord>,
}

/// In-memory map from document id to its current record slot
///
/// A cache over the chunk files: [`CollectionIndex::rebuild`] recreates it
/// from a replay. Every live id owns exactly one slot and no slot is shared.
#[derive(Debug, Clone)]
pub struct CollectionIndex {
    collection: String,
    by_id: AHashMap<DocumentId, Location>,
    /// (chunk, line) -> id, for uniqueness and line renumbering
    by_slot: BTreeMap<(u32, usize), DocumentId>,
}

impl CollectionIndex {
    pub fn new(collection: &str) -> Self {
        CollectionIndex {
            collection: collection.to_string(),
            by_id: AHashMap::new(),
            by_slot: BTreeMap::new(),
        }
    }

    /// Build an index from a replay stream, last copy of an id wins
    ///
    /// Undecodable records are skipped and listed in the report, or abort the
    /// rebuild when `strict` is set. I/O errors always abort.
    pub fn rebuild<I>(collection: &str, replay: I, strict: bool) -> Result<(Self, RebuildReport)>
    where
        I: IntoIterator<Item = Result<(Location, Document)>>,
    {
        let mut index = CollectionIndex::new(collection);
        let mut report = RebuildReport::default();

        for item in replay {
            match item {
                Ok((location, doc)) => {
                    report.records += 1;
                    if let Some(previous) = index.put(doc.id, location) {
                        report.superseded.push(previous);
                    }
                }
                Err(HonoError::CorruptRecord { chunk, line, reason }) => {
                    if strict {
                        return Err(HonoError::CorruptRecord { chunk, line, reason });
                    }
                    warn!(%chunk, line, %reason, "skipping undecodable record");
                    report.skipped.push(SkippedRecord { chunk, line, reason });
                }
                Err(e) => return Err(e),
            }
        }

        Ok((index, report))
    }

    pub fn lookup(&self, id: &DocumentId) -> Result<&Location> {
        self.by_id
            .get(id)
            .ok_or_else(|| HonoError::NotFound(format!("id {} in {}", id, self.collection)))
    }

    pub fn contains(&self, id: &DocumentId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Point `id` at `location`, returning its previous location
    pub fn put(&mut self, id: DocumentId, location: Location) -> Option<Location> {
        let slot = (location.chunk, location.line);
        let previous = self.by_id.insert(id.clone(), location);
        if let Some(prev) = &previous {
            self.by_slot.remove(&(prev.chunk, prev.line));
        }
        if let Some(evicted) = self.by_slot.insert(slot, id.clone()) {
            if evicted != id {
                warn!(
                    collection = %self.collection,
                    %evicted,
                    "slot reassigned while still indexed, dropping stale entry"
                );
                self.by_id.remove(&evicted);
            }
        }
        previous
    }

    pub fn remove(&mut self, id: &DocumentId) -> Option<Location> {
        let location = self.by_id.remove(id)?;
        self.by_slot.remove(&(location.chunk, location.line));
        Some(location)
    }

    /// Renumber a chunk after `removed_lines` were deleted from it
    ///
    /// Ids that lived on a removed line are dropped; later lines move up.
    pub fn compact_chunk(&mut self, chunk: u32, removed_lines: &[usize]) {
        if removed_lines.is_empty() {
            return;
        }
        let removed: BTreeSet<usize> = removed_lines.iter().copied().collect();
        let first = *removed.iter().next().unwrap_or(&0);

        let affected: Vec<((u32, usize), DocumentId)> = self
            .by_slot
            .range((chunk, first)..(chunk, usize::MAX))
            .map(|(slot, id)| (*slot, id.clone()))
            .collect();
        for (slot, _) in &affected {
            self.by_slot.remove(slot);
        }

        for ((_, line), id) in affected {
            if removed.contains(&line) {
                self.by_id.remove(&id);
                continue;
            }
            let shift = removed.range(..line).count();
            let new_line = line - shift;
            if let Some(loc) = self.by_id.get_mut(&id) {
                loc.line = new_line;
            }
            self.by_slot.insert((chunk, new_line), id);
        }
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Entries ordered by id, for comparisons and reporting
    pub fn snapshot(&self) -> BTreeMap<DocumentId, Location> {
        self.by_id
            .iter()
            .map(|(id, loc)| (id.clone(), loc.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loc(chunk: u32, line: usize) -> Location {
        Location {
            collection: "c".to_string(),
            chunk,
            line,
        }
    }

    fn sid(s: &str) -> DocumentId {
        DocumentId::String(s.to_string())
    }

    #[test]
    fn test_put_lookup_remove() {
        let mut index = CollectionIndex::new("c");
        assert!(index.put(sid("a"), loc(1, 0)).is_none());
        assert_eq!(index.lookup(&sid("a")).unwrap(), &loc(1, 0));

        assert_eq!(index.put(sid("a"), loc(2, 0)), Some(loc(1, 0)));
        assert_eq!(index.len(), 1);

        assert_eq!(index.remove(&sid("a")), Some(loc(2, 0)));
        assert!(matches!(index.lookup(&sid("a")), Err(HonoError::NotFound(_))));
        assert!(index.is_empty());
    }

    #[test]
    fn test_slot_never_shared() {
        let mut index = CollectionIndex::new("c");
        index.put(sid("a"), loc(1, 0));
        index.put(sid("b"), loc(1, 0));
        assert!(!index.contains(&sid("a")));
        assert_eq!(index.lookup(&sid("b")).unwrap(), &loc(1, 0));
    }

    #[test]
    fn test_compact_chunk_shifts_lines() {
        let mut index = CollectionIndex::new("c");
        for (i, name) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            index.put(sid(name), loc(1, i));
        }
        index.put(sid("z"), loc(2, 0));

        index.compact_chunk(1, &[1, 3]);

        assert!(!index.contains(&sid("b")));
        assert!(!index.contains(&sid("d")));
        assert_eq!(index.lookup(&sid("a")).unwrap(), &loc(1, 0));
        assert_eq!(index.lookup(&sid("c")).unwrap(), &loc(1, 1));
        assert_eq!(index.lookup(&sid("e")).unwrap(), &loc(1, 2));
        assert_eq!(index.lookup(&sid("z")).unwrap(), &loc(2, 0));
    }

    #[test]
    fn test_rebuild_last_seen_wins() {
        let stream = vec![
            Ok((loc(1, 0), Document::from_value(json!({"id": "a", "v": 1})).unwrap())),
            Ok((loc(1, 1), Document::from_value(json!({"id": "b"})).unwrap())),
            Ok((loc(2, 0), Document::from_value(json!({"id": "a", "v": 2})).unwrap())),
        ];
        let (index, report) = CollectionIndex::rebuild("c", stream, false).unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(&sid("a")).unwrap(), &loc(2, 0));
        assert_eq!(report.records, 3);
        assert_eq!(report.superseded, vec![loc(1, 0)]);
    }

    #[test]
    fn test_rebuild_skips_or_aborts_on_corrupt() {
        let corrupt = || HonoError::CorruptRecord {
            chunk: "db_c_1.json".into(),
            line: 0,
            reason: "bad".into(),
        };
        let stream = vec![
            Err(corrupt()),
            Ok((loc(1, 1), Document::from_value(json!({"id": 1})).unwrap())),
        ];
        let (index, report) = CollectionIndex::rebuild("c", stream, false).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(report.skipped.len(), 1);

        let stream = vec![Err(corrupt())];
        let err = CollectionIndex::rebuild("c", stream, true).unwrap_err();
        assert!(matches!(err, HonoError::CorruptRecord { .. }));
    }

    #[test]
    fn test_rebuild_aborts_on_io() {
        let stream = vec![Err(HonoError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk gone",
        )))];
        assert!(CollectionIndex::rebuild("c", stream, false).is_err());
    }
}
