// honodb-core/src/storage/mod.rs
//! Chunked flat-file storage
//!
//! A collection is stored as numbered chunk files holding one JSON document
//! per line. Appends go to the highest-numbered chunk and roll over to a new
//! one when the size threshold would be crossed. Updates and deletes rewrite
//! the owning chunk through a temporary copy and an atomic rename.

pub mod file_storage;
pub mod memory_storage;
pub mod naming;
mod replay;
pub mod traits;

pub use file_storage::FileBackend;
pub use memory_storage::MemoryBackend;
pub use replay::ReplayIter;
pub use traits::{ChunkBackend, TEMP_SUFFIX};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::DatabaseConfig;
use crate::document::Document;
use crate::error::{HonoError, Result};

/// Physical address of a record: chunk sequence (1-based) and line (0-based)
///
/// Orders by collection, then chunk, then line, which is scan order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Location {
    pub collection: String,
    pub chunk: u32,
    pub line: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}:{}", self.collection, self.chunk, self.line)
    }
}

/// Size bookkeeping of one chunk file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkDescriptor {
    pub sequence: u32,
    pub size: u64,
    /// Record slots, including undecodable ones
    pub lines: usize,
}

/// Size-bounded append/rewrite log of one collection
pub struct ChunkStore<B: ChunkBackend> {
    backend: Arc<B>,
    database: String,
    collection: String,
    max_chunk_bytes: u64,
    chunks: RwLock<Vec<ChunkDescriptor>>,
}

impl<B: ChunkBackend> ChunkStore<B> {
    // ========== OPEN / DROP ==========

    /// Open the chunks of a collection, creating chunk 1 if there are none
    ///
    /// Recovery performed here:
    /// - leftover `.tmp` copies from interrupted rewrites are deleted
    /// - a trailing line without its newline (torn append) is cut off
    /// - a gap in the sequence numbers is reported as corruption
    pub fn open(
        backend: Arc<B>,
        database: &str,
        collection: &str,
        config: &DatabaseConfig,
    ) -> Result<Self> {
        config.validate()?;

        let mut sequences = Vec::new();
        for name in backend.list()? {
            if naming::is_temp_chunk(database, collection, &name) {
                warn!(file = %name, "removing leftover temporary chunk");
                backend.remove(&name)?;
            } else if let Some(seq) = naming::parse_chunk_sequence(database, collection, &name) {
                sequences.push(seq);
            }
        }
        sequences.sort_unstable();

        for (expected, seq) in (1u32..).zip(&sequences) {
            if *seq != expected {
                return Err(HonoError::Corruption(format!(
                    "collection {}.{}: chunk {} is missing (found chunk {})",
                    database, collection, expected, seq
                )));
            }
        }

        let store = ChunkStore {
            backend,
            database: database.to_string(),
            collection: collection.to_string(),
            max_chunk_bytes: config.max_chunk_bytes,
            chunks: RwLock::new(Vec::with_capacity(sequences.len().max(1))),
        };

        if sequences.is_empty() {
            store.backend.write_atomic(&store.chunk_name(1), b"")?;
            sequences.push(1);
            debug!(database, collection, "created first chunk");
        }

        let mut descriptors = Vec::with_capacity(sequences.len());
        for seq in sequences {
            descriptors.push(store.load_descriptor(seq)?);
        }
        *store.chunks.write() = descriptors;

        Ok(store)
    }

    fn load_descriptor(&self, sequence: u32) -> Result<ChunkDescriptor> {
        let name = self.chunk_name(sequence);
        if self.backend.len(&name)? == 0 {
            return Ok(ChunkDescriptor {
                sequence,
                size: 0,
                lines: 0,
            });
        }
        let mut bytes = self.backend.read(&name)?;

        if bytes.last().map_or(false, |b| *b != b'\n') {
            let keep = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |p| p + 1);
            warn!(
                file = %name,
                dropped_bytes = bytes.len() - keep,
                "truncating torn record at end of chunk"
            );
            bytes.truncate(keep);
            self.backend.write_atomic(&name, &bytes)?;
        }

        Ok(ChunkDescriptor {
            sequence,
            size: bytes.len() as u64,
            lines: bytes.iter().filter(|b| **b == b'\n').count(),
        })
    }

    /// Delete every chunk file of the collection. The store is unusable afterwards.
    pub fn destroy(&self) -> Result<()> {
        let mut chunks = self.chunks.write();
        for desc in chunks.iter() {
            self.backend.remove(&self.chunk_name(desc.sequence))?;
        }
        chunks.clear();
        info!(database = %self.database, collection = %self.collection, "dropped chunks");
        Ok(())
    }

    // ========== ACCESSORS ==========

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn chunk_name(&self, sequence: u32) -> String {
        naming::chunk_file_name(&self.database, &self.collection, sequence)
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunks.read().len() as u32
    }

    pub fn descriptors(&self) -> Vec<ChunkDescriptor> {
        self.chunks.read().clone()
    }

    fn location(&self, chunk: u32, line: usize) -> Location {
        Location {
            collection: self.collection.clone(),
            chunk,
            line,
        }
    }

    // ========== RECORD OPERATIONS ==========

    /// Append a document to the active chunk, rolling over when it is full
    pub fn append(&self, doc: &Document) -> Result<Location> {
        let record = encode_record(doc)?;
        let mut chunks = self.chunks.write();
        self.append_locked(&mut chunks, &record)
    }

    fn append_locked(&self, chunks: &mut Vec<ChunkDescriptor>, record: &[u8]) -> Result<Location> {
        let record_len = record.len() as u64;
        let active = *chunks
            .last()
            .ok_or_else(|| HonoError::Corruption(format!("{} has no chunks", self.collection)))?;

        // An empty chunk takes any record, so oversized documents still land somewhere
        let rollover = active.size > 0 && active.size + record_len > self.max_chunk_bytes;
        let sequence = if rollover { active.sequence + 1 } else { active.sequence };

        self.backend.append(&self.chunk_name(sequence), record)?;

        if rollover {
            info!(
                collection = %self.collection,
                chunk = sequence,
                "active chunk full, rolled over"
            );
            chunks.push(ChunkDescriptor {
                sequence,
                size: record_len,
                lines: 1,
            });
            Ok(self.location(sequence, 0))
        } else {
            let line = active.lines;
            if let Some(last) = chunks.last_mut() {
                last.size += record_len;
                last.lines += 1;
            }
            Ok(self.location(sequence, line))
        }
    }

    /// Decode the record at `location`
    pub fn read(&self, location: &Location) -> Result<Document> {
        let name = self.chunk_name(location.chunk);
        if location.chunk == 0 || location.chunk > self.chunk_count() {
            return Err(HonoError::NotFound(format!("no chunk at {}", location)));
        }
        let bytes = self.backend.read(&name)?;
        let line = complete_lines(&bytes)
            .into_iter()
            .nth(location.line)
            .ok_or_else(|| HonoError::NotFound(format!("no record at {}", location)))?;
        decode_record(&name, location.line, line)
    }

    /// Replace the record at `location` with `doc`
    ///
    /// The chunk is rewritten in place unless the new record would push a
    /// chunk holding other records over the threshold. In that case the record
    /// moves to the active chunk and is removed from its old chunk, which
    /// shifts the lines after it up by one. The returned location tells the
    /// caller which case happened.
    pub fn rewrite(&self, location: &Location, doc: &Document) -> Result<Location> {
        let record = encode_record(doc)?;
        let mut chunks = self.chunks.write();
        let idx = self.descriptor_index(&chunks, location)?;
        let desc = chunks[idx];

        let name = self.chunk_name(desc.sequence);
        let bytes = self.backend.read(&name)?;
        let lines = complete_lines(&bytes);
        let old = lines
            .get(location.line)
            .ok_or_else(|| HonoError::NotFound(format!("no record at {}", location)))?;

        let new_size = desc.size - (old.len() as u64 + 1) + record.len() as u64;
        if new_size <= self.max_chunk_bytes || lines.len() == 1 {
            let mut out = Vec::with_capacity(new_size as usize);
            for (i, line) in lines.iter().enumerate() {
                if i == location.line {
                    out.extend_from_slice(&record);
                } else {
                    out.extend_from_slice(line);
                    out.push(b'\n');
                }
            }
            self.backend.write_atomic(&name, &out)?;
            chunks[idx].size = out.len() as u64;
            return Ok(location.clone());
        }

        // Append first: a crash in between leaves two copies, and replay keeps the later one
        let before = chunks.last().copied();
        let moved = self.append_locked(&mut chunks, &record)?;
        if let Err(e) = self.remove_lines_locked(&mut chunks, desc.sequence, &[location.line]) {
            // The new copy must not outlive a failed verb or replay would prefer it
            if let Some(before) = before {
                if let Err(undo) = self.undo_append(&mut chunks, before, &moved) {
                    error!(at = %moved, error = %undo, "could not take back relocated copy");
                }
            }
            return Err(e);
        }
        debug!(from = %location, to = %moved, "relocated record that outgrew its chunk");
        Ok(moved)
    }

    /// Take back the record `append_locked` just wrote at `moved`
    ///
    /// `before` is the active chunk's descriptor from before that append.
    fn undo_append(
        &self,
        chunks: &mut Vec<ChunkDescriptor>,
        before: ChunkDescriptor,
        moved: &Location,
    ) -> Result<()> {
        if moved.chunk != before.sequence {
            self.backend.remove(&self.chunk_name(moved.chunk))?;
            chunks.pop();
        } else {
            let name = self.chunk_name(before.sequence);
            let mut bytes = self.backend.read(&name)?;
            bytes.truncate(before.size as usize);
            self.backend.write_atomic(&name, &bytes)?;
            if let Some(last) = chunks.last_mut() {
                *last = before;
            }
        }
        warn!(at = %moved, "relocation failed, new copy removed");
        Ok(())
    }

    /// Remove the record at `location`
    pub fn remove(&self, location: &Location) -> Result<()> {
        self.remove_lines(location.chunk, &[location.line])
    }

    /// Remove several lines of one chunk with a single rewrite
    pub fn remove_lines(&self, sequence: u32, lines: &[usize]) -> Result<()> {
        let mut chunks = self.chunks.write();
        self.remove_lines_locked(&mut chunks, sequence, lines)
    }

    fn remove_lines_locked(
        &self,
        chunks: &mut [ChunkDescriptor],
        sequence: u32,
        lines: &[usize],
    ) -> Result<()> {
        if lines.is_empty() {
            return Ok(());
        }
        let at = self.location(sequence, lines[0]);
        let idx = self.descriptor_index(chunks, &at)?;

        let name = self.chunk_name(sequence);
        let bytes = self.backend.read(&name)?;
        let existing = complete_lines(&bytes);
        let doomed: BTreeSet<usize> = lines.iter().copied().collect();
        if let Some(missing) = doomed.iter().find(|l| **l >= existing.len()) {
            return Err(HonoError::NotFound(format!(
                "no record at {}",
                self.location(sequence, *missing)
            )));
        }

        let mut out = Vec::with_capacity(bytes.len());
        for (i, line) in existing.iter().enumerate() {
            if !doomed.contains(&i) {
                out.extend_from_slice(line);
                out.push(b'\n');
            }
        }
        self.backend.write_atomic(&name, &out)?;

        chunks[idx].size = out.len() as u64;
        chunks[idx].lines = existing.len() - doomed.len();
        Ok(())
    }

    fn descriptor_index(&self, chunks: &[ChunkDescriptor], location: &Location) -> Result<usize> {
        let idx = (location.chunk as usize).wrapping_sub(1);
        if location.collection != self.collection || idx >= chunks.len() {
            return Err(HonoError::NotFound(format!("no chunk at {}", location)));
        }
        Ok(idx)
    }

    // ========== REPLAY ==========

    /// Stream every record in (chunk, line) order
    ///
    /// Chunks are read one at a time. Undecodable lines surface as
    /// `CorruptRecord` items and the stream continues past them.
    pub fn replay(&self) -> ReplayIter<'_, B> {
        ReplayIter::new(self, self.chunk_count())
    }

    pub(crate) fn read_chunk(&self, sequence: u32) -> Result<Vec<u8>> {
        self.backend.read(&self.chunk_name(sequence))
    }
}

fn encode_record(doc: &Document) -> Result<Vec<u8>> {
    let mut record = doc.encode()?.into_bytes();
    record.push(b'\n');
    Ok(record)
}

pub(crate) fn decode_record(chunk: &str, line: usize, bytes: &[u8]) -> Result<Document> {
    Document::decode(bytes).map_err(|e| HonoError::CorruptRecord {
        chunk: chunk.to_string(),
        line,
        reason: e.to_string(),
    })
}

/// Newline-terminated lines of a chunk, without their newlines
///
/// Bytes after the last newline belong to an append still in flight and are
/// not part of any record yet.
pub(crate) fn complete_lines(bytes: &[u8]) -> Vec<&[u8]> {
    match bytes.iter().rposition(|b| *b == b'\n') {
        Some(end) => bytes[..end].split(|b| *b == b'\n').collect(),
        None => Vec::new(),
    }
}
