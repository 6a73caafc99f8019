// src/storage/traits.rs
//! Byte-level storage abstraction used by the chunk store
//!
//! ```text
//! ChunkBackend trait
//!   ├── FileBackend (production, one file per object in a data directory)
//!   └── MemoryBackend (testing, in-memory HashMap)
//! ```
//!
//! Objects are addressed by flat names such as `school_students_1.json`.

use crate::error::Result;

/// Suffix of the scratch copy written by [`ChunkBackend::write_atomic`]
pub const TEMP_SUFFIX: &str = ".tmp";

/// Named byte-stream storage with append and atomic replace
///
/// All methods take `&self`; implementations synchronize internally so a
/// backend can be shared (`Arc<B>`) by every collection of a data directory.
pub trait ChunkBackend: Send + Sync {
    /// Names of all stored objects, in no particular order
    fn list(&self) -> Result<Vec<String>>;

    fn exists(&self, name: &str) -> Result<bool>;

    /// Size in bytes. Missing objects are an I/O `NotFound` error.
    fn len(&self, name: &str) -> Result<u64>;

    /// Full contents of an object. Missing objects are an I/O `NotFound` error.
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Append bytes, creating the object if needed
    ///
    /// On failure the object is truncated back to its previous length so a
    /// half-written record never stays behind.
    fn append(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Replace the whole object
    ///
    /// Writes `{name}.tmp`, flushes it, then renames it over `name`. Readers
    /// observe either the old or the new contents, never a mix.
    fn write_atomic(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Delete an object. Deleting a missing object is not an error.
    fn remove(&self, name: &str) -> Result<()>;
}
