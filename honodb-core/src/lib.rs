// honodb-core/src/lib.rs
// Embedded document store: chunked JSON-lines collections behind a verb API

pub mod catalog;
pub mod collection_core;
pub mod config;
pub mod database;
pub mod document;
pub mod error;
pub mod executor;
pub mod find_options;
pub mod index;
pub mod mutator;
pub mod query;
pub mod storage;
pub mod value_utils;

// Public exports
pub use catalog::{Catalog, Manifest, MANIFEST_FILE};
pub use collection_core::{Collection, FindCursor, InsertManyResult};
pub use config::{DatabaseConfig, DEFAULT_MAX_CHUNK_BYTES};
pub use database::Database;
pub use document::{Document, DocumentId, ID_FIELD};
pub use error::{ErrorKind, HonoError, Result};
pub use executor::{Command, CommandExecutor, ItemResult, VerbResult};
pub use find_options::FindOptions;
pub use index::{CollectionIndex, RebuildReport, SkippedRecord};
pub use mutator::DocumentMutator;
pub use query::Condition;
pub use storage::{ChunkBackend, ChunkDescriptor, ChunkStore, FileBackend, Location, MemoryBackend};
