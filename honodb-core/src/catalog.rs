// honodb-core/src/catalog.rs
// Manifest of databases and their collections (metadata.json)
//
// The manifest says which collections exist. What they contain is decided
// by the chunk files alone.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::database::Database;
use crate::error::{HonoError, Result};
use crate::storage::naming::{validate_collection_name, validate_database_name};
use crate::storage::{ChunkBackend, FileBackend, TEMP_SUFFIX};

pub const MANIFEST_FILE: &str = "metadata.json";
const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    #[serde(default = "manifest_version")]
    pub version: u32,
    #[serde(default)]
    pub databases: BTreeMap<String, DatabaseEntry>,
}

fn manifest_version() -> u32 {
    MANIFEST_VERSION
}

impl Default for Manifest {
    fn default() -> Self {
        Manifest {
            version: MANIFEST_VERSION,
            databases: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseEntry {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionEntry {
    pub created_at: DateTime<Utc>,
}

/// Entry point to a data directory: lists, creates, drops and opens databases
///
/// Cloning is cheap; clones share the manifest.
pub struct Catalog<B: ChunkBackend> {
    backend: Arc<B>,
    config: DatabaseConfig,
    manifest: Arc<RwLock<Manifest>>,
}

impl<B: ChunkBackend> Clone for Catalog<B> {
    fn clone(&self) -> Self {
        Catalog {
            backend: Arc::clone(&self.backend),
            config: self.config.clone(),
            manifest: Arc::clone(&self.manifest),
        }
    }
}

impl Catalog<FileBackend> {
    /// Open (or initialize) a data directory on disk
    pub fn open_dir<P: AsRef<Path>>(path: P, config: DatabaseConfig) -> Result<Self> {
        let backend = FileBackend::open(path, config.sync_writes)?;
        Catalog::open(Arc::new(backend), config)
    }
}

impl<B: ChunkBackend> Catalog<B> {
    pub fn open(backend: Arc<B>, config: DatabaseConfig) -> Result<Self> {
        config.validate()?;

        let temp = format!("{}{}", MANIFEST_FILE, TEMP_SUFFIX);
        if backend.exists(&temp)? {
            warn!(file = %temp, "removing leftover temporary manifest");
            backend.remove(&temp)?;
        }

        let manifest = if backend.exists(MANIFEST_FILE)? {
            let bytes = backend.read(MANIFEST_FILE)?;
            serde_json::from_slice(&bytes).map_err(|e| {
                HonoError::Corruption(format!("unreadable {}: {}", MANIFEST_FILE, e))
            })?
        } else {
            Manifest::default()
        };

        Ok(Catalog {
            backend,
            config,
            manifest: Arc::new(RwLock::new(manifest)),
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn manifest(&self) -> Manifest {
        self.manifest.read().clone()
    }

    fn save(&self, manifest: &Manifest) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(manifest)?;
        self.backend.write_atomic(MANIFEST_FILE, &bytes)
    }

    /// Apply `change` to a copy of the manifest, persist it, then publish it
    fn update<T>(&self, change: impl FnOnce(&mut Manifest) -> Result<T>) -> Result<T> {
        let mut current = self.manifest.write();
        let mut next = current.clone();
        let out = change(&mut next)?;
        self.save(&next)?;
        *current = next;
        Ok(out)
    }

    // ========== DATABASES ==========

    pub fn create_database(&self, name: &str) -> Result<()> {
        validate_database_name(name)?;
        self.update(|m| {
            if m.databases.contains_key(name) {
                return Err(HonoError::DatabaseExists(name.to_string()));
            }
            m.databases.insert(
                name.to_string(),
                DatabaseEntry {
                    created_at: Utc::now(),
                    collections: BTreeMap::new(),
                },
            );
            Ok(())
        })?;
        info!(database = name, "database created");
        Ok(())
    }

    /// Remove a database from the manifest and delete its chunk files
    ///
    /// `Database` handles already opened on it must not be used afterwards.
    pub fn drop_database(&self, name: &str) -> Result<()> {
        let entry = self.update(|m| {
            m.databases
                .remove(name)
                .ok_or_else(|| HonoError::UnknownDatabase(name.to_string()))
        })?;

        for collection in entry.collections.keys() {
            remove_chunk_files(self.backend.as_ref(), name, collection)?;
        }
        info!(database = name, "database dropped");
        Ok(())
    }

    pub fn list_databases(&self) -> Vec<String> {
        self.manifest.read().databases.keys().cloned().collect()
    }

    pub fn has_database(&self, name: &str) -> bool {
        self.manifest.read().databases.contains_key(name)
    }

    /// Open a database: every listed collection is opened and indexed
    pub fn open_database(&self, name: &str) -> Result<Database<B>> {
        if !self.has_database(name) {
            return Err(HonoError::UnknownDatabase(name.to_string()));
        }
        Database::open(self.clone(), name)
    }

    // ========== COLLECTIONS ==========

    pub fn list_collections(&self, database: &str) -> Result<Vec<String>> {
        self.manifest
            .read()
            .databases
            .get(database)
            .map(|db| db.collections.keys().cloned().collect())
            .ok_or_else(|| HonoError::UnknownDatabase(database.to_string()))
    }

    pub(crate) fn add_collection(&self, database: &str, collection: &str) -> Result<()> {
        validate_collection_name(collection)?;
        self.update(|m| {
            let db = m
                .databases
                .get_mut(database)
                .ok_or_else(|| HonoError::UnknownDatabase(database.to_string()))?;
            if db.collections.contains_key(collection) {
                return Err(HonoError::CollectionExists(collection.to_string()));
            }
            db.collections.insert(
                collection.to_string(),
                CollectionEntry {
                    created_at: Utc::now(),
                },
            );
            Ok(())
        })
    }

    pub(crate) fn remove_collection(&self, database: &str, collection: &str) -> Result<()> {
        self.update(|m| {
            let db = m
                .databases
                .get_mut(database)
                .ok_or_else(|| HonoError::UnknownDatabase(database.to_string()))?;
            db.collections
                .remove(collection)
                .map(|_| ())
                .ok_or_else(|| HonoError::UnknownCollection(collection.to_string()))
        })
    }
}

fn remove_chunk_files<B: ChunkBackend>(backend: &B, database: &str, collection: &str) -> Result<()> {
    use crate::storage::naming::{is_temp_chunk, parse_chunk_sequence};
    for name in backend.list()? {
        if parse_chunk_sequence(database, collection, &name).is_some()
            || is_temp_chunk(database, collection, &name)
        {
            backend.remove(&name)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    fn catalog() -> (Arc<MemoryBackend>, Catalog<MemoryBackend>) {
        let backend = Arc::new(MemoryBackend::new());
        let catalog = Catalog::open(Arc::clone(&backend), DatabaseConfig::default()).unwrap();
        (backend, catalog)
    }

    #[test]
    fn test_create_list_drop_database() {
        let (backend, catalog) = catalog();
        catalog.create_database("school").unwrap();
        catalog.create_database("shop").unwrap();
        assert_eq!(catalog.list_databases(), vec!["school", "shop"]);
        assert!(backend.exists(MANIFEST_FILE).unwrap());

        assert!(matches!(
            catalog.create_database("school"),
            Err(HonoError::DatabaseExists(_))
        ));

        catalog.drop_database("shop").unwrap();
        assert_eq!(catalog.list_databases(), vec!["school"]);
        assert!(matches!(
            catalog.drop_database("shop"),
            Err(HonoError::UnknownDatabase(_))
        ));
    }

    #[test]
    fn test_manifest_survives_reopen() {
        let (backend, catalog) = catalog();
        catalog.create_database("school").unwrap();
        catalog.add_collection("school", "students").unwrap();

        let reopened = Catalog::open(Arc::clone(&backend), DatabaseConfig::default()).unwrap();
        assert_eq!(reopened.manifest(), catalog.manifest());
        assert_eq!(reopened.list_collections("school").unwrap(), vec!["students"]);
    }

    #[test]
    fn test_drop_database_removes_chunks() {
        let (backend, catalog) = catalog();
        catalog.create_database("school").unwrap();
        catalog.add_collection("school", "students").unwrap();
        backend.put_raw("school_students_1.json", b"{\"id\":1}\n");
        backend.put_raw("school_students_2.json.tmp", b"");
        backend.put_raw("other_students_1.json", b"");

        catalog.drop_database("school").unwrap();
        assert!(!backend.exists("school_students_1.json").unwrap());
        assert!(!backend.exists("school_students_2.json.tmp").unwrap());
        assert!(backend.exists("other_students_1.json").unwrap());
    }

    #[test]
    fn test_invalid_names_and_unknown_database() {
        let (_backend, catalog) = catalog();
        assert!(matches!(
            catalog.create_database("bad_name"),
            Err(HonoError::InvalidName { .. })
        ));
        assert!(matches!(
            catalog.add_collection("nope", "c"),
            Err(HonoError::UnknownDatabase(_))
        ));
        assert!(matches!(
            catalog.open_database("nope"),
            Err(HonoError::UnknownDatabase(_))
        ));
    }

    #[test]
    fn test_corrupt_manifest() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put_raw(MANIFEST_FILE, b"{{{");
        let result = Catalog::open(Arc::clone(&backend), DatabaseConfig::default());
        assert!(matches!(result, Err(HonoError::Corruption(_))));
    }

    #[test]
    fn test_failed_change_is_not_published() {
        let (_backend, catalog) = catalog();
        catalog.create_database("school").unwrap();
        let before = catalog.manifest();
        assert!(catalog.remove_collection("school", "ghost").is_err());
        assert_eq!(catalog.manifest(), before);
    }
}
