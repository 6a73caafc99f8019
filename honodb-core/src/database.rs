// honodb-core/src/database.rs
// A named set of collections, owned by the caller (no global "current database")

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::catalog::Catalog;
use crate::collection_core::Collection;
use crate::error::{HonoError, Result};
use crate::index::RebuildReport;
use crate::storage::naming::validate_collection_name;
use crate::storage::ChunkBackend;

/// An open database
///
/// Generic over the storage backend:
/// - `Database<FileBackend>` - chunk files in a data directory
/// - `Database<MemoryBackend>` - in-memory, for tests
pub struct Database<B: ChunkBackend> {
    name: String,
    catalog: Catalog<B>,
    collections: DashMap<String, Arc<Collection<B>>>,
    open_reports: BTreeMap<String, RebuildReport>,
}

impl<B: ChunkBackend> Database<B> {
    /// Open every collection listed for `name` and rebuild their indexes
    pub(crate) fn open(catalog: Catalog<B>, name: &str) -> Result<Self> {
        let collections = DashMap::new();
        let mut open_reports = BTreeMap::new();

        for coll_name in catalog.list_collections(name)? {
            let (collection, report) = Collection::open(
                Arc::clone(catalog.backend()),
                name,
                &coll_name,
                catalog.config(),
            )?;
            collections.insert(coll_name.clone(), Arc::new(collection));
            open_reports.insert(coll_name, report);
        }

        info!(database = name, collections = collections.len(), "database opened");
        Ok(Database {
            name: name.to_string(),
            catalog,
            collections,
            open_reports,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn catalog(&self) -> &Catalog<B> {
        &self.catalog
    }

    /// Index rebuild outcome per collection, as of opening
    pub fn open_reports(&self) -> &BTreeMap<String, RebuildReport> {
        &self.open_reports
    }

    /// Records skipped as undecodable while opening
    pub fn skipped_records(&self) -> usize {
        self.open_reports.values().map(|r| r.skipped.len()).sum()
    }

    // ========== COLLECTION MANAGEMENT ==========

    pub fn collection(&self, name: &str) -> Result<Arc<Collection<B>>> {
        self.collections
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| HonoError::UnknownCollection(name.to_string()))
    }

    pub fn create_collection(&self, name: &str) -> Result<Arc<Collection<B>>> {
        validate_collection_name(name)?;
        if self.collections.contains_key(name) {
            return Err(HonoError::CollectionExists(name.to_string()));
        }

        // chunk 1 first: a crash before the manifest update leaves an unlisted empty file
        let (collection, _) = Collection::open(
            Arc::clone(self.catalog.backend()),
            &self.name,
            name,
            self.catalog.config(),
        )?;
        self.catalog.add_collection(&self.name, name)?;

        let collection = Arc::new(collection);
        self.collections
            .insert(name.to_string(), Arc::clone(&collection));
        info!(database = %self.name, collection = name, "collection created");
        Ok(collection)
    }

    /// Create the collection if it does not exist yet
    pub fn get_or_create_collection(&self, name: &str) -> Result<Arc<Collection<B>>> {
        match self.collection(name) {
            Ok(collection) => Ok(collection),
            Err(HonoError::UnknownCollection(_)) => self.create_collection(name),
            Err(e) => Err(e),
        }
    }

    pub fn drop_collection(&self, name: &str) -> Result<()> {
        let (_, collection) = self
            .collections
            .remove(name)
            .ok_or_else(|| HonoError::UnknownCollection(name.to_string()))?;
        self.catalog.remove_collection(&self.name, name)?;
        collection.destroy()?;
        info!(database = %self.name, collection = name, "collection dropped");
        Ok(())
    }

    /// Collection names in ascending order
    pub fn list_collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
