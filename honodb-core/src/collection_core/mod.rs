// honodb-core/src/collection_core/mod.rs
// One collection: chunk store + primary index + write lock
//
// FILE STRUCTURE:
// ├── mod.rs        open / recovery, find, accessors, cursors
// └── mutations.rs  insert, update and delete verbs

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashSet;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::DatabaseConfig;
use crate::document::{Document, DocumentId};
use crate::error::{HonoError, Result};
use crate::find_options::FindOptions;
use crate::index::{CollectionIndex, RebuildReport};
use crate::mutator::DocumentMutator;
use crate::query::Condition;
use crate::storage::{ChunkBackend, ChunkDescriptor, ChunkStore, Location, ReplayIter};

mod mutations;

pub use self::mutations::InsertManyResult;

/// A named, independently chunked set of documents
///
/// Mutating verbs hold `write_lock` from the first index lookup to the last
/// index update. `find` never takes it: it reads whole chunk files, which
/// are only ever appended to or atomically replaced.
pub struct Collection<B: ChunkBackend> {
    name: String,
    store: ChunkStore<B>,
    index: RwLock<CollectionIndex>,
    write_lock: Mutex<()>,
    mutator: DocumentMutator,
    strict_replay: bool,
}

impl<B: ChunkBackend> Collection<B> {
    // ========== CONSTRUCTOR ==========

    /// Open (or create) a collection and rebuild its index from the chunks
    ///
    /// Older copies of an id left behind by an interrupted relocation are
    /// removed from disk so every id has exactly one record again.
    pub fn open(
        backend: Arc<B>,
        database: &str,
        name: &str,
        config: &DatabaseConfig,
    ) -> Result<(Self, RebuildReport)> {
        let store = ChunkStore::open(backend, database, name, config)?;
        let (mut index, report) =
            CollectionIndex::rebuild(name, store.replay(), config.strict_replay)?;

        if !report.superseded.is_empty() {
            warn!(
                collection = name,
                count = report.superseded.len(),
                "removing superseded copies of relocated documents"
            );
            for (chunk, lines) in group_by_chunk(&report.superseded) {
                store.remove_lines(chunk, &lines)?;
                index.compact_chunk(chunk, &lines);
            }
        }

        info!(
            database,
            collection = name,
            documents = index.len(),
            chunks = store.chunk_count(),
            skipped = report.skipped.len(),
            "collection opened"
        );

        Ok((
            Collection {
                name: name.to_string(),
                store,
                index: RwLock::new(index),
                write_lock: Mutex::new(()),
                mutator: DocumentMutator::new(config.generate_missing_ids),
                strict_replay: config.strict_replay,
            },
            report,
        ))
    }

    // ========== ACCESSORS ==========

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of live documents
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.read().is_empty()
    }

    pub fn chunks(&self) -> Vec<ChunkDescriptor> {
        self.store.descriptors()
    }

    pub fn lookup(&self, id: &DocumentId) -> Result<Location> {
        self.index.read().lookup(id).cloned()
    }

    /// Current index contents ordered by id
    pub fn index_snapshot(&self) -> BTreeMap<DocumentId, Location> {
        self.index.read().snapshot()
    }

    /// Read one document by id through the index
    pub fn get(&self, id: &DocumentId) -> Result<Document> {
        let _guard = self.write_lock.lock();
        let location = self.lookup(id)?;
        self.store.read(&location)
    }

    // ========== QUERY OPERATIONS ==========

    /// Documents matching `condition`, in scan order
    ///
    /// The condition is validated here; the chunks are read lazily by the
    /// returned cursor, once per call to [`FindCursor::iter`].
    pub fn find(&self, condition: &Value) -> Result<FindCursor<'_, B>> {
        let condition = Condition::parse(condition)?;
        debug!(collection = %self.name, condition = %condition.source(), "find");
        Ok(FindCursor {
            collection: self,
            condition,
        })
    }

    /// Find with projection, sort, limit and skip applied
    ///
    /// Without a sort the scan stops once `skip + limit` matches were read.
    pub fn find_with_options(&self, condition: &Value, options: &FindOptions) -> Result<Vec<Value>> {
        options.validate()?;
        let cursor = self.find(condition)?;

        if options.sort.is_some() {
            let docs = cursor
                .to_vec()?
                .into_iter()
                .map(Document::into_value)
                .collect();
            return Ok(options.apply(docs));
        }

        let wanted = options
            .limit
            .map_or(usize::MAX, |l| l.saturating_add(options.skip.unwrap_or(0)));
        let docs = cursor
            .iter()
            .take(wanted)
            .map(|doc| doc.map(Document::into_value))
            .collect::<Result<Vec<_>>>()?;
        Ok(options.apply(docs))
    }

    /// Throw the index away and rebuild it from the chunk files
    pub fn rebuild_index(&self) -> Result<RebuildReport> {
        let _guard = self.write_lock.lock();
        let (index, report) =
            CollectionIndex::rebuild(&self.name, self.store.replay(), self.strict_replay)?;
        *self.index.write() = index;
        Ok(report)
    }

    /// Delete the collection's chunk files
    pub fn destroy(&self) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.store.destroy()?;
        *self.index.write() = CollectionIndex::new(&self.name);
        Ok(())
    }

    // ========== PRIVATE HELPERS ==========

    /// Matching records in ascending (chunk, line) order, at most one if `first_only`
    ///
    /// Caller must hold `write_lock`, so the index and the chunks agree.
    fn select(&self, condition: &Condition, first_only: bool) -> Result<Vec<(Location, Document)>> {
        if let Some(id) = condition.id_equality() {
            let location = match self.index.read().lookup(&id) {
                Ok(loc) => loc.clone(),
                Err(_) => return Ok(Vec::new()),
            };
            let doc = self.store.read(&location)?;
            return Ok(if condition.matches(&doc) {
                vec![(location, doc)]
            } else {
                Vec::new()
            });
        }

        let mut selected = Vec::new();
        for item in self.store.replay() {
            match item {
                Ok((location, doc)) => {
                    if condition.matches(&doc) {
                        selected.push((location, doc));
                        if first_only {
                            break;
                        }
                    }
                }
                Err(HonoError::CorruptRecord { chunk, line, reason }) => {
                    warn!(%chunk, line, %reason, "skipping undecodable record");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(selected)
    }
}

fn group_by_chunk(locations: &[Location]) -> BTreeMap<u32, Vec<usize>> {
    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for loc in locations {
        groups.entry(loc.chunk).or_default().push(loc.line);
    }
    groups
}

/// Restartable result set of a `find`
pub struct FindCursor<'a, B: ChunkBackend> {
    collection: &'a Collection<B>,
    condition: Condition,
}

impl<'a, B: ChunkBackend> FindCursor<'a, B> {
    /// Start a fresh pass over the collection
    pub fn iter(&self) -> Matches<'_, B> {
        Matches {
            replay: self.collection.store.replay(),
            condition: &self.condition,
            seen: AHashSet::new(),
        }
    }

    /// Collect one full pass
    pub fn to_vec(&self) -> Result<Vec<Document>> {
        self.iter().collect()
    }
}

/// One pass of a [`FindCursor`]
///
/// Undecodable records are logged and skipped. An id already returned in this
/// pass is not returned again, so a document moving to a later chunk during
/// the scan shows up once.
pub struct Matches<'a, B: ChunkBackend> {
    replay: ReplayIter<'a, B>,
    condition: &'a Condition,
    seen: AHashSet<DocumentId>,
}

impl<'a, B: ChunkBackend> Iterator for Matches<'a, B> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.replay.next()? {
                Ok((_, doc)) => {
                    if self.condition.matches(&doc) && self.seen.insert(doc.id.clone()) {
                        return Some(Ok(doc));
                    }
                }
                Err(HonoError::CorruptRecord { chunk, line, reason }) => {
                    warn!(%chunk, line, %reason, "skipping undecodable record");
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
