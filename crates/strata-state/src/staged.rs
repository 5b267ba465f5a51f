use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use strata_core::error::StrataError;
use tracing::{error, warn};

use crate::db::{BatchOp, Database};

/// LRU over raw lookups, including misses. `generation` bumps on every
/// commit so a read that raced a commit never caches what it saw.
struct Cache {
    lru: LruCache<Vec<u8>, Option<Vec<u8>>>,
    generation: u64,
}

/// Write-staging, read-caching layer over a durable [`Database`].
///
/// Writes are collected in a [`WriteBatch`] and reach the database only on
/// `commit`, as one atomic batch. Commits are serialized per store. The
/// cache is updated after a successful commit, so reads within the process
/// never see stale bytes for a committed key.
pub struct StagedStore {
    db: Arc<dyn Database>,
    cache: Mutex<Cache>,
    commit_lock: Mutex<()>,
}

impl StagedStore {
    pub fn new(db: Arc<dyn Database>, cache_size: usize) -> Self {
        let capacity = match NonZeroUsize::new(cache_size) {
            Some(capacity) => capacity,
            None => {
                warn!("db cache size is 0, caching a single entry instead");
                NonZeroUsize::MIN
            }
        };
        Self {
            db,
            cache: Mutex::new(Cache {
                lru: LruCache::new(capacity),
                generation: 0,
            }),
            commit_lock: Mutex::new(()),
        }
    }

    /// Cache-through read.
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StrataError> {
        let generation = {
            let mut cache = self.cache.lock();
            if let Some(hit) = cache.lru.get(key) {
                return Ok(hit.clone());
            }
            cache.generation
        };

        let value = self.db.get(key)?;

        let mut cache = self.cache.lock();
        if cache.generation == generation {
            cache.lru.put(key.to_vec(), value.clone());
        }
        Ok(value)
    }

    /// Start an empty batch of staged writes.
    pub fn batch(&self) -> WriteBatch<'_> {
        WriteBatch {
            store: self,
            ops: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    fn cached(&self) -> usize {
        self.cache.lock().lru.len()
    }

    fn commit(&self, ops: BTreeMap<Vec<u8>, Vec<u8>>) -> Result<(), StrataError> {
        if ops.is_empty() {
            return Ok(());
        }
        let ops: Vec<BatchOp> = ops.into_iter().collect();

        let _guard = self.commit_lock.lock();
        if let Err(e) = self.db.write_batch(&ops) {
            error!(error = %e, ops = ops.len(), "staged batch commit failed");
            return Err(e);
        }

        let mut cache = self.cache.lock();
        cache.generation = cache.generation.wrapping_add(1);
        for (key, value) in ops {
            cache.lru.put(key, Some(value));
        }
        Ok(())
    }
}

/// Pending writes against a [`StagedStore`].
///
/// Later writes to the same key replace earlier ones. Nothing is visible to
/// readers until [`WriteBatch::commit`] succeeds; dropping a batch discards
/// it.
pub struct WriteBatch<'a> {
    store: &'a StagedStore,
    ops: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl<'a> WriteBatch<'a> {
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.insert(key, value);
    }

    /// Apply every staged write as one atomic, durable batch.
    pub fn commit(self) -> Result<(), StrataError> {
        self.store.commit(self.ops)
    }
}
