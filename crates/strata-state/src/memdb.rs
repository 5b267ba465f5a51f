//! In-memory [`Database`] for tests and ephemeral nodes.
//!
//! Clones share the same underlying map, so dropping a `Serializer` and
//! initializing a new one over a clone behaves like a process restart over
//! the same disk. Reads and writes can be made to fail on demand.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use strata_core::error::StrataError;

use crate::db::{BatchOp, Database};

#[derive(Default)]
struct Inner {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    batches: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Inner>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `get` fail with a storage error.
    pub fn fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `write_batch` fail without applying anything.
    pub fn fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of reads that reached this store.
    pub fn reads(&self) -> usize {
        self.inner.reads.load(Ordering::SeqCst)
    }

    /// Number of batches successfully applied.
    pub fn batches(&self) -> usize {
        self.inner.batches.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Database for MemoryDb {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StrataError> {
        if self.inner.fail_reads.load(Ordering::SeqCst) {
            return Err(StrataError::Storage("injected read failure".into()));
        }
        self.inner.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.inner.data.read().get(key).cloned())
    }

    fn write_batch(&self, ops: &[BatchOp]) -> Result<(), StrataError> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(StrataError::Storage("injected write failure".into()));
        }
        let mut data = self.inner.data.write();
        for (key, value) in ops {
            data.insert(key.clone(), value.clone());
        }
        self.inner.batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
