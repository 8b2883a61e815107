//! Recent ledger-set snapshots, bounded strict FIFO.
//!
//! Lookup by block hash atau block number. Insert snapshot yang sudah ada
//! tidak mengubah urutan eviction.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::DEFAULT_SNAPSHOT_CACHE_SIZE;
use crate::snapshot::LedgerSet;
use crate::types::Hash;

#[derive(Debug, Default)]
struct Inner {
    order: VecDeque<Hash>,
    by_hash: HashMap<Hash, Arc<LedgerSet>>,
    by_number: HashMap<u64, Hash>,
}

#[derive(Debug)]
pub struct SnapshotCache {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_CACHE_SIZE)
    }
}

impl SnapshotCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.inner.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().order.is_empty()
    }

    pub fn insert(&self, set: Arc<LedgerSet>) {
        let mut inner = self.inner.write();
        let hash = set.hash().clone();
        if inner.by_hash.contains_key(&hash) {
            inner.by_number.insert(set.number(), hash.clone());
            inner.by_hash.insert(hash, set);
            return;
        }

        while inner.order.len() >= self.capacity {
            let Some(old) = inner.order.pop_front() else { break };
            if let Some(evicted) = inner.by_hash.remove(&old) {
                if inner.by_number.get(&evicted.number()) == Some(&old) {
                    inner.by_number.remove(&evicted.number());
                }
                debug!(number = evicted.number(), "snapshot evicted from cache");
            }
        }

        inner.order.push_back(hash.clone());
        inner.by_number.insert(set.number(), hash.clone());
        inner.by_hash.insert(hash, set);
    }

    pub fn get(&self, hash: &Hash) -> Option<Arc<LedgerSet>> {
        self.inner.read().by_hash.get(hash).cloned()
    }

    pub fn get_by_number(&self, number: u64) -> Option<Arc<LedgerSet>> {
        let inner = self.inner.read();
        let hash = inner.by_number.get(&number)?;
        inner.by_hash.get(hash).cloned()
    }

    /// Most recently inserted snapshot.
    pub fn latest(&self) -> Option<Arc<LedgerSet>> {
        let inner = self.inner.read();
        let hash = inner.order.back()?;
        inner.by_hash.get(hash).cloned()
    }
}
