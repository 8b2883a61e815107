//! L1 / L2 cache blobs (CONSENSUS-CRITICAL)
//!
//! ```text
//! lock tick (entries >= threshold) ──► flush hot → L1 "<cat>-l1-<blockhash>"
//! pay tick                         ──► flush hot → L1, fold L1* + L2,
//!                                      settle, write "<cat>-l2-<blockhash>",
//!                                      clear L1 list
//! ```
//!
//! Blob isi = bincode(`CacheBlob`). Rekonstruksi (hot ∪ L1* ∪ L2) harus
//! identik dengan tabel yang akan dihasilkan tanpa tiering.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::activation::Feature;
use crate::db::{l1_key, l2_key, BlobStore};
use crate::error::{LockError, Result};
use crate::types::Hash;

use super::{EntryKey, LockCategory, LockContext, LockLedger, VestingEntry, VestingTable};

pub const CACHE_BLOB_VERSION: u8 = 1;

/// On-disk payload of an L1 or L2 blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheBlob {
    pub version: u8,
    pub category: LockCategory,
    pub entries: Vec<(EntryKey, VestingEntry)>,
}

pub fn encode_table(category: LockCategory, table: &VestingTable) -> Result<Vec<u8>> {
    let blob = CacheBlob {
        version: CACHE_BLOB_VERSION,
        category,
        entries: table.to_vec(),
    };
    Ok(bincode::serialize(&blob)?)
}

/// Decode a blob read from `key`, rejecting foreign categories and
/// unknown versions.
pub fn decode_table(category: LockCategory, key: &str, bytes: &[u8]) -> Result<VestingTable> {
    let blob: CacheBlob = bincode::deserialize(bytes).map_err(|e| LockError::BlobInvalid {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    if blob.version != CACHE_BLOB_VERSION {
        return Err(LockError::BlobInvalid {
            key: key.to_string(),
            reason: format!("unsupported version {}", blob.version),
        });
    }
    if blob.category != category {
        return Err(LockError::BlobInvalid {
            key: key.to_string(),
            reason: format!("category mismatch: expected {}, got {}", category, blob.category),
        });
    }
    Ok(VestingTable::from_vec(blob.entries))
}

impl LockLedger {
    fn read_blob(&self, store: &dyn BlobStore, key: &str) -> Result<VestingTable> {
        match store.get(key)? {
            Some(bytes) => decode_table(self.category, key, &bytes),
            None => Err(LockError::BlobMissing(key.to_string())),
        }
    }

    fn write_blob(&self, store: &dyn BlobStore, key: &str, table: &VestingTable) -> Result<()> {
        let bytes = encode_table(self.category, table)?;
        store.put(key, &bytes)
    }

    /// Move the hot entries into the L1 blob of block `id`.
    ///
    /// A second flush in the same block folds into the existing blob.
    /// Returns the number of entries flushed.
    pub fn flush_to_l1(&mut self, store: &dyn BlobStore, id: &Hash) -> Result<usize> {
        if self.entries.is_empty() {
            return Ok(0);
        }
        let key = l1_key(self.category, id);
        let mut table = if self.cache_l1.contains(id) {
            self.read_blob(store, &key)?
        } else {
            VestingTable::new()
        };
        let flushed = self.entries.len();
        table.merge_from(self.entries.clone());
        self.write_blob(store, &key, &table)?;

        if !self.cache_l1.contains(id) {
            self.cache_l1.push(id.clone());
        }
        self.entries = VestingTable::new();
        debug!(category = %self.category, key = %key, flushed, "hot entries flushed to L1");
        Ok(flushed)
    }

    /// Overflow flush after a lock pass. Only active with tiered caching.
    pub fn maybe_overflow(&mut self, ctx: &LockContext<'_>, store: &dyn BlobStore) -> Result<bool> {
        if !ctx.is_active(Feature::TieredCache) {
            return Ok(false);
        }
        if self.entries.len() < ctx.config.l1_flush_threshold.max(1) {
            return Ok(false);
        }
        let n = self.flush_to_l1(store, ctx.hash)?;
        info!(category = %self.category, height = ctx.number, entries = n, "L1 overflow flush");
        Ok(n > 0)
    }

    /// Full outstanding table: hot ∪ every L1 ∪ L2. Read-only.
    pub fn outstanding(&self, store: &dyn BlobStore) -> Result<VestingTable> {
        let mut table = match &self.cache_l2 {
            Some(id) => self.read_blob(store, &l2_key(self.category, id))?,
            None => VestingTable::new(),
        };
        for id in &self.cache_l1 {
            table.merge_from(self.read_blob(store, &l1_key(self.category, id))?);
        }
        table.merge_from(self.entries.clone());
        Ok(table)
    }

    /// Flush hot entries and return the complete outstanding table, ready
    /// to be rewritten with `commit_l2`.
    pub(crate) fn fold_outstanding(&mut self, store: &dyn BlobStore, id: &Hash) -> Result<VestingTable> {
        self.flush_to_l1(store, id)?;
        self.outstanding(store)
    }

    /// Persist `table` as the L2 blob of block `id` and drop the L1 list.
    /// The hot table must already be empty (see `fold_outstanding`).
    pub(crate) fn commit_l2(&mut self, store: &dyn BlobStore, id: &Hash, table: VestingTable) -> Result<()> {
        if table.is_empty() {
            self.cache_l2 = None;
        } else {
            self.write_blob(store, &l2_key(self.category, id), &table)?;
            self.cache_l2 = Some(id.clone());
        }
        self.cache_l1.clear();
        self.entries = VestingTable::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockConfig;
    use crate::db::MemoryBlobStore;
    use crate::external::{DirectRevenue, NoDelegation};
    use crate::ledger::RewardRecord;
    use crate::types::Address;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn h(b: u8) -> Hash {
        Hash::from_bytes([b; 64])
    }

    fn locked_ledger(cfg: &LockConfig, height: u64, id: &Hash, n: u8) -> LockLedger {
        let mut l = LockLedger::new(LockCategory::Bandwidth);
        for i in 1..=n {
            l.accumulate(&RewardRecord::new(addr(i), 10 * i as u128, LockCategory::Bandwidth), false);
        }
        let ctx = LockContext::new(cfg, height, id);
        l.lock_pending(&ctx, &DirectRevenue, &NoDelegation);
        l
    }

    #[test]
    fn test_blob_rejects_foreign_category() {
        let t = VestingTable::new();
        let bytes = encode_table(LockCategory::Flow, &t).unwrap();
        assert!(decode_table(LockCategory::Flow, "k", &bytes).is_ok());
        let err = decode_table(LockCategory::Storage, "k", &bytes).unwrap_err();
        assert!(matches!(err, LockError::BlobInvalid { .. }));
        assert!(decode_table(LockCategory::Flow, "k", b"garbage").is_err());
    }

    #[test]
    fn test_flush_then_outstanding_is_lossless() {
        let cfg = LockConfig::default();
        let store = MemoryBlobStore::new();
        let id = h(1);
        let mut l = locked_ledger(&cfg, 0, &id, 3);
        let before = l.hot_entries().clone();

        assert_eq!(l.flush_to_l1(&store, &id).unwrap(), 3);
        assert!(l.hot_entries().is_empty());
        assert_eq!(l.cache_l1(), &[id.clone()]);
        assert_eq!(l.outstanding(&store).unwrap(), before);
        assert_eq!(l.flush_to_l1(&store, &id).unwrap(), 0);
    }

    #[test]
    fn test_second_flush_same_block_folds() {
        let cfg = LockConfig::default();
        let store = MemoryBlobStore::new();
        let id = h(2);
        let mut l = locked_ledger(&cfg, 0, &id, 2);
        l.flush_to_l1(&store, &id).unwrap();
        l.accumulate(&RewardRecord::new(addr(1), 5, LockCategory::Bandwidth), false);
        l.lock_pending(&LockContext::new(&cfg, 0, &id), &DirectRevenue, &NoDelegation);
        l.flush_to_l1(&store, &id).unwrap();

        assert_eq!(l.cache_l1().len(), 1);
        let t = l.outstanding(&store).unwrap();
        assert_eq!(t.len(), 2);
        assert_eq!(t.total_amount(), 35);
    }

    #[test]
    fn test_missing_blob_is_an_error() {
        let cfg = LockConfig::default();
        let store = MemoryBlobStore::new();
        let id = h(3);
        let mut l = locked_ledger(&cfg, 0, &id, 1);
        l.flush_to_l1(&store, &id).unwrap();
        let empty = MemoryBlobStore::new();
        assert!(matches!(l.outstanding(&empty), Err(LockError::BlobMissing(_))));
    }

    #[test]
    fn test_overflow_respects_threshold() {
        let mut cfg = LockConfig::default();
        cfg.l1_flush_threshold = 3;
        let store = MemoryBlobStore::new();
        let id = h(4);
        let ctx = LockContext::new(&cfg, 0, &id);

        let mut l = locked_ledger(&cfg, 0, &id, 2);
        assert!(!l.maybe_overflow(&ctx, &store).unwrap());
        let mut l = locked_ledger(&cfg, 0, &id, 3);
        assert!(l.maybe_overflow(&ctx, &store).unwrap());
        assert!(l.hot_entries().is_empty());
    }
}
