//! # Lock Ledger Persistence
//!
//! Key-value store untuk cache blob L1/L2 dan snapshot ledger set.
//!
//! ## Key Layout (CONSENSUS-CRITICAL)
//!
//! ```text
//! <category>-l1-<blockhash>     bincode CacheBlob (overflow siklus berjalan)
//! <category>-l2-<blockhash>     bincode CacheBlob (carry-forward terkonsolidasi)
//! lockprofit-<blockhash>        bincode LedgerSet
//! lockprofit-height-<number>    block hash (hex) dari snapshot pada height tsb
//! ```
//!
//! Blob tidak pernah dihapus oleh crate ini: snapshot lama tetap bisa
//! direkonstruksi selama blob yang direferensikan masih ada.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lmdb::{Database, DatabaseFlags, Environment, Transaction as LmdbTxn, WriteFlags};
use parking_lot::RwLock;

use crate::error::Result;
use crate::ledger::LockCategory;
use crate::types::Hash;

// ════════════════════════════════════════════════════════════════════════════
// BUCKET / KEY CONSTANTS
// ════════════════════════════════════════════════════════════════════════════

/// Cache blob bucket
pub const BUCKET_LOCK_BLOBS: &str = "lock_blobs";

/// Ledger set snapshot bucket
pub const BUCKET_LOCK_SNAPSHOTS: &str = "lock_snapshots";

const SNAPSHOT_PREFIX: &str = "lockprofit-";

pub fn l1_key(category: LockCategory, id: &Hash) -> String {
    format!("{}-l1-{}", category.name(), id.to_hex())
}

pub fn l2_key(category: LockCategory, id: &Hash) -> String {
    format!("{}-l2-{}", category.name(), id.to_hex())
}

pub fn snapshot_key(hash: &Hash) -> String {
    format!("{}{}", SNAPSHOT_PREFIX, hash.to_hex())
}

pub fn snapshot_height_key(number: u64) -> String {
    format!("{}height-{}", SNAPSHOT_PREFIX, number)
}

fn is_snapshot_key(key: &str) -> bool {
    key.starts_with(SNAPSHOT_PREFIX)
}

// ════════════════════════════════════════════════════════════════════════════
// STORE TRAIT
// ════════════════════════════════════════════════════════════════════════════

/// Synchronous key-value store used by the lock ledger.
pub trait BlobStore: fmt::Debug + Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn put(&self, key: &str, data: &[u8]) -> Result<()>;
}

// ════════════════════════════════════════════════════════════════════════════
// LMDB STORE
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct LmdbBlobStore {
    env: Arc<Environment>,
    env_path: PathBuf,
    db_blobs: Database,
    db_snapshots: Database,
}

impl fmt::Debug for LmdbBlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LmdbBlobStore")
            .field("path", &self.env_path)
            .finish()
    }
}

impl LmdbBlobStore {
    /// Open LMDB environment at path, create named DBs
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let p = path.as_ref();
        std::fs::create_dir_all(p)?;

        let env = Environment::new()
            .set_max_dbs(4)
            .set_map_size(4_000_000_000usize)
            .open(p)?;

        let db_blobs = env.create_db(Some(BUCKET_LOCK_BLOBS), DatabaseFlags::empty())?;
        let db_snapshots = env.create_db(Some(BUCKET_LOCK_SNAPSHOTS), DatabaseFlags::empty())?;

        Ok(Self {
            env: Arc::new(env),
            env_path: p.to_path_buf(),
            db_blobs,
            db_snapshots,
        })
    }

    pub fn path(&self) -> &Path {
        &self.env_path
    }

    fn bucket(&self, key: &str) -> Database {
        if is_snapshot_key(key) {
            self.db_snapshots
        } else {
            self.db_blobs
        }
    }
}

impl BlobStore for LmdbBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let rtxn = self.env.begin_ro_txn()?;
        match rtxn.get(self.bucket(key), &key.as_bytes()) {
            Ok(v) => Ok(Some(v.to_vec())),
            Err(lmdb::Error::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        let mut wtxn = self.env.begin_rw_txn()?;
        wtxn.put(self.bucket(key), &key.as_bytes(), &data, WriteFlags::empty())?;
        wtxn.commit()?;
        Ok(())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// MEMORY STORE
// ════════════════════════════════════════════════════════════════════════════

/// Volatile store for replay tooling and tests.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    items: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.read().is_empty()
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        self.items.write().insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_key_layout() {
        let h = Hash::from_bytes([0x11; 64]);
        let k = l1_key(LockCategory::Flow, &h);
        assert!(k.starts_with("flow-l1-1111"));
        assert!(l2_key(LockCategory::SignerReward, &h).starts_with("reward-l2-"));
        assert!(is_snapshot_key(&snapshot_key(&h)));
        assert!(is_snapshot_key(&snapshot_height_key(7)));
        assert!(!is_snapshot_key(&k));
    }

    #[test]
    fn test_lmdb_put_get() {
        let dir = tempdir().unwrap();
        let store = LmdbBlobStore::open(dir.path()).expect("open");
        assert_eq!(store.get("flow-l1-aa").unwrap(), None);
        store.put("flow-l1-aa", b"blob").unwrap();
        store.put("lockprofit-height-3", b"hash").unwrap();
        assert_eq!(store.get("flow-l1-aa").unwrap().as_deref(), Some(&b"blob"[..]));
        assert_eq!(store.get("lockprofit-height-3").unwrap().as_deref(), Some(&b"hash"[..]));
        assert_eq!(store.get("flow-l2-aa").unwrap(), None);
    }

    #[test]
    fn test_memory_store_overwrite() {
        let store = MemoryBlobStore::new();
        assert!(store.is_empty());
        store.put("reward-l1-a", b"1").unwrap();
        store.put("reward-l1-a", b"2").unwrap();
        assert_eq!(store.get("reward-l1-a").unwrap().as_deref(), Some(&b"2"[..]));
    }
}
