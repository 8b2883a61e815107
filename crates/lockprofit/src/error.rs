//! Error types untuk lock ledger.
//!
//! Semua error di sini bersifat fatal untuk block yang sedang diproses:
//! caller WAJIB membatalkan block dan tidak memajukan snapshot.

use thiserror::Error;

use crate::types::Address;

// ════════════════════════════════════════════════════════════════════════════
// LOCK ERROR
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum LockError {
    /// Generic store failure (backend-specific message)
    #[error("store error: {0}")]
    Store(String),

    /// LMDB environment / transaction failure
    #[error("lmdb error: {0}")]
    Lmdb(#[from] lmdb::Error),

    /// Blob (de)serialization failure
    #[error("codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// Ledger references an L1/L2 blob the store does not have
    #[error("cache blob missing: {0}")]
    BlobMissing(String),

    /// Blob content belongs to a different category or format version
    #[error("cache blob {key} is invalid: {reason}")]
    BlobInvalid { key: String, reason: String },

    /// External account ledger refused a credit/debit
    #[error("external ledger rejected {op} of {amount} for {address}: {reason}")]
    Ledger {
        op: &'static str,
        address: Address,
        amount: u128,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, LockError>;

// ════════════════════════════════════════════════════════════════════════════
// QUERY ERROR
// ════════════════════════════════════════════════════════════════════════════

/// Errors returned by the read-side reporting layer.
#[derive(Debug, Error)]
pub enum QueryError {
    /// No snapshot exists for the requested block
    #[error("unknown block: {0}")]
    UnknownBlock(String),

    /// Snapshot exists but holds nothing for the request
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Lock(#[from] LockError),
}
