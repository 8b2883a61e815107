//! # DSDN Lock Profit Ledger
//!
//! Library untuk akuntansi reward yang di-lock (vesting) pada chain DPoS:
//! reward dikumpulkan per block, di-lock pada lock tick, dibayar bertahap
//! pada pay tick, dan bisa di-burn sebagian lewat punishment.
//!
//! ## Module Overview
//!
//! | Module | Fungsi |
//! |--------|--------|
//! | `types` | Core types: Address, Hash |
//! | `crypto` | SHA3-512 helpers |
//! | `error` | LockError, QueryError |
//! | `activation` | Hard-fork activation heights per feature |
//! | `config` | LockConfig, CategoryConfig, patch table, TOML loader |
//! | `external` | RevenueBinding, DelegationSource, ExternalLedger |
//! | `db` | BlobStore trait, LMDB + memory backends, key layout |
//! | `ledger` | LockLedger: accumulate, lock, settle, burn, merge, L1/L2 cache |
//! | `snapshot` | LedgerSet: per-block orchestration, state root, persistence |
//! | `snapshot_cache` | Bounded FIFO cache of recent LedgerSets |
//! | `query` | Read-side reporting: outstanding, settlements, summary |
//!
//! ## Installment Formula
//!
//! ```text
//! pay_start = start_high + lock_period
//! k         = floor((h - pay_start) / interval)
//! vested    = amount                                  bila k >= max(rls_period / interval, 1)
//!           = amount * (k * interval) / rls_period    selain itu
//! due       = vested - playment
//! credited  = due * (burn_base - burn_ratio) / burn_base
//! burned    = due - credited
//! ```
//!
//! ## Penggunaan
//!
//! ```text
//! let next = parent.apply_block(&block, &input, &mut env)?;
//! next.store(store)?;
//! cache.insert(Arc::new(next));
//! ```

pub mod types;
pub mod crypto;
pub mod error;
pub mod activation;
pub mod config;
pub mod external;
pub mod db;
pub mod ledger;
pub mod snapshot;
pub mod snapshot_cache;
pub mod query;

pub use crate::activation::{ActivationSchedule, Feature};
pub use crate::config::{CategoryConfig, LockConfig, PatchEntry};
pub use crate::db::{BlobStore, LmdbBlobStore, MemoryBlobStore};
pub use crate::external::PayoutBatch;
pub use crate::error::{LockError, QueryError};
pub use crate::ledger::{
    EntryKey, EntrySource, LockBalanceData, LockCategory, LockLedger, PunishKind, PunishmentOrder,
    RewardRecord, SettlementRecord, SettlementResult, VestingEntry,
};
pub use crate::query::{BlockRef, LockQuery, LockSummary};
pub use crate::snapshot::{BlockContext, BlockEnv, BlockInput, LedgerSet};
pub use crate::snapshot_cache::SnapshotCache;
pub use crate::types::{Address, Hash};
