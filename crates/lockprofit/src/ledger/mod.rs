//! # Lock Ledger Module
//!
//! Module ini adalah **FACADE** untuk satu kategori reward (`LockLedger`).
//!
//! ## Arsitektur
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                       mod.rs (FACADE)                            │
//! │  - LockLedger struct definition                                  │
//! │  - LockContext (height, hash, config)                            │
//! │  - Public re-exports                                             │
//! └──────────────────────────────────────────────────────────────────┘
//!                                  │
//!        ┌─────────────────────────┼─────────────────────────┐
//!        ▼                         ▼                         ▼
//! ┌──────────────┐         ┌──────────────┐          ┌──────────────┐
//! │  Accumulate  │ ──────► │     Lock     │ ───────► │  Settlement  │
//! │  (pending)   │         │  (vesting)   │          │   (payout)   │
//! └──────────────┘         └──────────────┘          └──────────────┘
//!                                  │                         │
//!                                  ▼                         ▼
//!                          ┌──────────────┐          ┌──────────────┐
//!                          │   L1 / L2    │ ◄──────► │ Burn / Merge │
//!                          │    Cache     │          │              │
//!                          └──────────────┘          └──────────────┘
//! ```
//!
//! ## Module Structure
//!
//! | Module | Fungsi |
//! |--------|--------|
//! | `internal_model` | VestingEntry, EntryKey, PendingBalance, SettlementRecord |
//! | `internal_balance` | VestingTable (flat composite-key table), LockBalanceData view |
//! | `internal_accumulate` | Reward record → pending accumulator |
//! | `internal_lock` | Pending → vesting entry, revenue binding, delegated split |
//! | `internal_payment` | Installment formula, burn split, release estimation |
//! | `internal_cache` | L1/L2 blob codec, flush, reconstitution |
//! | `internal_settlement` | Payout pass |
//! | `internal_merge` | Day-bucket consolidation + patch table |
//! | `internal_burn` | Burn ratio escalation |
//!
//! ## Lifecycle Entry
//!
//! ```text
//! Pending ──lock tick──► Locked ──pay tick──► Settled (dihapus)
//!                          │
//!                          └──punishment──► burn_ratio naik (ortogonal)
//! ```
//!
//! Tidak ada transisi mundur. Pending tidak pernah dipersist sebagai entry.
//!
//! ## Hot State vs Cache
//!
//! `entries` hanya berisi entry yang di-lock sejak flush terakhir. Entry lain
//! ada di blob L1 (`cache_l1`) atau blob L2 (`cache_l2`). Semua operasi yang
//! butuh set lengkap (settlement, burn, merge) memakai `fold_outstanding()`.

use serde::{Deserialize, Serialize};

use crate::activation::Feature;
use crate::config::LockConfig;
use crate::types::{Address, Hash};

mod internal_model;
mod internal_balance;
mod internal_accumulate;
mod internal_lock;
mod internal_payment;
mod internal_cache;
mod internal_settlement;
mod internal_merge;
mod internal_burn;

pub use internal_model::{
    EntryKey, EntrySource, LockCategory, LockParams, PendingBalance, PendingReward, PunishKind,
    PunishMatch, PunishmentOrder, RewardRecord, SettlementRecord, SettlementResult, VestingEntry,
};
pub use internal_balance::{LockBalanceData, VestingTable};
pub use internal_lock::{split_delegated, LockOutcome};
pub use internal_payment::{
    burn_split, due_payment, estimate_releases, mul_div, quote, vested_amount, PaymentQuote,
};
pub use internal_cache::{decode_table, encode_table, CacheBlob, CACHE_BLOB_VERSION};
pub use internal_settlement::{apply_settlement, compute_settlement};
pub use internal_merge::{consolidate_table, merge_address, MergeOutcome};
pub use internal_burn::{escalated_ratio, shortfall_reward_ratio};

// ════════════════════════════════════════════════════════════════════════════
// LOCK CONTEXT
// ════════════════════════════════════════════════════════════════════════════

/// Block being processed plus the configuration it is processed under.
#[derive(Debug, Clone, Copy)]
pub struct LockContext<'a> {
    pub config: &'a LockConfig,
    pub number: u64,
    pub hash: &'a Hash,
}

impl<'a> LockContext<'a> {
    pub fn new(config: &'a LockConfig, number: u64, hash: &'a Hash) -> Self {
        Self { config, number, hash }
    }

    pub fn is_active(&self, feature: Feature) -> bool {
        self.config.activation.is_active(feature, self.number)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// LOCK LEDGER (LockData)
// ════════════════════════════════════════════════════════════════════════════

/// One reward category: pending accumulators, hot vesting entries and
/// references to the on-disk L1/L2 cache blobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockLedger {
    category: LockCategory,
    /// participant → pending (not yet locked) rewards
    pending: im::OrdMap<Address, PendingBalance>,
    /// vesting entries locked since the last flush
    entries: VestingTable,
    /// overflow blobs written during the current settlement cycle
    cache_l1: Vec<Hash>,
    /// consolidated carry-forward blob
    cache_l2: Option<Hash>,
}

impl LockLedger {
    pub fn new(category: LockCategory) -> Self {
        Self {
            category,
            pending: im::OrdMap::new(),
            entries: VestingTable::new(),
            cache_l1: Vec::new(),
            cache_l2: None,
        }
    }

    pub fn category(&self) -> LockCategory {
        self.category
    }

    /// Hot (in-memory) vesting entries.
    pub fn hot_entries(&self) -> &VestingTable {
        &self.entries
    }

    pub fn pending(&self) -> &im::OrdMap<Address, PendingBalance> {
        &self.pending
    }

    pub fn pending_of(&self, participant: &Address) -> Option<&PendingBalance> {
        self.pending.get(participant)
    }

    pub fn cache_l1(&self) -> &[Hash] {
        &self.cache_l1
    }

    pub fn cache_l2(&self) -> Option<&Hash> {
        self.cache_l2.as_ref()
    }
}
