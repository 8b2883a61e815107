//! # Ledger Set (per-block snapshot)
//!
//! `LedgerSet` adalah state lock-profit lengkap pada satu block: satu
//! `LockLedger` per kategori plus settlement record block tsb.
//!
//! ## Block Processing Order (CONSENSUS-CRITICAL)
//!
//! ```text
//! 1. accumulate   semua RewardRecord block ini
//! 2. lock         kategori yang berada di lock tick (+ L1 overflow)
//! 3. punish       PunishmentOrder, urut sesuai input
//! 4. settle       kategori yang berada di pay tick
//! 5. merge        semua kategori, jika merge tick
//! 6. payout       kredit/debit ExternalLedger (setelah semua write store sukses)
//! ```
//!
//! `apply_block` tidak memodifikasi snapshot parent: snapshot lama tetap
//! valid untuk query dan reorg. Kloning murah karena `im::OrdMap` berbagi
//! struktur dengan parent.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::activation::Feature;
use crate::config::LockConfig;
use crate::crypto::sha3_512;
use crate::db::{snapshot_height_key, snapshot_key, BlobStore};
use crate::error::{LockError, Result};
use crate::external::{DelegationSource, ExternalLedger, PayoutBatch, RevenueBinding};
use crate::ledger::{
    LockBalanceData, LockCategory, LockContext, LockLedger, PunishmentOrder,
    RewardRecord, SettlementRecord,
};
use crate::types::{Address, Hash};

// ════════════════════════════════════════════════════════════════════════════
// BLOCK INPUT
// ════════════════════════════════════════════════════════════════════════════

/// Identity of the block being applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockContext {
    pub number: u64,
    pub hash: Hash,
}

impl BlockContext {
    pub fn new(number: u64, hash: Hash) -> Self {
        Self { number, hash }
    }
}

/// Everything the block feeds into the lock ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockInput {
    pub rewards: Vec<RewardRecord>,
    pub punishments: Vec<PunishmentOrder>,
}

/// Collaborators needed while applying a block.
pub struct BlockEnv<'a> {
    pub config: &'a LockConfig,
    pub store: &'a dyn BlobStore,
    pub accounts: &'a mut dyn ExternalLedger,
    pub bindings: &'a dyn RevenueBinding,
    pub delegations: &'a dyn DelegationSource,
}

// ════════════════════════════════════════════════════════════════════════════
// LEDGER SET
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSet {
    number: u64,
    hash: Hash,
    ledgers: im::OrdMap<LockCategory, LockLedger>,
    settlements: Vec<SettlementRecord>,
}

impl LedgerSet {
    /// Empty ledger set anchored at the genesis block.
    pub fn genesis(hash: Hash) -> Self {
        Self {
            number: 0,
            hash,
            ledgers: im::OrdMap::new(),
            settlements: Vec::new(),
        }
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn ledger(&self, category: LockCategory) -> Option<&LockLedger> {
        self.ledgers.get(&category)
    }

    /// Settlement records produced by the block this snapshot belongs to.
    pub fn settlements(&self) -> &[SettlementRecord] {
        &self.settlements
    }

    fn ledger_mut(&mut self, category: LockCategory) -> &mut LockLedger {
        self.ledgers
            .entry(category)
            .or_insert_with(|| LockLedger::new(category))
    }

    // ════════════════════════════════════════════════════════════════════
    // BLOCK APPLICATION
    // ════════════════════════════════════════════════════════════════════

    /// Derive the snapshot of `block` from `self` (its parent).
    ///
    /// On error nothing is credited and the parent stays untouched; blobs
    /// already written under `block.hash` are unreferenced garbage.
    pub fn apply_block(&self, block: &BlockContext, input: &BlockInput, env: &mut BlockEnv<'_>) -> Result<LedgerSet> {
        let mut next = self.clone();
        next.number = block.number;
        next.hash = block.hash.clone();
        next.settlements = Vec::new();

        let config = env.config;
        let ctx = LockContext::new(config, block.number, &block.hash);
        let source_keyed = ctx.is_active(Feature::SourceKeyedLedger);

        // 1. accumulate
        for record in &input.rewards {
            next.ledger_mut(record.category).accumulate(record, source_keyed);
        }

        // 2. lock
        for category in LockCategory::ALL {
            if !config.is_lock_tick(category, block.number) {
                continue;
            }
            let Some(ledger) = next.ledgers.get_mut(&category) else { continue };
            if ledger.pending().is_empty() {
                continue;
            }
            ledger.lock_pending(&ctx, env.bindings, env.delegations);
            ledger.maybe_overflow(&ctx, env.store)?;
        }

        // 3. punish
        for order in &input.punishments {
            if let Some(ledger) = next.ledgers.get_mut(&order.category) {
                ledger.escalate_burn(&ctx, env.store, order)?;
            }
        }

        // 4. settle
        let mut records = Vec::new();
        for category in LockCategory::ALL {
            if !config.is_pay_tick(category, block.number) {
                continue;
            }
            if let Some(ledger) = next.ledgers.get_mut(&category) {
                records.extend(ledger.settle(&ctx, env.store)?);
            }
        }

        // 5. merge
        if ctx.is_active(Feature::Consolidation) && config.is_merge_tick(block.number) {
            for category in LockCategory::ALL {
                if let Some(ledger) = next.ledgers.get_mut(&category) {
                    ledger.consolidate(&ctx, env.store)?;
                }
            }
        }

        // 6. payout
        Self::pay_out(config, &records, env.accounts)?;
        next.settlements = records;

        debug!(
            number = block.number,
            hash = %block.hash,
            rewards = input.rewards.len(),
            punishments = input.punishments.len(),
            settlements = next.settlements.len(),
            "block applied to lock ledger"
        );
        Ok(next)
    }

    /// Aggregate every record into one batch so the external ledger sees
    /// a single all-or-nothing change per block.
    fn pay_out(config: &LockConfig, records: &[SettlementRecord], accounts: &mut dyn ExternalLedger) -> Result<()> {
        let mut batch = PayoutBatch::new();
        for r in records {
            if let Some(pool) = config.reward_pool {
                batch.debit(pool, r.paid());
            }
            batch.credit(r.receiver, r.credited);
            batch.credit(r.burn_address, r.burned);
        }
        if batch.is_empty() {
            return Ok(());
        }
        accounts.apply(&batch)
    }

    // ════════════════════════════════════════════════════════════════════
    // READ SIDE
    // ════════════════════════════════════════════════════════════════════

    /// Reconstituted view of `participant` in `category`: pending balances
    /// plus every outstanding entry it earned, optionally limited to lock
    /// heights in `heights`.
    pub fn outstanding(
        &self,
        store: &dyn BlobStore,
        participant: &Address,
        category: LockCategory,
        heights: Option<&RangeInclusive<u64>>,
    ) -> Result<LockBalanceData> {
        let mut data = LockBalanceData::new(*participant);
        let Some(ledger) = self.ledger(category) else {
            return Ok(data);
        };

        if let Some(pending) = ledger.pending_of(participant) {
            if pending.legacy > 0 {
                data.reward_balance.insert(category, pending.legacy);
            }
            if !pending.v1.is_empty() {
                data.reward_balance_v1.insert(
                    category,
                    pending.v1.iter().map(|(k, v)| (*k, *v)).collect(),
                );
            }
        }

        let table = ledger.outstanding(store)?;
        for (key, entry) in table.for_target(participant) {
            data.entries.insert(*key, entry.clone());
        }
        if let Some(range) = heights {
            data.retain_heights(range);
        }
        Ok(data)
    }

    // ════════════════════════════════════════════════════════════════════
    // STATE ROOT
    // ════════════════════════════════════════════════════════════════════

    /// Deterministic digest of the hot state and the cache references.
    /// Pending balances and hot entries enter with their full bincode
    /// encoding; blob contents are covered through their block-hash ids.
    pub fn state_root(&self) -> Result<Hash> {
        let mut accum = Vec::new();
        accum.extend_from_slice(&self.number.to_be_bytes());

        for (category, ledger) in self.ledgers.iter() {
            accum.extend_from_slice(category.name().as_bytes());

            for (addr, bal) in ledger.pending().iter() {
                accum.extend_from_slice(addr.as_bytes());
                accum.extend_from_slice(&bincode::serialize(bal)?);
            }

            for (key, entry) in ledger.hot_entries().iter() {
                accum.extend_from_slice(&bincode::serialize(&(key, entry))?);
            }

            for id in ledger.cache_l1() {
                accum.extend_from_slice(id.as_bytes());
            }
            match ledger.cache_l2() {
                Some(id) => accum.extend_from_slice(id.as_bytes()),
                None => accum.push(0u8),
            }
        }

        Ok(sha3_512(&accum))
    }

    // ════════════════════════════════════════════════════════════════════
    // PERSISTENCE
    // ════════════════════════════════════════════════════════════════════

    /// Persist this snapshot under its block hash and index it by number.
    pub fn store(&self, store: &dyn BlobStore) -> Result<()> {
        let bytes = bincode::serialize(self)?;
        store.put(&snapshot_key(&self.hash), &bytes)?;
        store.put(&snapshot_height_key(self.number), self.hash.to_hex().as_bytes())?;
        info!(number = self.number, hash = %self.hash, bytes = bytes.len(), "lock snapshot stored");
        Ok(())
    }

    pub fn load(store: &dyn BlobStore, hash: &Hash) -> Result<Option<LedgerSet>> {
        match store.get(&snapshot_key(hash))? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn load_by_number(store: &dyn BlobStore, number: u64) -> Result<Option<LedgerSet>> {
        let Some(raw) = store.get(&snapshot_height_key(number))? else {
            return Ok(None);
        };
        let text = String::from_utf8(raw).map_err(|e| LockError::Store(e.to_string()))?;
        let hash: Hash = text
            .parse()
            .map_err(|e: anyhow::Error| LockError::Store(format!("bad height index {}: {}", number, e)))?;
        Self::load(store, &hash)
    }
}
