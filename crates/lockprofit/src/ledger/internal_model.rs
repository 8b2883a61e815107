//! Internal models for the lock ledger
//! Vesting entry, composite key, pending accumulator, settlement record

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::Address;

// ============================================================
// REWARD CATEGORIES
// ============================================================

/// Named reward category. Each category owns exactly one `LockLedger`
/// and its name is the storage namespace of that ledger's cache blobs.
///
/// Variant order is CONSENSUS-CRITICAL (bincode encodes the index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockCategory {
    /// Block production reward of signers
    SignerReward,
    /// Flow (traffic) miner reward
    Flow,
    /// Bandwidth provider reward
    Bandwidth,
    /// Validator stake released after exit
    PosExit,
    /// Delegators entrusted to a validator
    StpEntrust,
    /// Entrusted stake released after delegator exit
    StpEntrustExit,
    /// Storage-pool operator reward
    SpReward,
    /// Delegators entrusted to a storage pool
    SpEntrust,
    /// Entrusted pool stake released after exit
    SpEntrustExit,
    /// Storage pool stake released after pool exit
    SpExit,
    /// Storage-node revenue from storage proofs
    Storage,
}

impl LockCategory {
    pub const ALL: [LockCategory; 11] = [
        LockCategory::SignerReward,
        LockCategory::Flow,
        LockCategory::Bandwidth,
        LockCategory::PosExit,
        LockCategory::StpEntrust,
        LockCategory::StpEntrustExit,
        LockCategory::SpReward,
        LockCategory::SpEntrust,
        LockCategory::SpEntrustExit,
        LockCategory::SpExit,
        LockCategory::Storage,
    ];

    /// Storage namespace (`"<name>-l1-<hash>"`)
    pub fn name(&self) -> &'static str {
        match self {
            LockCategory::SignerReward => "reward",
            LockCategory::Flow => "flow",
            LockCategory::Bandwidth => "bandwidth",
            LockCategory::PosExit => "posexit",
            LockCategory::StpEntrust => "stpentrust",
            LockCategory::StpEntrustExit => "stpentrustexit",
            LockCategory::SpReward => "sprwd",
            LockCategory::SpEntrust => "spentrust",
            LockCategory::SpEntrustExit => "spentrustexit",
            LockCategory::SpExit => "spexit",
            LockCategory::Storage => "storage",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

impl std::fmt::Display for LockCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================
// ENTRY KEY (legacy | V1)
// ============================================================

/// Which schema generation keyed the entry.
///
/// Legacy entries are one per (participant, category, lock height);
/// V1 entries additionally carry the source that fed the reward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntrySource {
    Legacy,
    V1(Address),
}

impl EntrySource {
    pub fn source_address(&self) -> Option<Address> {
        match self {
            EntrySource::Legacy => None,
            EntrySource::V1(a) => Some(*a),
        }
    }
}

/// Flat composite key of the vesting table.
/// Field order defines iteration order and is CONSENSUS-CRITICAL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryKey {
    pub participant: Address,
    pub category: LockCategory,
    pub lock_height: u64,
    pub source: EntrySource,
}

impl EntryKey {
    pub fn legacy(participant: Address, category: LockCategory, lock_height: u64) -> Self {
        Self { participant, category, lock_height, source: EntrySource::Legacy }
    }

    pub fn v1(participant: Address, category: LockCategory, lock_height: u64, source: Address) -> Self {
        Self { participant, category, lock_height, source: EntrySource::V1(source) }
    }
}

// ============================================================
// LOCK PARAMETERS
// ============================================================

/// Vesting schedule parameters, in blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct LockParams {
    /// Blocks after `start_high` before the first installment
    pub lock_period: u64,
    /// Length of the linear release window
    pub rls_period: u64,
    /// Spacing between installments
    pub interval: u64,
}

impl LockParams {
    pub fn new(lock_period: u64, rls_period: u64, interval: u64) -> Self {
        Self { lock_period, rls_period, interval }
    }
}

// ============================================================
// VESTING ENTRY (PledgeItem)
// ============================================================

/// One locked reward, released in installments.
///
/// Invariant: `playment <= amount`; an entry with `playment == amount`
/// is deleted by the settlement pass. `burn_ratio` only ever increases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingEntry {
    pub amount: u128,
    pub playment: u128,
    pub category: LockCategory,
    pub start_high: u64,
    pub lock_period: u64,
    pub rls_period: u64,
    pub interval: u64,
    pub target_address: Address,
    pub revenue_address: Address,
    pub revenue_contract: Address,
    pub multi_signature: Option<Address>,
    pub burn_ratio: u64,
    pub burn_amount: u128,
    pub burn_address: Address,
}

impl VestingEntry {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        category: LockCategory,
        amount: u128,
        start_high: u64,
        params: LockParams,
        target_address: Address,
        revenue_address: Address,
        revenue_contract: Address,
        burn_address: Address,
    ) -> Self {
        Self {
            amount,
            playment: 0,
            category,
            start_high,
            lock_period: params.lock_period,
            rls_period: params.rls_period,
            interval: params.interval,
            target_address,
            revenue_address,
            revenue_contract,
            multi_signature: None,
            burn_ratio: 0,
            burn_amount: 0,
            burn_address,
        }
    }

    pub fn params(&self) -> LockParams {
        LockParams::new(self.lock_period, self.rls_period, self.interval)
    }

    pub fn remaining(&self) -> u128 {
        self.amount.saturating_sub(self.playment)
    }

    pub fn is_settled(&self) -> bool {
        self.playment >= self.amount
    }

    /// Address that receives installments.
    pub fn receiver(&self, multisig_enabled: bool) -> Address {
        match self.multi_signature {
            Some(ms) if multisig_enabled => ms,
            _ => self.revenue_address,
        }
    }

    /// Record a payment of `paid` (burned part included).
    /// Clamps instead of exceeding `amount`; a clamp means an accounting bug upstream.
    pub fn apply_payment(&mut self, paid: u128, burned: u128) {
        let next = self.playment.saturating_add(paid);
        if next > self.amount {
            warn!(
                target = %self.target_address,
                category = %self.category,
                start = self.start_high,
                amount = self.amount,
                playment = self.playment,
                paid,
                "payment exceeds locked amount, clamping"
            );
            self.playment = self.amount;
        } else {
            self.playment = next;
        }
        self.burn_amount = self.burn_amount.saturating_add(burned);
    }

    /// Combine a duplicate of the same key (same lock height, same source).
    pub fn absorb(&mut self, other: &VestingEntry) {
        self.amount = self.amount.saturating_add(other.amount);
        self.playment = self.playment.saturating_add(other.playment);
        self.burn_amount = self.burn_amount.saturating_add(other.burn_amount);
        self.burn_ratio = self.burn_ratio.max(other.burn_ratio);
    }
}

// ============================================================
// PENDING (pre-lock) BALANCES
// ============================================================

/// V1 pending slot: amount plus an optional payee fixed by the producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PendingReward {
    pub amount: u128,
    pub revenue_address: Option<Address>,
}

/// Per-participant pending accumulator for one category ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PendingBalance {
    /// Legacy scalar accumulator
    pub legacy: u128,
    /// V1 accumulator keyed by source
    pub v1: im::OrdMap<Address, PendingReward>,
}

impl PendingBalance {
    pub fn is_empty(&self) -> bool {
        self.legacy == 0 && self.v1.values().all(|p| p.amount == 0)
    }

    pub fn total(&self) -> u128 {
        self.v1
            .values()
            .fold(self.legacy, |acc, p| acc.saturating_add(p.amount))
    }
}

// ============================================================
// BLOCK INPUTS
// ============================================================

/// One newly earned reward (validated upstream: amount > 0, known category).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRecord {
    pub target: Address,
    pub amount: u128,
    pub category: LockCategory,
    pub source: Option<Address>,
    pub revenue: Option<Address>,
}

impl RewardRecord {
    pub fn new(target: Address, amount: u128, category: LockCategory) -> Self {
        Self { target, amount, category, source: None, revenue: None }
    }

    pub fn with_source(mut self, source: Address) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_revenue(mut self, revenue: Address) -> Self {
        self.revenue = Some(revenue);
        self
    }
}

/// How a punishment order raises the burn ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PunishKind {
    /// Forced removal / illegal pledge: ratio jumps to burn_base
    Removal,
    /// Keep `reward_ratio / burn_base` of what was still payable
    Graduated { reward_ratio: u64 },
}

/// Which entry field a punishment target is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PunishMatch {
    #[default]
    Target,
    Source,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PunishmentOrder {
    pub category: LockCategory,
    pub targets: Vec<Address>,
    pub kind: PunishKind,
    /// Overrides the entry's burn sink when set
    pub burn_address: Option<Address>,
}

// ============================================================
// SETTLEMENT
// ============================================================

/// Result code of one settlement record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementResult {
    /// Fully paid in this pass, entry removed
    Settled,
    /// Partially paid, entry retained
    Partial,
}

impl SettlementResult {
    pub fn code(&self) -> u8 {
        match self {
            SettlementResult::Settled => 0,
            SettlementResult::Partial => 1,
        }
    }
}

/// One installment paid for one vesting entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub key: EntryKey,
    pub target: Address,
    pub receiver: Address,
    /// Net amount credited to `receiver`
    pub credited: u128,
    /// Amount diverted to `burn_address`
    pub burned: u128,
    pub burn_address: Address,
    pub result: SettlementResult,
}

impl SettlementRecord {
    /// Total advanced on `playment` (credited + burned).
    pub fn paid(&self) -> u128 {
        self.credited.saturating_add(self.burned)
    }
}
