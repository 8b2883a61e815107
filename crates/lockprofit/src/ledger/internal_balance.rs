//! Vesting table dan view LockBalanceData per participant
//!
//! `VestingTable` adalah satu-satunya representasi vesting entry di crate ini:
//! legacy dan V1 hidup di tabel yang sama, dibedakan oleh `EntrySource`.
//! Semua algoritma (payment, burn, merge) berjalan di atas tabel ini.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::types::Address;
use super::{EntryKey, EntrySource, LockCategory, PendingReward, VestingEntry};

// ============================================================
// VESTING TABLE
// ============================================================

/// Flat table `(participant, category, lock_height, source) → entry`.
///
/// Backed by a persistent ordered map so cloning a ledger for the next
/// block shares structure with the previous snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct VestingTable {
    entries: im::OrdMap<EntryKey, VestingEntry>,
}

impl VestingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &EntryKey) -> Option<&VestingEntry> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &EntryKey) -> Option<&mut VestingEntry> {
        self.entries.get_mut(key)
    }

    pub fn remove(&mut self, key: &EntryKey) -> Option<VestingEntry> {
        self.entries.remove(key)
    }

    /// Insert, or fold into the entry already stored under the same key.
    pub fn upsert(&mut self, key: EntryKey, entry: VestingEntry) {
        match self.entries.get_mut(&key) {
            Some(existing) => existing.absorb(&entry),
            None => {
                self.entries.insert(key, entry);
            }
        }
    }

    /// Fold every entry of `other` into `self`.
    pub fn merge_from(&mut self, other: VestingTable) {
        for (k, v) in other.entries.into_iter() {
            self.upsert(k, v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntryKey, &VestingEntry)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> Vec<EntryKey> {
        self.entries.keys().copied().collect()
    }

    /// Entries whose earner is `participant` (consolidated entries are keyed
    /// by a merge hash, so the target field is authoritative).
    pub fn for_target(&self, participant: &Address) -> impl Iterator<Item = (&EntryKey, &VestingEntry)> + '_ {
        let p = *participant;
        self.entries.iter().filter(move |(_, e)| e.target_address == p)
    }

    pub fn total_amount(&self) -> u128 {
        self.entries.values().fold(0u128, |acc, e| acc.saturating_add(e.amount))
    }

    pub fn total_playment(&self) -> u128 {
        self.entries.values().fold(0u128, |acc, e| acc.saturating_add(e.playment))
    }

    /// Ordered snapshot of the content, the blob payload format.
    pub fn to_vec(&self) -> Vec<(EntryKey, VestingEntry)> {
        self.entries.iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    pub fn from_vec(items: Vec<(EntryKey, VestingEntry)>) -> Self {
        let mut t = Self::new();
        for (k, v) in items {
            t.upsert(k, v);
        }
        t
    }
}

// ============================================================
// LOCK BALANCE DATA (read-side view)
// ============================================================

/// Reconstituted state of one participant, as returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockBalanceData {
    pub participant: Address,
    /// Legacy pending accumulator per category
    pub reward_balance: BTreeMap<LockCategory, u128>,
    /// V1 pending accumulator per category and source
    pub reward_balance_v1: BTreeMap<LockCategory, BTreeMap<Address, PendingReward>>,
    /// Outstanding vesting entries (both generations)
    pub entries: BTreeMap<EntryKey, VestingEntry>,
}

impl LockBalanceData {
    pub fn new(participant: Address) -> Self {
        Self {
            participant,
            reward_balance: BTreeMap::new(),
            reward_balance_v1: BTreeMap::new(),
            entries: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
            && self.reward_balance.values().all(|v| *v == 0)
            && self
                .reward_balance_v1
                .values()
                .all(|m| m.values().all(|p| p.amount == 0))
    }

    /// Drop entries whose lock height is outside `range`.
    pub fn retain_heights(&mut self, range: &RangeInclusive<u64>) {
        self.entries.retain(|k, _| range.contains(&k.lock_height));
    }

    /// Legacy view: lock height → category → entry.
    pub fn lock_balance(&self) -> BTreeMap<u64, BTreeMap<LockCategory, &VestingEntry>> {
        let mut out: BTreeMap<u64, BTreeMap<LockCategory, &VestingEntry>> = BTreeMap::new();
        for (k, e) in self.entries.iter() {
            if k.source == EntrySource::Legacy {
                out.entry(k.lock_height).or_default().insert(k.category, e);
            }
        }
        out
    }

    /// V1 view: lock height → category → source → entry.
    pub fn lock_balance_v1(&self) -> BTreeMap<u64, BTreeMap<LockCategory, BTreeMap<Address, &VestingEntry>>> {
        let mut out: BTreeMap<u64, BTreeMap<LockCategory, BTreeMap<Address, &VestingEntry>>> = BTreeMap::new();
        for (k, e) in self.entries.iter() {
            if let EntrySource::V1(src) = k.source {
                out.entry(k.lock_height)
                    .or_default()
                    .entry(k.category)
                    .or_default()
                    .insert(src, e);
            }
        }
        out
    }

    pub fn total_locked(&self) -> u128 {
        self.entries.values().fold(0u128, |acc, e| acc.saturating_add(e.amount))
    }

    pub fn total_paid(&self) -> u128 {
        self.entries.values().fold(0u128, |acc, e| acc.saturating_add(e.playment))
    }

    pub fn total_burned(&self) -> u128 {
        self.entries.values().fold(0u128, |acc, e| acc.saturating_add(e.burn_amount))
    }

    pub fn total_pending(&self) -> u128 {
        let legacy = self.reward_balance.values().fold(0u128, |a, v| a.saturating_add(*v));
        self.reward_balance_v1
            .values()
            .flat_map(|m| m.values())
            .fold(legacy, |a, p| a.saturating_add(p.amount))
    }
}
