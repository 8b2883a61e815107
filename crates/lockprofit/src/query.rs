//! Read-side reporting over committed snapshots.
//!
//! Snapshot dicari di `SnapshotCache` dulu, lalu di store. Snapshot yang
//! dimuat dari store dimasukkan ke cache.

use std::ops::RangeInclusive;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::LockConfig;
use crate::db::BlobStore;
use crate::error::QueryError;
use crate::ledger::{estimate_releases, LockBalanceData, LockCategory, SettlementRecord};
use crate::snapshot::LedgerSet;
use crate::snapshot_cache::SnapshotCache;
use crate::types::{Address, Hash};

/// Block a query is evaluated at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockRef {
    Number(u64),
    Hash(Hash),
}

impl std::fmt::Display for BlockRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockRef::Number(n) => write!(f, "#{}", n),
            BlockRef::Hash(h) => write!(f, "{}", h),
        }
    }
}

/// Per-category totals for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockSummary {
    pub category: LockCategory,
    pub pending: u128,
    pub locked: u128,
    pub paid: u128,
    pub burned: u128,
    pub entries: usize,
}

pub struct LockQuery<'a> {
    cache: &'a SnapshotCache,
    store: &'a dyn BlobStore,
}

impl<'a> LockQuery<'a> {
    pub fn new(cache: &'a SnapshotCache, store: &'a dyn BlobStore) -> Self {
        Self { cache, store }
    }

    pub fn snapshot(&self, at: &BlockRef) -> Result<Arc<LedgerSet>, QueryError> {
        let cached = match at {
            BlockRef::Number(n) => self.cache.get_by_number(*n),
            BlockRef::Hash(h) => self.cache.get(h),
        };
        if let Some(set) = cached {
            return Ok(set);
        }
        let loaded = match at {
            BlockRef::Number(n) => LedgerSet::load_by_number(self.store, *n)?,
            BlockRef::Hash(h) => LedgerSet::load(self.store, h)?,
        };
        let set = Arc::new(loaded.ok_or_else(|| QueryError::UnknownBlock(at.to_string()))?);
        self.cache.insert(set.clone());
        Ok(set)
    }

    /// Outstanding position of `participant` in `category`.
    pub fn outstanding(
        &self,
        at: &BlockRef,
        participant: &Address,
        category: LockCategory,
        heights: Option<RangeInclusive<u64>>,
    ) -> Result<LockBalanceData, QueryError> {
        let set = self.snapshot(at)?;
        let data = set.outstanding(self.store, participant, category, heights.as_ref())?;
        if data.is_empty() {
            return Err(QueryError::NotFound(format!("{} {} at {}", category, participant, at)));
        }
        Ok(data)
    }

    /// Settlement records produced by the block `at`.
    pub fn settlements(&self, at: &BlockRef) -> Result<Vec<SettlementRecord>, QueryError> {
        Ok(self.snapshot(at)?.settlements().to_vec())
    }

    /// Totals across every category the participant appears in.
    pub fn summary(&self, at: &BlockRef, participant: &Address) -> Result<Vec<LockSummary>, QueryError> {
        let set = self.snapshot(at)?;
        let mut out = Vec::new();
        for category in LockCategory::ALL {
            let data = set.outstanding(self.store, participant, category, None)?;
            if data.is_empty() {
                continue;
            }
            out.push(LockSummary {
                category,
                pending: data.total_pending(),
                locked: data.total_locked(),
                paid: data.total_paid(),
                burned: data.total_burned(),
                entries: data.entries.len(),
            });
        }
        Ok(out)
    }

    /// Projected installments (height, amount) for `participant` in
    /// `category` after `at`, up to and including `until`.
    /// Ignores future punishments and consolidation.
    pub fn projected_releases(
        &self,
        at: &BlockRef,
        participant: &Address,
        category: LockCategory,
        until: u64,
        config: &LockConfig,
    ) -> Result<Vec<(u64, u128)>, QueryError> {
        let set = self.snapshot(at)?;
        let data = set.outstanding(self.store, participant, category, None)?;
        let mut plan: std::collections::BTreeMap<u64, u128> = std::collections::BTreeMap::new();
        for entry in data.entries.values() {
            for (h, due) in estimate_releases(entry, set.number(), until) {
                // only pay ticks actually release
                let tick = next_pay_tick(config, category, h);
                let slot = plan.entry(tick).or_insert(0);
                *slot = slot.saturating_add(due);
            }
        }
        Ok(plan.into_iter().filter(|(h, _)| *h <= until).collect())
    }
}

fn next_pay_tick(config: &LockConfig, category: LockCategory, height: u64) -> u64 {
    let cfg = config.category(category);
    let cycle = config.blocks_per_day().saturating_mul(cfg.pay_interval_days.max(1));
    let offset = cfg.pay_offset % cycle;
    let base = height - height % cycle + offset;
    if base >= height {
        base
    } else {
        base.saturating_add(cycle)
    }
}
