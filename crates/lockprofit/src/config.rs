//! Lock ledger configuration loaded from TOML.
//!
//! Everything consensus-relevant that used to be a package-level constant
//! lives here: tick cadence, lock parameters per category, burn base,
//! activation heights and the consolidation patch table.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use anyhow::Result;

use crate::activation::ActivationSchedule;
use crate::ledger::{LockCategory, LockParams, PunishMatch};
use crate::types::{Address, SECONDS_PER_DAY};

// ════════════════════════════════════════════════════════════════════════════
// DEFAULTS
// ════════════════════════════════════════════════════════════════════════════

/// Default block period in seconds.
pub const DEFAULT_BLOCK_PERIOD: u64 = 10;

/// Denominator of burn ratios.
pub const DEFAULT_BURN_BASE: u64 = 10_000;

/// Denominator of distribution rates.
pub const DEFAULT_RATE_BASE: u64 = 10_000;

/// In-memory entry count at which a ledger overflows to an L1 blob.
pub const DEFAULT_L1_FLUSH_THRESHOLD: usize = 4_096;

/// Snapshots kept by the read-side FIFO cache.
pub const DEFAULT_SNAPSHOT_CACHE_SIZE: usize = 32;

/// Days between consolidation passes.
pub const DEFAULT_MERGE_INTERVAL_DAYS: u64 = 30;

// ════════════════════════════════════════════════════════════════════════════
// CATEGORY CONFIG
// ════════════════════════════════════════════════════════════════════════════

/// Cadence and lock parameters for one category.
///
/// All periods are in blocks. Ticks:
///
/// ```text
/// lock tick: height % blocks_per_day == lock_offset
/// pay tick:  height % (blocks_per_day * pay_interval_days) == pay_offset
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub category: LockCategory,
    pub lock_period: u64,
    pub rls_period: u64,
    pub interval: u64,
    #[serde(default)]
    pub lock_offset: u64,
    #[serde(default)]
    pub pay_offset: u64,
    #[serde(default = "default_pay_interval_days")]
    pub pay_interval_days: u64,
    /// Share kept by the primary (over `rate_base`) when delegators exist.
    /// `None` disables the delegated split for this category.
    #[serde(default)]
    pub distribution_rate: Option<u64>,
    #[serde(default)]
    pub punish_match: PunishMatch,
}

fn default_pay_interval_days() -> u64 {
    1
}

impl CategoryConfig {
    /// Built-in parameters, scaled by `blocks_per_day`.
    pub fn default_for(category: LockCategory, blocks_per_day: u64) -> Self {
        let day = blocks_per_day;
        let (lock_days, rls_days, split, punish_match) = match category {
            LockCategory::SignerReward => (0, 180, Some(DEFAULT_RATE_BASE / 2), PunishMatch::Target),
            LockCategory::Flow => (0, 180, None, PunishMatch::Target),
            LockCategory::Bandwidth => (0, 180, None, PunishMatch::Target),
            LockCategory::PosExit => (30, 0, None, PunishMatch::Target),
            LockCategory::StpEntrust => (0, 180, None, PunishMatch::Source),
            LockCategory::StpEntrustExit => (30, 0, None, PunishMatch::Source),
            LockCategory::SpReward => (0, 180, Some(DEFAULT_RATE_BASE / 2), PunishMatch::Target),
            LockCategory::SpEntrust => (0, 180, None, PunishMatch::Source),
            LockCategory::SpEntrustExit => (30, 0, None, PunishMatch::Source),
            LockCategory::SpExit => (30, 0, None, PunishMatch::Target),
            LockCategory::Storage => (0, 180, None, PunishMatch::Target),
        };
        Self {
            category,
            lock_period: lock_days * day,
            rls_period: rls_days * day,
            interval: day,
            lock_offset: 0,
            pay_offset: 0,
            pay_interval_days: 1,
            distribution_rate: split,
            punish_match,
        }
    }

    pub fn params(&self) -> LockParams {
        LockParams::new(self.lock_period, self.rls_period, self.interval)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// PATCH TABLE
// ════════════════════════════════════════════════════════════════════════════

/// Corrective override applied to one consolidated group.
///
/// Historical data repair: values are reproduced exactly as configured,
/// nothing is derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEntry {
    pub category: LockCategory,
    /// Day-bucket start height the override applies to
    pub bucket: u64,
    /// Height of the merge tick that applies the override
    pub at_height: u64,
    pub target: Address,
    pub amount: u128,
    pub playment: u128,
}

// ════════════════════════════════════════════════════════════════════════════
// LOCK CONFIG
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    /// Block period in seconds
    pub block_period: u64,
    pub burn_base: u64,
    pub rate_base: u64,
    /// Default burn sink written into new entries
    pub burn_address: Address,
    /// Account debited for every payout; `None` mints from nowhere
    pub reward_pool: Option<Address>,
    pub l1_flush_threshold: usize,
    pub snapshot_cache_size: usize,
    /// 0 disables consolidation regardless of activation
    pub merge_interval_days: u64,
    pub activation: ActivationSchedule,
    pub categories: Vec<CategoryConfig>,
    pub patches: Vec<PatchEntry>,
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig {
            block_period: DEFAULT_BLOCK_PERIOD,
            burn_base: DEFAULT_BURN_BASE,
            rate_base: DEFAULT_RATE_BASE,
            burn_address: Address::ZERO,
            reward_pool: None,
            l1_flush_threshold: DEFAULT_L1_FLUSH_THRESHOLD,
            snapshot_cache_size: DEFAULT_SNAPSHOT_CACHE_SIZE,
            merge_interval_days: DEFAULT_MERGE_INTERVAL_DAYS,
            activation: ActivationSchedule::default(),
            categories: Vec::new(),
            patches: Vec::new(),
        }
    }
}

impl LockConfig {
    /// `SECONDS_PER_DAY / block_period`, never zero.
    pub fn blocks_per_day(&self) -> u64 {
        (SECONDS_PER_DAY / self.block_period.max(1)).max(1)
    }

    /// Configured parameters for `category`, or the built-in defaults.
    pub fn category(&self, category: LockCategory) -> CategoryConfig {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .cloned()
            .unwrap_or_else(|| CategoryConfig::default_for(category, self.blocks_per_day()))
    }

    /// Replace (or add) the parameters of one category.
    pub fn set_category(&mut self, cfg: CategoryConfig) {
        self.categories.retain(|c| c.category != cfg.category);
        self.categories.push(cfg);
    }

    pub fn is_lock_tick(&self, category: LockCategory, height: u64) -> bool {
        let bpd = self.blocks_per_day();
        height % bpd == self.category(category).lock_offset % bpd
    }

    pub fn is_pay_tick(&self, category: LockCategory, height: u64) -> bool {
        let cfg = self.category(category);
        let cycle = self.blocks_per_day().saturating_mul(cfg.pay_interval_days.max(1));
        height % cycle == cfg.pay_offset % cycle
    }

    pub fn is_merge_tick(&self, height: u64) -> bool {
        if self.merge_interval_days == 0 || height == 0 {
            return false;
        }
        let cycle = self.blocks_per_day().saturating_mul(self.merge_interval_days);
        height % cycle == 0
    }

    /// Start height of the day bucket containing `height`.
    pub fn day_bucket(&self, height: u64) -> u64 {
        let bpd = self.blocks_per_day();
        height / bpd * bpd
    }

    /// Patches firing for `(category, bucket)` at the consolidation at `height`.
    pub fn patches_for(
        &self,
        category: LockCategory,
        bucket: u64,
        height: u64,
    ) -> impl Iterator<Item = &PatchEntry> {
        self.patches
            .iter()
            .filter(move |p| p.category == category && p.bucket == bucket && p.at_height == height)
    }
}

/// Load config from a TOML file path.
/// If file is missing or parse fails, an error is returned.
pub fn load_from_file(path: impl AsRef<Path>) -> Result<LockConfig> {
    let p = path.as_ref();
    let s = fs::read_to_string(p)?;
    let cfg: LockConfig = toml::from_str(&s)?;
    if cfg.burn_base == 0 || cfg.rate_base == 0 {
        anyhow::bail!("burn_base and rate_base must be non-zero");
    }
    Ok(cfg)
}
