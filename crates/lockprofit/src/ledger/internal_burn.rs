//! Burn ratio escalation (punishment)
//!
//! ```text
//! Removal:    new = burn_base
//! Graduated:  new = burn_base - (burn_base - old) * reward_ratio / burn_base
//! ratio hanya naik: new dipakai jika new > old
//! ```
//!
//! Punishment tidak mengubah amount/playment; efeknya baru terlihat pada
//! settlement berikutnya lewat burn split.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::activation::Feature;
use crate::db::BlobStore;
use crate::error::Result;

use super::internal_payment::mul_div;
use super::{LockContext, LockLedger, PunishKind, PunishMatch, PunishmentOrder};

/// Burn ratio after applying `kind` to an entry currently at `old`.
/// Never lower than `old`.
pub fn escalated_ratio(old: u64, kind: PunishKind, burn_base: u64) -> u64 {
    let candidate = match kind {
        PunishKind::Removal => burn_base,
        PunishKind::Graduated { reward_ratio } => {
            let keep = reward_ratio.min(burn_base) as u128;
            let headroom = burn_base.saturating_sub(old) as u128;
            let kept = mul_div(headroom, keep, burn_base as u128) as u64;
            burn_base.saturating_sub(kept)
        }
    };
    old.max(candidate)
}

/// Reward ratio for a graduated punishment: the share of the expected
/// service that was actually delivered, over `base`.
pub fn shortfall_reward_ratio(expected: u128, delivered: u128, base: u64) -> u64 {
    if expected == 0 {
        return base;
    }
    mul_div(delivered.min(expected), base as u128, expected) as u64
}

impl LockLedger {
    /// Raise the burn ratio of every outstanding entry matched by `order`.
    /// Returns the number of entries whose ratio changed.
    pub fn escalate_burn(
        &mut self,
        ctx: &LockContext<'_>,
        store: &dyn BlobStore,
        order: &PunishmentOrder,
    ) -> Result<usize> {
        let gate = match order.kind {
            PunishKind::Removal => Feature::RemovalPunishment,
            PunishKind::Graduated { .. } => Feature::GraduatedPunishment,
        };
        if !ctx.is_active(gate) {
            warn!(
                category = %self.category,
                height = ctx.number,
                kind = ?order.kind,
                "punishment kind not active at this height, ignored"
            );
            return Ok(0);
        }
        if order.targets.is_empty() {
            return Ok(0);
        }

        let targets: BTreeSet<_> = order.targets.iter().copied().collect();
        let match_on = ctx.config.category(self.category).punish_match;
        let burn_base = ctx.config.burn_base;

        let mut table = self.fold_outstanding(store, ctx.hash)?;
        let mut changed = 0usize;
        for key in table.keys() {
            let Some(entry) = table.get_mut(&key) else { continue };
            let subject = match match_on {
                PunishMatch::Target => entry.target_address,
                PunishMatch::Source => entry.revenue_contract,
            };
            if !targets.contains(&subject) {
                continue;
            }
            let next = escalated_ratio(entry.burn_ratio, order.kind, burn_base);
            if next > entry.burn_ratio {
                entry.burn_ratio = next;
                if let Some(sink) = order.burn_address {
                    entry.burn_address = sink;
                }
                changed += 1;
            }
        }
        self.commit_l2(store, ctx.hash, table)?;

        info!(
            category = %self.category,
            height = ctx.number,
            targets = targets.len(),
            changed,
            "burn ratio escalated"
        );
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockConfig;
    use crate::db::MemoryBlobStore;
    use crate::external::{DirectRevenue, NoDelegation};
    use crate::ledger::{EntryKey, LockCategory, RewardRecord};
    use crate::types::{Address, Hash};

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn test_escalated_ratio() {
        assert_eq!(escalated_ratio(0, PunishKind::Removal, 10_000), 10_000);
        assert_eq!(escalated_ratio(0, PunishKind::Graduated { reward_ratio: 6_000 }, 10_000), 4_000);
        assert_eq!(escalated_ratio(5_000, PunishKind::Graduated { reward_ratio: 5_000 }, 10_000), 7_500);
        // never decreases
        assert_eq!(escalated_ratio(9_000, PunishKind::Graduated { reward_ratio: 10_000 }, 10_000), 9_000);
    }

    #[test]
    fn test_shortfall_reward_ratio() {
        assert_eq!(shortfall_reward_ratio(100, 60, 10_000), 6_000);
        assert_eq!(shortfall_reward_ratio(100, 200, 10_000), 10_000);
        assert_eq!(shortfall_reward_ratio(0, 0, 10_000), 10_000);
    }

    #[test]
    fn test_escalate_only_matching_entries() {
        let cfg = LockConfig::default();
        let store = MemoryBlobStore::new();
        let hash = Hash::from_bytes([7; 64]);
        let ctx = LockContext::new(&cfg, 0, &hash);

        let mut l = LockLedger::new(LockCategory::Storage);
        l.accumulate(&RewardRecord::new(addr(1), 100, LockCategory::Storage), false);
        l.accumulate(&RewardRecord::new(addr(2), 100, LockCategory::Storage), false);
        l.lock_pending(&ctx, &DirectRevenue, &NoDelegation);

        let order = PunishmentOrder {
            category: LockCategory::Storage,
            targets: vec![addr(1)],
            kind: PunishKind::Removal,
            burn_address: Some(addr(0xee)),
        };
        assert_eq!(l.escalate_burn(&ctx, &store, &order).unwrap(), 1);
        // second identical order changes nothing
        assert_eq!(l.escalate_burn(&ctx, &store, &order).unwrap(), 0);

        let t = l.outstanding(&store).unwrap();
        let hit = t.get(&EntryKey::legacy(addr(1), LockCategory::Storage, 0)).unwrap();
        assert_eq!(hit.burn_ratio, 10_000);
        assert_eq!(hit.burn_address, addr(0xee));
        let miss = t.get(&EntryKey::legacy(addr(2), LockCategory::Storage, 0)).unwrap();
        assert_eq!(miss.burn_ratio, 0);
    }

    #[test]
    fn test_inactive_kind_is_ignored() {
        let mut cfg = LockConfig::default();
        cfg.activation.set(Feature::GraduatedPunishment, None);
        let store = MemoryBlobStore::new();
        let hash = Hash::zero();
        let ctx = LockContext::new(&cfg, 0, &hash);
        let mut l = LockLedger::new(LockCategory::Flow);
        let order = PunishmentOrder {
            category: LockCategory::Flow,
            targets: vec![addr(1)],
            kind: PunishKind::Graduated { reward_ratio: 0 },
            burn_address: None,
        };
        assert_eq!(l.escalate_burn(&ctx, &store, &order).unwrap(), 0);
        assert!(store.is_empty());
    }
}
