//! Day-bucket consolidation (merge)
//!
//! Entry dengan lock height di bucket hari yang sudah lewat digabung per
//! (target, revenue, revenue_contract, multisig):
//!
//! ```text
//! merge_address = first20(sha3_512(target ‖ revenue ‖ contract ‖ multisig|0))
//! key           = (merge_address, category, bucket_start, V1(contract))
//! amount/playment/burn_amount dijumlah, start_high = bucket_start
//! ```
//!
//! Entry yang parameter lock / burn-nya berbeda dari grup tetap di key
//! aslinya. Patch table hanya berlaku pada merge tick `at_height`-nya
//! (sekali saja); setelah itu entry yang lunas dihapus.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::activation::Feature;
use crate::crypto::sha3_512_parts;
use crate::db::BlobStore;
use crate::error::Result;
use crate::types::Address;

use super::{EntryKey, LockContext, LockLedger, LockParams, VestingEntry, VestingTable};

/// Outcome of one consolidation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub before: usize,
    pub after: usize,
}

/// Group address of an entry.
pub fn merge_address(entry: &VestingEntry) -> Address {
    let multisig = entry.multi_signature.unwrap_or(Address::ZERO);
    let digest = sha3_512_parts(&[
        entry.target_address.as_bytes(),
        entry.revenue_address.as_bytes(),
        entry.revenue_contract.as_bytes(),
        multisig.as_bytes(),
    ]);
    Address::from_digest(&digest)
}

/// Fields that must agree for two entries to share a group.
#[derive(PartialEq, Eq)]
struct Compat {
    params: LockParams,
    burn_ratio: u64,
    burn_address: Address,
}

impl Compat {
    fn of(entry: &VestingEntry) -> Self {
        Self {
            params: entry.params(),
            burn_ratio: entry.burn_ratio,
            burn_address: entry.burn_address,
        }
    }
}

/// Consolidated copy of `table` as of `ctx.number`.
pub fn consolidate_table(table: &VestingTable, ctx: &LockContext<'_>) -> VestingTable {
    let current_bucket = ctx.config.day_bucket(ctx.number);
    let mut out = VestingTable::new();
    let mut groups: BTreeMap<EntryKey, Vec<(EntryKey, &VestingEntry)>> = BTreeMap::new();

    for (key, entry) in table.iter() {
        let bucket = ctx.config.day_bucket(key.lock_height);
        if bucket >= current_bucket {
            out.upsert(*key, entry.clone());
            continue;
        }
        let group_key = EntryKey::v1(merge_address(entry), key.category, bucket, entry.revenue_contract);
        groups.entry(group_key).or_default().push((*key, entry));
    }

    let mut merged_keys = Vec::new();
    for (group_key, members) in groups {
        // an entry already stored under the group key cannot move, so it anchors
        let anchor = members
            .iter()
            .find(|(k, _)| *k == group_key)
            .or_else(|| members.first())
            .map(|(_, e)| Compat::of(e));
        let Some(anchor) = anchor else { continue };

        let mut merged: Option<VestingEntry> = None;
        for (key, entry) in members {
            if Compat::of(entry) != anchor {
                out.upsert(key, entry.clone());
                continue;
            }
            match merged.as_mut() {
                Some(g) => {
                    g.amount = g.amount.saturating_add(entry.amount);
                    g.playment = g.playment.saturating_add(entry.playment);
                    g.burn_amount = g.burn_amount.saturating_add(entry.burn_amount);
                }
                None => {
                    let mut g = entry.clone();
                    g.start_high = group_key.lock_height;
                    merged = Some(g);
                }
            }
        }
        if let Some(g) = merged {
            out.upsert(group_key, g);
            merged_keys.push(group_key);
        }
    }

    if ctx.is_active(Feature::ConsolidationPatch) {
        apply_patches(&mut out, &merged_keys, ctx);
    }

    for key in out.keys() {
        if out.get(&key).map(|e| e.is_settled()).unwrap_or(false) {
            out.remove(&key);
        }
    }
    out
}

fn apply_patches(out: &mut VestingTable, merged_keys: &[EntryKey], ctx: &LockContext<'_>) {
    for key in merged_keys {
        let Some(entry) = out.get_mut(key) else { continue };
        for patch in ctx.config.patches_for(key.category, key.lock_height, ctx.number) {
            if patch.target != entry.target_address {
                continue;
            }
            let playment = if patch.playment > patch.amount {
                warn!(
                    target = %patch.target,
                    bucket = patch.bucket,
                    at_height = patch.at_height,
                    amount = patch.amount,
                    playment = patch.playment,
                    "patch playment exceeds amount, clamping"
                );
                patch.amount
            } else {
                patch.playment
            };
            entry.amount = patch.amount;
            entry.playment = playment;
            info!(
                category = %key.category,
                bucket = patch.bucket,
                target = %patch.target,
                "consolidation patch applied"
            );
        }
    }
}

impl LockLedger {
    /// Consolidate every outstanding entry of this category.
    pub fn consolidate(&mut self, ctx: &LockContext<'_>, store: &dyn BlobStore) -> Result<MergeOutcome> {
        let table = self.fold_outstanding(store, ctx.hash)?;
        let before = table.len();
        let merged = consolidate_table(&table, ctx);
        let after = merged.len();
        self.commit_l2(store, ctx.hash, merged)?;
        if before != after {
            info!(category = %self.category, height = ctx.number, before, after, "entries consolidated");
        }
        Ok(MergeOutcome { before, after })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LockConfig, PatchEntry};
    use crate::db::MemoryBlobStore;
    use crate::external::{DirectRevenue, NoDelegation};
    use crate::ledger::{LockCategory, RewardRecord};
    use crate::types::Hash;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn entry(amount: u128, start: u64, target: Address) -> VestingEntry {
        VestingEntry::new(
            LockCategory::Flow,
            amount,
            start,
            LockParams::new(0, 1_000_000, 8_640),
            target,
            target,
            target,
            Address::ZERO,
        )
    }

    #[test]
    fn test_same_day_entries_merge() {
        let cfg = LockConfig::default();
        let bpd = cfg.blocks_per_day();
        let hash = Hash::zero();
        let ctx = LockContext::new(&cfg, 3 * bpd, &hash);

        let mut t = VestingTable::new();
        t.upsert(EntryKey::legacy(addr(1), LockCategory::Flow, 10), entry(100, 10, addr(1)));
        let mut paid = entry(50, 20, addr(1));
        paid.playment = 5;
        t.upsert(EntryKey::v1(addr(1), LockCategory::Flow, 20, addr(1)), paid);
        t.upsert(EntryKey::legacy(addr(1), LockCategory::Flow, bpd + 1), entry(30, bpd + 1, addr(1)));
        t.upsert(EntryKey::legacy(addr(2), LockCategory::Flow, 3 * bpd), entry(7, 3 * bpd, addr(2)));

        let out = consolidate_table(&t, &ctx);
        assert_eq!(out.len(), 3);
        assert_eq!(out.total_amount(), t.total_amount());
        assert_eq!(out.total_playment(), t.total_playment());

        let gk = EntryKey::v1(merge_address(&entry(0, 0, addr(1))), LockCategory::Flow, 0, addr(1));
        let g = out.get(&gk).unwrap();
        assert_eq!((g.amount, g.playment, g.start_high), (150, 5, 0));
        // current bucket untouched
        assert!(out.get(&EntryKey::legacy(addr(2), LockCategory::Flow, 3 * bpd)).is_some());
    }

    #[test]
    fn test_incompatible_entry_keeps_key() {
        let cfg = LockConfig::default();
        let hash = Hash::zero();
        let ctx = LockContext::new(&cfg, 10 * cfg.blocks_per_day(), &hash);

        let mut t = VestingTable::new();
        t.upsert(EntryKey::legacy(addr(1), LockCategory::Flow, 1), entry(10, 1, addr(1)));
        let mut burned = entry(10, 2, addr(1));
        burned.burn_ratio = 5_000;
        let odd = EntryKey::legacy(addr(1), LockCategory::Flow, 2);
        t.upsert(odd, burned.clone());

        let out = consolidate_table(&t, &ctx);
        assert_eq!(out.len(), 2);
        assert_eq!(out.get(&odd), Some(&burned));
    }

    #[test]
    fn test_consolidation_is_stable() {
        let cfg = LockConfig::default();
        let hash = Hash::zero();
        let ctx = LockContext::new(&cfg, 5 * cfg.blocks_per_day(), &hash);
        let mut t = VestingTable::new();
        t.upsert(EntryKey::legacy(addr(1), LockCategory::Flow, 3), entry(10, 3, addr(1)));
        t.upsert(EntryKey::legacy(addr(1), LockCategory::Flow, 4), entry(20, 4, addr(1)));
        let once = consolidate_table(&t, &ctx);
        let twice = consolidate_table(&once, &ctx);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_patch_overrides_group() {
        let mut cfg = LockConfig::default();
        cfg.patches.push(PatchEntry {
            category: LockCategory::Flow,
            bucket: 0,
            at_height: 2 * cfg.blocks_per_day(),
            target: addr(1),
            amount: 90,
            playment: 40,
        });
        let hash = Hash::zero();
        let ctx = LockContext::new(&cfg, 2 * cfg.blocks_per_day(), &hash);
        let mut t = VestingTable::new();
        t.upsert(EntryKey::legacy(addr(1), LockCategory::Flow, 5), entry(100, 5, addr(1)));

        let out = consolidate_table(&t, &ctx);
        let (_, g) = out.iter().next().unwrap();
        assert_eq!((g.amount, g.playment), (90, 40));

        // a later merge tick leaves the group alone
        let later = LockContext::new(&cfg, 3 * cfg.blocks_per_day(), &hash);
        let mut t = VestingTable::new();
        t.upsert(EntryKey::legacy(addr(1), LockCategory::Flow, 5), entry(100, 5, addr(1)));
        let out = consolidate_table(&t, &later);
        let (_, g) = out.iter().next().unwrap();
        assert_eq!((g.amount, g.playment), (100, 0));
    }

    #[test]
    fn test_patch_not_reapplied_across_merge_ticks() {
        let mut cfg = LockConfig { block_period: 8_640, ..LockConfig::default() };
        let bpd = cfg.blocks_per_day();
        let mut flow = cfg.category(LockCategory::Flow);
        flow.lock_period = 0;
        flow.rls_period = 1_000;
        flow.interval = 10;
        cfg.set_category(flow);
        cfg.patches.push(PatchEntry {
            category: LockCategory::Flow,
            bucket: 0,
            at_height: bpd,
            target: addr(1),
            amount: 1_000,
            playment: 10,
        });

        let store = MemoryBlobStore::new();
        let genesis = Hash::zero();
        let mut l = LockLedger::new(LockCategory::Flow);
        l.accumulate(&RewardRecord::new(addr(1), 1_000, LockCategory::Flow), false);
        l.lock_pending(&LockContext::new(&cfg, 0, &genesis), &DirectRevenue, &NoDelegation);

        let mut paid = 0u128;
        for day in 1..=6u64 {
            let hash = Hash::from_bytes([day as u8; 64]);
            let ctx = LockContext::new(&cfg, day * bpd, &hash);
            paid += l.settle(&ctx, &store).unwrap().iter().map(|r| r.paid()).sum::<u128>();
            l.consolidate(&ctx, &store).unwrap();
        }
        assert_eq!(paid, 60);
        let t = l.outstanding(&store).unwrap();
        assert_eq!(t.total_amount(), 1_000);
        assert_eq!(t.total_playment(), paid);
    }

    #[test]
    fn test_settled_groups_dropped() {
        let cfg = LockConfig::default();
        let hash = Hash::zero();
        let ctx = LockContext::new(&cfg, 2 * cfg.blocks_per_day(), &hash);
        let mut e = entry(10, 1, addr(1));
        e.playment = 10;
        let mut t = VestingTable::new();
        t.upsert(EntryKey::legacy(addr(1), LockCategory::Flow, 1), e);
        assert!(consolidate_table(&t, &ctx).is_empty());
    }
}
