//! # Property Tests — Lock Ledger Invariants
//!
//! - Conservation: credited + burned + outstanding == locked
//! - Payment never decreases, never exceeds amount
//! - Burn ratio never decreases
//! - Installments of a fully released entry sum to its remaining amount
//! - Re-running a settlement at the same height pays nothing
//! - Cache blob encode/decode preserves the table

use proptest::prelude::*;

use dsdn_lockprofit::config::LockConfig;
use dsdn_lockprofit::db::MemoryBlobStore;
use dsdn_lockprofit::external::{DirectRevenue, NoDelegation};
use dsdn_lockprofit::ledger::{
    decode_table, due_payment, encode_table, escalated_ratio, estimate_releases, LockContext,
    LockLedger, LockParams, VestingTable,
};
use dsdn_lockprofit::{
    Address, EntryKey, Hash, LockCategory, PunishKind, PunishmentOrder, RewardRecord, VestingEntry,
};

fn addr(b: u8) -> Address {
    Address::from_bytes([b; 20])
}

fn arb_params() -> impl Strategy<Value = LockParams> {
    (0u64..50, 0u64..200, 1u64..40).prop_map(|(lock, rls, interval)| LockParams::new(lock, rls, interval))
}

fn arb_entry() -> impl Strategy<Value = VestingEntry> {
    (1u128..1_000_000_000, 0u64..1_000, arb_params(), 0u64..=10_000, 1u8..8).prop_map(
        |(amount, start, params, burn_ratio, who)| {
            let mut e = VestingEntry::new(
                LockCategory::Flow,
                amount,
                start,
                params,
                addr(who),
                addr(who),
                addr(who),
                Address::ZERO,
            );
            e.burn_ratio = burn_ratio;
            e
        },
    )
}

fn arb_kind() -> impl Strategy<Value = PunishKind> {
    prop_oneof![
        Just(PunishKind::Removal),
        (0u64..=10_000).prop_map(|reward_ratio| PunishKind::Graduated { reward_ratio }),
    ]
}

proptest! {
    #[test]
    fn proptest_payment_monotonic_and_bounded(entry in arb_entry(), steps in prop::collection::vec(1u64..60, 1..40)) {
        let mut e = entry;
        let mut h = e.start_high;
        let mut last = 0u128;
        for step in steps {
            h += step;
            if let Some(due) = due_payment(&e, h) {
                e.apply_payment(due, 0);
            }
            prop_assert!(e.playment >= last, "playment decreased");
            prop_assert!(e.playment <= e.amount, "playment above amount");
            last = e.playment;
        }
    }

    #[test]
    fn proptest_release_completes(entry in arb_entry()) {
        // interval-spaced payouts through the release window clear the entry
        let mut e = entry;
        let remaining = e.remaining();
        let pay_start = e.start_high + e.lock_period;
        let installments = (e.rls_period / e.interval).max(1);
        let mut paid = 0u128;
        for k in 1..=installments {
            if let Some(due) = due_payment(&e, pay_start + k * e.interval) {
                e.apply_payment(due, 0);
                paid += due;
            }
        }
        prop_assert_eq!(paid, remaining);
        prop_assert!(e.is_settled());
    }

    #[test]
    fn proptest_estimate_matches_settlement(entry in arb_entry()) {
        let plan = estimate_releases(&entry, 0, u64::MAX / 2);
        let total: u128 = plan.iter().map(|(_, a)| *a).sum();
        prop_assert_eq!(total, entry.remaining());
        let heights: Vec<u64> = plan.iter().map(|(h, _)| *h).collect();
        let mut sorted = heights.clone();
        sorted.sort();
        prop_assert_eq!(heights, sorted);
    }

    #[test]
    fn proptest_burn_ratio_monotonic(start in 0u64..=10_000, kinds in prop::collection::vec(arb_kind(), 1..10)) {
        let mut ratio = start;
        for kind in kinds {
            let next = escalated_ratio(ratio, kind, 10_000);
            prop_assert!(next >= ratio);
            prop_assert!(next <= 10_000);
            ratio = next;
        }
    }

    #[test]
    fn proptest_blob_roundtrip(entries in prop::collection::vec(arb_entry(), 0..20)) {
        let mut t = VestingTable::new();
        for (i, e) in entries.into_iter().enumerate() {
            t.upsert(EntryKey::legacy(e.target_address, LockCategory::Flow, i as u64), e);
        }
        let bytes = encode_table(LockCategory::Flow, &t).unwrap();
        prop_assert_eq!(decode_table(LockCategory::Flow, "k", &bytes).unwrap(), t);
    }

    #[test]
    fn proptest_conservation_and_idempotent_settlement(
        amounts in prop::collection::vec((1u8..6, 1u128..100_000), 1..12),
        punish_at in 0usize..20,
        kind in arb_kind(),
        victim in 1u8..6,
    ) {
        let mut cfg = LockConfig::default();
        cfg.block_period = 8_640; // 10 blocks per day
        let mut flow = cfg.category(LockCategory::Flow);
        flow.lock_period = 5;
        flow.rls_period = 60;
        flow.interval = 10;
        cfg.set_category(flow);
        cfg.l1_flush_threshold = 2;

        let store = MemoryBlobStore::new();
        let mut ledger = LockLedger::new(LockCategory::Flow);
        let mut locked = 0u128;
        let mut credited = 0u128;
        let mut burned = 0u128;

        for day in 0..20u64 {
            let height = day * 10;
            let hash = Hash::from_bytes([day as u8 + 1; 64]);
            let ctx = LockContext::new(&cfg, height, &hash);

            if let Some((who, amount)) = amounts.get(day as usize) {
                ledger.accumulate(&RewardRecord::new(addr(*who), *amount, LockCategory::Flow), true);
                locked += *amount;
            }
            ledger.lock_pending(&ctx, &DirectRevenue, &NoDelegation);
            ledger.maybe_overflow(&ctx, &store).unwrap();

            if day as usize == punish_at {
                let order = PunishmentOrder {
                    category: LockCategory::Flow,
                    targets: vec![addr(victim)],
                    kind,
                    burn_address: None,
                };
                ledger.escalate_burn(&ctx, &store, &order).unwrap();
            }

            let records = ledger.settle(&ctx, &store).unwrap();
            for r in &records {
                credited += r.credited;
                burned += r.burned;
            }
            let again = ledger.settle(&ctx, &store).unwrap();
            prop_assert!(again.is_empty(), "second settlement at {} paid {:?}", height, again);

            let t = ledger.outstanding(&store).unwrap();
            let outstanding = t.total_amount() - t.total_playment();
            prop_assert_eq!(credited + burned + outstanding, locked);
        }
    }
}
