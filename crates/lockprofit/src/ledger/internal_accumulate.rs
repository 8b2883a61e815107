//! Reward accumulation (pre-lock)

use tracing::debug;

use super::{LockLedger, PendingBalance, PendingReward, RewardRecord};

impl LockLedger {
    /// Add one reward record to the participant's pending balance.
    ///
    /// `source_keyed` selects the V1 accumulator; a V1 record without an
    /// explicit source is keyed by its own target. Zero amounts are ignored,
    /// validation of everything else happens upstream.
    pub fn accumulate(&mut self, record: &RewardRecord, source_keyed: bool) {
        if record.amount == 0 {
            return;
        }
        let balance = self
            .pending
            .entry(record.target)
            .or_insert_with(PendingBalance::default);

        if source_keyed {
            let source = record.source.unwrap_or(record.target);
            let slot = balance
                .v1
                .entry(source)
                .or_insert_with(PendingReward::default);
            slot.amount = slot.amount.saturating_add(record.amount);
            if record.revenue.is_some() {
                slot.revenue_address = record.revenue;
            }
        } else {
            balance.legacy = balance.legacy.saturating_add(record.amount);
        }

        debug!(
            category = %self.category,
            target = %record.target,
            amount = record.amount,
            source_keyed,
            "reward accumulated"
        );
    }

    /// Sum of every pending balance in this ledger.
    pub fn pending_total(&self) -> u128 {
        self.pending
            .values()
            .fold(0u128, |acc, b| acc.saturating_add(b.total()))
    }
}

#[cfg(test)]
mod tests {
    use crate::ledger::{LockCategory, LockLedger, RewardRecord};
    use crate::types::Address;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn test_legacy_accumulates_scalar() {
        let mut l = LockLedger::new(LockCategory::SignerReward);
        l.accumulate(&RewardRecord::new(addr(1), 40, LockCategory::SignerReward), false);
        l.accumulate(&RewardRecord::new(addr(1), 60, LockCategory::SignerReward).with_source(addr(5)), false);
        let p = l.pending_of(&addr(1)).unwrap();
        assert_eq!(p.legacy, 100);
        assert!(p.v1.is_empty());
    }

    #[test]
    fn test_v1_accumulates_per_source() {
        let mut l = LockLedger::new(LockCategory::SpEntrust);
        l.accumulate(&RewardRecord::new(addr(1), 10, LockCategory::SpEntrust).with_source(addr(5)), true);
        l.accumulate(&RewardRecord::new(addr(1), 15, LockCategory::SpEntrust).with_source(addr(5)), true);
        l.accumulate(
            &RewardRecord::new(addr(1), 7, LockCategory::SpEntrust).with_revenue(addr(9)),
            true,
        );
        l.accumulate(&RewardRecord::new(addr(2), 0, LockCategory::SpEntrust), true);
        let p = l.pending_of(&addr(1)).unwrap();
        assert_eq!(p.v1[&addr(5)].amount, 25);
        assert_eq!(p.v1[&addr(1)].revenue_address, Some(addr(9)));
        assert!(l.pending_of(&addr(2)).is_none());
        assert_eq!(l.pending_total(), 32);
    }
}
