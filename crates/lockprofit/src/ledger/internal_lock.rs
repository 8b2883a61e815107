//! Lock pass: pending accumulators → vesting entries
//!
//! Dipanggil pada lock tick kategori. Semua pending (legacy dan V1)
//! dikosongkan dan diubah menjadi entry dengan `start_high = height`.
//!
//! ## Delegated Split
//!
//! ```text
//! self_share = X * distribution_rate / rate_base
//! pool       = X - self_share
//! share_i    = pool * stake_i / total_stake
//! dust       = pool - Σ share_i   → ke primary
//! ```
//!
//! Delegator entry di-key V1 dengan source = primary, sehingga punishment
//! per-source bisa menemukan semua entry yang dibiayai primary tsb.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::activation::Feature;
use crate::external::{DelegationSource, RevenueBinding};
use crate::types::Address;

use super::internal_payment::mul_div;
use super::{EntryKey, EntrySource, LockContext, LockLedger, VestingEntry};

/// Result of one lock pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockOutcome {
    /// Entries created or topped up
    pub created: usize,
    /// Total amount moved from pending into entries
    pub locked_amount: u128,
}

/// Split `amount` between a primary and its delegators.
///
/// Returns `(primary_share, delegator_shares)`. Delegators with zero stake
/// are ignored; with no remaining stake everything stays with the primary.
/// The sum of all returned shares always equals `amount`.
pub fn split_delegated(
    amount: u128,
    distribution_rate: u64,
    rate_base: u64,
    delegators: &[(Address, u128)],
) -> (u128, Vec<(Address, u128)>) {
    let mut stakes: BTreeMap<Address, u128> = BTreeMap::new();
    for (d, stake) in delegators.iter().filter(|(_, s)| *s > 0) {
        let slot = stakes.entry(*d).or_insert(0);
        *slot = slot.saturating_add(*stake);
    }
    let total_stake = stakes.values().fold(0u128, |a, s| a.saturating_add(*s));
    if total_stake == 0 || rate_base == 0 {
        return (amount, Vec::new());
    }

    let rate = distribution_rate.min(rate_base);
    let self_share = mul_div(amount, rate as u128, rate_base as u128);
    let pool = amount - self_share;

    let mut shares = Vec::with_capacity(stakes.len());
    let mut distributed = 0u128;
    for (d, stake) in stakes {
        let share = mul_div(pool, stake, total_stake);
        distributed += share;
        shares.push((d, share));
    }
    let dust = pool - distributed;
    (self_share + dust, shares)
}

impl LockLedger {
    /// Drain every pending balance into vesting entries locked at
    /// `ctx.number`.
    pub fn lock_pending(
        &mut self,
        ctx: &LockContext<'_>,
        bindings: &dyn RevenueBinding,
        delegations: &dyn DelegationSource,
    ) -> LockOutcome {
        let pending = std::mem::take(&mut self.pending);
        let mut outcome = LockOutcome::default();

        for (participant, balance) in pending.into_iter() {
            if balance.legacy > 0 {
                self.lock_one(
                    ctx,
                    bindings,
                    delegations,
                    participant,
                    EntrySource::Legacy,
                    balance.legacy,
                    None,
                    &mut outcome,
                );
            }
            for (source, slot) in balance.v1.into_iter() {
                if slot.amount == 0 {
                    continue;
                }
                self.lock_one(
                    ctx,
                    bindings,
                    delegations,
                    participant,
                    EntrySource::V1(source),
                    slot.amount,
                    slot.revenue_address,
                    &mut outcome,
                );
            }
        }

        if outcome.created > 0 {
            info!(
                category = %self.category,
                height = ctx.number,
                entries = outcome.created,
                amount = outcome.locked_amount,
                "pending rewards locked"
            );
        }
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    fn lock_one(
        &mut self,
        ctx: &LockContext<'_>,
        bindings: &dyn RevenueBinding,
        delegations: &dyn DelegationSource,
        participant: Address,
        source: EntrySource,
        amount: u128,
        revenue_override: Option<Address>,
        outcome: &mut LockOutcome,
    ) {
        let category = self.category;
        let cfg = ctx.config.category(category);
        let params = cfg.params();
        let redirect = ctx.is_active(Feature::RevenueRedirect);
        let resolve = |who: &Address| -> Address {
            if redirect {
                bindings.resolve_revenue(category, who)
            } else {
                *who
            }
        };

        let (primary_share, delegator_shares) = match cfg.distribution_rate {
            Some(rate) if ctx.is_active(Feature::DelegatedSplit) => {
                let delegators = delegations.entrusted(category, &participant);
                split_delegated(amount, rate, ctx.config.rate_base, &delegators)
            }
            _ => (amount, Vec::new()),
        };

        if primary_share > 0 {
            let revenue = revenue_override.unwrap_or_else(|| resolve(&participant));
            let contract = source.source_address().unwrap_or(participant);
            let mut entry = VestingEntry::new(
                category,
                primary_share,
                ctx.number,
                params,
                participant,
                revenue,
                contract,
                ctx.config.burn_address,
            );
            entry.multi_signature = bindings.multi_signature(category, &participant);
            let key = EntryKey { participant, category, lock_height: ctx.number, source };
            self.entries.upsert(key, entry);
            outcome.created += 1;
            outcome.locked_amount = outcome.locked_amount.saturating_add(primary_share);
        }

        for (delegator, share) in delegator_shares {
            if share == 0 {
                continue;
            }
            let mut entry = VestingEntry::new(
                category,
                share,
                ctx.number,
                params,
                delegator,
                resolve(&delegator),
                participant,
                ctx.config.burn_address,
            );
            entry.multi_signature = bindings.multi_signature(category, &delegator);
            self.entries
                .upsert(EntryKey::v1(delegator, category, ctx.number, participant), entry);
            outcome.created += 1;
            outcome.locked_amount = outcome.locked_amount.saturating_add(share);
            debug!(
                category = %category,
                primary = %participant,
                delegator = %delegator,
                share,
                "delegated share locked"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LockConfig;
    use crate::external::{NoDelegation, StaticBindings, StaticDelegations};
    use crate::ledger::{LockCategory, RewardRecord};
    use crate::types::Hash;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn test_split_30_42_28() {
        let (primary, shares) = split_delegated(100, 3_000, 10_000, &[(addr(2), 60), (addr(3), 40)]);
        assert_eq!(primary, 30);
        assert_eq!(shares, vec![(addr(2), 42), (addr(3), 28)]);
    }

    #[test]
    fn test_split_dust_goes_to_primary() {
        let (primary, shares) = split_delegated(10, 0, 10_000, &[(addr(2), 1), (addr(3), 1), (addr(4), 1)]);
        assert_eq!(shares.iter().map(|(_, s)| *s).collect::<Vec<_>>(), vec![3, 3, 3]);
        assert_eq!(primary, 1);
    }

    #[test]
    fn test_split_without_stake_keeps_everything() {
        assert_eq!(split_delegated(55, 3_000, 10_000, &[(addr(2), 0)]), (55, Vec::new()));
        assert_eq!(split_delegated(55, 3_000, 10_000, &[]), (55, Vec::new()));
    }

    #[test]
    fn test_lock_pending_drains_both_generations() {
        let cfg = LockConfig::default();
        let hash = Hash::zero();
        let ctx = LockContext::new(&cfg, 8_640, &hash);
        let mut l = LockLedger::new(LockCategory::Flow);
        l.accumulate(&RewardRecord::new(addr(1), 40, LockCategory::Flow), false);
        l.accumulate(&RewardRecord::new(addr(1), 60, LockCategory::Flow).with_source(addr(7)), true);

        let out = l.lock_pending(&ctx, &StaticBindings::new(), &NoDelegation);
        assert_eq!(out, LockOutcome { created: 2, locked_amount: 100 });
        assert!(l.pending().is_empty());

        let legacy = l.hot_entries().get(&EntryKey::legacy(addr(1), LockCategory::Flow, 8_640)).unwrap();
        assert_eq!(legacy.amount, 40);
        assert_eq!(legacy.revenue_contract, addr(1));
        let v1 = l.hot_entries().get(&EntryKey::v1(addr(1), LockCategory::Flow, 8_640, addr(7))).unwrap();
        assert_eq!(v1.amount, 60);
        assert_eq!(v1.revenue_contract, addr(7));
    }

    #[test]
    fn test_revenue_redirect_and_delegation() {
        let mut cfg = LockConfig::default();
        let mut signer = cfg.category(LockCategory::SignerReward);
        signer.distribution_rate = Some(3_000);
        cfg.set_category(signer);
        let hash = Hash::zero();
        let ctx = LockContext::new(&cfg, 0, &hash);

        let mut bindings = StaticBindings::new();
        bindings.bind(LockCategory::SignerReward, addr(1), addr(9));
        let mut dele = StaticDelegations::new();
        dele.entrust(LockCategory::SignerReward, addr(1), addr(2), 60);
        dele.entrust(LockCategory::SignerReward, addr(1), addr(3), 40);

        let mut l = LockLedger::new(LockCategory::SignerReward);
        l.accumulate(&RewardRecord::new(addr(1), 100, LockCategory::SignerReward), true);
        l.lock_pending(&ctx, &bindings, &dele);

        let primary = l.hot_entries().get(&EntryKey::v1(addr(1), LockCategory::SignerReward, 0, addr(1))).unwrap();
        assert_eq!(primary.amount, 30);
        assert_eq!(primary.revenue_address, addr(9));
        let d2 = l.hot_entries().get(&EntryKey::v1(addr(2), LockCategory::SignerReward, 0, addr(1))).unwrap();
        assert_eq!(d2.amount, 42);
        assert_eq!(d2.revenue_contract, addr(1));
        assert_eq!(l.hot_entries().total_amount(), 100);
    }
}
