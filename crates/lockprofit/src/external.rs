//! External collaborators of the lock ledger.
//!
//! The core never touches account state or the delegation registry
//! directly; it goes through these traits. Simple in-memory
//! implementations are provided for replay tooling and tests.

use std::collections::BTreeMap;

use crate::error::{LockError, Result};
use crate::ledger::LockCategory;
use crate::types::Address;

// ════════════════════════════════════════════════════════════════════════════
// TRAITS
// ════════════════════════════════════════════════════════════════════════════

/// Delegation-registry read: who actually gets paid for `participant`.
pub trait RevenueBinding {
    fn resolve_revenue(&self, category: LockCategory, participant: &Address) -> Address;

    /// Multi-signature receiver registered for `participant`, frozen into
    /// the entry at lock time.
    fn multi_signature(&self, _category: LockCategory, _participant: &Address) -> Option<Address> {
        None
    }
}

/// Entrusted stake behind a primary participant (delegator, stake).
pub trait DelegationSource {
    fn entrusted(&self, category: LockCategory, participant: &Address) -> Vec<(Address, u128)>;
}

/// Account-balance ledger the installments are credited to.
///
/// `apply` is all-or-nothing: on `Err` no balance may have changed.
pub trait ExternalLedger {
    fn apply(&mut self, batch: &PayoutBatch) -> Result<()>;
}

// ════════════════════════════════════════════════════════════════════════════
// PAYOUT BATCH
// ════════════════════════════════════════════════════════════════════════════

/// Net balance changes of one block, aggregated per address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PayoutBatch {
    pub debits: BTreeMap<Address, u128>,
    pub credits: BTreeMap<Address, u128>,
}

impl PayoutBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debit(&mut self, address: Address, amount: u128) {
        if amount > 0 {
            let slot = self.debits.entry(address).or_insert(0);
            *slot = slot.saturating_add(amount);
        }
    }

    pub fn credit(&mut self, address: Address, amount: u128) {
        if amount > 0 {
            let slot = self.credits.entry(address).or_insert(0);
            *slot = slot.saturating_add(amount);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.debits.is_empty() && self.credits.is_empty()
    }
}

// ════════════════════════════════════════════════════════════════════════════
// SIMPLE IMPLEMENTATIONS
// ════════════════════════════════════════════════════════════════════════════

/// No binding registry: everybody is paid directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectRevenue;

impl RevenueBinding for DirectRevenue {
    fn resolve_revenue(&self, _category: LockCategory, participant: &Address) -> Address {
        *participant
    }
}

/// Fixed binding table; unbound participants are paid directly.
#[derive(Debug, Clone, Default)]
pub struct StaticBindings {
    bindings: BTreeMap<(LockCategory, Address), Address>,
    multisig: BTreeMap<(LockCategory, Address), Address>,
}

impl StaticBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, category: LockCategory, participant: Address, revenue: Address) {
        self.bindings.insert((category, participant), revenue);
    }

    pub fn bind_multisig(&mut self, category: LockCategory, participant: Address, multisig: Address) {
        self.multisig.insert((category, participant), multisig);
    }
}

impl RevenueBinding for StaticBindings {
    fn resolve_revenue(&self, category: LockCategory, participant: &Address) -> Address {
        self.bindings
            .get(&(category, *participant))
            .copied()
            .unwrap_or(*participant)
    }

    fn multi_signature(&self, category: LockCategory, participant: &Address) -> Option<Address> {
        self.multisig.get(&(category, *participant)).copied()
    }
}

/// Nobody has delegators.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelegation;

impl DelegationSource for NoDelegation {
    fn entrusted(&self, _category: LockCategory, _participant: &Address) -> Vec<(Address, u128)> {
        Vec::new()
    }
}

/// Fixed delegation table.
#[derive(Debug, Clone, Default)]
pub struct StaticDelegations {
    delegations: BTreeMap<(LockCategory, Address), Vec<(Address, u128)>>,
}

impl StaticDelegations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entrust(&mut self, category: LockCategory, primary: Address, delegator: Address, stake: u128) {
        self.delegations
            .entry((category, primary))
            .or_default()
            .push((delegator, stake));
    }
}

impl DelegationSource for StaticDelegations {
    fn entrusted(&self, category: LockCategory, participant: &Address) -> Vec<(Address, u128)> {
        self.delegations
            .get(&(category, *participant))
            .cloned()
            .unwrap_or_default()
    }
}

/// In-memory account balances.
#[derive(Debug, Clone, Default)]
pub struct MemoryAccounts {
    balances: BTreeMap<Address, u128>,
}

impl MemoryAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balance(mut self, address: Address, amount: u128) -> Self {
        self.balances.insert(address, amount);
        self
    }

    pub fn balance(&self, address: &Address) -> u128 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u128 {
        self.balances.values().fold(0u128, |a, b| a.saturating_add(*b))
    }
}

impl ExternalLedger for MemoryAccounts {
    fn apply(&mut self, batch: &PayoutBatch) -> Result<()> {
        // staged copy, swapped in only when every change succeeds
        let mut staged = self.balances.clone();
        for (address, amount) in &batch.debits {
            let bal = staged.entry(*address).or_insert(0);
            if *bal < *amount {
                return Err(LockError::Ledger {
                    op: "debit",
                    address: *address,
                    amount: *amount,
                    reason: format!("insufficient balance {}", bal),
                });
            }
            *bal -= *amount;
        }
        for (address, amount) in &batch.credits {
            let bal = staged.entry(*address).or_insert(0);
            *bal = bal.checked_add(*amount).ok_or_else(|| LockError::Ledger {
                op: "credit",
                address: *address,
                amount: *amount,
                reason: "balance overflow".to_string(),
            })?;
        }
        self.balances = staged;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    #[test]
    fn test_memory_accounts_debit_guard() {
        let mut acc = MemoryAccounts::new().with_balance(addr(1), 10);
        let mut ok = PayoutBatch::new();
        ok.debit(addr(1), 4);
        ok.credit(addr(2), 4);
        acc.apply(&ok).unwrap();
        assert_eq!(acc.balance(&addr(1)), 6);
        assert_eq!(acc.balance(&addr(2)), 4);

        let mut over = PayoutBatch::new();
        over.credit(addr(3), 5);
        over.debit(addr(1), 4);
        over.debit(addr(1), 4);
        assert!(acc.apply(&over).is_err());
        // rejected batch leaves every balance untouched
        assert_eq!(acc.balance(&addr(1)), 6);
        assert_eq!(acc.balance(&addr(3)), 0);
        assert_eq!(acc.total(), 10);
    }

    #[test]
    fn test_static_bindings_fallback() {
        let mut b = StaticBindings::new();
        b.bind(LockCategory::Storage, addr(1), addr(9));
        assert_eq!(b.resolve_revenue(LockCategory::Storage, &addr(1)), addr(9));
        assert_eq!(b.resolve_revenue(LockCategory::Flow, &addr(1)), addr(1));
    }
}
