//! Settlement pass (CONSENSUS-CRITICAL)
//!
//! Urutan pada pay tick:
//! 1. flush hot → L1
//! 2. fold L1* + L2 menjadi satu tabel
//! 3. hitung installment tiap entry (iterasi terurut by `EntryKey`)
//! 4. playment += paid, burn_amount += burned, hapus entry yang lunas
//! 5. tulis L2 baru, kosongkan daftar L1
//!
//! Kredit ke akun eksternal TIDAK dilakukan di sini; record dikembalikan ke
//! orchestrator yang baru mengkredit setelah semua write store sukses.

use tracing::{info, warn};

use crate::activation::Feature;
use crate::db::BlobStore;
use crate::error::Result;

use super::internal_payment::quote;
use super::{LockContext, LockLedger, SettlementRecord, SettlementResult, VestingTable};

/// Installments due at `ctx.number` for every entry of `table`.
/// Entries with nothing due produce no record.
pub fn compute_settlement(table: &VestingTable, ctx: &LockContext<'_>) -> Vec<SettlementRecord> {
    let multisig = ctx.is_active(Feature::MultiSignatureReceiver);
    let burn_base = ctx.config.burn_base;
    table
        .iter()
        .filter_map(|(key, entry)| {
            let q = quote(entry, ctx.number, burn_base)?;
            Some(SettlementRecord {
                key: *key,
                target: entry.target_address,
                receiver: entry.receiver(multisig),
                credited: q.credited,
                burned: q.burned,
                burn_address: entry.burn_address,
                result: if q.completes {
                    SettlementResult::Settled
                } else {
                    SettlementResult::Partial
                },
            })
        })
        .collect()
}

/// Apply computed records to `table`, removing entries that are fully paid.
pub fn apply_settlement(table: &mut VestingTable, records: &[SettlementRecord]) {
    for r in records {
        let settled = match table.get_mut(&r.key) {
            Some(entry) => {
                entry.apply_payment(r.paid(), r.burned);
                entry.is_settled()
            }
            None => {
                warn!(key = ?r.key, "settlement record without entry, skipped");
                continue;
            }
        };
        if settled {
            table.remove(&r.key);
        }
    }
}

impl LockLedger {
    /// Run the settlement pass for this category at `ctx.number`.
    pub fn settle(&mut self, ctx: &LockContext<'_>, store: &dyn BlobStore) -> Result<Vec<SettlementRecord>> {
        let mut table = self.fold_outstanding(store, ctx.hash)?;
        let records = compute_settlement(&table, ctx);
        apply_settlement(&mut table, &records);
        let remaining = table.len();
        self.commit_l2(store, ctx.hash, table)?;

        if !records.is_empty() {
            let credited: u128 = records.iter().fold(0u128, |a, r| a.saturating_add(r.credited));
            let burned: u128 = records.iter().fold(0u128, |a, r| a.saturating_add(r.burned));
            info!(
                category = %self.category,
                height = ctx.number,
                records = records.len(),
                credited,
                burned,
                remaining,
                "settlement pass complete"
            );
        }
        Ok(records)
    }
}
