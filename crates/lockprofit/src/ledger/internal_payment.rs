//! Installment / payment calculation (CONSENSUS-CRITICAL)
//!
//! Pure functions, dipakai untuk settlement dan untuk estimasi jadwal rilis.
//!
//! ```text
//! pay_start = start_high + lock_period
//! height <= pay_start               -> tidak ada yang jatuh tempo
//! rls_period == 0 || interval == 0  -> seluruh sisa jatuh tempo
//! n        = max(rls_period / interval, 1)   jumlah installment
//! k        = (height - pay_start) / interval
//! k >= n                            -> vested = amount (installment terakhir bulatkan sisa)
//! else                              -> vested = amount * (k * interval) / rls_period
//! due = vested - playment
//! ```
//!
//! Burn split:
//!
//! ```text
//! credited = due * (burn_base - burn_ratio) / burn_base
//! burned   = due - credited
//! ```

use super::VestingEntry;

/// `value * num / den` without intermediate overflow, floor rounding.
/// Exact for `num <= den`.
pub fn mul_div(value: u128, num: u128, den: u128) -> u128 {
    if den == 0 {
        return 0;
    }
    let q = value / den;
    let r = value % den;
    q.saturating_mul(num)
        .saturating_add(r.saturating_mul(num) / den)
}

/// Cumulative amount vested at `height` (ignores what was already paid).
pub fn vested_amount(entry: &VestingEntry, height: u64) -> u128 {
    let pay_start = entry.start_high.saturating_add(entry.lock_period);
    if height <= pay_start {
        return 0;
    }
    if entry.rls_period == 0 || entry.interval == 0 {
        return entry.amount;
    }
    let k = (height - pay_start) / entry.interval;
    if k >= installment_count(entry) {
        return entry.amount;
    }
    mul_div(entry.amount, (k * entry.interval) as u128, entry.rls_period as u128)
}

/// Number of installments of a release window; at least one.
fn installment_count(entry: &VestingEntry) -> u64 {
    (entry.rls_period / entry.interval.max(1)).max(1)
}

/// Amount owed at `height`, or `None` when nothing is due.
pub fn due_payment(entry: &VestingEntry, height: u64) -> Option<u128> {
    let vested = vested_amount(entry, height).min(entry.amount);
    let due = vested.saturating_sub(entry.playment);
    if due == 0 {
        None
    } else {
        Some(due)
    }
}

/// Split `due` into (credited, burned) for the given burn ratio.
pub fn burn_split(due: u128, burn_ratio: u64, burn_base: u64) -> (u128, u128) {
    if burn_ratio == 0 || burn_base == 0 {
        return (due, 0);
    }
    let ratio = burn_ratio.min(burn_base);
    let credited = mul_div(due, (burn_base - ratio) as u128, burn_base as u128);
    (credited, due - credited)
}

/// One computed installment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentQuote {
    pub due: u128,
    pub credited: u128,
    pub burned: u128,
    /// The installment clears the entry
    pub completes: bool,
}

pub fn quote(entry: &VestingEntry, height: u64, burn_base: u64) -> Option<PaymentQuote> {
    let due = due_payment(entry, height)?;
    let (credited, burned) = burn_split(due, entry.burn_ratio, burn_base);
    Some(PaymentQuote {
        due,
        credited,
        burned,
        completes: entry.playment.saturating_add(due) >= entry.amount,
    })
}

/// Projected installments in `(from, to]`, evaluated at every interval
/// boundary up to the last installment.
///
/// Simulation only: the entry passed in is not modified.
pub fn estimate_releases(entry: &VestingEntry, from: u64, to: u64) -> Vec<(u64, u128)> {
    let mut out = Vec::new();
    if to <= from || entry.is_settled() {
        return out;
    }
    let pay_start = entry.start_high.saturating_add(entry.lock_period);
    let heights: Vec<u64> = if entry.rls_period == 0 || entry.interval == 0 {
        vec![pay_start.saturating_add(1)]
    } else {
        (1..=installment_count(entry))
            .map(|k| pay_start.saturating_add(k.saturating_mul(entry.interval)))
            .collect()
    };

    let mut sim = entry.clone();
    for h in heights.into_iter().filter(|h| *h > from && *h <= to) {
        if let Some(due) = due_payment(&sim, h) {
            sim.playment = sim.playment.saturating_add(due);
            out.push((h, due));
        }
    }
    out
}
