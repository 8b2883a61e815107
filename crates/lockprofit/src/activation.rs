//! # Activation Schedule
//!
//! Hard-fork heights yang mengubah perilaku lock ledger. Semua komponen
//! menerima `ActivationSchedule` secara eksplisit; tidak ada konstanta global.
//!
//! ```text
//! is_active(feature, height) == height >= activation_height(feature)
//! ```
//!
//! Feature tanpa height (None) tidak pernah aktif.

use serde::{Deserialize, Serialize};

/// Behaviour switches gated by block height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    /// New pending rewards and vesting entries use the source-keyed (V1) schema
    SourceKeyedLedger,
    /// Payment address resolved through the delegation binding at lock time
    RevenueRedirect,
    /// Pending amounts split between primary and entrusted delegators at lock time
    DelegatedSplit,
    /// In-memory vesting table overflows to L1 blobs once it reaches the threshold
    TieredCache,
    /// Outstanding entries regrouped into day buckets on merge ticks
    Consolidation,
    /// Patch table applied to consolidated groups
    ConsolidationPatch,
    /// Full burn for removed / illegal pledges
    RemovalPunishment,
    /// Shortfall-scaled burn escalation
    GraduatedPunishment,
    /// Installments paid to the multi-signature receiver when one is set
    MultiSignatureReceiver,
}

impl Feature {
    pub const ALL: [Feature; 9] = [
        Feature::SourceKeyedLedger,
        Feature::RevenueRedirect,
        Feature::DelegatedSplit,
        Feature::TieredCache,
        Feature::Consolidation,
        Feature::ConsolidationPatch,
        Feature::RemovalPunishment,
        Feature::GraduatedPunishment,
        Feature::MultiSignatureReceiver,
    ];
}

/// Activation heights, one optional field per [`Feature`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivationSchedule {
    pub source_keyed_ledger: Option<u64>,
    pub revenue_redirect: Option<u64>,
    pub delegated_split: Option<u64>,
    pub tiered_cache: Option<u64>,
    pub consolidation: Option<u64>,
    pub consolidation_patch: Option<u64>,
    pub removal_punishment: Option<u64>,
    pub graduated_punishment: Option<u64>,
    pub multi_signature_receiver: Option<u64>,
}

impl Default for ActivationSchedule {
    /// Everything active from genesis.
    fn default() -> Self {
        Self::all_at(0)
    }
}

impl ActivationSchedule {
    /// Every feature activates at `height`.
    pub fn all_at(height: u64) -> Self {
        Self {
            source_keyed_ledger: Some(height),
            revenue_redirect: Some(height),
            delegated_split: Some(height),
            tiered_cache: Some(height),
            consolidation: Some(height),
            consolidation_patch: Some(height),
            removal_punishment: Some(height),
            graduated_punishment: Some(height),
            multi_signature_receiver: Some(height),
        }
    }

    /// No feature ever activates (pure legacy behaviour).
    pub fn none() -> Self {
        Self {
            source_keyed_ledger: None,
            revenue_redirect: None,
            delegated_split: None,
            tiered_cache: None,
            consolidation: None,
            consolidation_patch: None,
            removal_punishment: None,
            graduated_punishment: None,
            multi_signature_receiver: None,
        }
    }

    pub fn activation_height(&self, feature: Feature) -> Option<u64> {
        match feature {
            Feature::SourceKeyedLedger => self.source_keyed_ledger,
            Feature::RevenueRedirect => self.revenue_redirect,
            Feature::DelegatedSplit => self.delegated_split,
            Feature::TieredCache => self.tiered_cache,
            Feature::Consolidation => self.consolidation,
            Feature::ConsolidationPatch => self.consolidation_patch,
            Feature::RemovalPunishment => self.removal_punishment,
            Feature::GraduatedPunishment => self.graduated_punishment,
            Feature::MultiSignatureReceiver => self.multi_signature_receiver,
        }
    }

    pub fn set(&mut self, feature: Feature, height: Option<u64>) {
        let slot = match feature {
            Feature::SourceKeyedLedger => &mut self.source_keyed_ledger,
            Feature::RevenueRedirect => &mut self.revenue_redirect,
            Feature::DelegatedSplit => &mut self.delegated_split,
            Feature::TieredCache => &mut self.tiered_cache,
            Feature::Consolidation => &mut self.consolidation,
            Feature::ConsolidationPatch => &mut self.consolidation_patch,
            Feature::RemovalPunishment => &mut self.removal_punishment,
            Feature::GraduatedPunishment => &mut self.graduated_punishment,
            Feature::MultiSignatureReceiver => &mut self.multi_signature_receiver,
        };
        *slot = height;
    }

    pub fn is_active(&self, feature: Feature, height: u64) -> bool {
        self.activation_height(feature)
            .map(|h| height >= h)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activation_boundary() {
        let mut s = ActivationSchedule::none();
        s.set(Feature::SourceKeyedLedger, Some(500));
        assert!(!s.is_active(Feature::SourceKeyedLedger, 499));
        assert!(s.is_active(Feature::SourceKeyedLedger, 500));
        assert!(!s.is_active(Feature::DelegatedSplit, u64::MAX));
    }

    #[test]
    fn test_default_all_active() {
        let s = ActivationSchedule::default();
        for f in Feature::ALL {
            assert!(s.is_active(f, 0), "{:?} should be active", f);
        }
    }
}
