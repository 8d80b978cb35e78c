//! `From` implementations bridging `afe_config` types to `afe_core` types.

use afe_traits::TriggerCondition;

use crate::chain::ChainRole;
use crate::config::{AlignCfg, Targets, Timeouts};
use crate::finder::Strategy;
use crate::snapshot::{RegisterSnapshot, SnapshotEntry};

// ── Strategy ─────────────────────────────────────────────────────────────────

impl From<afe_config::StrategyName> for Strategy {
    fn from(s: afe_config::StrategyName) -> Self {
        match s {
            afe_config::StrategyName::Bisection => Strategy::Bisection,
            afe_config::StrategyName::Secant => Strategy::Secant,
        }
    }
}

// ── AlignCfg ─────────────────────────────────────────────────────────────────

impl From<&afe_config::AlignmentCfg> for AlignCfg {
    fn from(c: &afe_config::AlignmentCfg) -> Self {
        Self {
            strategy: c.strategy.into(),
            max_rounds: c.max_rounds,
            calibration_trigger: TriggerCondition(c.calibration_trigger),
        }
    }
}

// ── Targets ──────────────────────────────────────────────────────────────────

impl From<&afe_config::Targets> for Targets {
    fn from(c: &afe_config::Targets) -> Self {
        Self {
            mid_scale: c.mid_scale,
            low_scale: c.low_scale,
        }
    }
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

impl From<&afe_config::Timeouts> for Timeouts {
    fn from(c: &afe_config::Timeouts) -> Self {
        Self {
            measurement_ms: c.measurement_ms,
        }
    }
}

// ── Snapshot rows ────────────────────────────────────────────────────────────

impl From<afe_config::ChainName> for ChainRole {
    fn from(c: afe_config::ChainName) -> Self {
        match c {
            afe_config::ChainName::Primary => ChainRole::Primary,
            afe_config::ChainName::Secondary => ChainRole::Secondary,
        }
    }
}

impl From<ChainRole> for afe_config::ChainName {
    fn from(r: ChainRole) -> Self {
        match r {
            ChainRole::Primary => afe_config::ChainName::Primary,
            ChainRole::Secondary => afe_config::ChainName::Secondary,
        }
    }
}

impl From<&afe_config::SnapshotRow> for SnapshotEntry {
    fn from(r: &afe_config::SnapshotRow) -> Self {
        Self {
            chain: r.chain.into(),
            register: r.register,
            value: r.value,
        }
    }
}

impl From<&SnapshotEntry> for afe_config::SnapshotRow {
    fn from(e: &SnapshotEntry) -> Self {
        Self {
            chain: e.chain.into(),
            register: e.register,
            value: e.value,
        }
    }
}

impl From<&[afe_config::SnapshotRow]> for RegisterSnapshot {
    fn from(rows: &[afe_config::SnapshotRow]) -> Self {
        rows.iter().map(SnapshotEntry::from).collect()
    }
}

impl RegisterSnapshot {
    /// Rows in the on-disk CSV schema.
    pub fn to_rows(&self) -> Vec<afe_config::SnapshotRow> {
        self.entries().iter().map(afe_config::SnapshotRow::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afe_traits::Register;

    #[test]
    fn default_config_maps_to_default_core_config() {
        let cfg = afe_config::Config::default();
        assert_eq!(AlignCfg::from(&cfg.alignment), AlignCfg::default());
        assert_eq!(Targets::from(&cfg.targets), Targets::default());
        assert_eq!(Timeouts::from(&cfg.timeouts), Timeouts::default());
    }

    #[test]
    fn snapshot_rows_keep_order() {
        let mut snap = RegisterSnapshot::new();
        snap.upsert(ChainRole::Secondary, Register::Ch2GainNegative, 3);
        snap.upsert(ChainRole::Primary, Register::FullScale, 250);
        let rows = snap.to_rows();
        assert_eq!(rows[0].chain, afe_config::ChainName::Secondary);
        assert_eq!(rows[1].register, Register::FullScale);
        assert_eq!(RegisterSnapshot::from(rows.as_slice()), snap);
    }
}
