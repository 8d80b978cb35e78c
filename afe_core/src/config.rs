//! Runtime configuration of the alignment procedures.
//!
//! These are separate from the TOML-deserialized structs in `afe_config`;
//! see `conversions` for the mapping.

use std::time::Duration;

use afe_traits::TriggerCondition;

use crate::finder::Strategy;

/// How searches are run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignCfg {
    pub strategy: Strategy,
    /// Measurement rounds one step may take before giving up.
    pub max_rounds: usize,
    /// Trigger condition held while aligning.
    pub calibration_trigger: TriggerCondition,
}

impl Default for AlignCfg {
    fn default() -> Self {
        Self {
            strategy: Strategy::Secant,
            max_rounds: 64,
            calibration_trigger: TriggerCondition::CALIBRATION,
        }
    }
}

/// ADC codes the baselines are steered to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Targets {
    /// Phase 1 target.
    pub mid_scale: u16,
    /// Phase 2 target.
    pub low_scale: u16,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            mid_scale: 2048,
            low_scale: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Upper bound on one blocking measurement read.
    pub measurement_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            measurement_ms: 15_000,
        }
    }
}

impl Timeouts {
    #[inline]
    pub fn measurement(&self) -> Duration {
        Duration::from_millis(self.measurement_ms)
    }
}
