//! Two-phase alignment of a single acquisition chain, plus the pieces the
//! dual-chain procedure shares with it.
//!
//! Sequence: save the trigger condition, switch to the calibration trigger,
//! reset the common and offset registers, run phase 1 (mid-scale) and phase 2
//! (low-scale), restore the trigger condition.

use afe_traits::{Device, Register, Subchannel, TriggerCondition};
use eyre::WrapErr;

use crate::chain::{ChainRole, Chains};
use crate::config::{AlignCfg, Targets, Timeouts};
use crate::error::{AlignError, Result};
use crate::hw_error::map_boxed;
use crate::observer::{AlignObserver, Phase, TracingObserver};
use crate::snapshot::RegisterSnapshot;
use crate::step::{CalibrationStep, RunParams};

/// Registers written to `Register::MIDPOINT` before phase 1.
pub const RESET_REGISTERS: [Register; 6] = [
    Register::FullScale,
    Register::CommonOffset,
    Register::Ch1OffsetPositive,
    Register::Ch1OffsetNegative,
    Register::Ch2OffsetPositive,
    Register::Ch2OffsetNegative,
];

/// The six steps of a run over `roles`, in execution order.
pub fn step_plan(roles: &[ChainRole], targets: &Targets) -> Vec<CalibrationStep> {
    let mid = f64::from(targets.mid_scale);
    let low = f64::from(targets.low_scale);
    vec![
        CalibrationStep::common("full_scale", Phase::MidScale, Register::FullScale, roles, mid),
        CalibrationStep::common("common_offset", Phase::MidScale, Register::CommonOffset, roles, mid),
        CalibrationStep::per_subchannel("offsets", Phase::MidScale, Subchannel::offset_register, roles, mid),
        CalibrationStep::common("full_scale", Phase::LowScale, Register::FullScale, roles, low),
        CalibrationStep::common("common_offset", Phase::LowScale, Register::CommonOffset, roles, low),
        CalibrationStep::per_subchannel("gains", Phase::LowScale, Subchannel::gain_register, roles, low),
    ]
}

pub(crate) fn run_params(config: &AlignCfg, timeouts: &Timeouts) -> Result<RunParams> {
    if config.max_rounds == 0 {
        return Err(AlignError::Config("max_rounds must be >= 1".into()).into());
    }
    if timeouts.measurement_ms == 0 {
        return Err(AlignError::Config("measurement timeout must be > 0 ms".into()).into());
    }
    Ok(RunParams {
        strategy: config.strategy,
        max_rounds: config.max_rounds,
        timeout: timeouts.measurement(),
    })
}

/// Midpoint every reset register on every chain, then drop buffered samples.
pub(crate) fn reset(chains: &mut Chains<'_>) -> Result<()> {
    for &role in chains.roles() {
        let dev = chains.get(role)?;
        for register in RESET_REGISTERS {
            dev.set_register(register, Register::MIDPOINT)
                .map_err(map_boxed)
                .wrap_err_with(|| format!("resetting {register} on {role} chain"))?;
        }
    }
    for &role in chains.roles() {
        chains
            .get(role)?
            .flush()
            .map_err(map_boxed)
            .wrap_err_with(|| format!("flushing {role} chain"))?;
    }
    tracing::debug!(chains = chains.roles().len(), "registers reset");
    Ok(())
}

pub(crate) fn run_plan<O: AlignObserver + ?Sized>(
    chains: &mut Chains<'_>,
    plan: &[CalibrationStep],
    params: RunParams,
    observer: &mut O,
) -> Result<RegisterSnapshot> {
    let mut snapshot = RegisterSnapshot::new();
    for step in plan {
        let values = step
            .run(chains, params, observer)
            .wrap_err_with(|| format!("phase {} step {}", step.phase.number(), step.name))?;
        for (&(role, register), &value) in step.settings.entries().iter().zip(&values) {
            snapshot.upsert(role, register, value);
        }
    }
    Ok(snapshot)
}

/// Run `body` with `calibration` as the trigger condition of `device`, then
/// put the saved condition back whether or not `body` succeeded.
pub(crate) fn with_calibration_trigger<T>(
    device: &mut dyn Device,
    calibration: TriggerCondition,
    body: impl FnOnce(&mut dyn Device) -> Result<T>,
) -> Result<T> {
    let saved = device.trigger_condition();
    device
        .set_trigger_condition(calibration)
        .map_err(map_boxed)
        .wrap_err("setting calibration trigger")?;

    let outcome = body(&mut *device);

    let restored = device
        .set_trigger_condition(saved)
        .map_err(map_boxed)
        .wrap_err("restoring trigger condition");
    match (outcome, restored) {
        (Ok(v), Ok(())) => Ok(v),
        (Ok(_), Err(e)) => Err(e),
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(restore_err)) => {
            tracing::warn!(error = %restore_err, "failed to restore trigger condition");
            Err(e)
        }
    }
}

/// Aligns one chain.
pub struct AlignmentProcedure<D, O = TracingObserver> {
    device: D,
    config: AlignCfg,
    targets: Targets,
    timeouts: Timeouts,
    observer: O,
}

impl<D: Device> AlignmentProcedure<D> {
    pub fn new(device: D) -> Self {
        Self {
            device,
            config: AlignCfg::default(),
            targets: Targets::default(),
            timeouts: Timeouts::default(),
            observer: TracingObserver,
        }
    }
}

impl<D: Device, O: AlignObserver> AlignmentProcedure<D, O> {
    pub fn with_config(mut self, config: AlignCfg) -> Self {
        self.config = config;
        self
    }

    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_observer<O2: AlignObserver>(self, observer: O2) -> AlignmentProcedure<D, O2> {
        AlignmentProcedure {
            device: self.device,
            config: self.config,
            targets: self.targets,
            timeouts: self.timeouts,
            observer,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_device(self) -> D {
        self.device
    }

    /// Run the full two-phase calibration. Registers keep their converged
    /// values afterwards.
    pub fn align(&mut self) -> Result<()> {
        self.align_with_report().map(|_| ())
    }

    /// Like `align`, returning the converged register values.
    pub fn align_with_report(&mut self) -> Result<RegisterSnapshot> {
        let params = run_params(&self.config, &self.timeouts)?;
        let plan = step_plan(&[ChainRole::Primary], &self.targets);
        tracing::info!(
            strategy = %params.strategy,
            mid_scale = self.targets.mid_scale,
            low_scale = self.targets.low_scale,
            "aligning single chain"
        );

        let observer = &mut self.observer;
        let snapshot = with_calibration_trigger(
            &mut self.device,
            self.config.calibration_trigger,
            |dev| {
                let mut chains = Chains::single(dev);
                reset(&mut chains)?;
                run_plan(&mut chains, &plan, params, observer)
            },
        )?;

        tracing::info!(registers = snapshot.len(), "single-chain alignment complete");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_runs_common_registers_before_subchannels() {
        let plan = step_plan(&[ChainRole::Primary], &Targets::default());
        let names: Vec<_> = plan.iter().map(|s| (s.phase.number(), s.name)).collect();
        assert_eq!(
            names,
            vec![
                (1, "full_scale"),
                (1, "common_offset"),
                (1, "offsets"),
                (2, "full_scale"),
                (2, "common_offset"),
                (2, "gains"),
            ]
        );
        assert!(plan[..3].iter().all(|s| s.target == 2048.0));
        assert!(plan[3..].iter().all(|s| s.target == 200.0));
        assert_eq!(plan[2].width(), 4);
    }

    #[test]
    fn dual_plan_doubles_every_width() {
        let plan = step_plan(&ChainRole::ALL, &Targets::default());
        let widths: Vec<_> = plan.iter().map(CalibrationStep::width).collect();
        assert_eq!(widths, vec![2, 2, 8, 2, 2, 8]);
    }

    #[test]
    fn zero_round_cap_is_a_config_error() {
        let cfg = AlignCfg {
            max_rounds: 0,
            ..AlignCfg::default()
        };
        let err = run_params(&cfg, &Timeouts::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<AlignError>(),
            Some(AlignError::Config(_))
        ));
    }
}
