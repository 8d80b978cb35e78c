//! Alignment of a synchronized primary/secondary pair of chains.
//!
//! Both boards are searched in the same measurement rounds: common registers
//! as 2-wide searches, per-subchannel registers as 8-wide searches (primary
//! subchannels first). Only the primary board's trigger condition is switched;
//! the secondary follows it.

use afe_traits::Device;
use eyre::WrapErr;

use crate::chain::{ChainRole, Chains};
use crate::config::{AlignCfg, Targets, Timeouts};
use crate::error::Result;
use crate::hw_error::map_boxed;
use crate::observer::{AlignObserver, TracingObserver};
use crate::procedure::{reset, run_params, run_plan, step_plan, with_calibration_trigger};
use crate::snapshot::RegisterSnapshot;

pub struct DualChainAlignmentProcedure<P, S, O = TracingObserver> {
    primary: P,
    secondary: S,
    config: AlignCfg,
    targets: Targets,
    timeouts: Timeouts,
    observer: O,
}

impl<P: Device, S: Device> DualChainAlignmentProcedure<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self {
            primary,
            secondary,
            config: AlignCfg::default(),
            targets: Targets::default(),
            timeouts: Timeouts::default(),
            observer: TracingObserver,
        }
    }
}

impl<P: Device, S: Device, O: AlignObserver> DualChainAlignmentProcedure<P, S, O> {
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

    pub fn with_observer<O2: AlignObserver>(
        self,
        observer: O2,
    ) -> DualChainAlignmentProcedure<P, S, O2> {
        DualChainAlignmentProcedure {
            primary: self.primary,
            secondary: self.secondary,
            config: self.config,
            targets: self.targets,
            timeouts: self.timeouts,
            observer,
        }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn secondary(&self) -> &S {
        &self.secondary
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_devices(self) -> (P, S) {
        (self.primary, self.secondary)
    }

    pub fn align(&mut self) -> Result<()> {
        self.align_with_report().map(|_| ())
    }

    pub fn align_with_report(&mut self) -> Result<RegisterSnapshot> {
        let params = run_params(&self.config, &self.timeouts)?;
        let plan = step_plan(&ChainRole::ALL, &self.targets);
        tracing::info!(
            strategy = %params.strategy,
            mid_scale = self.targets.mid_scale,
            low_scale = self.targets.low_scale,
            "aligning primary and secondary chains"
        );

        let secondary = &mut self.secondary;
        let observer = &mut self.observer;
        let snapshot = with_calibration_trigger(
            &mut self.primary,
            self.config.calibration_trigger,
            |primary| {
                let mut chains = Chains::dual(primary, secondary);
                reset(&mut chains)?;
                synchronize(&mut chains, params.timeout)?;
                run_plan(&mut chains, &plan, params, observer)
            },
        )?;

        tracing::info!(registers = snapshot.len(), "dual-chain alignment complete");
        Ok(snapshot)
    }
}

/// Bring both streams to the same point after a reset (which already left
/// both flushed): one discarded measurement per chain, then flush again.
fn synchronize(chains: &mut Chains<'_>, timeout: std::time::Duration) -> Result<()> {
    for role in ChainRole::ALL {
        chains
            .get(role)?
            .flush_and_measure(timeout)
            .map_err(map_boxed)
            .wrap_err_with(|| format!("sync measurement on {role} chain"))?;
    }
    for role in ChainRole::ALL {
        chains
            .get(role)?
            .flush()
            .map_err(map_boxed)
            .wrap_err_with(|| format!("flushing {role} chain after sync"))?;
    }
    tracing::debug!("chains synchronized");
    Ok(())
}
