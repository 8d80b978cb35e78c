//! Progress reporting for alignment runs.
//!
//! Procedures call an injected `AlignObserver`; the default turns every
//! callback into a `tracing` event.

use afe_traits::Register;

use crate::chain::ChainRole;

/// Calibration phase a step belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Baselines to mid-scale.
    MidScale,
    /// Baselines to low-scale.
    LowScale,
}

impl Phase {
    pub const fn number(self) -> u8 {
        match self {
            Phase::MidScale => 1,
            Phase::LowScale => 2,
        }
    }
}

/// Static description of a running step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    pub name: &'static str,
    pub phase: Phase,
    pub target: f64,
    /// Registers searched, in channel order.
    pub registers: Vec<(ChainRole, Register)>,
}

impl StepInfo {
    pub fn width(&self) -> usize {
        self.registers.len()
    }
}

/// One finished measurement round.
#[derive(Debug, Clone, Copy)]
pub struct RoundInfo<'a> {
    /// 1-based.
    pub round: usize,
    /// Values that were written and measured this round.
    pub guesses: &'a [u8],
    /// Measured value minus target, per channel.
    pub feedback: &'a [f64],
    pub done: &'a [bool],
}

pub trait AlignObserver {
    fn step_started(&mut self, _step: &StepInfo) {}
    fn round(&mut self, _step: &StepInfo, _round: &RoundInfo<'_>) {}
    fn step_finished(&mut self, _step: &StepInfo, _values: &[u8], _rounds: usize) {}
}

impl<O: AlignObserver + ?Sized> AlignObserver for &mut O {
    fn step_started(&mut self, step: &StepInfo) {
        (**self).step_started(step);
    }

    fn round(&mut self, step: &StepInfo, round: &RoundInfo<'_>) {
        (**self).round(step, round);
    }

    fn step_finished(&mut self, step: &StepInfo, values: &[u8], rounds: usize) {
        (**self).step_finished(step, values, rounds);
    }
}

impl<O: AlignObserver + ?Sized> AlignObserver for Box<O> {
    fn step_started(&mut self, step: &StepInfo) {
        (**self).step_started(step);
    }

    fn round(&mut self, step: &StepInfo, round: &RoundInfo<'_>) {
        (**self).round(step, round);
    }

    fn step_finished(&mut self, step: &StepInfo, values: &[u8], rounds: usize) {
        (**self).step_finished(step, values, rounds);
    }
}

/// Emits structured `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl AlignObserver for TracingObserver {
    fn step_started(&mut self, step: &StepInfo) {
        tracing::debug!(
            step = step.name,
            phase = step.phase.number(),
            target = step.target,
            width = step.width(),
            "step started"
        );
    }

    fn round(&mut self, step: &StepInfo, round: &RoundInfo<'_>) {
        tracing::debug!(
            step = step.name,
            round = round.round,
            guesses = ?round.guesses,
            feedback = ?round.feedback,
            done = ?round.done,
            "round"
        );
    }

    fn step_finished(&mut self, step: &StepInfo, values: &[u8], rounds: usize) {
        tracing::info!(
            step = step.name,
            phase = step.phase.number(),
            rounds,
            values = ?values,
            "step converged"
        );
    }
}

/// Records every event; handy for assertions.
#[derive(Debug, Default, Clone)]
pub struct RecordingObserver {
    pub started: Vec<StepInfo>,
    /// `(step name, round, guesses)`.
    pub rounds: Vec<(&'static str, usize, Vec<u8>)>,
    /// `(step name, final values, rounds)`.
    pub finished: Vec<(&'static str, Vec<u8>, usize)>,
}

impl AlignObserver for RecordingObserver {
    fn step_started(&mut self, step: &StepInfo) {
        self.started.push(step.clone());
    }

    fn round(&mut self, step: &StepInfo, round: &RoundInfo<'_>) {
        self.rounds
            .push((step.name, round.round, round.guesses.to_vec()));
    }

    fn step_finished(&mut self, step: &StepInfo, values: &[u8], rounds: usize) {
        self.finished.push((step.name, values.to_vec(), rounds));
    }
}
