//! One calibration step: a set of registers searched against a set of
//! measured values until every value sits on the target.

use std::collections::BTreeMap;
use std::time::Duration;

use afe_traits::{Measurement, Register, Subchannel};
use eyre::WrapErr;

use crate::chain::{ChainRole, Chains};
use crate::error::{AlignError, Result};
use crate::finder::{self, Strategy};
use crate::hw_error::map_boxed;
use crate::observer::{AlignObserver, Phase, RoundInfo, StepInfo};

/// Ordered table of registers written by a step; entry `i` takes value `i`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SettingsVector {
    entries: Vec<(ChainRole, Register)>,
}

impl SettingsVector {
    pub fn new(entries: Vec<(ChainRole, Register)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(ChainRole, Register)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn apply(&self, chains: &mut Chains<'_>, values: &[u8]) -> Result<()> {
        if values.len() != self.entries.len() {
            return Err(AlignError::LengthMismatch {
                expected: self.entries.len(),
                got: values.len(),
            }
            .into());
        }
        for (&(role, register), &value) in self.entries.iter().zip(values) {
            chains
                .get(role)?
                .set_register(register, value)
                .map_err(map_boxed)
                .wrap_err_with(|| format!("writing {register} on {role} chain"))?;
        }
        Ok(())
    }
}

/// Which number a measurement contributes to a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackSource {
    /// Average of both trace means.
    TraceAverage,
    Subchannel(Subchannel),
}

impl FeedbackSource {
    pub fn read(self, m: &Measurement) -> f64 {
        match self {
            FeedbackSource::TraceAverage => m.mean_of_traces(),
            FeedbackSource::Subchannel(s) => m.subchannel_mean(s),
        }
    }
}

/// Ordered table of measured values; entry `i` is the feedback of channel `i`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedbackVector {
    entries: Vec<(ChainRole, FeedbackSource)>,
}

impl FeedbackVector {
    pub fn new(entries: Vec<(ChainRole, FeedbackSource)>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[(ChainRole, FeedbackSource)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Measure every chain the table references once and pick the values.
    pub(crate) fn measure(&self, chains: &mut Chains<'_>, timeout: Duration) -> Result<Vec<f64>> {
        let mut readings: BTreeMap<ChainRole, Measurement> = BTreeMap::new();
        for &(role, _) in &self.entries {
            if readings.contains_key(&role) {
                continue;
            }
            let m = chains
                .get(role)?
                .flush_and_measure(timeout)
                .map_err(map_boxed)
                .wrap_err_with(|| format!("measuring {role} chain"))?;
            readings.insert(role, m);
        }
        self.entries
            .iter()
            .map(|&(role, source)| -> Result<f64> {
                let v = readings
                    .get(&role)
                    .map(|m| source.read(m))
                    .ok_or(AlignError::MissingChain(role))?;
                if v.is_finite() {
                    Ok(v)
                } else {
                    Err(AlignError::Hardware(format!("non-finite feedback from {role} chain")).into())
                }
            })
            .collect()
    }
}

/// Search knobs shared by every step of a run.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RunParams {
    pub strategy: Strategy,
    pub max_rounds: usize,
    pub timeout: Duration,
}

/// Registers, feedback and target of one step.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationStep {
    pub name: &'static str,
    pub phase: Phase,
    pub settings: SettingsVector,
    pub feedback: FeedbackVector,
    pub target: f64,
}

impl CalibrationStep {
    /// `register` on every chain, fed back by that chain's trace average.
    pub fn common(
        name: &'static str,
        phase: Phase,
        register: Register,
        roles: &[ChainRole],
        target: f64,
    ) -> Self {
        Self {
            name,
            phase,
            settings: SettingsVector::new(roles.iter().map(|&r| (r, register)).collect()),
            feedback: FeedbackVector::new(
                roles
                    .iter()
                    .map(|&r| (r, FeedbackSource::TraceAverage))
                    .collect(),
            ),
            target,
        }
    }

    /// One register per subchannel per chain, fed back by that subchannel's mean.
    pub fn per_subchannel(
        name: &'static str,
        phase: Phase,
        register_of: fn(Subchannel) -> Register,
        roles: &[ChainRole],
        target: f64,
    ) -> Self {
        let pairs: Vec<(ChainRole, Subchannel)> = roles
            .iter()
            .flat_map(|&r| Subchannel::ALL.into_iter().map(move |s| (r, s)))
            .collect();
        Self {
            name,
            phase,
            settings: SettingsVector::new(pairs.iter().map(|&(r, s)| (r, register_of(s))).collect()),
            feedback: FeedbackVector::new(
                pairs
                    .iter()
                    .map(|&(r, s)| (r, FeedbackSource::Subchannel(s)))
                    .collect(),
            ),
            target,
        }
    }

    pub fn width(&self) -> usize {
        self.settings.len()
    }

    pub fn info(&self) -> StepInfo {
        StepInfo {
            name: self.name,
            phase: self.phase,
            target: self.target,
            registers: self.settings.entries().to_vec(),
        }
    }

    fn evaluate(
        &self,
        chains: &mut Chains<'_>,
        values: &[u8],
        timeout: Duration,
    ) -> Result<Vec<f64>> {
        self.settings.apply(chains, values)?;
        let measured = self.feedback.measure(chains, timeout)?;
        Ok(measured.into_iter().map(|v| v - self.target).collect())
    }

    /// Search until every channel is done, then write the final values once
    /// more. Returns the final values in channel order.
    pub(crate) fn run<O: AlignObserver + ?Sized>(
        &self,
        chains: &mut Chains<'_>,
        params: RunParams,
        observer: &mut O,
    ) -> Result<Vec<u8>> {
        let n = self.width();
        if self.feedback.len() != n {
            return Err(AlignError::LengthMismatch {
                expected: n,
                got: self.feedback.len(),
            }
            .into());
        }
        let info = self.info();
        observer.step_started(&info);

        let a = vec![u8::MIN; n];
        let b = vec![u8::MAX; n];
        let fa = self.evaluate(chains, &a, params.timeout)?;
        let fb = self.evaluate(chains, &b, params.timeout)?;
        tracing::debug!(step = self.name, ?fa, ?fb, "endpoints measured");

        let mut search = finder::finder_for(params.strategy, &a, &b, &fa, &fb)
            .wrap_err_with(|| format!("step {}", self.name))?;

        let mut guesses = search.first_guesses();
        let mut rounds = 0usize;
        loop {
            if rounds >= params.max_rounds {
                return Err(AlignError::MaxRounds(rounds))
                    .wrap_err_with(|| format!("step {}", self.name));
            }
            let fx = self.evaluate(chains, &guesses, params.timeout)?;
            rounds += 1;
            let (next, done) = search.advance(&fx)?;
            observer.round(
                &info,
                &RoundInfo {
                    round: rounds,
                    guesses: &guesses,
                    feedback: &fx,
                    done: &done,
                },
            );
            guesses = next;
            if done.iter().all(|d| *d) {
                break;
            }
        }

        self.settings.apply(chains, &guesses)?;
        observer.step_finished(&info, &guesses, rounds);
        Ok(guesses)
    }
}
