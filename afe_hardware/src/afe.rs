//! Behavioral model of one board's analog front end.
//!
//! Each subchannel's baseline code is
//!
//! ```text
//! code = 2048 + pedestal
//!      + CO_CODES_PER_STEP * (common_offset - 128)
//!      + IO_CODES_PER_STEP * (offset - 128)
//!      + FS_CODES_PER_STEP * (128 - full_scale) * mismatch * (1 + IG_PER_STEP * (gain - 128))
//! ```
//!
//! clamped to the 12-bit range, plus Gaussian sample noise. The response is
//! monotonic in every register, which is what the bracketing search relies on.

use afe_traits::{Measurement, Register, Subchannel};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::error::{HwError, Result};

/// Full-scale sensitivity in ADC codes per register step.
pub const FS_CODES_PER_STEP: f64 = 16.0;
/// Common-offset sensitivity in ADC codes per register step.
pub const CO_CODES_PER_STEP: f64 = 8.0;
/// Per-subchannel offset sensitivity in ADC codes per register step.
pub const IO_CODES_PER_STEP: f64 = 2.0;
/// Relative swing change per per-subchannel gain step.
pub const IG_PER_STEP: f64 = 0.002;

/// Largest code of the 12-bit converters.
pub const ADC_MAX: u16 = 4095;
const ADC_MID: f64 = 2048.0;

#[derive(Debug, Clone, PartialEq)]
pub struct AfeParams {
    /// Baseline offset of each subchannel (codes) with all registers at 0x80.
    pub pedestals: [f64; 4],
    /// Relative full-scale swing of each subchannel.
    pub gain_mismatch: [f64; 4],
    /// RMS sample noise in codes; 0 disables noise.
    pub noise_sigma: f64,
    /// Samples per channel trace (two subchannels interleaved).
    pub trace_len: usize,
}

impl Default for AfeParams {
    fn default() -> Self {
        Self {
            pedestals: [35.0, -20.0, 60.0, -45.0],
            gain_mismatch: [1.0, 0.97, 1.03, 0.99],
            noise_sigma: 2.0,
            trace_len: 400,
        }
    }
}

impl AfeParams {
    pub fn validate(&self) -> Result<()> {
        if self.trace_len < Measurement::MIN_TRACE_LEN {
            return Err(HwError::Params(format!(
                "trace_len must be >= {}",
                Measurement::MIN_TRACE_LEN
            )));
        }
        if !(self.noise_sigma.is_finite() && self.noise_sigma >= 0.0) {
            return Err(HwError::Params("noise_sigma must be finite and >= 0".into()));
        }
        if self.pedestals.iter().any(|p| !p.is_finite()) {
            return Err(HwError::Params("pedestals must be finite".into()));
        }
        if self.gain_mismatch.iter().any(|m| !(m.is_finite() && *m > 0.0)) {
            return Err(HwError::Params("gain_mismatch must be finite and > 0".into()));
        }
        Ok(())
    }
}

pub struct AfeModel {
    params: AfeParams,
    registers: [u8; Register::COUNT],
    rng: StdRng,
    noise: Option<Normal<f64>>,
}

impl core::fmt::Debug for AfeModel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AfeModel")
            .field("params", &self.params)
            .field("registers", &self.registers)
            .finish()
    }
}

impl AfeModel {
    /// Build a model with every register at its power-on midpoint.
    pub fn new(params: AfeParams, seed: u64) -> Result<Self> {
        params.validate()?;
        let noise = if params.noise_sigma > 0.0 {
            Some(
                Normal::new(0.0, params.noise_sigma)
                    .map_err(|e| HwError::Params(e.to_string()))?,
            )
        } else {
            None
        };
        Ok(Self {
            params,
            registers: [Register::MIDPOINT; Register::COUNT],
            rng: StdRng::seed_from_u64(seed),
            noise,
        })
    }

    pub fn params(&self) -> &AfeParams {
        &self.params
    }

    #[inline]
    pub fn register(&self, register: Register) -> u8 {
        self.registers[register as usize]
    }

    #[inline]
    pub fn set_register(&mut self, register: Register, value: u8) {
        self.registers[register as usize] = value;
    }

    /// Noise-free baseline of one subchannel, clamped to the ADC range.
    pub fn baseline(&self, sub: Subchannel) -> f64 {
        let i = sub.index();
        let step = |r: Register| f64::from(self.register(r)) - f64::from(Register::MIDPOINT);
        let swing = -step(Register::FullScale)
            * FS_CODES_PER_STEP
            * self.params.gain_mismatch[i]
            * (1.0 + IG_PER_STEP * step(sub.gain_register()));
        let code = ADC_MID
            + self.params.pedestals[i]
            + CO_CODES_PER_STEP * step(Register::CommonOffset)
            + IO_CODES_PER_STEP * step(sub.offset_register())
            + swing;
        code.clamp(0.0, f64::from(ADC_MAX))
    }

    /// Digitize one pair of traces at the current register values.
    pub fn sample(&mut self) -> Result<Measurement> {
        let baselines = Subchannel::ALL.map(|s| self.baseline(s));
        let ch1 = self.trace(baselines[0], baselines[1]);
        let ch2 = self.trace(baselines[2], baselines[3]);
        Measurement::new(ch1, ch2)
            .ok_or_else(|| HwError::InvalidSample("trace shorter than two samples".into()))
    }

    fn trace(&mut self, positive: f64, negative: f64) -> Vec<u16> {
        (0..self.params.trace_len)
            .map(|k| {
                let base = if k % 2 == 0 { positive } else { negative };
                let noisy = match &self.noise {
                    Some(n) => base + n.sample(&mut self.rng),
                    None => base,
                };
                noisy.round().clamp(0.0, f64::from(ADC_MAX)) as u16
            })
            .collect()
    }
}
