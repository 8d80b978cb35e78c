#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and register snapshot files for front-end alignment.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Register snapshot CSV load/save enforces the `chain,register,value` header.
use std::io::{Read, Write};
use std::path::Path;

use afe_traits::Register;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StrategyName {
    Bisection,
    #[default]
    Secant,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ChainName {
    Primary,
    Secondary,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlignmentCfg {
    /// "secant" (default) or "bisection"
    pub strategy: StrategyName,
    /// Measurement rounds one step may take before aborting
    pub max_rounds: usize,
    /// Trigger condition written while aligning (0..=255)
    pub calibration_trigger: u8,
}

impl Default for AlignmentCfg {
    fn default() -> Self {
        Self {
            strategy: StrategyName::Secant,
            max_rounds: 64,
            calibration_trigger: 0x80,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Targets {
    pub mid_scale: u16,
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

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Timeouts {
    /// Upper bound on one measurement read (ms). Also accepts alias "sample_ms".
    #[serde(alias = "sample_ms")]
    pub measurement_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            measurement_ms: 15_000,
        }
    }
}

/// Analog behavior of one simulated board.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChainSim {
    /// Baseline offset per subchannel (codes), order ch1_pos, ch1_neg, ch2_pos, ch2_neg
    pub pedestals: [f64; 4],
    /// Relative full-scale swing per subchannel
    pub gain_mismatch: [f64; 4],
}

impl ChainSim {
    fn secondary() -> Self {
        Self {
            pedestals: [-25.0, 40.0, -55.0, 15.0],
            gain_mismatch: [0.98, 1.02, 1.01, 0.96],
        }
    }
}

impl Default for ChainSim {
    fn default() -> Self {
        Self {
            pedestals: [35.0, -20.0, 60.0, -45.0],
            gain_mismatch: [1.0, 0.97, 1.03, 0.99],
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Simulation {
    pub seed: u64,
    /// RMS sample noise in ADC codes (0 disables noise)
    pub noise_sigma: f64,
    /// Samples per channel trace
    pub trace_len: usize,
    /// Settle time the synchronous board waits per measurement (ms)
    pub settle_ms: u64,
    /// Sampling period of the free-running board (ms)
    pub stream_period_ms: u64,
    pub primary: ChainSim,
    pub secondary: ChainSim,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            seed: 1,
            noise_sigma: 2.0,
            trace_len: 400,
            settle_ms: 0,
            stream_period_ms: 5,
            primary: ChainSim::default(),
            secondary: ChainSim::secondary(),
        }
    }
}

impl Simulation {
    pub fn chain(&self, chain: ChainName) -> &ChainSim {
        match chain {
            ChainName::Primary => &self.primary,
            ChainName::Secondary => &self.secondary,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub alignment: AlignmentCfg,
    pub targets: Targets,
    pub timeouts: Timeouts,
    pub simulation: Simulation,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Largest 12-bit ADC code.
const ADC_MAX: u16 = 4095;

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Alignment
        if self.alignment.max_rounds == 0 {
            eyre::bail!("alignment.max_rounds must be >= 1");
        }
        if self.alignment.max_rounds > 1024 {
            eyre::bail!("alignment.max_rounds is unreasonably large (>1024)");
        }

        // Targets
        if self.targets.mid_scale > ADC_MAX {
            eyre::bail!("targets.mid_scale must be <= {ADC_MAX}");
        }
        if self.targets.low_scale > ADC_MAX {
            eyre::bail!("targets.low_scale must be <= {ADC_MAX}");
        }

        // Timeouts
        if self.timeouts.measurement_ms == 0 {
            eyre::bail!("timeouts.measurement_ms must be >= 1");
        }
        if self.timeouts.measurement_ms > 10 * 60 * 1000 {
            eyre::bail!("timeouts.measurement_ms is unreasonably large (>10min)");
        }

        // Simulation
        let sim = &self.simulation;
        if !(sim.noise_sigma.is_finite() && sim.noise_sigma >= 0.0) {
            eyre::bail!("simulation.noise_sigma must be finite and >= 0");
        }
        if sim.trace_len < 2 {
            eyre::bail!("simulation.trace_len must be >= 2");
        }
        if sim.stream_period_ms == 0 {
            eyre::bail!("simulation.stream_period_ms must be >= 1");
        }
        for (name, chain) in [("primary", &sim.primary), ("secondary", &sim.secondary)] {
            if chain.pedestals.iter().any(|p| !p.is_finite()) {
                eyre::bail!("simulation.{name}.pedestals must be finite");
            }
            if chain.gain_mismatch.iter().any(|m| !(m.is_finite() && *m > 0.0)) {
                eyre::bail!("simulation.{name}.gain_mismatch must be finite and > 0");
            }
        }

        // Logging
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        Ok(())
    }
}

/// Register snapshot CSV schema.
///
/// Expected headers:
/// chain,register,value
///
/// Example:
/// chain,register,value
/// primary,full_scale,243
/// primary,ch1_gain_positive,0x7c
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRow {
    pub chain: ChainName,
    #[serde(deserialize_with = "de_register", serialize_with = "ser_register")]
    pub register: Register,
    /// Decimal or `0x`-prefixed hex.
    #[serde(deserialize_with = "de_register_value")]
    pub value: u8,
}

fn de_register<'de, D>(deserializer: D) -> Result<Register, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse().map_err(serde::de::Error::custom)
}

fn ser_register<S>(register: &Register, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(register.name())
}

fn de_register_value<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    let s = s.trim();
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse::<u8>(),
    };
    parsed.map_err(|e| serde::de::Error::custom(format!("register value {s:?}: {e}")))
}

const SNAPSHOT_HEADERS: [&str; 3] = ["chain", "register", "value"];

/// Parse snapshot rows from any reader. Rejects a wrong header and repeated
/// `(chain, register)` pairs.
pub fn read_snapshot_csv<R: Read>(reader: R) -> eyre::Result<Vec<SnapshotRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers: {}", e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != SNAPSHOT_HEADERS {
        eyre::bail!(
            "register snapshot CSV must have headers 'chain,register,value', got: {}",
            actual.join(",")
        );
    }

    let mut rows: Vec<SnapshotRow> = Vec::new();
    for (idx, rec) in rdr.deserialize::<SnapshotRow>().enumerate() {
        let row = match rec {
            Ok(row) => row,
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        };
        if rows
            .iter()
            .any(|r| r.chain == row.chain && r.register == row.register)
        {
            eyre::bail!(
                "duplicate register {} for chain {:?} at row {}",
                row.register,
                row.chain,
                idx + 2
            );
        }
        rows.push(row);
    }
    Ok(rows)
}

pub fn load_snapshot_csv(path: &Path) -> eyre::Result<Vec<SnapshotRow>> {
    let file = std::fs::File::open(path)
        .map_err(|e| eyre::eyre!("open register snapshot CSV {:?}: {}", path, e))?;
    read_snapshot_csv(file).map_err(|e| eyre::eyre!("{:?}: {}", path, e))
}

pub fn write_snapshot<W: Write>(writer: W, rows: &[SnapshotRow]) -> eyre::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| eyre::eyre!("write snapshot row: {}", e))?;
    }
    if rows.is_empty() {
        wtr.write_record(SNAPSHOT_HEADERS)
            .map_err(|e| eyre::eyre!("write snapshot header: {}", e))?;
    }
    wtr.flush()
        .map_err(|e| eyre::eyre!("flush snapshot: {}", e))?;
    Ok(())
}

pub fn write_snapshot_csv(path: &Path, rows: &[SnapshotRow]) -> eyre::Result<()> {
    let file = std::fs::File::create(path)
        .map_err(|e| eyre::eyre!("create register snapshot CSV {:?}: {}", path, e))?;
    write_snapshot(file, rows)
}
