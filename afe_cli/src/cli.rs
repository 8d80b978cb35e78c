//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "afe", version, about = "ADC front-end alignment CLI")]
pub struct Cli {
    /// Path to config TOML (typed); built-in defaults when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging] level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Step strategy for every search of the run.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum StrategyArg {
    /// Halve the bracket each round
    Bisection,
    /// Linear interpolation between the bracket ends
    Secant,
}

impl From<StrategyArg> for afe_config::StrategyName {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Bisection => afe_config::StrategyName::Bisection,
            StrategyArg::Secant => afe_config::StrategyName::Secant,
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct AlignArgs {
    /// Override alignment.strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyArg>,
    /// Override alignment.max_rounds
    #[arg(long, value_name = "N")]
    pub max_rounds: Option<usize>,
    /// Override simulation.seed
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,
    /// Pre-load register values from a snapshot CSV (chain,register,value)
    #[arg(long, value_name = "FILE")]
    pub registers: Option<PathBuf>,
    /// Write the converged registers to a snapshot CSV
    #[arg(long, value_name = "FILE")]
    pub save: Option<PathBuf>,
    /// Use the free-running (threaded) simulated board instead of the synchronous one
    #[arg(long, action = ArgAction::SetTrue)]
    pub stream: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Align a single acquisition chain
    Align(AlignArgs),
    /// Align a synchronized primary/secondary pair of chains
    AlignDual(AlignArgs),
    /// Quick health check: take one measurement from the simulated board
    SelfCheck,
}
