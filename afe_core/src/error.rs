use thiserror::Error;

use crate::chain::ChainRole;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AlignError {
    #[error(
        "endpoints do not bracket the target on channel {channel}: f({a}) = {fa}, f({b}) = {fb}"
    )]
    InvalidBracket {
        channel: usize,
        a: u8,
        b: u8,
        fa: f64,
        fb: f64,
    },
    #[error("degenerate bracket: both endpoints are {0}")]
    DegenerateBracket(u8),
    #[error("length mismatch: expected {expected} values, got {got}")]
    LengthMismatch { expected: usize, got: usize },
    #[error("timeout waiting for measurement")]
    MeasurementTimeout,
    #[error("alignment interrupted")]
    Interrupted,
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("no convergence after {0} measurement rounds")]
    MaxRounds(usize),
    #[error("no {0} chain attached")]
    MissingChain(ChainRole),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
