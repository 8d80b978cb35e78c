#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Front-end alignment logic (hardware-agnostic).
//!
//! All hardware interactions go through the `afe_traits::Device` trait.
//!
//! ## Architecture
//!
//! - **Finders**: integer root bracketing over `0..=255`, scalar and N-wide (`finder`)
//! - **Steps**: registers + feedback + target bound to one search (`step`)
//! - **Procedures**: the two-phase sequence for one chain (`procedure`) or a
//!   synchronized primary/secondary pair (`dual`)
//! - **Progress**: injected `AlignObserver` (`observer`)
//!
//! Procedures return `eyre::Result`; the typed cause is recoverable with
//! `report.downcast_ref::<AlignError>()`.

pub mod chain;
pub mod config;
pub mod conversions;
pub mod dual;
pub mod error;
pub mod finder;
pub mod hw_error;
pub mod observer;
pub mod procedure;
pub mod snapshot;
pub mod step;

pub use chain::ChainRole;
pub use config::{AlignCfg, Targets, Timeouts};
pub use dual::DualChainAlignmentProcedure;
pub use error::{AlignError, Result};
pub use finder::{Bracket, BracketSearch, ParallelBracketFinder, ScalarBracketFinder, Strategy};
pub use observer::{
    AlignObserver, Phase, RecordingObserver, RoundInfo, StepInfo, TracingObserver,
};
pub use procedure::AlignmentProcedure;
pub use snapshot::{RegisterSnapshot, SnapshotEntry};
pub use step::{CalibrationStep, FeedbackSource, FeedbackVector, SettingsVector};
