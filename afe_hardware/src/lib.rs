//! Simulated acquisition boards implementing `afe_traits::Device`.
//!
//! - `afe`: behavioral model of the analog front end (registers → baselines)
//! - `sim`: synchronous board, one fresh trace pair per read
//! - `stream`: free-running board on a background thread
pub mod afe;
pub mod error;
pub mod sim;
pub mod stream;
pub mod util;

pub use afe::{AfeModel, AfeParams};
pub use sim::{DeviceEvent, SimulatedDevice};
pub use stream::StreamingDevice;
