pub mod clock;
pub mod measurement;
pub mod register;

pub use clock::{Clock, MonotonicClock};
pub use measurement::{Channel, Measurement};
pub use register::{Register, Subchannel, UnknownRegister};

/// Opaque trigger configuration of one chain. Saved and restored around an
/// alignment run; never interpreted by the alignment code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TriggerCondition(pub u8);

impl TriggerCondition {
    /// Trigger bit that makes the board stream baseline-only calibration traces.
    pub const CALIBRATION: Self = Self(0x80);
}

/// One acquisition chain (board) as seen by the alignment engine.
pub trait Device {
    /// Queue a write of one 8-bit setting. No acknowledgment is awaited.
    fn set_register(
        &mut self,
        register: Register,
        value: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Discard any buffered samples.
    fn flush(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Discard buffered samples, then block until a fresh measurement arrives
    /// or `timeout` elapses.
    fn flush_and_measure(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Measurement, Box<dyn std::error::Error + Send + Sync>>;

    fn trigger_condition(&self) -> TriggerCondition;

    fn set_trigger_condition(
        &mut self,
        condition: TriggerCondition,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

impl<D: Device + ?Sized> Device for &mut D {
    fn set_register(
        &mut self,
        register: Register,
        value: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_register(register, value)
    }

    fn flush(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).flush()
    }

    fn flush_and_measure(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Measurement, Box<dyn std::error::Error + Send + Sync>> {
        (**self).flush_and_measure(timeout)
    }

    fn trigger_condition(&self) -> TriggerCondition {
        (**self).trigger_condition()
    }

    fn set_trigger_condition(
        &mut self,
        condition: TriggerCondition,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_trigger_condition(condition)
    }
}

impl<D: Device + ?Sized> Device for Box<D> {
    fn set_register(
        &mut self,
        register: Register,
        value: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_register(register, value)
    }

    fn flush(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).flush()
    }

    fn flush_and_measure(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Measurement, Box<dyn std::error::Error + Send + Sync>> {
        (**self).flush_and_measure(timeout)
    }

    fn trigger_condition(&self) -> TriggerCondition {
        (**self).trigger_condition()
    }

    fn set_trigger_condition(
        &mut self,
        condition: TriggerCondition,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_trigger_condition(condition)
    }
}
