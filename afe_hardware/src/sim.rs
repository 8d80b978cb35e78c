//! On-demand simulated board: every `flush_and_measure` waits the settle
//! time on the injected clock and digitizes a fresh trace pair.

use std::time::Duration;

use afe_traits::clock::{Clock, MonotonicClock};
use afe_traits::{Device, Measurement, Register, TriggerCondition};

use crate::afe::{AfeModel, AfeParams};
use crate::error::{HwError, Result};

/// One interaction with the simulated board, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceEvent {
    Write(Register, u8),
    Flush,
    Measure,
    Trigger(TriggerCondition),
}

pub struct SimulatedDevice<C: Clock = MonotonicClock> {
    model: AfeModel,
    trigger: TriggerCondition,
    settle: Duration,
    clock: C,
    events: Vec<DeviceEvent>,
    // Measurements left before every read times out; None never fails.
    reads_before_timeout: Option<usize>,
}

impl<C: Clock> core::fmt::Debug for SimulatedDevice<C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedDevice")
            .field("model", &self.model)
            .field("trigger", &self.trigger)
            .field("events", &self.events.len())
            .finish()
    }
}

impl SimulatedDevice<MonotonicClock> {
    pub fn new(params: AfeParams, seed: u64) -> Result<Self> {
        Self::with_clock(params, seed, MonotonicClock::new())
    }
}

impl<C: Clock> SimulatedDevice<C> {
    pub fn with_clock(params: AfeParams, seed: u64, clock: C) -> Result<Self> {
        Ok(Self {
            model: AfeModel::new(params, seed)?,
            trigger: TriggerCondition::default(),
            settle: Duration::ZERO,
            clock,
            events: Vec::new(),
            reads_before_timeout: None,
        })
    }

    /// Time each read waits for the front end to settle after register writes.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_trigger_condition(mut self, trigger: TriggerCondition) -> Self {
        self.trigger = trigger;
        self
    }

    /// Let `n` reads succeed, then time out on every further read.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.reads_before_timeout = Some(n);
        self
    }

    pub fn model(&self) -> &AfeModel {
        &self.model
    }

    pub fn register(&self, register: Register) -> u8 {
        self.model.register(register)
    }

    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    /// Register writes only, in order.
    pub fn writes(&self) -> impl Iterator<Item = (Register, u8)> + '_ {
        self.events.iter().filter_map(|e| match e {
            DeviceEvent::Write(r, v) => Some((*r, *v)),
            _ => None,
        })
    }

    /// A settle time longer than `timeout` never yields a sample in time.
    fn measure(&mut self, timeout: Duration) -> Result<Measurement> {
        if let Some(left) = self.reads_before_timeout.as_mut() {
            if *left == 0 {
                return Err(HwError::Timeout);
            }
            *left -= 1;
        }
        if self.settle > timeout {
            self.clock.sleep(timeout);
            return Err(HwError::Timeout);
        }
        self.clock.sleep(self.settle);
        self.model.sample()
    }
}

impl<C: Clock> Device for SimulatedDevice<C> {
    fn set_register(
        &mut self,
        register: Register,
        value: u8,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.model.set_register(register, value);
        self.events.push(DeviceEvent::Write(register, value));
        Ok(())
    }

    fn flush(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.events.push(DeviceEvent::Flush);
        Ok(())
    }

    fn flush_and_measure(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Measurement, Box<dyn std::error::Error + Send + Sync>> {
        self.events.push(DeviceEvent::Measure);
        let m = self.measure(timeout)?;
        tracing::trace!(
            means = ?m.subchannel_means(),
            "simulated measurement"
        );
        Ok(m)
    }

    fn trigger_condition(&self) -> TriggerCondition {
        self.trigger
    }

    fn set_trigger_condition(
        &mut self,
        condition: TriggerCondition,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.trigger = condition;
        self.events.push(DeviceEvent::Trigger(condition));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use afe_traits::clock::test_clock::TestClock;

    fn quiet() -> AfeParams {
        AfeParams {
            noise_sigma: 0.0,
            ..AfeParams::default()
        }
    }

    #[test]
    fn writes_reach_the_model_and_the_log() {
        let mut dev = SimulatedDevice::new(quiet(), 0).unwrap();
        dev.set_register(Register::CommonOffset, 0x40).unwrap();
        assert_eq!(dev.register(Register::CommonOffset), 0x40);
        assert_eq!(
            dev.writes().collect::<Vec<_>>(),
            vec![(Register::CommonOffset, 0x40)]
        );
    }

    #[test]
    fn settle_time_is_spent_on_the_clock() {
        let clock = TestClock::new();
        let mut dev = SimulatedDevice::with_clock(quiet(), 0, clock.clone())
            .unwrap()
            .with_settle(Duration::from_millis(30));
        dev.flush_and_measure(Duration::from_secs(1)).unwrap();
        dev.flush_and_measure(Duration::from_secs(1)).unwrap();
        assert_eq!(clock.elapsed(), Duration::from_millis(60));
    }

    #[test]
    fn settle_longer_than_timeout_times_out() {
        let clock = TestClock::new();
        let mut dev = SimulatedDevice::with_clock(quiet(), 0, clock.clone())
            .unwrap()
            .with_settle(Duration::from_millis(40));
        let err = dev.flush_and_measure(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::Timeout)));
        assert_eq!(clock.elapsed(), Duration::from_millis(10));
        assert_eq!(dev.model().params().noise_sigma, 0.0);

        // Settle equal to the timeout still lands in time.
        assert!(dev.flush_and_measure(Duration::from_millis(40)).is_ok());
    }

    #[test]
    fn fail_after_times_out() {
        let mut dev = SimulatedDevice::new(quiet(), 0).unwrap().fail_after(1);
        assert!(dev.flush_and_measure(Duration::from_millis(1)).is_ok());
        let err = dev.flush_and_measure(Duration::from_millis(1)).unwrap_err();
        assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::Timeout)));
    }
}
