use std::error::Error;
use std::time::Duration;

use afe_core::{AlignError, AlignmentProcedure};
use afe_hardware::{AfeParams, DeviceEvent, SimulatedDevice};
use afe_traits::{Device, Measurement, Register, TriggerCondition};

/// A board whose baseline ignores every register.
struct FlatBoard {
    code: u16,
    trigger: TriggerCondition,
}

impl Device for FlatBoard {
    fn set_register(&mut self, _: Register, _: u8) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn flush(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn flush_and_measure(
        &mut self,
        _timeout: Duration,
    ) -> Result<Measurement, Box<dyn Error + Send + Sync>> {
        Ok(Measurement::new(vec![self.code; 4], vec![self.code; 4]).ok_or("short trace")?)
    }
    fn trigger_condition(&self) -> TriggerCondition {
        self.trigger
    }
    fn set_trigger_condition(
        &mut self,
        condition: TriggerCondition,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.trigger = condition;
        Ok(())
    }
}

/// Reads fail with a plain string error; trigger writes can be made to fail.
struct BrokenLink {
    message: &'static str,
    trigger: TriggerCondition,
    trigger_writes_left: usize,
}

impl Device for BrokenLink {
    fn set_register(&mut self, _: Register, _: u8) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn flush(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn flush_and_measure(
        &mut self,
        _timeout: Duration,
    ) -> Result<Measurement, Box<dyn Error + Send + Sync>> {
        Err(self.message.into())
    }
    fn trigger_condition(&self) -> TriggerCondition {
        self.trigger
    }
    fn set_trigger_condition(
        &mut self,
        condition: TriggerCondition,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        if self.trigger_writes_left == 0 {
            return Err("trigger register write rejected".into());
        }
        self.trigger_writes_left -= 1;
        self.trigger = condition;
        Ok(())
    }
}

#[test]
fn flat_response_aborts_with_invalid_bracket() {
    let mut proc = AlignmentProcedure::new(FlatBoard {
        code: 3000,
        trigger: TriggerCondition(0x11),
    });
    let err = proc.align().expect_err("no bracket");
    match err.downcast_ref::<AlignError>() {
        Some(AlignError::InvalidBracket { channel, a, b, fa, fb }) => {
            assert_eq!((*channel, *a, *b), (0, 0, 255));
            assert_eq!((*fa, *fb), (952.0, 952.0));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(format!("{err:#}").contains("full_scale"));
    assert_eq!(proc.device().trigger, TriggerCondition(0x11));
}

#[test]
fn timeout_propagates_and_trigger_is_restored() {
    let dev = SimulatedDevice::new(AfeParams::default(), 0)
        .unwrap()
        .with_trigger_condition(TriggerCondition(0x22))
        .fail_after(5);
    let mut proc = AlignmentProcedure::new(dev);
    let err = proc.align().expect_err("timeout");
    assert_eq!(
        err.downcast_ref::<AlignError>(),
        Some(&AlignError::MeasurementTimeout)
    );
    let dev = proc.into_device();
    assert_eq!(dev.trigger_condition(), TriggerCondition(0x22));
    assert_eq!(
        dev.events().last(),
        Some(&DeviceEvent::Trigger(TriggerCondition(0x22)))
    );
    // No retries: exactly one read failed.
    let measures = dev
        .events()
        .iter()
        .filter(|e| matches!(e, DeviceEvent::Measure))
        .count();
    assert_eq!(measures, 6);
}

#[test]
fn string_errors_are_classified() {
    let mut proc = AlignmentProcedure::new(BrokenLink {
        message: "read timed out after 15000 ms",
        trigger: TriggerCondition(0),
        trigger_writes_left: 2,
    });
    let err = proc.align().unwrap_err();
    assert_eq!(
        err.downcast_ref::<AlignError>(),
        Some(&AlignError::MeasurementTimeout)
    );

    let mut proc = AlignmentProcedure::new(BrokenLink {
        message: "frame checksum mismatch",
        trigger: TriggerCondition(0),
        trigger_writes_left: 2,
    });
    let err = proc.align().unwrap_err();
    assert_eq!(
        err.downcast_ref::<AlignError>(),
        Some(&AlignError::Hardware("frame checksum mismatch".into()))
    );
}

#[test]
fn failed_restore_does_not_mask_the_run_error() {
    let mut proc = AlignmentProcedure::new(BrokenLink {
        message: "measurement interrupted by operator",
        trigger: TriggerCondition(0x40),
        trigger_writes_left: 1,
    });
    let err = proc.align().unwrap_err();
    assert_eq!(
        err.downcast_ref::<AlignError>(),
        Some(&AlignError::Interrupted)
    );
    // Restore was attempted and rejected; the board keeps the calibration trigger.
    assert_eq!(proc.device().trigger, TriggerCondition::CALIBRATION);
}

#[test]
fn failed_calibration_trigger_stops_before_any_write() {
    let mut proc = AlignmentProcedure::new(BrokenLink {
        message: "unused",
        trigger: TriggerCondition(0x40),
        trigger_writes_left: 0,
    });
    let err = proc.align().unwrap_err();
    assert!(format!("{err:#}").contains("setting calibration trigger"));
    assert_eq!(proc.device().trigger, TriggerCondition(0x40));
}
