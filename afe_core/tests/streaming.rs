use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use afe_core::{AlignError, AlignmentProcedure, Timeouts};
use afe_hardware::{AfeModel, AfeParams, StreamingDevice};
use afe_traits::{MonotonicClock, Register, TriggerCondition};

fn stream(interrupt: Arc<AtomicBool>) -> StreamingDevice {
    let params = AfeParams {
        noise_sigma: 0.0,
        trace_len: 32,
        ..AfeParams::default()
    };
    StreamingDevice::spawn(
        AfeModel::new(params, 8).unwrap(),
        Duration::from_millis(1),
        MonotonicClock::new(),
        interrupt,
    )
    .with_trigger_condition(TriggerCondition(0x09))
}

#[test]
fn free_running_board_aligns() {
    let mut proc = AlignmentProcedure::new(stream(Arc::new(AtomicBool::new(false))))
        .with_timeouts(Timeouts { measurement_ms: 2_000 });
    let snapshot = proc.align_with_report().unwrap();
    let dev = proc.device();
    for e in snapshot.entries() {
        assert_eq!(dev.register(e.register).unwrap(), e.value);
    }
    assert_ne!(dev.register(Register::FullScale).unwrap(), 0x80);
}

#[test]
fn interrupt_flag_aborts_the_run() {
    let interrupt = Arc::new(AtomicBool::new(false));
    let mut proc = AlignmentProcedure::new(stream(interrupt.clone()))
        .with_timeouts(Timeouts { measurement_ms: 2_000 });
    interrupt.store(true, Ordering::SeqCst);
    let err = proc.align().unwrap_err();
    assert_eq!(
        err.downcast_ref::<AlignError>(),
        Some(&AlignError::Interrupted)
    );
}

#[test]
fn paused_board_times_out() {
    let dev = stream(Arc::new(AtomicBool::new(false)));
    dev.set_paused(true);
    // Let a sample taken just before the pause land so the reset drops it.
    std::thread::sleep(Duration::from_millis(20));
    let mut proc = AlignmentProcedure::new(dev).with_timeouts(Timeouts { measurement_ms: 30 });
    let err = proc.align().unwrap_err();
    assert_eq!(
        err.downcast_ref::<AlignError>(),
        Some(&AlignError::MeasurementTimeout)
    );
}
