//! Free-running simulated board.
//!
//! A background thread digitizes the front end at a fixed rate and pushes
//! measurements into a bounded channel, like a board that streams over a
//! link whether or not anyone is reading. Register writes bump a generation
//! counter; reads only accept samples taken after the last write, which is
//! how stale buffered data is kept out of the alignment rounds.
//!
//! Each `StreamingDevice` owns exactly one thread, joined on drop.
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use afe_traits::clock::Clock;
use afe_traits::{Device, Measurement, Register, TriggerCondition};
use crossbeam_channel as xch;

use crate::afe::AfeModel;
use crate::error::{HwError, Result};
use crate::util::{drain, recv_fresh_with_timeout};

/// Buffered measurements before the producer starts dropping new ones.
const BUFFER_DEPTH: usize = 8;
/// Longest gap between checks of the interrupt flag while waiting for data.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

struct Stamped {
    generation: u64,
    measurement: Measurement,
}

pub struct StreamingDevice {
    model: Arc<Mutex<AfeModel>>,
    generation: Arc<AtomicU64>,
    rx: xch::Receiver<Stamped>,
    trigger: TriggerCondition,
    /// Producer pause switch; a paused board never answers reads.
    paused: Arc<AtomicBool>,
    /// External abort request (e.g. Ctrl-C); fails pending reads.
    interrupt: Arc<AtomicBool>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl StreamingDevice {
    /// Start streaming `model` every `period`, timed by `clock`.
    pub fn spawn<C: Clock + Send + Sync + 'static>(
        model: AfeModel,
        period: Duration,
        clock: C,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        let (tx, rx) = xch::bounded(BUFFER_DEPTH);
        let model = Arc::new(Mutex::new(model));
        let generation = Arc::new(AtomicU64::new(0));
        let paused = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        let model_bg = model.clone();
        let generation_bg = generation.clone();
        let paused_bg = paused.clone();
        let shutdown_bg = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            loop {
                if shutdown_bg.load(Ordering::Relaxed) {
                    tracing::debug!("stream thread received shutdown signal");
                    break;
                }
                if !paused_bg.load(Ordering::Relaxed) {
                    let sampled = match model_bg.lock() {
                        Ok(mut m) => {
                            // Read the generation under the model lock so the
                            // stamp matches the registers that were sampled.
                            let generation = generation_bg.load(Ordering::Acquire);
                            m.sample().map(|measurement| Stamped {
                                generation,
                                measurement,
                            })
                        }
                        Err(_) => {
                            tracing::warn!("front-end model lock poisoned; stopping stream");
                            break;
                        }
                    };
                    match sampled {
                        Ok(s) => match tx.try_send(s) {
                            Ok(()) | Err(xch::TrySendError::Full(_)) => {}
                            Err(xch::TrySendError::Disconnected(_)) => {
                                tracing::debug!("stream consumer disconnected, exiting thread");
                                break;
                            }
                        },
                        Err(e) => tracing::warn!(error = %e, "stream sample failed"),
                    }
                }
                if shutdown_bg.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!("stream thread exiting cleanly");
        });

        Self {
            model,
            generation,
            rx,
            trigger: TriggerCondition::default(),
            paused,
            interrupt,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    pub fn with_trigger_condition(mut self, trigger: TriggerCondition) -> Self {
        self.trigger = trigger;
        self
    }

    /// Stop or resume the producer. While paused every read times out.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn register(&self, register: Register) -> Result<u8> {
        Ok(self.lock_model()?.register(register))
    }

    fn lock_model(&self) -> Result<MutexGuard<'_, AfeModel>> {
        self.model
            .lock()
            .map_err(|_| HwError::InvalidSample("front-end model lock poisoned".into()))
    }
}

impl Device for StreamingDevice {
    fn set_register(
        &mut self,
        register: Register,
        value: u8,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut m = self.lock_model()?;
        m.set_register(register, value);
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }

    fn flush(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let dropped = drain(&self.rx);
        tracing::trace!(dropped, "flushed stream");
        Ok(())
    }

    fn flush_and_measure(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Measurement, Box<dyn std::error::Error + Send + Sync>> {
        drain(&self.rx);
        let current = self.generation.load(Ordering::Acquire);
        let interrupt = self.interrupt.clone();
        let stamped = recv_fresh_with_timeout(
            &self.rx,
            |s| s.generation >= current,
            || interrupt.load(Ordering::Relaxed),
            timeout,
            POLL_INTERVAL,
        )?;
        Ok(stamped.measurement)
    }

    fn trigger_condition(&self) -> TriggerCondition {
        self.trigger
    }

    fn set_trigger_condition(
        &mut self,
        condition: TriggerCondition,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.trigger = condition;
        Ok(())
    }
}

impl Drop for StreamingDevice {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("stream thread joined successfully"),
                Err(e) => tracing::warn!(?e, "stream thread panicked during shutdown"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::afe::AfeParams;
    use afe_traits::MonotonicClock;

    fn device() -> StreamingDevice {
        let params = AfeParams {
            noise_sigma: 0.0,
            trace_len: 16,
            ..AfeParams::default()
        };
        StreamingDevice::spawn(
            AfeModel::new(params, 3).unwrap(),
            Duration::from_millis(1),
            MonotonicClock::new(),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[test]
    fn measurement_reflects_latest_write() {
        let mut dev = device();
        dev.set_register(Register::Ch1OffsetPositive, 0x80 + 10).unwrap();
        let m = dev.flush_and_measure(Duration::from_secs(2)).unwrap();
        assert_eq!(m.subchannel_means()[0], 2083.0 + 20.0);
    }

    #[test]
    fn paused_stream_times_out() {
        let mut dev = device();
        dev.set_paused(true);
        // Let a sample taken just before the pause land so the read drains it.
        std::thread::sleep(Duration::from_millis(20));
        let err = dev
            .flush_and_measure(Duration::from_millis(30))
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::Timeout)));
        dev.set_paused(false);
        assert!(dev.flush_and_measure(Duration::from_secs(2)).is_ok());
    }
}
