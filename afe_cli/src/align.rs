//! Alignment commands: config mapping, simulated board assembly, run and report.

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use afe_config::{ChainName, Config, SnapshotRow};
use afe_core::hw_error::map_boxed;
use afe_core::{
    AlignCfg, AlignmentProcedure, ChainRole, DualChainAlignmentProcedure, RegisterSnapshot,
    Strategy, Targets, Timeouts,
};
use afe_hardware::error::HwError;
use afe_hardware::{AfeModel, AfeParams, SimulatedDevice, StreamingDevice};
use afe_traits::{Device, Measurement, MonotonicClock, Subchannel, TriggerCondition};
use eyre::{Result, WrapErr};
use serde_json::json;

use crate::cli::{AlignArgs, json_mode};
use crate::progress;

/// Env hook for tests: the synchronous board fails every read after N good ones.
const SIM_TIMEOUT_ENV: &str = "AFE_TEST_SIM_TIMEOUT";

/// Core settings after applying command-line overrides to the config.
struct RunSettings {
    align: AlignCfg,
    targets: Targets,
    timeouts: Timeouts,
    seed: u64,
}

impl RunSettings {
    fn resolve(cfg: &Config, args: &AlignArgs) -> Self {
        let mut align: AlignCfg = (&cfg.alignment).into();
        if let Some(s) = args.strategy {
            align.strategy = afe_config::StrategyName::from(s).into();
        }
        if let Some(n) = args.max_rounds {
            align.max_rounds = n;
        }
        Self {
            align,
            targets: (&cfg.targets).into(),
            timeouts: (&cfg.timeouts).into(),
            seed: args.seed.unwrap_or(cfg.simulation.seed),
        }
    }
}

/// Fails pending reads once the interrupt flag is raised (Ctrl-C).
struct Interruptible<D> {
    inner: D,
    interrupt: Arc<AtomicBool>,
}

impl<D: Device> Device for Interruptible<D> {
    fn set_register(
        &mut self,
        register: afe_traits::Register,
        value: u8,
    ) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        self.inner.set_register(register, value)
    }

    fn flush(&mut self) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        self.inner.flush()
    }

    fn flush_and_measure(
        &mut self,
        timeout: Duration,
    ) -> std::result::Result<Measurement, Box<dyn Error + Send + Sync>> {
        if self.interrupt.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Interrupted));
        }
        self.inner.flush_and_measure(timeout)
    }

    fn trigger_condition(&self) -> TriggerCondition {
        self.inner.trigger_condition()
    }

    fn set_trigger_condition(
        &mut self,
        condition: TriggerCondition,
    ) -> std::result::Result<(), Box<dyn Error + Send + Sync>> {
        self.inner.set_trigger_condition(condition)
    }
}

fn afe_params(cfg: &Config, chain: ChainName) -> AfeParams {
    let sim = &cfg.simulation;
    let board = sim.chain(chain);
    AfeParams {
        pedestals: board.pedestals,
        gain_mismatch: board.gain_mismatch,
        noise_sigma: sim.noise_sigma,
        trace_len: sim.trace_len,
    }
}

fn chain_seed(seed: u64, chain: ChainName) -> u64 {
    match chain {
        ChainName::Primary => seed,
        ChainName::Secondary => seed.wrapping_add(1),
    }
}

fn sim_fail_after() -> Option<usize> {
    std::env::var(SIM_TIMEOUT_ENV).ok()?.parse().ok()
}

/// Open one simulated board described by `[simulation]`.
fn open_device(
    cfg: &Config,
    chain: ChainName,
    seed: u64,
    stream: bool,
    interrupt: &Arc<AtomicBool>,
) -> Result<Box<dyn Device>> {
    let params = afe_params(cfg, chain);
    let seed = chain_seed(seed, chain);
    if stream {
        let model = AfeModel::new(params, seed)
            .wrap_err_with(|| format!("building {chain:?} front-end model"))?;
        let period = Duration::from_millis(cfg.simulation.stream_period_ms);
        tracing::info!(?chain, period_ms = cfg.simulation.stream_period_ms, "streaming board started");
        return Ok(Box::new(StreamingDevice::spawn(
            model,
            period,
            MonotonicClock::new(),
            interrupt.clone(),
        )));
    }

    if cfg.simulation.settle_ms > cfg.timeouts.measurement_ms {
        tracing::warn!(
            settle_ms = cfg.simulation.settle_ms,
            measurement_ms = cfg.timeouts.measurement_ms,
            "settle time exceeds the measurement timeout; every read will time out"
        );
    }
    let mut dev = SimulatedDevice::new(params, seed)
        .wrap_err_with(|| format!("building {chain:?} simulated board"))?
        .with_settle(Duration::from_millis(cfg.simulation.settle_ms));
    if let Some(n) = sim_fail_after() {
        tracing::warn!(reads = n, "{SIM_TIMEOUT_ENV} set; reads will time out");
        dev = dev.fail_after(n);
    }
    Ok(Box::new(Interruptible {
        inner: dev,
        interrupt: interrupt.clone(),
    }))
}

fn load_preset(path: Option<&Path>) -> Result<RegisterSnapshot> {
    match path {
        Some(p) => {
            let rows = afe_config::load_snapshot_csv(p).wrap_err("loading register snapshot")?;
            Ok(RegisterSnapshot::from(rows.as_slice()))
        }
        None => Ok(RegisterSnapshot::new()),
    }
}

/// Write every preset value for `role` to `dev`.
fn apply_preset(dev: &mut dyn Device, preset: &RegisterSnapshot, role: ChainRole) -> Result<()> {
    let mut written = 0usize;
    for entry in preset.chain(role) {
        dev.set_register(entry.register, entry.value)
            .map_err(map_boxed)
            .wrap_err_with(|| format!("pre-loading {} on {role} chain", entry.register))?;
        written += 1;
    }
    if written > 0 {
        tracing::info!(chain = %role, registers = written, "registers pre-loaded from snapshot");
    }
    Ok(())
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

fn report(
    mode: &str,
    strategy: Strategy,
    snapshot: &RegisterSnapshot,
    elapsed: Duration,
    save: Option<&Path>,
) -> Result<()> {
    let rows: Vec<SnapshotRow> = snapshot.to_rows();
    if let Some(path) = save {
        afe_config::write_snapshot_csv(path, &rows)?;
        tracing::info!(path = %path.display(), rows = rows.len(), "register snapshot saved");
    }

    if json_mode() {
        let line = json!({
            "event": "complete",
            "timestamp": unix_timestamp(),
            "mode": mode,
            "strategy": strategy.name(),
            "duration_ms": elapsed.as_millis() as u64,
            "registers": serde_json::to_value(&rows)?,
            "error": serde_json::Value::Null,
        });
        println!("{line}");
    } else {
        println!(
            "alignment complete: {} registers ({strategy}, {} ms)",
            rows.len(),
            elapsed.as_millis()
        );
        for e in snapshot.entries() {
            println!("{:<10} {:<20} 0x{:02x}", e.chain.name(), e.register.name(), e.value);
        }
    }
    Ok(())
}

pub fn run_single(cfg: &Config, args: &AlignArgs, interrupt: &Arc<AtomicBool>) -> Result<()> {
    let settings = RunSettings::resolve(cfg, args);
    let preset = load_preset(args.registers.as_deref())?;
    if preset.chain(ChainRole::Secondary).next().is_some() {
        tracing::warn!("snapshot has secondary rows; ignored for single-chain alignment");
    }

    let mut primary = open_device(cfg, ChainName::Primary, settings.seed, args.stream, interrupt)?;
    apply_preset(primary.as_mut(), &preset, ChainRole::Primary)?;

    let strategy = settings.align.strategy;
    let started = Instant::now();
    let snapshot = AlignmentProcedure::new(primary)
        .with_config(settings.align)
        .with_targets(settings.targets)
        .with_timeouts(settings.timeouts)
        .with_observer(progress::observer(json_mode()))
        .align_with_report()?;
    report("single", strategy, &snapshot, started.elapsed(), args.save.as_deref())
}

pub fn run_dual(cfg: &Config, args: &AlignArgs, interrupt: &Arc<AtomicBool>) -> Result<()> {
    let settings = RunSettings::resolve(cfg, args);
    let preset = load_preset(args.registers.as_deref())?;

    let mut primary = open_device(cfg, ChainName::Primary, settings.seed, args.stream, interrupt)?;
    let mut secondary =
        open_device(cfg, ChainName::Secondary, settings.seed, args.stream, interrupt)?;
    apply_preset(primary.as_mut(), &preset, ChainRole::Primary)?;
    apply_preset(secondary.as_mut(), &preset, ChainRole::Secondary)?;

    let strategy = settings.align.strategy;
    let started = Instant::now();
    let snapshot = DualChainAlignmentProcedure::new(primary, secondary)
        .with_config(settings.align)
        .with_targets(settings.targets)
        .with_timeouts(settings.timeouts)
        .with_observer(progress::observer(json_mode()))
        .align_with_report()?;
    report("dual", strategy, &snapshot, started.elapsed(), args.save.as_deref())
}

/// One measurement from the primary board, reported per subchannel.
pub fn self_check(cfg: &Config, interrupt: &Arc<AtomicBool>) -> Result<()> {
    let mut dev = open_device(cfg, ChainName::Primary, cfg.simulation.seed, false, interrupt)?;
    let timeouts: Timeouts = (&cfg.timeouts).into();
    let m = dev
        .flush_and_measure(timeouts.measurement())
        .map_err(map_boxed)
        .wrap_err("self-check measurement")?;
    let means = m.subchannel_means();

    if json_mode() {
        let by_name: serde_json::Map<String, serde_json::Value> = Subchannel::ALL
            .iter()
            .map(|s| (s.name().to_string(), json!(means[s.index()])))
            .collect();
        println!("{}", json!({ "event": "self_check", "ok": true, "means": by_name }));
    } else {
        println!("OK");
        for s in Subchannel::ALL {
            println!("{:<8} {:>8.1}", s.name(), means[s.index()]);
        }
    }
    Ok(())
}
