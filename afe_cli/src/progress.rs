//! Progress output for `--json` runs: one JSON object per observer callback on stdout.

use afe_core::{AlignObserver, RoundInfo, StepInfo, TracingObserver};
use serde_json::json;

/// Prints JSON lines and still forwards every event to `tracing`.
#[derive(Debug, Default)]
pub struct JsonLinesObserver {
    inner: TracingObserver,
}

impl AlignObserver for JsonLinesObserver {
    fn step_started(&mut self, step: &StepInfo) {
        self.inner.step_started(step);
        let registers: Vec<_> = step
            .registers
            .iter()
            .map(|(role, reg)| json!({ "chain": role.name(), "register": reg.name() }))
            .collect();
        println!(
            "{}",
            json!({
                "event": "step_started",
                "step": step.name,
                "phase": step.phase.number(),
                "target": step.target,
                "registers": registers,
            })
        );
    }

    fn round(&mut self, step: &StepInfo, round: &RoundInfo<'_>) {
        self.inner.round(step, round);
        // Non-finite feedback aborts the step before reaching the observer.
        println!(
            "{}",
            json!({
                "event": "round",
                "step": step.name,
                "phase": step.phase.number(),
                "round": round.round,
                "guesses": round.guesses,
                "feedback": round.feedback,
                "done": round.done,
            })
        );
    }

    fn step_finished(&mut self, step: &StepInfo, values: &[u8], rounds: usize) {
        self.inner.step_finished(step, values, rounds);
        println!(
            "{}",
            json!({
                "event": "step_finished",
                "step": step.name,
                "phase": step.phase.number(),
                "rounds": rounds,
                "values": values,
            })
        );
    }
}

/// Observer chosen by output mode.
pub fn observer(json: bool) -> Box<dyn AlignObserver> {
    if json {
        Box::new(JsonLinesObserver::default())
    } else {
        Box::new(TracingObserver)
    }
}
