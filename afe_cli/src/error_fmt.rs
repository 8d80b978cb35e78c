//! Human-readable error descriptions and structured JSON error formatting.

use afe_core::AlignError;
use serde_json::json;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(ae) = err.downcast_ref::<AlignError>() {
        return match ae {
            AlignError::InvalidBracket { channel, a, b, fa, fb } => format!(
                "What happened: No sign change between register codes {a} and {b} on channel {channel} (feedback {fa:.1} and {fb:.1}).\nLikely causes: The target is outside what this register can reach, or the board is not streaming calibration traces.\nHow to fix: Check [targets] and alignment.calibration_trigger in the config, then rerun."
            ),
            AlignError::DegenerateBracket(code) => format!(
                "What happened: Search interval collapsed to a single code ({code}).\nLikely causes: Internal search setup error.\nHow to fix: Re-run with --log-level=debug and report the log."
            ),
            AlignError::LengthMismatch { expected, got } => format!(
                "What happened: Got {got} feedback values for a {expected}-wide search.\nLikely causes: A chain returned a malformed measurement.\nHow to fix: Re-run with --log-level=debug and check the board's trace length."
            ),
            AlignError::MeasurementTimeout => {
                "What happened: Measurement timed out.\nLikely causes: Board not streaming, trigger condition not applied, or timeout configured too low.\nHow to fix: Check that the board is running, and consider increasing timeouts.measurement_ms in the config.".to_string()
            }
            AlignError::Interrupted => {
                "What happened: Alignment was interrupted.\nLikely causes: Ctrl-C or another abort request while waiting for data.\nHow to fix: Start a new run; the saved trigger condition was restored.".to_string()
            }
            AlignError::MaxRounds(n) => format!(
                "What happened: A search did not converge within {n} rounds.\nLikely causes: Feedback that is not monotonic in the register, or a very noisy board.\nHow to fix: Increase alignment.max_rounds, try --strategy bisection, or check the board."
            ),
            AlignError::Hardware(msg) => format!(
                "What happened: Hardware error ({msg}).\nLikely causes: Link or board fault.\nHow to fix: Check the board connection and power, then rerun."
            ),
            AlignError::MissingChain(role) => format!(
                "What happened: No {role} chain was provided.\nLikely causes: The run was configured for more chains than were opened.\nHow to fix: Use `align` for a single chain or open both boards for `align-dual`."
            ),
            AlignError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML or on the command line.\nHow to fix: Edit the config file or flags, then rerun."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("register snapshot csv must have headers") {
        return "Invalid headers in register snapshot CSV. Expected 'chain,register,value'.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: Unknown keys, wrong types, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("snapshot") {
        return format!(
            "What happened: Could not use the register snapshot ({msg}).\nLikely causes: Missing file, unknown register name, or a value outside 0..=255.\nHow to fix: Check the CSV rows (chain,register,value) and the path."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable name of the typed cause, or "Error".
pub fn reason_name(err: &eyre::Report) -> &'static str {
    match err.downcast_ref::<AlignError>() {
        Some(AlignError::InvalidBracket { .. }) => "InvalidBracket",
        Some(AlignError::DegenerateBracket(_)) => "DegenerateBracket",
        Some(AlignError::LengthMismatch { .. }) => "LengthMismatch",
        Some(AlignError::MeasurementTimeout) => "MeasurementTimeout",
        Some(AlignError::Interrupted) => "Interrupted",
        Some(AlignError::MaxRounds(_)) => "MaxRounds",
        Some(AlignError::Hardware(_)) => "Hardware",
        Some(AlignError::MissingChain(_)) => "MissingChain",
        Some(AlignError::Config(_)) => "Config",
        None => "Error",
    }
}

/// Stable exit codes per error kind. Usage errors exit 2 from clap.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<AlignError>() {
        Some(AlignError::InvalidBracket { .. } | AlignError::DegenerateBracket(_)) => 3,
        Some(AlignError::MeasurementTimeout) => 4,
        Some(AlignError::Interrupted) => 5,
        Some(AlignError::MaxRounds(_)) => 6,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    let details = match err.downcast_ref::<AlignError>() {
        Some(AlignError::InvalidBracket { channel, a, b, fa, fb }) => {
            Some(json!({ "channel": channel, "a": a, "b": b, "fa": fa, "fb": fb }))
        }
        Some(AlignError::MaxRounds(n)) => Some(json!({ "max_rounds": n })),
        _ => None,
    };
    let context: Vec<String> = err.chain().map(ToString::to_string).collect();

    let mut obj = json!({
        "event": "error",
        "reason": reason_name(err),
        "message": humanize(err),
        "context": context,
    });
    if let Some(d) = details {
        obj["details"] = d;
    }
    obj.to_string()
}
