//! Maps `Box<dyn Error>` from trait boundaries to typed `AlignError`.
//!
//! The `afe_traits::Device` trait uses `Box<dyn Error + Send + Sync>` so any
//! transport can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `afe_hardware::HwError` downcasting.

use crate::error::AlignError;

/// Map a trait-boundary error to a typed `AlignError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> AlignError {
    #[cfg(feature = "hardware-errors")]
    {
        use afe_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            return match hw {
                HwError::Timeout => AlignError::MeasurementTimeout,
                HwError::Interrupted => AlignError::Interrupted,
                other => AlignError::Hardware(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        AlignError::MeasurementTimeout
    } else if lower.contains("interrupt") {
        AlignError::Interrupted
    } else {
        AlignError::Hardware(s)
    }
}

/// Convenience for `map_err` on boxed trait errors.
pub fn map_boxed(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    eyre::Report::new(map_hw_error(&*e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heuristics_recognize_timeouts() {
        let e: Box<dyn std::error::Error + Send + Sync> = "read timed out".into();
        assert_eq!(map_hw_error(&*e), AlignError::MeasurementTimeout);
    }

    #[test]
    fn unknown_errors_keep_their_message() {
        let e: Box<dyn std::error::Error + Send + Sync> = "link CRC mismatch".into();
        assert_eq!(
            map_hw_error(&*e),
            AlignError::Hardware("link CRC mismatch".into())
        );
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn typed_hardware_errors_are_downcast() {
        use afe_hardware::error::HwError;
        let e: Box<dyn std::error::Error + Send + Sync> = Box::new(HwError::Interrupted);
        assert_eq!(map_hw_error(&*e), AlignError::Interrupted);
        let e: Box<dyn std::error::Error + Send + Sync> = Box::new(HwError::Disconnected);
        assert!(matches!(map_hw_error(&*e), AlignError::Hardware(_)));
    }
}
