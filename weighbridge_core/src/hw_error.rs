//! Maps `Box<dyn Error>` from trait boundaries to typed `CoreError`.
//!
//! The traits in `weighbridge_traits` use `Box<dyn Error + Send + Sync>` for
//! maximum flexibility; this module converts those to our typed error enum,
//! with an optional feature-gated path for `weighbridge_hardware::LineError`
//! downcasting.

use crate::error::CoreError;

/// Map a trait-boundary error to a typed `CoreError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_collaborator_error(e: &(dyn std::error::Error + 'static)) -> CoreError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(line) = e.downcast_ref::<weighbridge_hardware::LineError>() {
            return match line {
                weighbridge_hardware::LineError::Timeout => CoreError::Timeout,
                other => CoreError::Telemetry(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CoreError::Timeout
    } else {
        CoreError::Capture(s)
    }
}
