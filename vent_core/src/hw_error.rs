//! Maps `Box<dyn Error>` from the seam traits to typed `VentError`.
//!
//! The traits in `vent_traits` use `Box<dyn Error + Send + Sync>` for
//! maximum flexibility; this module converts those to the typed error enum,
//! with an optional feature-gated path for `vent_hardware::HwError`
//! downcasting.

use crate::error::VentError;

/// Map a trait-boundary error to a typed `VentError`.
///
/// Attempts to downcast known hardware error types first, then falls back to
/// string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> VentError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<vent_hardware::error::HwError>() {
            return match hw {
                vent_hardware::error::HwError::Timeout => VentError::Timeout,
                other => VentError::HardwareFault(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        VentError::Timeout
    } else {
        VentError::Hardware(s)
    }
}
