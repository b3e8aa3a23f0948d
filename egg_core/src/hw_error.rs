//! Maps `Box<dyn Error>` from trait boundaries to typed `EggError`.
//!
//! The traits in `egg_traits` use `Box<dyn Error + Send + Sync>`; this module
//! converts those to our typed error enum, with an optional feature-gated path
//! for `egg_hardware::HwError` downcasting.

use crate::error::EggError;

/// Map a trait-boundary error to a typed `EggError`.
///
/// Known hardware error types are downcast first; anything else is carried
/// as its display string.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> EggError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<egg_hardware::error::HwError>() {
            return EggError::HardwareFault(hw.to_string());
        }
    }

    EggError::Hardware(e.to_string())
}
