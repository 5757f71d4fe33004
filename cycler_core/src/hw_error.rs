//! Maps `Box<dyn Error>` from trait boundaries to typed `CycleError`.
//!
//! The traits in `cycler_traits` use `Box<dyn Error + Send + Sync>` for maximum
//! flexibility; this module converts those to our typed error enum, with an
//! optional feature-gated path for `cycler_hardware::HwError` downcasting.

use crate::error::CycleError;

/// Map a trait-boundary error to a typed `CycleError`.
///
/// A channel the bank was never configured for is a wiring/config mistake;
/// everything else coming back from the boundary is a hardware fault.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> CycleError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<cycler_hardware::error::HwError>() {
            return match hw {
                cycler_hardware::error::HwError::UnknownChannel(ch) => {
                    CycleError::Config(format!("channel {ch} is not configured"))
                }
                other => CycleError::HardwareFault(other.to_string()),
            };
        }
    }

    if let Some(ce) = e.downcast_ref::<CycleError>() {
        return ce.clone();
    }
    CycleError::HardwareFault(e.to_string())
}

/// Wrap a boundary error into an `eyre::Report` carrying the typed error.
pub(crate) fn hw_report(e: &(dyn std::error::Error + 'static), context: &'static str) -> eyre::Report {
    eyre::Report::new(map_hw_error(e)).wrap_err(context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_io_errors_become_hardware_faults() {
        let e = std::io::Error::other("line stuck");
        assert_eq!(
            map_hw_error(&e),
            CycleError::HardwareFault("line stuck".into())
        );
    }

    #[cfg(feature = "hardware-errors")]
    #[test]
    fn unknown_channel_maps_to_config() {
        let e = cycler_hardware::error::HwError::UnknownChannel(7);
        assert!(matches!(map_hw_error(&e), CycleError::Config(msg) if msg.contains('7')));
    }

    #[test]
    fn report_downcasts_to_the_typed_error() {
        let e = std::io::Error::other("pwm gone");
        let report = hw_report(&e, "applying actuator command");
        assert!(matches!(
            report.downcast_ref::<CycleError>(),
            Some(CycleError::HardwareFault(_))
        ));
        assert_eq!(report.to_string(), "applying actuator command");
    }
}
