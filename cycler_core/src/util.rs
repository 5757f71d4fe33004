//! Common time/period helpers for cycler_core.
use std::time::Duration;

/// Number of milliseconds in one second.
pub const MILLIS_PER_SEC: u64 = 1_000;

/// Period of a millisecond cadence, never shorter than 1 ms.
#[inline]
pub fn period_ms(ms: u64) -> Duration {
    Duration::from_millis(ms.max(1))
}

/// Convert fractional seconds from config into a `Duration`.
/// Negative, NaN and out-of-range values collapse to zero.
#[inline]
pub fn secs_f64(secs: f64) -> Duration {
    if !secs.is_finite() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::ZERO)
}

/// Round to the nearest hundredth of a second.
#[inline]
pub fn round_to_centis(d: Duration) -> Duration {
    const NANOS_PER_CENTI: u128 = 10_000_000;
    let centis = (d.as_nanos() + NANOS_PER_CENTI / 2) / NANOS_PER_CENTI;
    Duration::from_millis(u64::try_from(centis * 10).unwrap_or(u64::MAX))
}
