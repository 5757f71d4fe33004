//! Display formatting for elapsed time, cycle counts and status lines.
use std::time::Duration;

use crate::state::CycleMode;
use crate::status::StatusSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// HH:MM
    Minutes,
    /// HH:MM:SS
    #[default]
    Seconds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayFormat {
    pub resolution: Resolution,
    /// Zero-padded width of the cycle counter.
    pub cycle_width: usize,
}

impl Default for DisplayFormat {
    fn default() -> Self {
        Self {
            resolution: Resolution::Seconds,
            cycle_width: 4,
        }
    }
}

/// Whole hours, minutes and seconds; sub-second time is truncated.
pub fn format_elapsed(elapsed: Duration, resolution: Resolution) -> String {
    let secs = elapsed.as_secs();
    let (h, m, s) = (secs / 3600, (secs / 60) % 60, secs % 60);
    match resolution {
        Resolution::Minutes => format!("{h:02}:{m:02}"),
        Resolution::Seconds => format!("{h:02}:{m:02}:{s:02}"),
    }
}

pub fn format_cycle_count(count: u64, width: usize) -> String {
    format!("{count:0width$}")
}

/// One status line, e.g. `00:01:20  cycles 0005  RUNNING  [on]`.
///
/// While purging the timer is frozen, so `PURGE` takes its place.
pub fn render_status(snap: &StatusSnapshot, fmt: &DisplayFormat) -> String {
    let st = &snap.state;
    let count = format_cycle_count(st.cycle_count, fmt.cycle_width);
    let output = if st.actuator_active { "on" } else { "off" };
    if st.mode == CycleMode::Purge {
        return format!("{}  cycles {count}  [{output}]", st.mode);
    }
    format!(
        "{}  cycles {count}  {}  [{output}]",
        format_elapsed(st.elapsed, fmt.resolution),
        st.mode,
    )
}
