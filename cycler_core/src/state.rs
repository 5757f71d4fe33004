//! Cycle state shared by the controller, the run loop and the status publisher.
use std::fmt;
use std::time::Duration;

/// Top-level controller mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CycleMode {
    #[default]
    Setup,
    Running,
    Paused,
    Purge,
}

impl CycleMode {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            CycleMode::Setup => "SETUP",
            CycleMode::Running => "RUNNING",
            CycleMode::Paused => "PAUSED",
            CycleMode::Purge => "PURGE",
        }
    }
}

impl fmt::Display for CycleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mode plus the counters the display needs. `Copy` so a reader always holds
/// one coherent value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleState {
    pub mode: CycleMode,
    pub elapsed: Duration,
    pub cycle_count: u64,
    pub actuator_active: bool,
}

impl CycleState {
    /// SETUP with every counter at zero.
    pub fn baseline() -> Self {
        Self::default()
    }
}
