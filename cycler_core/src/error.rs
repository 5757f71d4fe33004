use std::time::Duration;

use thiserror::Error;

use crate::state::CycleMode;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CycleError {
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("interrupted; actuators forced to safe state")]
    Interrupted,
}

/// A requested timing value that had to be clamped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("actuation interval {requested:?} is below the minimum {minimum:?}")]
    IntervalBelowMinimum {
        requested: Duration,
        minimum: Duration,
    },
    #[error("repeat count {requested} is above the maximum {maximum}")]
    RepeatAboveMaximum { requested: u32, maximum: u32 },
}

/// A command that has no defined effect in the current mode. Never raised;
/// reported back as `CommandOutcome::Ignored`.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{command} has no effect in {state}")]
pub struct StateViolation {
    pub state: CycleMode,
    pub command: &'static str,
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
