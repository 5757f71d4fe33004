//! Operator commands and the single table that decides whether a command
//! applies in a given mode.
use std::time::Duration;

use crate::error::{ConfigError, StateViolation};
use crate::state::CycleMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Start from SETUP or resume from PAUSED.
    Go,
    Pause,
    /// Return to SETUP from any mode. `reset` also zeroes elapsed time and
    /// the cycle count; stopping a purge always does.
    Stop { reset: bool },
    SetTotalDuration(Duration),
    SetActuationInterval(Duration),
    SetRepeatCount(u32),
    /// Stop and go held together.
    PurgeEnter,
    /// The purge chord was released.
    PurgeRelease,
    /// The post-purge quiet period elapsed.
    PurgeSettled,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Go => "go",
            Command::Pause => "pause",
            Command::Stop { .. } => "stop",
            Command::SetTotalDuration(_) => "set_total_duration",
            Command::SetActuationInterval(_) => "set_actuation_interval",
            Command::SetRepeatCount(_) => "set_repeat_count",
            Command::PurgeEnter => "purge_enter",
            Command::PurgeRelease => "purge_release",
            Command::PurgeSettled => "purge_settled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

/// Whether `cmd` has an effect in `mode`. Every transition goes through here.
pub fn validate(mode: CycleMode, cmd: &Command) -> Verdict {
    use CycleMode::{Paused, Purge, Running, Setup};
    let ok = match cmd {
        Command::Go => matches!(mode, Setup | Paused),
        Command::Pause => mode == Running,
        Command::Stop { .. } => true,
        Command::SetTotalDuration(_)
        | Command::SetActuationInterval(_)
        | Command::SetRepeatCount(_) => mode == Setup,
        Command::PurgeEnter => mode != Purge,
        Command::PurgeRelease | Command::PurgeSettled => mode == Purge,
    };
    if ok { Verdict::Accept } else { Verdict::Reject }
}

/// What became of a submitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Applied,
    /// Applied with a value clamped into its allowed range.
    Clamped(ConfigError),
    /// No effect in the current mode.
    Ignored(StateViolation),
}

impl CommandOutcome {
    pub fn is_applied(&self) -> bool {
        !matches!(self, CommandOutcome::Ignored(_))
    }
}
