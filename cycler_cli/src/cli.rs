//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[inline]
pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "cycler", version, about = "Timed actuation cycle controller")]
pub struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE", default_value = "etc/cycler.toml")]
    pub config: PathBuf,

    /// Print status and errors as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller until Ctrl-C, completion or a hardware fault
    Run {
        /// Total run duration in seconds (applied in SETUP)
        #[arg(long, value_name = "S")]
        total_s: Option<u64>,
        /// Actuation interval in seconds; clamped to the configured minimum
        #[arg(long, value_name = "S")]
        interval_s: Option<f64>,
        /// Chew repetitions per cycle
        #[arg(long, value_name = "N")]
        repeat: Option<u32>,
        /// Issue GO right away instead of waiting for the button
        #[arg(long, action = ArgAction::SetTrue)]
        auto_start: bool,
        /// Exit once a run completes naturally
        #[arg(long, action = ArgAction::SetTrue)]
        exit_on_complete: bool,
    },
    /// Validate config, initialize hardware and force the safe state
    SelfCheck,
    /// Print the hold time for the configured motor profile
    HoldTime {
        /// Actuation interval in seconds
        #[arg(long, value_name = "S")]
        interval_s: f64,
        /// Chew repetitions per cycle
        #[arg(long, value_name = "N")]
        repeat: u32,
    },
}
