#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core cycle-control logic (hardware-agnostic).
//!
//! All hardware interactions go through the `cycler_traits` input/output
//! traits and the `actuator::Actuator` seam.
//!
//! ## Architecture
//!
//! - **Encoders**: quadrature decoding and tier classification (`encoder`)
//! - **Inputs**: fast sampler thread, purge chord and settle window (`input`)
//! - **Control**: the SETUP/RUNNING/PAUSED/PURGE state machine (`controller`)
//! - **Actuation**: phase schedule, cycle counting, chew dispatch (`scheduler`)
//! - **Status**: snapshot publisher and display formatting (`status`, `format`)
//! - **Assembly**: the three loops around one shared controller (`runner`)
//!
//! A typical host run wires simulated banks from `cycler_hardware`:
//!
//! ```no_run
//! use std::sync::Arc;
//! use cycler_core::actuator::Valve;
//! use cycler_core::config::MachineCfg;
//! use cycler_core::runner::Machine;
//! use cycler_hardware::{SimInputs, SimOutputs};
//! use cycler_traits::MonotonicClock;
//!
//! # fn main() -> eyre::Result<()> {
//! let cfg = cycler_config::load_file("etc/cycler.toml".as_ref())?;
//! let machine_cfg = MachineCfg::from(&cfg);
//! let valve = Valve::new(SimOutputs::new(), cfg.pins.valve.unwrap_or(6));
//! let mut machine = Machine::start(
//!     &machine_cfg,
//!     SimInputs::new(),
//!     Box::new(valve),
//!     Arc::new(MonotonicClock::new()),
//! )?;
//! machine.handle().start()?;
//! machine.shutdown()?;
//! # Ok(())
//! # }
//! ```

pub mod actuator;
pub mod command;
pub mod config;
pub mod controller;
pub mod conversions;
pub mod encoder;
pub mod error;
pub mod format;
pub mod hw_error;
pub mod input;
pub mod mocks;
pub mod runner;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod util;

pub use actuator::{Actuator, ActuatorCommand};
pub use command::{Command, CommandOutcome};
pub use config::{ActuationMode, MachineCfg, TimingConfig};
pub use controller::{CycleController, Tick};
pub use error::{ConfigError, CycleError, Result, StateViolation};
pub use runner::{Machine, MachineEvent, MachineHandle};
pub use state::{CycleMode, CycleState};
pub use status::StatusSnapshot;
