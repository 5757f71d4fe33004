//! Concrete GPIO banks behind the `cycler_traits` boundary.
//!
//! Host builds get the simulated banks only; `--features hardware` on Linux adds
//! the rppal-backed banks.
pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;

pub use sim::{SimInputs, SimOutputs, SimPwm};
