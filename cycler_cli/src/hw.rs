//! Builds the input bank and actuator for the configured actuator kind.
//!
//! Host builds get simulated banks; `--features hardware` on Linux opens the
//! real GPIO lines.

use cycler_config::{ActuatorKind, Config};
use cycler_core::actuator::{Actuator, Motor, Valve};
use cycler_traits::DigitalInput;
use eyre::Result;

pub type Inputs = Box<dyn DigitalInput + Send>;

fn valve_pin(cfg: &Config) -> Result<u8> {
    cfg.pins
        .valve
        .ok_or_else(|| eyre::eyre!("invalid configuration: pins.valve is missing"))
}

fn motor_pins(cfg: &Config) -> Result<(u8, u8)> {
    match (cfg.pins.motor_forward, cfg.pins.motor_backward) {
        (Some(f), Some(b)) => Ok((f, b)),
        _ => eyre::bail!("invalid configuration: pins.motor_forward/motor_backward are missing"),
    }
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn assemble(cfg: &Config) -> Result<(Inputs, Box<dyn Actuator>)> {
    use cycler_core::error::Report;
    use cycler_core::hw_error::map_hw_error;
    use cycler_hardware::gpio::{GpioInputs, GpioOutputs, SoftPwm};

    let hw = |e: cycler_hardware::error::HwError, what: &'static str| {
        Report::new(map_hw_error(&e)).wrap_err(what)
    };

    let inputs =
        GpioInputs::new(&cfg.input_channels()).map_err(|e| hw(e, "open input pins"))?;
    let actuator: Box<dyn Actuator> = match cfg.actuator.kind {
        ActuatorKind::Valve => {
            let pin = valve_pin(cfg)?;
            let out = GpioOutputs::new(&[pin]).map_err(|e| hw(e, "open valve pin"))?;
            Box::new(Valve::new(out, pin))
        }
        ActuatorKind::Motor => {
            let (f, b) = motor_pins(cfg)?;
            let pwm = SoftPwm::new(&[f, b], cfg.actuator.pwm_hz)
                .map_err(|e| hw(e, "open motor pins"))?;
            Box::new(Motor::new(pwm, f, b, cfg.actuator.speed_pct))
        }
    };
    Ok((Box::new(inputs), actuator))
}

/// `CYCLER_TEST_SIM_FAULT=1` makes every simulated output write fail.
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn assemble(cfg: &Config) -> Result<(Inputs, Box<dyn Actuator>)> {
    use cycler_hardware::{SimInputs, SimOutputs, SimPwm};

    let fault = std::env::var("CYCLER_TEST_SIM_FAULT").is_ok_and(|v| v == "1");
    if fault {
        tracing::warn!("simulated outputs will fail every write");
    }
    let actuator: Box<dyn Actuator> = match cfg.actuator.kind {
        ActuatorKind::Valve => {
            let out = if fault { SimOutputs::failing() } else { SimOutputs::new() };
            Box::new(Valve::new(out, valve_pin(cfg)?))
        }
        ActuatorKind::Motor => {
            let (f, b) = motor_pins(cfg)?;
            let pwm = SimPwm::new();
            pwm.fail_writes(fault);
            Box::new(Motor::new(pwm, f, b, cfg.actuator.speed_pct))
        }
    };
    Ok((Box::new(SimInputs::new()), actuator))
}
