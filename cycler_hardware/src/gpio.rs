//! rppal-backed banks for a Raspberry Pi.
use std::collections::HashMap;

use cycler_traits::{BoxError, DigitalInput, DigitalOutput, Level, PwmOutput};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::{debug, trace};

use crate::error::{HwError, Result};

/// Buttons and encoder lines, configured with internal pull-ups.
pub struct GpioInputs {
    pins: HashMap<u8, InputPin>,
}

impl GpioInputs {
    pub fn new(channels: &[u8]) -> Result<Self> {
        let gpio = Gpio::new()?;
        let mut pins = HashMap::with_capacity(channels.len());
        for &ch in channels {
            pins.insert(ch, gpio.get(ch)?.into_input_pullup());
        }
        debug!(?channels, "gpio inputs ready");
        Ok(Self { pins })
    }
}

impl DigitalInput for GpioInputs {
    fn read(&mut self, channel: u8) -> std::result::Result<Level, BoxError> {
        let pin = self
            .pins
            .get(&channel)
            .ok_or(HwError::UnknownChannel(channel))?;
        Ok(Level::from(pin.is_high()))
    }
}

/// Valve and other plain digital outputs; every line starts low.
pub struct GpioOutputs {
    pins: HashMap<u8, OutputPin>,
}

impl GpioOutputs {
    pub fn new(channels: &[u8]) -> Result<Self> {
        let gpio = Gpio::new()?;
        let mut pins = HashMap::with_capacity(channels.len());
        for &ch in channels {
            pins.insert(ch, gpio.get(ch)?.into_output_low());
        }
        debug!(?channels, "gpio outputs ready");
        Ok(Self { pins })
    }
}

impl DigitalOutput for GpioOutputs {
    fn write(&mut self, channel: u8, level: Level) -> std::result::Result<(), BoxError> {
        let pin = self
            .pins
            .get_mut(&channel)
            .ok_or(HwError::UnknownChannel(channel))?;
        match level {
            Level::High => pin.set_high(),
            Level::Low => pin.set_low(),
        }
        trace!(channel, ?level, "gpio write");
        Ok(())
    }
}

/// Software PWM on plain output pins (rppal drives the waveform on a thread).
pub struct SoftPwm {
    pins: HashMap<u8, OutputPin>,
    frequency_hz: f64,
}

impl SoftPwm {
    pub fn new(channels: &[u8], frequency_hz: f64) -> Result<Self> {
        let gpio = Gpio::new()?;
        let mut pins = HashMap::with_capacity(channels.len());
        for &ch in channels {
            pins.insert(ch, gpio.get(ch)?.into_output_low());
        }
        debug!(?channels, frequency_hz, "software pwm ready");
        Ok(Self { pins, frequency_hz })
    }
}

impl PwmOutput for SoftPwm {
    fn set_duty_cycle(&mut self, channel: u8, percent: f32) -> std::result::Result<(), BoxError> {
        let pin = self
            .pins
            .get_mut(&channel)
            .ok_or(HwError::UnknownChannel(channel))?;
        if percent <= 0.0 {
            pin.clear_pwm().map_err(|e| HwError::Pwm(e.to_string()))?;
            pin.set_low();
            return Ok(());
        }
        let duty = f64::from(percent.min(100.0)) / 100.0;
        pin.set_pwm_frequency(self.frequency_hz, duty)
            .map_err(|e| HwError::Pwm(e.to_string()))?;
        trace!(channel, percent, "pwm duty");
        Ok(())
    }
}
