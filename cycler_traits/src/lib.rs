//! Hardware boundary and clock traits for the cycle controller.
//!
//! Channels are BCM pin numbers. Implementations report failures as boxed errors
//! so the core stays independent of any particular GPIO crate.
pub mod clock;

pub use clock::{Clock, MonotonicClock};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Electrical level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[inline]
    pub fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    #[inline]
    pub fn is_low(self) -> bool {
        matches!(self, Level::Low)
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

pub trait DigitalInput {
    fn read(&mut self, channel: u8) -> Result<Level, BoxError>;
}

pub trait DigitalOutput {
    fn write(&mut self, channel: u8, level: Level) -> Result<(), BoxError>;
}

pub trait PwmOutput {
    /// Duty cycle in percent, 0.0..=100.0.
    fn set_duty_cycle(&mut self, channel: u8, percent: f32) -> Result<(), BoxError>;
}

impl<T: DigitalInput + ?Sized> DigitalInput for Box<T> {
    fn read(&mut self, channel: u8) -> Result<Level, BoxError> {
        (**self).read(channel)
    }
}

impl<T: DigitalOutput + ?Sized> DigitalOutput for Box<T> {
    fn write(&mut self, channel: u8, level: Level) -> Result<(), BoxError> {
        (**self).write(channel, level)
    }
}

impl<T: PwmOutput + ?Sized> PwmOutput for Box<T> {
    fn set_duty_cycle(&mut self, channel: u8, percent: f32) -> Result<(), BoxError> {
        (**self).set_duty_cycle(channel, percent)
    }
}
