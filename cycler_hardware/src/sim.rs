//! Simulated GPIO banks for host builds and tests.
//!
//! Every bank is a cheap handle over shared state, so a test can keep a clone
//! to press buttons or inspect what the controller wrote.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cycler_traits::{BoxError, DigitalInput, DigitalOutput, Level, PwmOutput};

use crate::error::HwError;

/// Input bank with pull-ups: unset channels read `High`.
#[derive(Debug, Clone, Default)]
pub struct SimInputs {
    levels: Arc<Mutex<HashMap<u8, Level>>>,
    fail: Arc<AtomicBool>,
}

impl SimInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, channel: u8, level: Level) {
        let mut levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        levels.insert(channel, level);
    }

    /// Drive an active-low button line low.
    pub fn press(&self, channel: u8) {
        self.set(channel, Level::Low);
    }

    pub fn release(&self, channel: u8) {
        self.set(channel, Level::High);
    }

    /// Make every subsequent read fail until cleared.
    pub fn fail_reads(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

impl DigitalInput for SimInputs {
    fn read(&mut self, channel: u8) -> Result<Level, BoxError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Injected(channel)));
        }
        let levels = self.levels.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(levels.get(&channel).copied().unwrap_or(Level::High))
    }
}

/// Output bank that records the current level and the full write history.
#[derive(Debug, Clone, Default)]
pub struct SimOutputs {
    inner: Arc<Mutex<OutputLog>>,
    fail: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct OutputLog {
    levels: HashMap<u8, Level>,
    history: Vec<(u8, Level)>,
}

impl SimOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// A bank whose writes always fail.
    pub fn failing() -> Self {
        let out = Self::default();
        out.fail_writes(true);
        out
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    /// Last level written to `channel`, `Low` if never written.
    pub fn level(&self, channel: u8) -> Level {
        let log = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        log.levels.get(&channel).copied().unwrap_or(Level::Low)
    }

    pub fn history(&self) -> Vec<(u8, Level)> {
        let log = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        log.history.clone()
    }
}

impl DigitalOutput for SimOutputs {
    fn write(&mut self, channel: u8, level: Level) -> Result<(), BoxError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Injected(channel)));
        }
        let mut log = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        log.levels.insert(channel, level);
        log.history.push((channel, level));
        tracing::trace!(channel, ?level, "sim output write");
        Ok(())
    }
}

/// PWM bank that records duty cycles per channel.
#[derive(Debug, Clone, Default)]
pub struct SimPwm {
    inner: Arc<Mutex<PwmLog>>,
    fail: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct PwmLog {
    duty: HashMap<u8, f32>,
    history: Vec<(u8, f32)>,
}

impl SimPwm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    /// Current duty cycle on `channel`, 0.0 if never set.
    pub fn duty(&self, channel: u8) -> f32 {
        let log = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        log.duty.get(&channel).copied().unwrap_or(0.0)
    }

    pub fn history(&self) -> Vec<(u8, f32)> {
        let log = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        log.history.clone()
    }
}

impl PwmOutput for SimPwm {
    fn set_duty_cycle(&mut self, channel: u8, percent: f32) -> Result<(), BoxError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Injected(channel)));
        }
        if !(0.0..=100.0).contains(&percent) {
            return Err(Box::new(HwError::Pwm(format!(
                "duty {percent} out of range on channel {channel}"
            ))));
        }
        let mut log = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        log.duty.insert(channel, percent);
        log.history.push((channel, percent));
        Ok(())
    }
}
