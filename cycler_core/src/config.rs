//! Runtime configuration types for the cycle controller.
//!
//! These are the core's own view of the TOML schema: durations instead of
//! float seconds and optional encoder wiring folded into `Option`s.
//! See `conversions` for the mapping from `cycler_config`.
use std::time::Duration;

use crate::encoder::TierValues;

pub use cycler_config::MAX_REPEAT_COUNT;

/// Active timing parameters. Writable only in SETUP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    pub total_duration: Duration,
    pub actuation_interval: Duration,
    /// Forward/backward repetitions per chew, at most `MAX_REPEAT_COUNT`.
    pub repeat_count: u32,
    /// Time per cycle outside the holds that does not depend on the repeat count.
    pub fixed_overhead: Duration,
    /// Motion time added by each repetition.
    pub repeat_overhead: Duration,
    pub safety_margin: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            total_duration: Duration::from_secs(600),
            actuation_interval: Duration::from_secs(3),
            repeat_count: 2,
            fixed_overhead: Duration::ZERO,
            repeat_overhead: Duration::ZERO,
            safety_margin: Duration::from_secs(1),
        }
    }
}

impl TimingConfig {
    /// Everything one cycle spends outside its holds at the current repeat count.
    pub fn overhead(&self) -> Duration {
        self.fixed_overhead
            .saturating_add(self.repeat_overhead.saturating_mul(self.repeat_count))
    }

    /// Shortest interval accepted by the setters and by tier selection.
    /// A whole chew sequence fits inside it.
    #[inline]
    pub fn minimum_interval(&self) -> Duration {
        self.overhead().saturating_add(self.safety_margin)
    }

    /// Hold between chew motions for the current interval.
    pub fn hold_time(&self) -> Duration {
        crate::scheduler::hold_time(self.actuation_interval, self.overhead(), self.repeat_count)
    }
}

/// Fixed phases of one chew on a bidirectional motor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChewProfile {
    pub initial_wait: Duration,
    pub forward: Duration,
    pub backward: Duration,
    pub settle: Duration,
    /// Duty cycle while moving, percent.
    pub speed_pct: f32,
}

impl Default for ChewProfile {
    fn default() -> Self {
        Self {
            initial_wait: Duration::from_secs(1),
            forward: Duration::from_millis(500),
            backward: Duration::from_millis(500),
            settle: Duration::ZERO,
            speed_pct: 80.0,
        }
    }
}

impl ChewProfile {
    pub fn fixed_overhead(&self) -> Duration {
        self.initial_wait + self.settle
    }

    /// One forward plus one backward motion.
    pub fn repeat_overhead(&self) -> Duration {
        self.forward + self.backward
    }
}

/// How the actuation schedule drives its output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuationMode {
    /// Open for the engaged half of each interval, closed for the rest.
    Valve,
    /// One chew sequence at the start of each engaged half.
    Chew(ChewProfile),
}

impl ActuationMode {
    pub fn fixed_overhead(&self) -> Duration {
        match self {
            ActuationMode::Valve => Duration::ZERO,
            ActuationMode::Chew(p) => p.fixed_overhead(),
        }
    }

    pub fn repeat_overhead(&self) -> Duration {
        match self {
            ActuationMode::Valve => Duration::ZERO,
            ActuationMode::Chew(p) => p.repeat_overhead(),
        }
    }
}

/// Encoder-tier lookup applied when a run starts. An axis whose encoder is
/// not wired keeps the configured value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierTable {
    pub threshold: i32,
    pub duration: Option<TierValues<Duration>>,
    pub interval: Option<TierValues<Duration>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderPins {
    pub clk: u8,
    pub dt: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputPins {
    pub stop: u8,
    pub go: u8,
    pub pause: Option<u8>,
    pub duration: Option<EncoderPins>,
    pub interval: Option<EncoderPins>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputCfg {
    pub active_low: bool,
    pub poll: Duration,
    /// Inputs are ignored for this long after a purge chord is released.
    pub purge_settle: Duration,
    pub encoder_bound: i32,
}

impl Default for InputCfg {
    fn default() -> Self {
        Self {
            active_low: true,
            poll: Duration::from_millis(5),
            purge_settle: Duration::from_millis(200),
            encoder_bound: 40,
        }
    }
}

/// Everything `runner::Machine` needs to assemble the loops.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MachineCfg {
    pub pins: InputPins,
    pub inputs: InputCfg,
    pub tiers: Option<TierTable>,
    pub timing: TimingConfig,
    pub mode: ActuationMode,
    /// Run-loop period.
    pub tick: Duration,
    /// Status publisher period.
    pub refresh: Duration,
}
