#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the cycle controller.
//!
//! `Config` and its sections are deserialized from TOML and checked by
//! `Config::validate()`. Only `[pins]` is mandatory; every other section has
//! defaults matching the bench prototype.
use eyre::WrapErr;
use serde::Deserialize;

/// Upper bound on forward/backward repetitions per chew.
pub const MAX_REPEAT_COUNT: u32 = 10;

#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    pub stop: u8,
    pub go: u8,
    pub pause: Option<u8>,
    /// Encoder selecting the total duration tier.
    pub duration_clk: Option<u8>,
    pub duration_dt: Option<u8>,
    /// Encoder selecting the actuation interval tier.
    pub interval_clk: Option<u8>,
    pub interval_dt: Option<u8>,
    pub valve: Option<u8>,
    pub motor_forward: Option<u8>,
    pub motor_backward: Option<u8>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Inputs {
    /// Treat low level as pressed when true
    pub active_low: bool,
    /// Sampler period in milliseconds
    pub poll_ms: u64,
    /// Quiet period after a purge chord is released
    pub purge_settle_ms: u64,
}

impl Default for Inputs {
    fn default() -> Self {
        Self {
            active_low: true,
            poll_ms: 5,
            purge_settle_ms: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Encoder {
    /// Counter wraps to 0 when it reaches +/- bound
    pub bound: i32,
    /// Tier threshold; see `cycler_core::encoder::classify`
    pub threshold: i32,
}

impl Default for Encoder {
    fn default() -> Self {
        Self {
            bound: 40,
            threshold: 10,
        }
    }
}

/// Three values indexed by encoder tier.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct TierSet<T> {
    pub low: T,
    pub mid: T,
    pub high: T,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Tiers {
    /// Select duration/interval from the encoders when a run starts
    pub enabled: bool,
    pub duration_s: TierSet<u64>,
    pub interval_s: TierSet<f64>,
}

impl Default for Tiers {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_s: TierSet {
                low: 120,
                mid: 60,
                high: 10,
            },
            interval_s: TierSet {
                low: 1.0,
                mid: 2.0,
                high: 3.0,
            },
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Timing {
    pub total_duration_s: u64,
    pub actuation_interval_s: f64,
    pub repeat_count: u32,
    /// Added to the fixed overhead to get the minimum accepted interval
    pub safety_margin_s: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            total_duration_s: 600,
            actuation_interval_s: 3.0,
            repeat_count: 2,
            safety_margin_s: 1.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    #[default]
    Valve,
    Motor,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Actuator {
    pub kind: ActuatorKind,
    pub initial_wait_s: f64,
    pub forward_s: f64,
    pub backward_s: f64,
    pub settle_s: f64,
    /// Motor duty cycle while moving, percent
    pub speed_pct: f32,
    pub pwm_hz: f64,
}

impl Default for Actuator {
    fn default() -> Self {
        Self {
            kind: ActuatorKind::Valve,
            initial_wait_s: 1.0,
            forward_s: 0.5,
            backward_s: 0.5,
            settle_s: 0.0,
            speed_pct: 80.0,
            pwm_hz: 1000.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Runner {
    /// Controller run-loop period in milliseconds
    pub tick_ms: u64,
}

impl Default for Runner {
    fn default() -> Self {
        Self { tick_ms: 10 }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Minutes,
    #[default]
    Seconds,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Display {
    pub refresh_ms: u64,
    /// "minutes" renders HH:MM, "seconds" renders HH:MM:SS
    pub resolution: Resolution,
    pub cycle_width: usize,
}

impl Default for Display {
    fn default() -> Self {
        Self {
            refresh_ms: 200,
            resolution: Resolution::Seconds,
            cycle_width: 4,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub inputs: Inputs,
    #[serde(default)]
    pub encoder: Encoder,
    #[serde(default)]
    pub tiers: Tiers,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default)]
    pub actuator: Actuator,
    #[serde(default)]
    pub runner: Runner,
    #[serde(default)]
    pub display: Display,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = load_toml(&text).wrap_err_with(|| format!("parse config {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
    Ok(cfg)
}

fn positive_secs(v: f64) -> bool {
    v.is_finite() && v > 0.0
}

fn non_negative_secs(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

impl Actuator {
    /// Time per cycle spent outside the computed holds for `repeat`
    /// forward/backward pairs, in seconds.
    pub fn fixed_overhead_s(&self, repeat: u32) -> f64 {
        match self.kind {
            ActuatorKind::Valve => 0.0,
            ActuatorKind::Motor => {
                self.initial_wait_s
                    + f64::from(repeat) * (self.forward_s + self.backward_s)
                    + self.settle_s
            }
        }
    }
}

impl Config {
    /// Smallest actuation interval the controller will accept, in seconds.
    pub fn minimum_interval_s(&self) -> f64 {
        self.actuator.fixed_overhead_s(self.timing.repeat_count) + self.timing.safety_margin_s
    }

    /// Every input channel the sampler polls.
    pub fn input_channels(&self) -> Vec<u8> {
        let p = &self.pins;
        let mut v = vec![p.stop, p.go];
        v.extend(
            [
                p.pause,
                p.duration_clk,
                p.duration_dt,
                p.interval_clk,
                p.interval_dt,
            ]
            .into_iter()
            .flatten(),
        );
        v
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        if self.pins.stop == self.pins.go {
            eyre::bail!("pins.stop and pins.go must differ");
        }
        if self.pins.duration_clk.is_some() != self.pins.duration_dt.is_some() {
            eyre::bail!("pins.duration_clk and pins.duration_dt must be set together");
        }
        if self.pins.interval_clk.is_some() != self.pins.interval_dt.is_some() {
            eyre::bail!("pins.interval_clk and pins.interval_dt must be set together");
        }
        match self.actuator.kind {
            ActuatorKind::Valve => {
                if self.pins.valve.is_none() {
                    eyre::bail!("pins.valve is required when actuator.kind = \"valve\"");
                }
            }
            ActuatorKind::Motor => {
                if self.pins.motor_forward.is_none() || self.pins.motor_backward.is_none() {
                    eyre::bail!(
                        "pins.motor_forward and pins.motor_backward are required when actuator.kind = \"motor\""
                    );
                }
            }
        }

        // Inputs
        if !(1..=9).contains(&self.inputs.poll_ms) {
            eyre::bail!("inputs.poll_ms must be in [1, 9]");
        }
        if self.inputs.purge_settle_ms > 10_000 {
            eyre::bail!("inputs.purge_settle_ms is unreasonably large (>10s)");
        }

        // Encoder
        if self.encoder.bound <= 0 {
            eyre::bail!("encoder.bound must be > 0");
        }
        if self.encoder.threshold <= 0 || self.encoder.threshold >= self.encoder.bound {
            eyre::bail!("encoder.threshold must be in (0, encoder.bound)");
        }

        // Tiers
        let d = &self.tiers.duration_s;
        if d.low == 0 || d.mid == 0 || d.high == 0 {
            eyre::bail!("tiers.duration_s values must be > 0");
        }
        let i = &self.tiers.interval_s;
        if !(positive_secs(i.low) && positive_secs(i.mid) && positive_secs(i.high)) {
            eyre::bail!("tiers.interval_s values must be > 0");
        }

        // Timing
        if self.timing.total_duration_s == 0 {
            eyre::bail!("timing.total_duration_s must be > 0");
        }
        if self.timing.total_duration_s > 24 * 60 * 60 {
            eyre::bail!("timing.total_duration_s is unreasonably large (>24h)");
        }
        if !positive_secs(self.timing.actuation_interval_s) {
            eyre::bail!("timing.actuation_interval_s must be > 0");
        }
        if !non_negative_secs(self.timing.safety_margin_s) {
            eyre::bail!("timing.safety_margin_s must be >= 0");
        }
        if self.timing.repeat_count > MAX_REPEAT_COUNT {
            eyre::bail!("timing.repeat_count must be <= {MAX_REPEAT_COUNT}");
        }

        // Actuator
        let a = &self.actuator;
        if !(non_negative_secs(a.initial_wait_s)
            && non_negative_secs(a.forward_s)
            && non_negative_secs(a.backward_s)
            && non_negative_secs(a.settle_s))
        {
            eyre::bail!("actuator phase durations must be >= 0");
        }
        if !(a.speed_pct > 0.0 && a.speed_pct <= 100.0) {
            eyre::bail!("actuator.speed_pct must be in (0, 100]");
        }
        if !positive_secs(a.pwm_hz) {
            eyre::bail!("actuator.pwm_hz must be > 0");
        }

        // Runner / display cadences: sampler < run loop <= display
        if self.runner.tick_ms == 0 {
            eyre::bail!("runner.tick_ms must be >= 1");
        }
        if self.display.refresh_ms <= self.inputs.poll_ms {
            eyre::bail!("display.refresh_ms must be greater than inputs.poll_ms");
        }
        if self.display.cycle_width == 0 || self.display.cycle_width > 12 {
            eyre::bail!("display.cycle_width must be in [1, 12]");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[pins]
stop = 26
go = 16
valve = 6
"#;

    #[test]
    fn minimal_config_uses_prototype_defaults() {
        let cfg = load_toml(MINIMAL).expect("parse");
        cfg.validate().expect("valid");
        assert_eq!(cfg.encoder.bound, 40);
        assert_eq!(cfg.encoder.threshold, 10);
        assert_eq!(cfg.tiers.duration_s.low, 120);
        assert_eq!(cfg.tiers.interval_s.high, 3.0);
        assert_eq!(cfg.inputs.purge_settle_ms, 200);
        assert_eq!(cfg.display.refresh_ms, 200);
        assert_eq!(cfg.actuator.kind, ActuatorKind::Valve);
    }

    #[test]
    fn motor_overhead_sums_fixed_phases() {
        let cfg = load_toml(
            r#"
[pins]
stop = 16
go = 1
motor_forward = 12
motor_backward = 13

[actuator]
kind = "motor"
"#,
        )
        .expect("parse");
        cfg.validate().expect("valid");
        // 1 s initial wait plus two 0.5 s + 0.5 s repetitions.
        assert!((cfg.actuator.fixed_overhead_s(2) - 3.0).abs() < 1e-9);
        assert!((cfg.actuator.fixed_overhead_s(1) - 2.0).abs() < 1e-9);
        assert!((cfg.minimum_interval_s() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn repeat_count_is_bounded() {
        let at_max = format!("{MINIMAL}\n[timing]\nrepeat_count = {MAX_REPEAT_COUNT}\n");
        load_toml(&at_max).expect("parse").validate().expect("valid");

        let huge = format!("{MINIMAL}\n[timing]\nrepeat_count = 4294967295\n");
        let err = load_toml(&huge).expect("parse").validate().unwrap_err();
        assert!(err.to_string().contains("timing.repeat_count"), "{err}");
    }

    #[test]
    fn input_channels_skip_unset_pins() {
        let cfg = load_toml(MINIMAL).expect("parse");
        assert_eq!(cfg.input_channels(), vec![26, 16]);
    }
}
