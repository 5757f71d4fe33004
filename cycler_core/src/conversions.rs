//! `From` implementations bridging `cycler_config` types to `cycler_core` types.

use crate::config::{
    ActuationMode, ChewProfile, EncoderPins, InputCfg, InputPins, MAX_REPEAT_COUNT, MachineCfg,
    TierTable, TimingConfig,
};
use crate::encoder::TierValues;
use crate::format::{DisplayFormat, Resolution};
use crate::util::{period_ms, secs_f64};
use std::time::Duration;

// ── Actuation ────────────────────────────────────────────────────────────────

impl From<&cycler_config::Actuator> for ActuationMode {
    fn from(a: &cycler_config::Actuator) -> Self {
        match a.kind {
            cycler_config::ActuatorKind::Valve => ActuationMode::Valve,
            cycler_config::ActuatorKind::Motor => ActuationMode::Chew(ChewProfile {
                initial_wait: secs_f64(a.initial_wait_s),
                forward: secs_f64(a.forward_s),
                backward: secs_f64(a.backward_s),
                settle: secs_f64(a.settle_s),
                speed_pct: a.speed_pct,
            }),
        }
    }
}

// ── TimingConfig ─────────────────────────────────────────────────────────────

impl From<&cycler_config::Config> for TimingConfig {
    fn from(c: &cycler_config::Config) -> Self {
        let mode = ActuationMode::from(&c.actuator);
        Self {
            total_duration: Duration::from_secs(c.timing.total_duration_s),
            actuation_interval: secs_f64(c.timing.actuation_interval_s),
            repeat_count: c.timing.repeat_count.min(MAX_REPEAT_COUNT),
            fixed_overhead: mode.fixed_overhead(),
            repeat_overhead: mode.repeat_overhead(),
            safety_margin: secs_f64(c.timing.safety_margin_s),
        }
    }
}

// ── Inputs ───────────────────────────────────────────────────────────────────

fn encoder_pins(clk: Option<u8>, dt: Option<u8>) -> Option<EncoderPins> {
    Some(EncoderPins { clk: clk?, dt: dt? })
}

impl From<&cycler_config::Pins> for InputPins {
    fn from(p: &cycler_config::Pins) -> Self {
        Self {
            stop: p.stop,
            go: p.go,
            pause: p.pause,
            duration: encoder_pins(p.duration_clk, p.duration_dt),
            interval: encoder_pins(p.interval_clk, p.interval_dt),
        }
    }
}

impl From<&cycler_config::Config> for InputCfg {
    fn from(c: &cycler_config::Config) -> Self {
        Self {
            active_low: c.inputs.active_low,
            poll: period_ms(c.inputs.poll_ms),
            purge_settle: Duration::from_millis(c.inputs.purge_settle_ms),
            encoder_bound: c.encoder.bound,
        }
    }
}

// ── Tiers ────────────────────────────────────────────────────────────────────

impl TierTable {
    /// Tier lookup for the wired encoders, `None` when tiers are disabled or
    /// no encoder is wired.
    pub fn from_config(c: &cycler_config::Config) -> Option<Self> {
        if !c.tiers.enabled {
            return None;
        }
        let pins = InputPins::from(&c.pins);
        let d = &c.tiers.duration_s;
        let i = &c.tiers.interval_s;
        let table = Self {
            threshold: c.encoder.threshold,
            duration: pins.duration.map(|_| TierValues {
                low: Duration::from_secs(d.low),
                mid: Duration::from_secs(d.mid),
                high: Duration::from_secs(d.high),
            }),
            interval: pins.interval.map(|_| TierValues {
                low: secs_f64(i.low),
                mid: secs_f64(i.mid),
                high: secs_f64(i.high),
            }),
        };
        (table.duration.is_some() || table.interval.is_some()).then_some(table)
    }
}

// ── Machine ──────────────────────────────────────────────────────────────────

impl From<&cycler_config::Config> for MachineCfg {
    fn from(c: &cycler_config::Config) -> Self {
        Self {
            pins: InputPins::from(&c.pins),
            inputs: InputCfg::from(c),
            tiers: TierTable::from_config(c),
            timing: TimingConfig::from(c),
            mode: ActuationMode::from(&c.actuator),
            tick: period_ms(c.runner.tick_ms),
            refresh: period_ms(c.display.refresh_ms),
        }
    }
}

// ── Display ──────────────────────────────────────────────────────────────────

impl From<cycler_config::Resolution> for Resolution {
    fn from(r: cycler_config::Resolution) -> Self {
        match r {
            cycler_config::Resolution::Minutes => Resolution::Minutes,
            cycler_config::Resolution::Seconds => Resolution::Seconds,
        }
    }
}

impl From<&cycler_config::Display> for DisplayFormat {
    fn from(d: &cycler_config::Display) -> Self {
        Self {
            resolution: d.resolution.into(),
            cycle_width: d.cycle_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROTOTYPE: &str = r#"
[pins]
stop = 26
go = 16
duration_clk = 22
duration_dt = 23
valve = 6
"#;

    #[test]
    fn tiers_only_cover_wired_encoders() {
        let cfg = cycler_config::load_toml(PROTOTYPE).expect("parse");
        let table = TierTable::from_config(&cfg).expect("duration encoder wired");
        assert_eq!(table.threshold, 10);
        assert_eq!(
            table.duration.map(|t| t.low),
            Some(Duration::from_secs(120))
        );
        assert!(table.interval.is_none());
    }

    #[test]
    fn disabled_tiers_yield_none() {
        let text = format!("{PROTOTYPE}\n[tiers]\nenabled = false\n");
        let cfg = cycler_config::load_toml(&text).expect("parse");
        assert!(TierTable::from_config(&cfg).is_none());
    }

    #[test]
    fn motor_overhead_flows_into_timing() {
        let cfg = cycler_config::load_toml(
            r#"
[pins]
stop = 16
go = 1
motor_forward = 12
motor_backward = 13

[actuator]
kind = "motor"
settle_s = 0.5
"#,
        )
        .expect("parse");
        let timing = TimingConfig::from(&cfg);
        assert_eq!(timing.fixed_overhead, Duration::from_millis(1_500));
        assert_eq!(timing.repeat_overhead, Duration::from_secs(1));
        // Two repetitions by default.
        assert_eq!(timing.overhead(), Duration::from_millis(3_500));
        assert_eq!(timing.minimum_interval(), Duration::from_millis(4_500));
        assert!(matches!(
            MachineCfg::from(&cfg).mode,
            ActuationMode::Chew(p) if p.speed_pct == 80.0
        ));
    }
}
