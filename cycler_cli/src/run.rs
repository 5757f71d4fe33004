//! Subcommand implementations.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel as xch;
use cycler_config::Config;
use cycler_core::actuator::Actuator;
use cycler_core::command::CommandOutcome;
use cycler_core::config::{MAX_REPEAT_COUNT, MachineCfg, TimingConfig};
use cycler_core::error::{CycleError, Report};
use cycler_core::format::{DisplayFormat, format_elapsed, render_status};
use cycler_core::hw_error::map_hw_error;
use cycler_core::runner::{Machine, MachineEvent, MachineHandle};
use cycler_core::scheduler::hold_time as compute_hold;
use cycler_core::status::StatusSnapshot;
use cycler_core::util::secs_f64;
use cycler_traits::{DigitalInput, MonotonicClock};
use eyre::{Result, WrapErr};
use serde_json::json;

use crate::cli::json_mode;
use crate::hw;

/// Setter overrides from the command line, applied while in SETUP.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub total_s: Option<u64>,
    pub interval_s: Option<f64>,
    pub repeat: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOpts {
    pub overrides: Overrides,
    pub auto_start: bool,
    pub exit_on_complete: bool,
}

fn report_outcome(what: &str, outcome: CommandOutcome) {
    match outcome {
        CommandOutcome::Applied => tracing::debug!(setting = what, "applied"),
        CommandOutcome::Clamped(e) => tracing::warn!(setting = what, "{e}; clamped"),
        CommandOutcome::Ignored(v) => tracing::warn!(setting = what, "{v}"),
    }
}

fn apply_overrides(handle: &MachineHandle, o: Overrides) -> Result<()> {
    if let Some(s) = o.total_s {
        report_outcome("total_duration", handle.set_total_duration(Duration::from_secs(s))?);
    }
    if let Some(s) = o.interval_s {
        report_outcome("actuation_interval", handle.set_actuation_interval(secs_f64(s))?);
    }
    if let Some(n) = o.repeat {
        report_outcome("repeat_count", handle.set_repeat_count(n)?);
    }
    Ok(())
}

fn print_status(snap: &StatusSnapshot, fmt: &DisplayFormat, last: &mut Option<String>) {
    if json_mode() {
        let st = &snap.state;
        println!(
            "{}",
            json!({
                "event": "status",
                "state": st.mode.as_str(),
                "elapsed_ms": st.elapsed.as_millis() as u64,
                "cycle_count": st.cycle_count,
                "actuator_active": st.actuator_active,
                "total_ms": snap.timing.total_duration.as_millis() as u64,
                "interval_ms": snap.timing.actuation_interval.as_millis() as u64,
            })
        );
        return;
    }
    let line = render_status(snap, fmt);
    if last.as_deref() != Some(line.as_str()) {
        println!("{line}");
        *last = Some(line);
    }
}

fn print_complete(elapsed: Duration, cycle_count: u64, fmt: &DisplayFormat) {
    if json_mode() {
        println!(
            "{}",
            json!({
                "event": "complete",
                "elapsed_ms": elapsed.as_millis() as u64,
                "cycle_count": cycle_count,
            })
        );
    } else {
        println!(
            "run complete: {} elapsed, {cycle_count} cycles",
            format_elapsed(elapsed, fmt.resolution)
        );
    }
}

/// Shut down after a fault; the fault itself is what the caller reports.
fn shutdown_after(machine: &mut Machine, err: CycleError) -> Report {
    if let Err(e) = machine.shutdown() {
        tracing::error!(error = %e, "cleanup after fault failed");
    }
    Report::new(err).wrap_err("run aborted")
}

pub fn run(cfg: &Config, opts: RunOpts) -> Result<()> {
    let machine_cfg = MachineCfg::from(cfg);
    let fmt = DisplayFormat::from(&cfg.display);
    let (inputs, actuator) = hw::assemble(cfg)?;

    let (sig_tx, sig_rx) = xch::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = sig_tx.try_send(());
    })
    .wrap_err("install signal handler")?;

    let mut machine = Machine::start(
        &machine_cfg,
        inputs,
        actuator,
        Arc::new(MonotonicClock::new()),
    )?;
    let handle = machine.handle();
    apply_overrides(&handle, opts.overrides)?;
    tracing::info!(
        total_ms = handle.timing().total_duration.as_millis() as u64,
        interval_ms = handle.timing().actuation_interval.as_millis() as u64,
        repeat = handle.timing().repeat_count,
        "ready"
    );
    if opts.auto_start {
        report_outcome("start", handle.start()?);
    }

    let events = machine.events().clone();
    let status = machine.status().unwrap_or_else(xch::never);
    let mut last_line = None;
    loop {
        xch::select! {
            recv(sig_rx) -> _ => {
                tracing::info!("interrupt or termination signal received");
                machine.shutdown()?;
                return Err(Report::new(CycleError::Interrupted));
            }
            recv(events) -> ev => match ev {
                Ok(MachineEvent::Completed { elapsed, cycle_count }) => {
                    print_complete(elapsed, cycle_count, &fmt);
                    if opts.exit_on_complete {
                        machine.shutdown()?;
                        return Ok(());
                    }
                }
                Ok(MachineEvent::Fault(err)) => {
                    tracing::error!(error = %err, "machine fault");
                    return Err(shutdown_after(&mut machine, err));
                }
                Err(_) => break,
            },
            recv(status) -> snap => {
                if let Ok(snap) = snap {
                    print_status(&snap, &fmt, &mut last_line);
                }
            }
        }
    }
    machine.shutdown()
}

pub fn self_check(cfg: &Config) -> Result<()> {
    let (mut inputs, mut actuator) = hw::assemble(cfg)?;
    for ch in cfg.input_channels() {
        let level = inputs
            .read(ch)
            .map_err(|e| Report::new(map_hw_error(&*e)))
            .wrap_err_with(|| format!("read input {ch}"))?;
        tracing::debug!(channel = ch, ?level, "input ok");
    }
    actuator
        .safe()
        .map_err(|e| Report::new(map_hw_error(&*e)))
        .wrap_err_with(|| format!("force {} safe", actuator.name()))?;

    if json_mode() {
        println!(
            "{}",
            json!({
                "event": "self_check",
                "ok": true,
                "actuator": actuator.name(),
                "inputs": cfg.input_channels(),
            })
        );
    } else {
        println!("self-check ok ({} safe)", actuator.name());
    }
    Ok(())
}

pub fn hold_time(cfg: &Config, interval_s: f64, repeat: u32) -> Result<()> {
    let timing = TimingConfig {
        actuation_interval: secs_f64(interval_s),
        repeat_count: repeat.min(MAX_REPEAT_COUNT),
        ..TimingConfig::from(cfg)
    };
    let repeat_clamped = timing.repeat_count != repeat;
    let minimum = timing.minimum_interval();
    let effective = timing.actuation_interval.max(minimum);
    let clamped = effective != timing.actuation_interval;
    let overhead = timing.overhead();
    let hold = compute_hold(effective, overhead, timing.repeat_count);

    if json_mode() {
        println!(
            "{}",
            json!({
                "event": "hold_time",
                "hold_ms": hold.as_millis() as u64,
                "interval_ms": effective.as_millis() as u64,
                "fixed_overhead_ms": overhead.as_millis() as u64,
                "repeat_count": timing.repeat_count,
                "clamped": clamped || repeat_clamped,
            })
        );
    } else {
        println!(
            "hold time: {:.2} s (interval {:.2} s, repeat {}, overhead {:.2} s)",
            hold.as_secs_f64(),
            effective.as_secs_f64(),
            timing.repeat_count,
            overhead.as_secs_f64()
        );
        if repeat_clamped {
            println!("note: repeat count lowered to the maximum {MAX_REPEAT_COUNT}");
        }
        if clamped {
            println!(
                "note: interval raised to the minimum {:.2} s",
                minimum.as_secs_f64()
            );
        }
    }
    Ok(())
}
