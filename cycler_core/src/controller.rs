//! Cycle controller: the SETUP / RUNNING / PAUSED / PURGE state machine.
//!
//! The controller is clock-agnostic: every call takes the current instant, so
//! the run loop, the sampler and tests all drive the same code. Elapsed time
//! is `base + (now - origin)`; pausing folds the running span into `base`
//! and resuming starts a fresh origin, so paused time never counts.
use std::time::{Duration, Instant};

use cycler_traits::BoxError;

use crate::actuator::ActuatorCommand;
use crate::command::{Command, CommandOutcome, Verdict, validate};
use crate::config::{MAX_REPEAT_COUNT, TierTable, TimingConfig};
use crate::encoder::classify;
use crate::error::{ConfigError, CycleError, Result, StateViolation};
use crate::hw_error::hw_report;
use crate::input::Axis;
use crate::scheduler::ActuationScheduler;
use crate::state::{CycleMode, CycleState};
use crate::status::StatusSnapshot;

/// Result of one run-loop tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Not running; the run loop should exit.
    Idle,
    Running,
    /// Total duration reached; the controller is back in SETUP.
    Completed { elapsed: Duration, cycle_count: u64 },
}

pub struct CycleController {
    state: CycleState,
    base: Duration,
    origin: Option<Instant>,
    timing: TimingConfig,
    tiers: Option<TierTable>,
    duration_counter: i32,
    interval_counter: i32,
    purge_released: bool,
    scheduler: ActuationScheduler,
}

impl CycleController {
    pub fn new(timing: TimingConfig, tiers: Option<TierTable>, scheduler: ActuationScheduler) -> Self {
        Self {
            state: CycleState::baseline(),
            base: Duration::ZERO,
            origin: None,
            timing,
            tiers,
            duration_counter: 0,
            interval_counter: 0,
            purge_released: false,
            scheduler,
        }
    }

    pub fn mode(&self) -> CycleMode {
        self.state.mode
    }

    pub fn state(&self) -> CycleState {
        CycleState {
            actuator_active: self.scheduler.actuator_active(),
            ..self.state
        }
    }

    pub fn timing(&self) -> TimingConfig {
        self.timing
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state(),
            timing: self.timing,
        }
    }

    /// The command last written to the actuator.
    pub fn actuator_command(&self) -> ActuatorCommand {
        self.scheduler.command()
    }

    /// Encoder positions are tracked in every mode but only read when a run
    /// starts.
    pub fn set_encoder(&mut self, axis: Axis, counter: i32) {
        match axis {
            Axis::Duration => self.duration_counter = counter,
            Axis::Interval => self.interval_counter = counter,
        }
    }

    pub fn handle(&mut self, cmd: Command, now: Instant) -> Result<CommandOutcome> {
        let mode = self.state.mode;
        if validate(mode, &cmd) == Verdict::Reject {
            tracing::trace!(command = cmd.name(), %mode, "command ignored");
            return Ok(CommandOutcome::Ignored(StateViolation {
                state: mode,
                command: cmd.name(),
            }));
        }
        match cmd {
            Command::Go if mode == CycleMode::Paused => self.resume(now),
            Command::Go => self.start(now),
            Command::Pause => self.pause(now),
            Command::Stop { reset } => self.stop(reset),
            Command::SetTotalDuration(d) => {
                self.timing.total_duration = d;
                tracing::info!(total = ?d, "total duration set");
                Ok(CommandOutcome::Applied)
            }
            Command::SetActuationInterval(d) => Ok(self.set_interval(d)),
            Command::SetRepeatCount(n) => Ok(self.set_repeat(n)),
            Command::PurgeEnter => self.enter_purge(now),
            Command::PurgeRelease => self.release_purge(),
            Command::PurgeSettled => self.settle_purge(),
        }
    }

    /// Advance a running cycle to `now`.
    pub fn tick(&mut self, now: Instant) -> Result<Tick> {
        if self.state.mode != CycleMode::Running {
            return Ok(Tick::Idle);
        }
        let elapsed = self.elapsed_at(now);
        if elapsed >= self.timing.total_duration {
            let total = self.timing.total_duration;
            self.state.elapsed = total;
            self.state.cycle_count += self.scheduler.finish(total, &self.timing);
            self.leave_running(CycleMode::Setup)?;
            tracing::info!(
                cycles = self.state.cycle_count,
                elapsed = ?self.state.elapsed,
                "run complete"
            );
            return Ok(Tick::Completed {
                elapsed: self.state.elapsed,
                cycle_count: self.state.cycle_count,
            });
        }
        self.state.elapsed = elapsed;
        let step = self.scheduler.step(elapsed, &self.timing);
        let completed = self.checked(step, "stepping actuation schedule")?;
        if completed > 0 {
            self.state.cycle_count += completed;
            tracing::debug!(cycle = self.state.cycle_count, ?elapsed, "cycle complete");
        }
        Ok(Tick::Running)
    }

    /// Force the actuator safe and drop to SETUP after an external fault.
    pub fn fault(&mut self, err: &CycleError) {
        tracing::error!(error = %err, mode = %self.state.mode, "fault; forcing safe state");
        self.fail_safe();
    }

    /// Force safe and wait for any in-flight actuation task.
    pub fn shutdown(&mut self) -> Result<()> {
        self.origin = None;
        self.state.mode = CycleMode::Setup;
        let halted = self.scheduler.halt();
        self.scheduler.join();
        halted.map_err(|e| hw_report(&*e, "forcing actuator safe on shutdown"))
    }

    fn elapsed_at(&self, now: Instant) -> Duration {
        match self.origin {
            Some(origin) => self.base + now.saturating_duration_since(origin),
            None => self.base,
        }
    }

    fn start(&mut self, now: Instant) -> Result<CommandOutcome> {
        let mut interval = self.timing.actuation_interval;
        if let Some(tiers) = self.tiers {
            if let Some(durations) = tiers.duration {
                let tier = classify(self.duration_counter, tiers.threshold);
                self.timing.total_duration = durations.select(tier);
                tracing::debug!(?tier, total = ?self.timing.total_duration, "duration tier");
            }
            if let Some(intervals) = tiers.interval {
                let tier = classify(self.interval_counter, tiers.threshold);
                tracing::debug!(?tier, "interval tier");
                interval = intervals.select(tier);
            }
        }
        // The repeat count may have changed since the interval was set.
        let outcome = self.set_interval(interval);
        self.base = Duration::ZERO;
        self.origin = Some(now);
        self.state = CycleState {
            mode: CycleMode::Running,
            ..CycleState::baseline()
        };
        self.scheduler.begin();
        tracing::info!(
            total = ?self.timing.total_duration,
            interval = ?self.timing.actuation_interval,
            repeat = self.timing.repeat_count,
            "run started"
        );
        Ok(outcome)
    }

    fn pause(&mut self, now: Instant) -> Result<CommandOutcome> {
        self.base = self.elapsed_at(now);
        self.state.elapsed = self.base;
        self.leave_running(CycleMode::Paused)?;
        tracing::info!(elapsed = ?self.base, "paused");
        Ok(CommandOutcome::Applied)
    }

    fn resume(&mut self, now: Instant) -> Result<CommandOutcome> {
        self.origin = Some(now);
        self.state.mode = CycleMode::Running;
        tracing::info!(elapsed = ?self.base, "resumed");
        Ok(CommandOutcome::Applied)
    }

    fn stop(&mut self, reset: bool) -> Result<CommandOutcome> {
        let was = self.state.mode;
        // Later chord release and settle events are ignored in SETUP.
        self.purge_released = true;
        self.leave_running(CycleMode::Setup)?;
        if reset || was == CycleMode::Purge {
            self.reset_counters();
        }
        if was != CycleMode::Setup {
            tracing::info!(from = %was, reset, "stopped");
        }
        Ok(CommandOutcome::Applied)
    }

    fn set_interval(&mut self, requested: Duration) -> CommandOutcome {
        let minimum = self.timing.minimum_interval();
        if requested < minimum {
            self.timing.actuation_interval = minimum;
            tracing::warn!(?requested, ?minimum, "actuation interval clamped to minimum");
            return CommandOutcome::Clamped(ConfigError::IntervalBelowMinimum { requested, minimum });
        }
        self.timing.actuation_interval = requested;
        tracing::info!(interval = ?requested, hold = ?self.timing.hold_time(), "actuation interval set");
        CommandOutcome::Applied
    }

    fn set_repeat(&mut self, requested: u32) -> CommandOutcome {
        if requested > MAX_REPEAT_COUNT {
            self.timing.repeat_count = MAX_REPEAT_COUNT;
            tracing::warn!(requested, maximum = MAX_REPEAT_COUNT, "repeat count clamped to maximum");
            return CommandOutcome::Clamped(ConfigError::RepeatAboveMaximum {
                requested,
                maximum: MAX_REPEAT_COUNT,
            });
        }
        self.timing.repeat_count = requested;
        tracing::info!(repeat = requested, hold = ?self.timing.hold_time(), "repeat count set");
        CommandOutcome::Applied
    }

    fn enter_purge(&mut self, now: Instant) -> Result<CommandOutcome> {
        if self.state.mode == CycleMode::Running {
            self.base = self.elapsed_at(now);
            self.state.elapsed = self.base;
        }
        self.origin = None;
        self.purge_released = false;
        self.state.mode = CycleMode::Purge;
        let forced = self.scheduler.force(ActuatorCommand::Open);
        self.checked(forced, "opening actuator for purge")?;
        tracing::info!("purge");
        Ok(CommandOutcome::Applied)
    }

    fn release_purge(&mut self) -> Result<CommandOutcome> {
        if !self.purge_released {
            self.purge_released = true;
            let halted = self.scheduler.halt();
            self.checked(halted, "closing actuator after purge")?;
            tracing::debug!("purge released; settling");
        }
        Ok(CommandOutcome::Applied)
    }

    fn settle_purge(&mut self) -> Result<CommandOutcome> {
        self.release_purge()?;
        self.state.mode = CycleMode::Setup;
        self.reset_counters();
        tracing::info!("purge settled");
        Ok(CommandOutcome::Applied)
    }

    fn reset_counters(&mut self) {
        self.base = Duration::ZERO;
        self.state.elapsed = Duration::ZERO;
        self.state.cycle_count = 0;
    }

    /// Every exit from RUNNING or PURGE goes through here.
    fn leave_running(&mut self, to: CycleMode) -> Result<()> {
        self.origin = None;
        self.state.mode = to;
        let halted = self.scheduler.halt();
        self.checked(halted, "forcing actuator safe")
    }

    fn fail_safe(&mut self) {
        self.origin = None;
        self.state.mode = CycleMode::Setup;
        if let Err(e) = self.scheduler.halt() {
            tracing::error!(error = %e, "actuator did not accept safe command");
        }
    }

    /// A failed hardware call forces the safe state, drops to SETUP and
    /// surfaces as a typed `CycleError`.
    fn checked<T>(&mut self, r: std::result::Result<T, BoxError>, context: &'static str) -> Result<T> {
        match r {
            Ok(v) => Ok(v),
            Err(e) => {
                let report = hw_report(&*e, context);
                tracing::error!(error = %e, context, "hardware fault; forcing safe state");
                self.fail_safe();
                Err(report)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ActuationMode;
    use crate::mocks::RecordingActuator;
    use cycler_traits::MonotonicClock;
    use std::sync::Arc;

    fn valve_controller(timing: TimingConfig) -> (CycleController, RecordingActuator) {
        let recorder = RecordingActuator::new("valve");
        let sched = ActuationScheduler::new(
            ActuationMode::Valve,
            Box::new(recorder.clone()),
            Arc::new(MonotonicClock::new()),
        );
        (CycleController::new(timing, None, sched), recorder)
    }

    #[test]
    fn hardware_fault_on_tick_drops_to_setup() {
        let (mut c, recorder) = valve_controller(TimingConfig::default());
        let t0 = Instant::now();
        c.handle(Command::Go, t0).unwrap();
        recorder.fail_writes(true);
        let err = c.tick(t0).expect_err("write fails");
        assert!(matches!(
            err.downcast_ref::<CycleError>(),
            Some(CycleError::HardwareFault(_))
        ));
        assert_eq!(c.mode(), CycleMode::Setup);
    }

    #[test]
    fn repeated_go_is_idempotent() {
        let (mut c, _) = valve_controller(TimingConfig::default());
        let t0 = Instant::now();
        assert_eq!(c.handle(Command::Go, t0).unwrap(), CommandOutcome::Applied);
        let again = c.handle(Command::Go, t0 + Duration::from_millis(5)).unwrap();
        assert!(matches!(again, CommandOutcome::Ignored(v) if v.state == CycleMode::Running));
        c.tick(t0 + Duration::from_millis(500)).unwrap();
        assert_eq!(c.state().elapsed, Duration::from_millis(500));
    }
}
