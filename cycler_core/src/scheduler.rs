//! Actuation scheduling.
//!
//! Each actuation interval is split into an engaged half followed by a
//! disengaged half. In valve mode the output simply follows the phase. In chew
//! mode a timed forward/backward sequence is dispatched once per interval on a
//! worker thread so the run loop never blocks for a physical motion.
//!
//! Cancellation is cooperative: `halt()` bumps the channel epoch and forces the
//! output safe under the driver lock. A running task checks the epoch under
//! the same lock before every write, so nothing it planned can fire after the
//! halt, and its waits are sliced so it notices promptly.
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use cycler_traits::{BoxError, Clock};

use crate::actuator::{Actuator, ActuatorCommand};
use crate::config::{ActuationMode, ChewProfile, TimingConfig};
use crate::util::round_to_centis;

/// Granularity of cancel-aware waits inside a dispatched task.
const WAIT_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Engaged,
    Disengaged,
}

/// Index of the interval containing `elapsed`.
#[inline]
pub fn period_index(elapsed: Duration, interval: Duration) -> u64 {
    if interval.is_zero() {
        return 0;
    }
    u64::try_from(elapsed.as_nanos() / interval.as_nanos()).unwrap_or(u64::MAX)
}

/// Engaged for the first half of every interval, disengaged for the second.
#[inline]
pub fn phase(elapsed: Duration, interval: Duration) -> Phase {
    let half = interval / 2;
    if half.is_zero() {
        return Phase::Engaged;
    }
    if (elapsed.as_nanos() / half.as_nanos()) % 2 == 0 {
        Phase::Engaged
    } else {
        Phase::Disengaged
    }
}

/// Hold between chew motions: `(interval - overhead) / (2 * repeat)`, floored
/// at zero and rounded to 10 ms. Zero repetitions means no holds.
pub fn hold_time(interval: Duration, fixed_overhead: Duration, repeat_count: u32) -> Duration {
    if repeat_count == 0 {
        return Duration::ZERO;
    }
    let available = interval.saturating_sub(fixed_overhead);
    round_to_centis(available / repeat_count.saturating_mul(2))
}

/// Number of engaged-to-disengaged boundaries at or before `elapsed`. The
/// boundary of period `k` sits at `k * interval + interval / 2`.
fn boundaries_through(elapsed: Duration, interval: Duration) -> u64 {
    let half = interval / 2;
    if interval.is_zero() || elapsed < half {
        return 0;
    }
    period_index(elapsed - half, interval).saturating_add(1)
}

fn is_boundary(at: Duration, interval: Duration) -> bool {
    let half = interval / 2;
    !interval.is_zero() && at >= half && (at - half).as_nanos() % interval.as_nanos() == 0
}

/// Counts engaged-to-disengaged boundaries.
///
/// Each observation reports every boundary since the previous one, so the
/// total depends only on the elapsed time reached, never on how far apart
/// the observations were.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisengageTracker {
    counted: u64,
}

impl DisengageTracker {
    pub fn reset(&mut self) {
        self.counted = 0;
    }

    /// Period indices whose boundary falls after the last observation and
    /// at or before `elapsed`.
    pub fn observe(&mut self, elapsed: Duration, interval: Duration) -> Range<u64> {
        self.advance_to(boundaries_through(elapsed, interval))
    }

    /// Same as `observe`, except a boundary exactly at `end` is left out.
    pub fn observe_before(&mut self, end: Duration, interval: Duration) -> Range<u64> {
        let through = boundaries_through(end, interval);
        let through = if is_boundary(end, interval) {
            through.saturating_sub(1)
        } else {
            through
        };
        self.advance_to(through)
    }

    /// Boundaries counted since the last reset.
    pub fn counted(&self) -> u64 {
        self.counted
    }

    fn advance_to(&mut self, through: u64) -> Range<u64> {
        let from = self.counted;
        self.counted = self.counted.max(through);
        from..self.counted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Wait(Duration),
    /// Apply the command, let it run for its carried duration, then idle.
    Move(ActuatorCommand),
}

/// One chew: initial wait, `repeat` forward/backward pairs each followed by a
/// hold, then the settle time. Zero-length waits are dropped. Steps are
/// produced on demand, so nothing is allocated per repetition.
pub fn chew_sequence(
    profile: &ChewProfile,
    hold: Duration,
    repeat: u32,
) -> impl Iterator<Item = Step> + Send + 'static {
    let p = *profile;
    let pairs = (0..repeat).flat_map(move |_| {
        [
            Step::Move(ActuatorCommand::Forward(p.forward)),
            Step::Wait(hold),
            Step::Move(ActuatorCommand::Backward(p.backward)),
            Step::Wait(hold),
        ]
    });
    std::iter::once(Step::Wait(p.initial_wait))
        .chain(pairs)
        .chain(std::iter::once(Step::Wait(p.settle)))
        .filter(|s| !matches!(s, Step::Wait(d) if d.is_zero()))
}

fn motion_length(cmd: ActuatorCommand) -> Duration {
    match cmd {
        ActuatorCommand::Forward(d) | ActuatorCommand::Backward(d) => d,
        _ => Duration::ZERO,
    }
}

struct Driven {
    actuator: Box<dyn Actuator>,
    current: ActuatorCommand,
}

/// One actuator plus the bookkeeping that keeps at most one task on it.
struct Channel {
    name: &'static str,
    driver: Mutex<Driven>,
    busy: AtomicBool,
    active: AtomicBool,
    epoch: AtomicU64,
    fault: Mutex<Option<BoxError>>,
}

impl Channel {
    fn lock(&self) -> MutexGuard<'_, Driven> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Write `cmd` unless the epoch moved on. Returns false when cancelled.
    fn apply_in(&self, epoch: u64, cmd: ActuatorCommand) -> Result<bool, BoxError> {
        let mut drv = self.lock();
        if self.epoch() != epoch {
            return Ok(false);
        }
        drv.actuator.apply(cmd)?;
        drv.current = cmd;
        self.active.store(cmd.is_engaged(), Ordering::Release);
        Ok(true)
    }

    fn record_fault(&self, e: BoxError) {
        let mut slot = self.fault.lock().unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert(e);
    }
}

/// Sleep `d` in slices; false if the epoch moved on meanwhile.
fn wait_in(channel: &Channel, clock: &dyn Clock, epoch: u64, d: Duration) -> bool {
    let mut remaining = d;
    while !remaining.is_zero() {
        if channel.epoch() != epoch {
            return false;
        }
        let slice = remaining.min(WAIT_SLICE);
        clock.sleep(slice);
        remaining -= slice;
    }
    channel.epoch() == epoch
}

fn run_sequence<I>(channel: &Channel, clock: &dyn Clock, epoch: u64, steps: I)
where
    I: IntoIterator<Item = Step>,
{
    for step in steps {
        let proceed = match step {
            Step::Wait(d) => wait_in(channel, clock, epoch, d),
            Step::Move(cmd) => match channel.apply_in(epoch, cmd) {
                Ok(true) => {
                    // The motion itself runs to completion once started.
                    clock.sleep(motion_length(cmd));
                    match channel.apply_in(epoch, ActuatorCommand::Idle) {
                        Ok(applied) => applied,
                        Err(e) => {
                            channel.record_fault(e);
                            false
                        }
                    }
                }
                Ok(false) => false,
                Err(e) => {
                    channel.record_fault(e);
                    false
                }
            },
        };
        if !proceed {
            tracing::debug!(channel = channel.name, "actuation task cancelled");
            return;
        }
    }
}

/// Drives one actuator channel from the controller's elapsed time.
pub struct ActuationScheduler {
    mode: ActuationMode,
    channel: Arc<Channel>,
    clock: Arc<dyn Clock + Send + Sync>,
    tracker: DisengageTracker,
    last_dispatch: Option<u64>,
    task: Option<JoinHandle<()>>,
}

impl ActuationScheduler {
    pub fn new(
        mode: ActuationMode,
        actuator: Box<dyn Actuator>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let name = actuator.name();
        Self {
            mode,
            channel: Arc::new(Channel {
                name,
                driver: Mutex::new(Driven {
                    actuator,
                    current: ActuatorCommand::Idle,
                }),
                busy: AtomicBool::new(false),
                active: AtomicBool::new(false),
                epoch: AtomicU64::new(0),
                fault: Mutex::new(None),
            }),
            clock,
            tracker: DisengageTracker::default(),
            last_dispatch: None,
            task: None,
        }
    }

    pub fn mode(&self) -> ActuationMode {
        self.mode
    }

    /// Clear per-run bookkeeping before a fresh run.
    pub fn begin(&mut self) {
        self.tracker.reset();
        self.last_dispatch = None;
    }

    /// The command last written to the actuator.
    pub fn command(&self) -> ActuatorCommand {
        self.channel.lock().current
    }

    pub fn actuator_active(&self) -> bool {
        self.channel.active.load(Ordering::Acquire)
    }

    /// True while a dispatched task has not finished.
    pub fn is_busy(&self) -> bool {
        self.channel.busy.load(Ordering::Acquire)
    }

    /// Advance the schedule to `elapsed`. Returns the number of cycles
    /// completed since the previous step.
    pub fn step(&mut self, elapsed: Duration, timing: &TimingConfig) -> Result<u64, BoxError> {
        self.take_fault()?;
        let interval = timing.actuation_interval;
        // Count before dispatching: a dispatch below belongs to the next boundary.
        let crossed = self.tracker.observe(elapsed, interval);
        let completed = self.completed_in(crossed);
        let phase = phase(elapsed, interval);
        match self.mode {
            ActuationMode::Valve => {
                let want = match phase {
                    Phase::Engaged => ActuatorCommand::Open,
                    Phase::Disengaged => ActuatorCommand::Close,
                };
                let mut drv = self.channel.lock();
                if drv.current != want {
                    drv.actuator.apply(want)?;
                    drv.current = want;
                    self.channel
                        .active
                        .store(want.is_engaged(), Ordering::Release);
                }
            }
            ActuationMode::Chew(profile) => {
                let k = period_index(elapsed, interval);
                let hold = timing.hold_time();
                // A busy channel is retried on later ticks of the same engaged half.
                if phase == Phase::Engaged
                    && self.last_dispatch != Some(k)
                    && self.dispatch(chew_sequence(&profile, hold, timing.repeat_count))
                {
                    self.last_dispatch = Some(k);
                }
            }
        }
        Ok(completed)
    }

    /// Cycles still to be counted for a run that ends at `end`. A boundary
    /// exactly at `end` does not count.
    pub fn finish(&mut self, end: Duration, timing: &TimingConfig) -> u64 {
        let crossed = self.tracker.observe_before(end, timing.actuation_interval);
        self.completed_in(crossed)
    }

    fn completed_in(&self, crossed: Range<u64>) -> u64 {
        match self.mode {
            ActuationMode::Valve => crossed.end - crossed.start,
            // Only a period whose chew actually started is a cycle.
            ActuationMode::Chew(_) => {
                u64::from(self.last_dispatch.is_some_and(|k| crossed.contains(&k)))
            }
        }
    }

    /// Start `steps` on a worker thread unless one is still running on this
    /// channel. Returns whether a task was started.
    pub fn dispatch<I>(&mut self, steps: I) -> bool
    where
        I: IntoIterator<Item = Step>,
        I::IntoIter: Send + 'static,
    {
        if self.channel.busy.swap(true, Ordering::AcqRel) {
            tracing::trace!(channel = self.channel.name, "previous task still running");
            return false;
        }
        if let Some(done) = self.task.take()
            && done.join().is_err()
        {
            tracing::warn!(channel = self.channel.name, "actuation task panicked");
        }
        let channel = Arc::clone(&self.channel);
        let clock = Arc::clone(&self.clock);
        let epoch = channel.epoch();
        let steps = steps.into_iter();
        tracing::debug!(channel = channel.name, "dispatching actuation task");
        self.task = Some(std::thread::spawn(move || {
            run_sequence(&channel, clock.as_ref(), epoch, steps);
            channel.active.store(false, Ordering::Release);
            channel.busy.store(false, Ordering::Release);
        }));
        true
    }

    /// Cancel anything pending and write `cmd` directly.
    pub fn force(&mut self, cmd: ActuatorCommand) -> Result<(), BoxError> {
        self.channel.epoch.fetch_add(1, Ordering::AcqRel);
        let mut drv = self.channel.lock();
        drv.actuator.apply(cmd)?;
        drv.current = cmd;
        self.channel
            .active
            .store(cmd.is_engaged(), Ordering::Release);
        Ok(())
    }

    /// Cancel pending phases and put the actuator in its safe state.
    pub fn halt(&mut self) -> Result<(), BoxError> {
        let safe = match self.mode {
            ActuationMode::Valve => ActuatorCommand::Close,
            ActuationMode::Chew(_) => ActuatorCommand::Idle,
        };
        self.force(safe)
    }

    /// Wait for an in-flight task to finish.
    pub fn join(&mut self) {
        if let Some(task) = self.task.take()
            && task.join().is_err()
        {
            tracing::warn!(channel = self.channel.name, "actuation task panicked");
        }
    }

    fn take_fault(&self) -> Result<(), BoxError> {
        let mut slot = self.channel.fault.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for ActuationScheduler {
    fn drop(&mut self) {
        if let Err(e) = self.halt() {
            tracing::error!(error = %e, channel = self.channel.name, "failed to force actuator safe on drop");
        }
        self.join();
    }
}
