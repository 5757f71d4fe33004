//! Input sampling.
//!
//! Spawns a thread that owns the input bank, polls buttons and encoders at a
//! fixed cadence, and reports decoded commands to a `CommandSink`. Buttons are
//! level-triggered: a held button asserts its command on every poll.
//!
//! Safety: Each `InputSampler` spawns exactly one thread that is shut down and
//! joined when the sampler is dropped.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use cycler_traits::{BoxError, Clock, DigitalInput, Level};

use crate::command::Command;
use crate::config::{InputCfg, InputPins};
use crate::encoder::Encoder;
use crate::error::CycleError;
use crate::hw_error::map_hw_error;

/// Button state for one poll, already normalized for the wiring polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputSnapshot {
    pub stop: bool,
    pub go: bool,
    pub pause: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Duration,
    Interval,
}

/// Receiver of everything the sampler decodes.
pub trait CommandSink: Send + Sync {
    fn submit(&self, cmd: Command);
    fn encoder_moved(&self, axis: Axis, counter: i32);
    fn input_fault(&self, err: CycleError);
}

/// Turns snapshots into commands, owning the purge chord and its settle
/// window.
#[derive(Debug, Clone)]
pub struct ChordFilter {
    settle: Duration,
    purging: bool,
    settle_until: Option<Instant>,
}

impl ChordFilter {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            purging: false,
            settle_until: None,
        }
    }

    pub fn is_purging(&self) -> bool {
        self.purging
    }

    /// True while inputs are being ignored after a purge.
    pub fn is_settling(&self) -> bool {
        self.settle_until.is_some()
    }

    pub fn evaluate(&mut self, snap: InputSnapshot, now: Instant, mut emit: impl FnMut(Command)) {
        if let Some(until) = self.settle_until {
            if now < until {
                return;
            }
            self.settle_until = None;
            emit(Command::PurgeSettled);
        }

        let chord = snap.stop && snap.go;
        if self.purging {
            if !chord {
                self.purging = false;
                self.settle_until = Some(now + self.settle);
                emit(Command::PurgeRelease);
            }
            return;
        }
        if chord {
            self.purging = true;
            emit(Command::PurgeEnter);
            return;
        }

        if snap.stop {
            emit(Command::Stop { reset: true });
        }
        if snap.go {
            emit(Command::Go);
        }
        if snap.pause {
            emit(Command::Pause);
        }
    }
}

/// One poll of every configured input. Owned by the sampler thread; usable
/// directly in tests.
#[derive(Debug, Clone)]
pub struct InputPoller {
    pins: InputPins,
    active_low: bool,
    filter: ChordFilter,
    duration: Option<Encoder>,
    interval: Option<Encoder>,
}

impl InputPoller {
    pub fn new(pins: InputPins, cfg: &InputCfg) -> Self {
        let bound = cfg.encoder_bound;
        Self {
            pins,
            active_low: cfg.active_low,
            filter: ChordFilter::new(cfg.purge_settle),
            duration: pins.duration.map(|p| Encoder::new(p.clk, p.dt, bound)),
            interval: pins.interval.map(|p| Encoder::new(p.clk, p.dt, bound)),
        }
    }

    fn pressed(&self, level: Level) -> bool {
        if self.active_low {
            level.is_low()
        } else {
            level.is_high()
        }
    }

    pub fn poll<I, K>(&mut self, inputs: &mut I, now: Instant, sink: &K) -> Result<InputSnapshot, BoxError>
    where
        I: DigitalInput + ?Sized,
        K: CommandSink + ?Sized,
    {
        for (axis, enc) in [
            (Axis::Duration, self.duration.as_mut()),
            (Axis::Interval, self.interval.as_mut()),
        ] {
            if let Some(enc) = enc
                && let Some(counter) = enc.poll(inputs)?
            {
                sink.encoder_moved(axis, counter);
            }
        }

        let stop = inputs.read(self.pins.stop)?;
        let go = inputs.read(self.pins.go)?;
        let pause = match self.pins.pause {
            Some(ch) => Some(inputs.read(ch)?),
            None => None,
        };
        let snap = InputSnapshot {
            stop: self.pressed(stop),
            go: self.pressed(go),
            pause: pause.is_some_and(|l| self.pressed(l)),
        };
        self.filter.evaluate(snap, now, |cmd| sink.submit(cmd));
        Ok(snap)
    }
}

pub struct InputSampler {
    shutdown: Arc<AtomicBool>,
    polls: Arc<AtomicU64>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl InputSampler {
    pub fn spawn<I, C, K>(
        mut inputs: I,
        pins: InputPins,
        cfg: InputCfg,
        clock: C,
        sink: Arc<K>,
    ) -> Self
    where
        I: DigitalInput + Send + 'static,
        C: Clock + Send + Sync + 'static,
        K: CommandSink + ?Sized + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let polls = Arc::new(AtomicU64::new(0));
        let polls_clone = polls.clone();
        let period = cfg.poll;
        let mut poller = InputPoller::new(pins, &cfg);

        let join_handle = std::thread::spawn(move || {
            // Report a failing bank once per fault episode, not once per poll.
            let mut faulted = false;
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("input sampler received shutdown signal");
                    break;
                }

                match poller.poll(&mut inputs, clock.now(), &*sink) {
                    Ok(_) => {
                        if faulted {
                            tracing::info!("input reads recovered");
                        }
                        faulted = false;
                    }
                    Err(e) => {
                        if !faulted {
                            faulted = true;
                            tracing::error!(error = %e, "input read failed");
                            sink.input_fault(map_hw_error(&*e));
                        }
                    }
                }
                polls_clone.fetch_add(1, Ordering::Relaxed);

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                clock.sleep(period);
            }
            tracing::trace!("input sampler exiting cleanly");
        });

        Self {
            shutdown,
            polls,
            join_handle: Some(join_handle),
        }
    }

    /// Number of completed polls.
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }
}

impl Drop for InputSampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => tracing::trace!("input sampler joined"),
                Err(e) => tracing::warn!(?e, "input sampler panicked during shutdown"),
            }
        }
    }
}
