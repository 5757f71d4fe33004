//! Machine assembly: the controller behind one lock, plus the three loops
//! that share it.
//!
//! - the input sampler submits commands and encoder moves,
//! - the run loop ticks the controller while it is RUNNING,
//! - the status publisher copies snapshots for the display.
//!
//! The run loop is started by whichever command moves the controller into
//! RUNNING and exits on its own, under the lock, on the first tick that finds
//! it in any other mode.
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel as xch;
use cycler_traits::{Clock, DigitalInput};
use eyre::WrapErr;

use crate::actuator::{Actuator, ActuatorCommand};
use crate::command::{Command, CommandOutcome};
use crate::config::{MachineCfg, TimingConfig};
use crate::controller::{CycleController, Tick};
use crate::error::{CycleError, Report, Result};
use crate::input::{Axis, CommandSink, InputSampler};
use crate::scheduler::ActuationScheduler;
use crate::state::CycleMode;
use crate::status::{StatusPublisher, StatusSnapshot};

/// Events the machine reports to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MachineEvent {
    Completed { elapsed: Duration, cycle_count: u64 },
    Fault(CycleError),
}

struct Core {
    controller: CycleController,
    loop_active: bool,
    run_loop: Option<JoinHandle<()>>,
    closed: bool,
}

struct Inner {
    core: Mutex<Core>,
    clock: Arc<dyn Clock + Send + Sync>,
    events: xch::Sender<MachineEvent>,
    tick: Duration,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, ev: MachineEvent) {
        if let Err(e) = self.events.try_send(ev) {
            tracing::warn!(event = ?e.into_inner(), "event queue full; dropped");
        }
    }
}

fn typed(report: &Report) -> CycleError {
    report
        .downcast_ref::<CycleError>()
        .cloned()
        .unwrap_or_else(|| CycleError::HardwareFault(format!("{report:#}")))
}

fn run_loop(inner: &Inner) {
    tracing::debug!("run loop started");
    loop {
        {
            let mut core = inner.lock();
            let now = inner.clock.now();
            let tick = core.controller.tick(now);
            match tick {
                Ok(Tick::Running) => {}
                Ok(Tick::Idle) => {
                    core.loop_active = false;
                    break;
                }
                Ok(Tick::Completed {
                    elapsed,
                    cycle_count,
                }) => {
                    core.loop_active = false;
                    inner.emit(MachineEvent::Completed {
                        elapsed,
                        cycle_count,
                    });
                    break;
                }
                Err(report) => {
                    core.loop_active = false;
                    inner.emit(MachineEvent::Fault(typed(&report)));
                    break;
                }
            }
        }
        inner.clock.sleep(inner.tick);
    }
    tracing::debug!("run loop exited");
}

/// Cheap, cloneable handle for issuing commands and reading state.
#[derive(Clone)]
pub struct MachineHandle {
    inner: Arc<Inner>,
}

impl MachineHandle {
    /// Apply one command and start the run loop if it entered RUNNING.
    pub fn apply(&self, cmd: Command) -> Result<CommandOutcome> {
        let mut core = self.inner.lock();
        if core.closed {
            return Err(Report::new(CycleError::Interrupted));
        }
        let now = self.inner.clock.now();
        let outcome = core.controller.handle(cmd, now);
        if let Err(report) = &outcome {
            self.inner.emit(MachineEvent::Fault(typed(report)));
        }
        self.ensure_run_loop(&mut core);
        outcome
    }

    pub fn start(&self) -> Result<CommandOutcome> {
        self.apply(Command::Go)
    }

    pub fn pause(&self) -> Result<CommandOutcome> {
        self.apply(Command::Pause)
    }

    pub fn stop(&self, reset: bool) -> Result<CommandOutcome> {
        self.apply(Command::Stop { reset })
    }

    pub fn set_total_duration(&self, d: Duration) -> Result<CommandOutcome> {
        self.apply(Command::SetTotalDuration(d))
    }

    pub fn set_actuation_interval(&self, d: Duration) -> Result<CommandOutcome> {
        self.apply(Command::SetActuationInterval(d))
    }

    pub fn set_repeat_count(&self, n: u32) -> Result<CommandOutcome> {
        self.apply(Command::SetRepeatCount(n))
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.lock().controller.snapshot()
    }

    pub fn timing(&self) -> TimingConfig {
        self.inner.lock().controller.timing()
    }

    pub fn mode(&self) -> CycleMode {
        self.inner.lock().controller.mode()
    }

    pub fn actuator_command(&self) -> ActuatorCommand {
        self.inner.lock().controller.actuator_command()
    }

    fn ensure_run_loop(&self, core: &mut Core) {
        if core.loop_active || core.controller.mode() != CycleMode::Running {
            return;
        }
        // A previous loop cleared `loop_active` under this lock and needs it
        // no more, so joining here cannot deadlock.
        if let Some(prev) = core.run_loop.take()
            && prev.join().is_err()
        {
            tracing::warn!("previous run loop panicked");
        }
        core.loop_active = true;
        let inner = Arc::clone(&self.inner);
        core.run_loop = Some(std::thread::spawn(move || run_loop(&inner)));
    }
}

impl CommandSink for MachineHandle {
    fn submit(&self, cmd: Command) {
        // Faults are already reported through the event queue.
        if let Err(e) = self.apply(cmd) {
            tracing::debug!(error = %e, command = cmd.name(), "command failed");
        }
    }

    fn encoder_moved(&self, axis: Axis, counter: i32) {
        tracing::trace!(?axis, counter, "encoder moved");
        self.inner.lock().controller.set_encoder(axis, counter);
    }

    fn input_fault(&self, err: CycleError) {
        self.inner.lock().controller.fault(&err);
        self.inner.emit(MachineEvent::Fault(err));
    }
}

/// The running machine. Dropping it forces the actuator safe and joins every
/// thread.
pub struct Machine {
    handle: MachineHandle,
    events: xch::Receiver<MachineEvent>,
    sampler: Option<InputSampler>,
    publisher: Option<StatusPublisher>,
    closed: bool,
}

impl Machine {
    pub fn start<I>(
        cfg: &MachineCfg,
        inputs: I,
        actuator: Box<dyn Actuator>,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self>
    where
        I: DigitalInput + Send + 'static,
    {
        let scheduler = ActuationScheduler::new(cfg.mode, actuator, Arc::clone(&clock));
        let mut controller = CycleController::new(cfg.timing, cfg.tiers, scheduler);
        controller
            .shutdown()
            .wrap_err("initializing actuator to safe state")?;

        let (events_tx, events) = xch::bounded(16);
        let handle = MachineHandle {
            inner: Arc::new(Inner {
                core: Mutex::new(Core {
                    controller,
                    loop_active: false,
                    run_loop: None,
                    closed: false,
                }),
                clock: Arc::clone(&clock),
                events: events_tx,
                tick: cfg.tick,
            }),
        };

        let sampler = InputSampler::spawn(
            inputs,
            cfg.pins,
            cfg.inputs,
            clock,
            Arc::new(handle.clone()),
        );
        let source = handle.clone();
        let publisher = StatusPublisher::spawn(move || source.snapshot(), cfg.refresh);
        tracing::info!(
            mode = ?cfg.mode,
            poll = ?cfg.inputs.poll,
            tick = ?cfg.tick,
            refresh = ?cfg.refresh,
            "machine started"
        );

        Ok(Self {
            handle,
            events,
            sampler: Some(sampler),
            publisher: Some(publisher),
            closed: false,
        })
    }

    pub fn handle(&self) -> MachineHandle {
        self.handle.clone()
    }

    pub fn events(&self) -> &xch::Receiver<MachineEvent> {
        &self.events
    }

    /// Snapshots at the display cadence.
    pub fn status(&self) -> Option<xch::Receiver<StatusSnapshot>> {
        self.publisher.as_ref().map(StatusPublisher::subscribe)
    }

    /// Most recent published snapshot.
    pub fn latest(&self) -> StatusSnapshot {
        self.publisher
            .as_ref()
            .map_or_else(|| self.handle.snapshot(), StatusPublisher::latest)
    }

    /// Stop input, force the actuator safe, and join the run loop and the
    /// publisher.
    pub fn shutdown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        drop(self.sampler.take());

        let (halted, run_loop) = {
            let mut core = self.handle.inner.lock();
            core.closed = true;
            let halted = core.controller.shutdown();
            (halted, core.run_loop.take())
        };
        if let Some(h) = run_loop
            && h.join().is_err()
        {
            tracing::warn!("run loop panicked");
        }
        drop(self.publisher.take());
        tracing::info!("machine stopped; actuator safe");
        halted
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!(error = %e, "shutdown failed");
        }
    }
}
