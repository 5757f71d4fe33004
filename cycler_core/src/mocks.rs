//! Test and helper mocks for cycler_core
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use cycler_traits::BoxError;

use crate::actuator::{Actuator, ActuatorCommand};
use crate::command::Command;
use crate::error::CycleError;
use crate::input::{Axis, CommandSink};

/// Actuator that records every command it receives. Clones share the log.
#[derive(Debug, Clone)]
pub struct RecordingActuator {
    name: &'static str,
    log: Arc<Mutex<Vec<ActuatorCommand>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingActuator {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            log: Arc::new(Mutex::new(Vec::new())),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }

    pub fn commands(&self) -> Vec<ActuatorCommand> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last(&self) -> Option<ActuatorCommand> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .copied()
    }
}

impl Actuator for RecordingActuator {
    fn apply(&mut self, cmd: ActuatorCommand) -> Result<(), BoxError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(std::io::Error::other("recording actuator: write failed")));
        }
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(cmd);
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Command(Command),
    Encoder(Axis, i32),
    Fault(CycleError),
}

/// Command sink that records what the sampler reported.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SinkEvent::Command(c) => Some(c),
                _ => None,
            })
            .collect()
    }

    fn push(&self, e: SinkEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(e);
    }
}

impl CommandSink for RecordingSink {
    fn submit(&self, cmd: Command) {
        self.push(SinkEvent::Command(cmd));
    }

    fn encoder_moved(&self, axis: Axis, counter: i32) {
        self.push(SinkEvent::Encoder(axis, counter));
    }

    fn input_fault(&self, err: CycleError) {
        self.push(SinkEvent::Fault(err));
    }
}
