//! Actuator commands and the drivers that put them on the wire.
use std::time::Duration;

use cycler_traits::{BoxError, DigitalOutput, Level, PwmOutput};

/// Command applied to the actuator. `Forward`/`Backward` carry the planned
/// motion length; the driver only sets the output, timing is the scheduler's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActuatorCommand {
    #[default]
    Idle,
    Open,
    Close,
    Forward(Duration),
    Backward(Duration),
}

impl ActuatorCommand {
    /// True while the output is driven.
    #[inline]
    pub fn is_engaged(&self) -> bool {
        matches!(
            self,
            ActuatorCommand::Open | ActuatorCommand::Forward(_) | ActuatorCommand::Backward(_)
        )
    }
}

/// Something the scheduler can drive. Implementations must be idempotent for
/// repeated identical commands.
pub trait Actuator: Send {
    fn apply(&mut self, cmd: ActuatorCommand) -> Result<(), BoxError>;

    /// De-energize the output.
    fn safe(&mut self) -> Result<(), BoxError> {
        self.apply(ActuatorCommand::Idle)
    }

    fn name(&self) -> &'static str;
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn apply(&mut self, cmd: ActuatorCommand) -> Result<(), BoxError> {
        (**self).apply(cmd)
    }

    fn safe(&mut self) -> Result<(), BoxError> {
        (**self).safe()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Solenoid valve on one digital output, high is open.
pub struct Valve<O> {
    out: O,
    channel: u8,
}

impl<O: DigitalOutput> Valve<O> {
    pub fn new(out: O, channel: u8) -> Self {
        Self { out, channel }
    }
}

impl<O: DigitalOutput + Send> Actuator for Valve<O> {
    fn apply(&mut self, cmd: ActuatorCommand) -> Result<(), BoxError> {
        let level = match cmd {
            ActuatorCommand::Open | ActuatorCommand::Forward(_) => Level::High,
            ActuatorCommand::Close | ActuatorCommand::Backward(_) | ActuatorCommand::Idle => {
                Level::Low
            }
        };
        self.out.write(self.channel, level)
    }

    fn name(&self) -> &'static str {
        "valve"
    }
}

/// Bidirectional motor on an H-bridge with one PWM line per direction.
///
/// The opposite line is always zeroed before the active one is raised, so
/// both lines are never driven at once.
pub struct Motor<P> {
    pwm: P,
    forward: u8,
    backward: u8,
    speed_pct: f32,
}

impl<P: PwmOutput> Motor<P> {
    pub fn new(pwm: P, forward: u8, backward: u8, speed_pct: f32) -> Self {
        Self {
            pwm,
            forward,
            backward,
            speed_pct: speed_pct.clamp(0.0, 100.0),
        }
    }

    fn drive(&mut self, active: u8, idle: u8) -> Result<(), BoxError> {
        self.pwm.set_duty_cycle(idle, 0.0)?;
        self.pwm.set_duty_cycle(active, self.speed_pct)
    }
}

impl<P: PwmOutput + Send> Actuator for Motor<P> {
    fn apply(&mut self, cmd: ActuatorCommand) -> Result<(), BoxError> {
        match cmd {
            // Open runs forward continuously (purge).
            ActuatorCommand::Forward(_) | ActuatorCommand::Open => {
                self.drive(self.forward, self.backward)
            }
            ActuatorCommand::Backward(_) => self.drive(self.backward, self.forward),
            ActuatorCommand::Idle | ActuatorCommand::Close => {
                let a = self.pwm.set_duty_cycle(self.forward, 0.0);
                let b = self.pwm.set_duty_cycle(self.backward, 0.0);
                a.and(b)
            }
        }
    }

    fn name(&self) -> &'static str {
        "motor"
    }
}
