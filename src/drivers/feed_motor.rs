//! Feed motor relay driver.
//!
//! The auger (vibration motor) hangs off a relay module whose input is
//! active LOW.  The driver is a dumb switch: the dispense controller
//! decides when it runs.
//!
//! Generic over an `embedded-hal` output pin so the host tests can record
//! the pin level.

use embedded_hal::digital::OutputPin;
use log::error;

use crate::error::ActuatorError;

pub struct FeedMotor<P: OutputPin> {
    pin: P,
    on: bool,
}

impl<P: OutputPin> FeedMotor<P> {
    /// Take the relay pin and force it to the released state.
    pub fn new(pin: P) -> Result<Self, ActuatorError> {
        let mut motor = Self { pin, on: true };
        motor.set(false)?;
        Ok(motor)
    }

    pub fn set(&mut self, on: bool) -> Result<(), ActuatorError> {
        // Active LOW: low pulls the relay in.
        let res = if on { self.pin.set_low() } else { self.pin.set_high() };
        res.map_err(|_| {
            error!("FeedMotor: relay write failed (on={})", on);
            ActuatorError::GpioWriteFailed
        })?;
        self.on = on;
        Ok(())
    }

    pub fn is_on(&self) -> bool {
        self.on
    }
}
