//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the load cell, tag reader, feed relay and gate stepper, exposing
//! them through the ports bundled in
//! [`FeederHardware`](crate::app::ports::FeederHardware).  This is the only
//! module in the system that touches actual hardware.  On non-espidf
//! targets, the sensor drivers use cfg-gated simulation stubs and the
//! actuators take whatever `embedded-hal` pins they are given.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::error;

use crate::access::TagId;
use crate::app::ports::{FeedActuatorPort, GateActuatorPort, TagReaderPort, WeightPort};
use crate::drivers::feed_motor::FeedMotor;
use crate::drivers::stepper::GateStepper;
use crate::sensors::rfid::TagReader;
use crate::sensors::weight::WeightSensor;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<R: OutputPin, C: OutputPin, D: DelayNs> {
    scale: WeightSensor,
    reader: TagReader,
    feed: FeedMotor<R>,
    gate: GateStepper<C, D>,
}

impl<R: OutputPin, C: OutputPin, D: DelayNs> HardwareAdapter<R, C, D> {
    pub fn new(
        scale: WeightSensor,
        reader: TagReader,
        feed: FeedMotor<R>,
        gate: GateStepper<C, D>,
    ) -> Self {
        Self {
            scale,
            reader,
            feed,
            gate,
        }
    }

    /// Last scale reading without touching the HX711.
    pub fn cached_weight(&self) -> i32 {
        self.scale.cached_grams()
    }

    pub fn feed_running(&self) -> bool {
        self.feed.is_on()
    }

    pub fn gate_position(&self) -> i64 {
        self.gate.position()
    }
}

// ── Sensor ports ──────────────────────────────────────────────

impl<R: OutputPin, C: OutputPin, D: DelayNs> WeightPort for HardwareAdapter<R, C, D> {
    fn read_weight_grams(&mut self) -> i32 {
        self.scale.read_grams()
    }
}

impl<R: OutputPin, C: OutputPin, D: DelayNs> TagReaderPort for HardwareAdapter<R, C, D> {
    fn read_tag(&mut self) -> Option<TagId> {
        self.reader.poll()
    }
}

// ── Actuator ports ────────────────────────────────────────────

impl<R: OutputPin, C: OutputPin, D: DelayNs> FeedActuatorPort for HardwareAdapter<R, C, D> {
    fn set_feed_actuator(&mut self, on: bool) {
        if let Err(e) = self.feed.set(on) {
            error!("Hardware: feed actuator {} failed ({})", if on { "on" } else { "off" }, e);
        }
    }
}

impl<R: OutputPin, C: OutputPin, D: DelayNs> GateActuatorPort for HardwareAdapter<R, C, D> {
    fn step_gate(&mut self, steps: i32) {
        self.gate.step(steps);
    }

    fn deenergize_gate(&mut self) {
        self.gate.release();
    }
}
