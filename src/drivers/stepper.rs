//! Gate stepper driver (28BYJ-48 through a ULN2003 board).
//!
//! Four-wire full stepping.  Coils are wired in the order IN1, IN3, IN2,
//! IN4 so the classic 4-phase table drives the motor in sequence:
//!
//! ```text
//!   phase  A  B  C  D
//!     0    1  0  1  0
//!     1    0  1  1  0
//!     2    0  1  0  1
//!     3    1  0  0  1
//! ```
//!
//! Travel is blocking: `step()` returns once the last step has been
//! clocked out.  A full 625-step open takes about 3.7 s at 5 rpm, which
//! is what the gate's settle window accounts for.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use log::{debug, warn};

const PHASES: [[bool; 4]; 4] = [
    [true, false, true, false],
    [false, true, true, false],
    [false, true, false, true],
    [true, false, false, true],
];

/// Microseconds between steps for the given geometry and speed.
pub const fn step_delay_us(steps_per_rev: u32, rpm: u32) -> u32 {
    60_000_000 / (steps_per_rev * rpm)
}

pub struct GateStepper<P: OutputPin, D: DelayNs> {
    /// Coil pins in drive order (IN1, IN3, IN2, IN4).
    coils: [P; 4],
    delay: D,
    step_delay_us: u32,
    phase: usize,
    position: i64,
}

impl<P: OutputPin, D: DelayNs> GateStepper<P, D> {
    pub fn new(coils: [P; 4], delay: D, steps_per_rev: u32, rpm: u32) -> Self {
        let mut stepper = Self {
            coils,
            delay,
            step_delay_us: step_delay_us(steps_per_rev, rpm.max(1)),
            phase: 0,
            position: 0,
        };
        stepper.release();
        stepper
    }

    /// Move `steps` full steps.  Positive and negative turn opposite ways.
    pub fn step(&mut self, steps: i32) {
        debug!("Stepper: {} steps", steps);
        let forward = steps > 0;
        for _ in 0..steps.unsigned_abs() {
            self.phase = if forward { (self.phase + 1) % 4 } else { (self.phase + 3) % 4 };
            self.position += if forward { 1 } else { -1 };
            self.apply(PHASES[self.phase]);
            self.delay.delay_us(self.step_delay_us);
        }
    }

    /// All coils low.
    pub fn release(&mut self) {
        self.apply([false; 4]);
    }

    /// Net steps travelled since construction.
    pub fn position(&self) -> i64 {
        self.position
    }

    fn apply(&mut self, levels: [bool; 4]) {
        for (pin, high) in self.coils.iter_mut().zip(levels) {
            let res = if high { pin.set_high() } else { pin.set_low() };
            if res.is_err() {
                warn!("Stepper: coil write failed");
            }
        }
    }
}
