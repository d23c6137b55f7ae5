//! Gate state machine.
//!
//! Sole owner of the gate stepper.  Every open/close request, whether it
//! comes from the access arbiter or from a dispense session holding the
//! gate shut, goes through here, so travel commands never overlap.
//!
//! ## Timing
//!
//! A travel command marks the gate busy for [`SETTLE_MS`].  While busy,
//! further requests are ignored.  Once the window lapses, each `tick()`
//! releases the coils so the motor does not sit energised.
//!
//! ## Usage events
//!
//! `open()` stamps the wall-clock open time and `close()` the close time.
//! A close with `log_event` emits [`AppEvent::GateUsage`] when both stamps
//! are non-zero (i.e. time was synchronized at both ends), then clears them.

use log::{debug, info};

use crate::app::events::AppEvent;
use crate::app::ports::{Clock, EventSink, GateActuatorPort};
use crate::error::ActuatorError;

/// Busy window after every travel command.
pub const SETTLE_MS: u64 = 3000;

/// Step count for a full open stroke (sign = direction).
pub const OPEN_TRAVEL_STEPS: i32 = -625;

/// Step count for a full close stroke.  Asymmetric with the open stroke
/// to match the mechanism.
pub const CLOSE_TRAVEL_STEPS: i32 = 460;

/// Last commanded gate movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOperation {
    None,
    Open,
    Close,
}

/// Gate bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateState {
    pub operation: GateOperation,
    pub busy_until_ms: u64,
    pub open_timestamp: u64,
    pub close_timestamp: u64,
}

pub struct GateStateMachine {
    state: GateState,
    held_closed: bool,
}

impl Default for GateStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl GateStateMachine {
    pub fn new() -> Self {
        Self {
            state: GateState {
                operation: GateOperation::None,
                busy_until_ms: 0,
                open_timestamp: 0,
                close_timestamp: 0,
            },
            held_closed: false,
        }
    }

    /// Open the gate.  Returns `true` if a travel command was issued.
    ///
    /// No-op while busy, when already open, or while held closed.
    pub fn open(&mut self, clock: &impl Clock, hw: &mut impl GateActuatorPort) -> bool {
        let now = clock.uptime_ms();
        if self.state.operation == GateOperation::Open {
            return false;
        }
        if let Err(e) = self.open_ready(now) {
            debug!("Gate: open ignored, {}", e);
            return false;
        }

        hw.step_gate(OPEN_TRAVEL_STEPS);
        self.state.busy_until_ms = now + SETTLE_MS;
        self.state.open_timestamp = clock.epoch_secs();
        self.state.operation = GateOperation::Open;
        info!("Gate: opened");
        true
    }

    /// Close the gate.  Returns `true` if a travel command was issued.
    ///
    /// No-op while busy or when already closed.
    pub fn close(
        &mut self,
        clock: &impl Clock,
        hw: &mut impl GateActuatorPort,
        sink: &mut impl EventSink,
        log_event: bool,
    ) -> bool {
        let now = clock.uptime_ms();
        if self.state.operation == GateOperation::Close {
            return false;
        }
        if let Err(e) = self.travel_ready(now) {
            debug!("Gate: close ignored, {}", e);
            return false;
        }

        hw.step_gate(CLOSE_TRAVEL_STEPS);
        self.state.busy_until_ms = now + SETTLE_MS;
        self.state.close_timestamp = clock.epoch_secs();

        if log_event && self.state.open_timestamp != 0 && self.state.close_timestamp != 0 {
            sink.emit(&AppEvent::GateUsage {
                open_timestamp: self.state.open_timestamp,
                close_timestamp: self.state.close_timestamp,
            });
        }
        self.state.open_timestamp = 0;
        self.state.close_timestamp = 0;
        self.state.operation = GateOperation::Close;
        info!("Gate: closed");
        true
    }

    /// Per-pass housekeeping: enforce a pending hold, release idle coils.
    pub fn tick(
        &mut self,
        clock: &impl Clock,
        hw: &mut impl GateActuatorPort,
        sink: &mut impl EventSink,
    ) {
        if self.is_busy(clock.uptime_ms()) {
            return;
        }
        if self.held_closed && self.state.operation != GateOperation::Close {
            self.close(clock, hw, sink, true);
            return;
        }
        hw.deenergize_gate();
    }

    /// Keep the gate shut until [`release_hold`](Self::release_hold).
    /// An open gate is closed on the next tick outside the settle window.
    pub fn hold_closed(&mut self) {
        if !self.held_closed {
            info!("Gate: hold closed");
        }
        self.held_closed = true;
    }

    pub fn release_hold(&mut self) {
        if self.held_closed {
            info!("Gate: hold released");
        }
        self.held_closed = false;
    }

    pub fn is_held(&self) -> bool {
        self.held_closed
    }

    /// Whether a travel command would be accepted now.
    pub fn travel_ready(&self, now_ms: u64) -> Result<(), ActuatorError> {
        if self.is_busy(now_ms) {
            return Err(ActuatorError::GateBusy);
        }
        Ok(())
    }

    /// As [`travel_ready`](Self::travel_ready), also refusing while held.
    pub fn open_ready(&self, now_ms: u64) -> Result<(), ActuatorError> {
        if self.held_closed {
            return Err(ActuatorError::GateHeld);
        }
        self.travel_ready(now_ms)
    }

    pub fn is_busy(&self, now_ms: u64) -> bool {
        now_ms < self.state.busy_until_ms
    }

    pub fn operation(&self) -> GateOperation {
        self.state.operation
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }
}
