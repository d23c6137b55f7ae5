//! Weight-feedback dispense controller.
//!
//! Runs the feed actuator until the bowl reaches the expected weight or the
//! session deadline passes, then classifies the outcome.  The controller is
//! a resumable state machine: [`DispenseController::step`] samples once and
//! returns immediately, so the rest of the scheduler pass (access arbiter,
//! gate) keeps running while food is flowing.
//!
//! ```text
//!            start()                    step(): weight >= expected
//!   Idle ───────────────▶ Dispensing ──────────────────────────────▶ FullSuccess
//!     ▲                       │  step(): deadline, delta > 5 g ────▶ PartialSuccess
//!     │                       │  step(): deadline, delta <= 5 g ───▶ Failure
//!     │                       │  cancel() ─────────────────────────▶ Failure
//!     └───────────────────────┴──── (actuator off, events emitted) ◀─┘
//! ```

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{Clock, EventSink, FeedActuatorPort, WeightPort};
use crate::error::{ActuatorError, Error};

/// Hard limit on the expected bowl weight, whatever the target.
pub const SAFETY_CEILING_GRAMS: i32 = 60;

/// Session deadline measured from `start()`.
pub const MAX_DISPENSE_DURATION_MS: u64 = 70_000;

/// A timed-out session counts as partial only above this gain.
pub const NOISE_TOLERANCE_GRAMS: i32 = 5;

/// What asked for the food.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseSource {
    /// Schedule slot at this store index.
    Scheduled { index: usize },
    /// Remote "dispense now" command.
    Manual,
}

/// Terminal classification of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseOutcome {
    /// Expected weight reached; reports the requested quantity.
    FullSuccess { grams: u32 },
    /// Deadline reached with a measurable gain; reports the gain.
    PartialSuccess { grams: u32 },
    /// Deadline reached (or cancelled) with no meaningful gain.
    Failure,
}

impl DispenseOutcome {
    /// Grams reported for telemetry.
    pub fn grams(self) -> u32 {
        match self {
            Self::FullSuccess { grams } | Self::PartialSuccess { grams } => grams,
            Self::Failure => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::FullSuccess { .. } => "full",
            Self::PartialSuccess { .. } => "partial",
            Self::Failure => "failure",
        }
    }
}

/// Snapshot of a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispenseSession {
    pub source: DispenseSource,
    pub initial_weight_grams: i32,
    pub expected_weight_grams: i32,
    pub target_quantity_grams: u32,
    pub started_ms: u64,
    pub deadline_ms: u64,
    pub max_duration_ms: u64,
}

/// Result of a finished session, as emitted in [`AppEvent::Dispensed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispenseReport {
    pub source: DispenseSource,
    pub outcome: DispenseOutcome,
    pub target_grams: u32,
    pub final_weight_grams: i32,
    /// Wall-clock seconds at completion (0 when time is not synchronized).
    pub timestamp: u64,
    pub duration_ms: u64,
}

impl DispenseReport {
    /// [`Error::DispenseTimeout`] when the session ran into its deadline
    /// short of the expected weight.
    pub fn timeout_error(&self) -> Option<Error> {
        let short = !matches!(self.outcome, DispenseOutcome::FullSuccess { .. });
        (short && self.duration_ms >= MAX_DISPENSE_DURATION_MS).then_some(Error::DispenseTimeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispenseState {
    Idle,
    Dispensing(DispenseSession),
}

/// Single-session dispense state machine.
pub struct DispenseController {
    state: DispenseState,
    actuator_on: bool,
    last_report: Option<DispenseReport>,
    completed: u32,
}

impl Default for DispenseController {
    fn default() -> Self {
        Self::new()
    }
}

impl DispenseController {
    pub fn new() -> Self {
        Self {
            state: DispenseState::Idle,
            actuator_on: false,
            last_report: None,
            completed: 0,
        }
    }

    /// Begin a session.  Rejected while another session is running.
    pub fn start(
        &mut self,
        target_grams: u32,
        source: DispenseSource,
        clock: &impl Clock,
        hw: &mut (impl WeightPort + FeedActuatorPort),
        sink: &mut impl EventSink,
    ) -> Result<DispenseSession, ActuatorError> {
        if self.is_active() {
            return Err(ActuatorError::DispenseActive);
        }

        let now = clock.uptime_ms();
        let initial = hw.read_weight_grams();
        let target = i32::try_from(target_grams).unwrap_or(i32::MAX);
        let expected = initial.saturating_add(target).min(SAFETY_CEILING_GRAMS);

        let session = DispenseSession {
            source,
            initial_weight_grams: initial,
            expected_weight_grams: expected,
            target_quantity_grams: target_grams,
            started_ms: now,
            deadline_ms: now + MAX_DISPENSE_DURATION_MS,
            max_duration_ms: MAX_DISPENSE_DURATION_MS,
        };

        if !self.actuator_on {
            hw.set_feed_actuator(true);
            self.actuator_on = true;
        }
        self.state = DispenseState::Dispensing(session);

        info!(
            "Dispense: start {:?} target={}g initial={}g expected={}g",
            source, target_grams, initial, expected
        );
        sink.emit(&AppEvent::DispenseStarted {
            source,
            target_grams,
            initial_grams: initial,
            expected_grams: expected,
        });
        Ok(session)
    }

    /// Sample the bowl once.  Returns the report when the session ends.
    pub fn step(
        &mut self,
        clock: &impl Clock,
        hw: &mut (impl WeightPort + FeedActuatorPort),
        sink: &mut impl EventSink,
    ) -> Option<DispenseReport> {
        let DispenseState::Dispensing(session) = self.state else {
            return None;
        };

        let current = hw.read_weight_grams();
        let outcome = if current >= session.expected_weight_grams {
            DispenseOutcome::FullSuccess {
                grams: session.target_quantity_grams,
            }
        } else if clock.uptime_ms() >= session.deadline_ms {
            let delta = current - session.initial_weight_grams;
            if delta > NOISE_TOLERANCE_GRAMS {
                DispenseOutcome::PartialSuccess { grams: delta as u32 }
            } else {
                DispenseOutcome::Failure
            }
        } else {
            return None;
        };

        Some(self.finish(session, outcome, current, clock, hw, sink))
    }

    /// Abort the running session as a failure.
    pub fn cancel(
        &mut self,
        clock: &impl Clock,
        hw: &mut (impl WeightPort + FeedActuatorPort),
        sink: &mut impl EventSink,
    ) -> Option<DispenseReport> {
        let DispenseState::Dispensing(session) = self.state else {
            return None;
        };
        warn!("Dispense: cancelled");
        let current = hw.read_weight_grams();
        Some(self.finish(session, DispenseOutcome::Failure, current, clock, hw, sink))
    }

    fn finish(
        &mut self,
        session: DispenseSession,
        outcome: DispenseOutcome,
        final_weight: i32,
        clock: &impl Clock,
        hw: &mut impl FeedActuatorPort,
        sink: &mut impl EventSink,
    ) -> DispenseReport {
        // Off on every exit path, tracked state notwithstanding.
        hw.set_feed_actuator(false);
        self.actuator_on = false;
        self.state = DispenseState::Idle;

        let timestamp = clock.epoch_secs();
        let report = DispenseReport {
            source: session.source,
            outcome,
            target_grams: session.target_quantity_grams,
            final_weight_grams: final_weight,
            timestamp,
            duration_ms: clock.uptime_ms().saturating_sub(session.started_ms),
        };

        match outcome {
            DispenseOutcome::Failure => warn!(
                "Dispense: failure after {}ms (bowl {}g, expected {}g)",
                report.duration_ms, final_weight, session.expected_weight_grams
            ),
            _ => info!(
                "Dispense: {} {}g after {}ms (bowl {}g)",
                outcome.label(),
                outcome.grams(),
                report.duration_ms,
                final_weight
            ),
        }

        if let Some(e) = report.timeout_error() {
            warn!("Dispense: {}, slot consumed", e);
        }

        sink.emit(&AppEvent::Dispensed(report));
        sink.emit(&AppEvent::WeightReported {
            grams: final_weight,
            timestamp,
        });

        self.completed = self.completed.wrapping_add(1);
        self.last_report = Some(report);
        report
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, DispenseState::Dispensing(_))
    }

    /// The running session, if any.
    pub fn session(&self) -> Option<&DispenseSession> {
        match &self.state {
            DispenseState::Dispensing(s) => Some(s),
            DispenseState::Idle => None,
        }
    }

    pub fn last_report(&self) -> Option<&DispenseReport> {
        self.last_report.as_ref()
    }

    /// Sessions completed since boot (any outcome).
    pub fn completed_count(&self) -> u32 {
        self.completed
    }
}
