//! Feeder service: the hexagonal core and cooperative scheduler.
//!
//! [`FeederService`] owns the schedule store, dispense controller, gate
//! state machine, access arbiter and health monitor.  One call to
//! [`FeederService::tick`] is one scheduler pass; every component does a
//! bounded amount of work and returns.
//!
//! ```text
//!  Clock ─────────▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                   │        FeederService          │
//!  FeederHardware ◀▶│ Schedule · Dispense · Access  │
//!                   │      Gate · Health            │
//!                   └──────────────────────────────┘
//! ```
//!
//! ## Pass order
//!
//! 1. Schedule evaluation (rate-limited to [`SCHEDULE_EVAL_INTERVAL_MS`]):
//!    time-sync gate, day rollover, due-slot scan into the pending queue.
//! 2. Dispense controller: step the running session or start the next
//!    queued one.
//! 3. Access arbiter: poll the tag reader, request open/close.
//! 4. Gate: settle-window housekeeping, hold enforcement, coil release.
//! 5. Health flags.

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::access::AccessArbiter;
use crate::config::{FeederConfig, TrapMode};
use crate::control::dispense::{
    DispenseController, DispenseOutcome, DispenseReport, DispenseSource,
};
use crate::error::{Error, Result};
use crate::gate::{GateOperation, GateStateMachine};
use crate::health::{HealthInputs, HealthMonitor};
use crate::schedule::{self, ScheduleStore};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{Clock, EventSink, FeederHardware};

/// Minimum spacing between schedule evaluations.
pub const SCHEDULE_EVAL_INTERVAL_MS: u64 = 5000;

/// Manual requests allowed to wait behind the running session.
pub const MAX_PENDING_MANUAL: usize = 4;

const SECS_PER_DAY: u64 = 86_400;

// ───────────────────────────────────────────────────────────────
// Local time helpers
// ───────────────────────────────────────────────────────────────

/// Wall-clock fields derived from a UTC epoch and a fixed offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalTime {
    /// 0 = Sunday … 6 = Saturday.
    pub day_index: u8,
    /// Minutes since local midnight.
    pub minutes: u16,
}

impl LocalTime {
    pub fn from_epoch(epoch_secs: u64, utc_offset_secs: i32) -> Self {
        let local = (epoch_secs as i64 + utc_offset_secs as i64).max(0) as u64;
        // 1970-01-01 was a Thursday.
        let day_index = ((local / SECS_PER_DAY + 4) % 7) as u8;
        let minutes = ((local % SECS_PER_DAY) / 60) as u16;
        Self { day_index, minutes }
    }

    /// As [`from_epoch`](Self::from_epoch), treating epoch 0 as an
    /// unsynchronized clock.
    pub fn from_synced_epoch(epoch_secs: u64, utc_offset_secs: i32) -> Result<Self> {
        if epoch_secs == 0 {
            return Err(Error::TimeNotSynced);
        }
        Ok(Self::from_epoch(epoch_secs, utc_offset_secs))
    }
}

// ───────────────────────────────────────────────────────────────
// Pending work
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingDispense {
    source: DispenseSource,
    grams: u32,
}

// ───────────────────────────────────────────────────────────────
// FeederService
// ───────────────────────────────────────────────────────────────

pub struct FeederService {
    config: FeederConfig,
    schedule: ScheduleStore,
    dispenser: DispenseController,
    gate: GateStateMachine,
    access: AccessArbiter,
    health: HealthMonitor,
    /// Due slots and manual requests waiting for the dispenser, FIFO.
    pending: VecDeque<PendingDispense>,
    /// Bumped on rollover and on schedule replacement; a session started
    /// under an older generation must not mark a slot.
    slot_generation: u32,
    session_generation: u32,
    last_eval_ms: Option<u64>,
    time_synced: bool,
    current_day: Option<u8>,
    tick_count: u64,
}

impl FeederService {
    /// Construct the service from configuration with an empty schedule.
    pub fn new(config: FeederConfig) -> Self {
        let access = AccessArbiter::new(
            config.registered_tags,
            config.tag_timeout_ms as u64,
            config.trap_mode,
        );
        Self {
            config,
            schedule: ScheduleStore::new(),
            dispenser: DispenseController::new(),
            gate: GateStateMachine::new(),
            access,
            health: HealthMonitor::new(),
            pending: VecDeque::new(),
            slot_generation: 0,
            session_generation: 0,
            last_eval_ms: None,
            time_synced: false,
            current_day: None,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    pub fn start(&mut self, sink: &mut impl EventSink) {
        sink.emit(&AppEvent::Started {
            entries: self.schedule.len(),
        });
        info!(
            "FeederService started ({} slots, trap mode {:?})",
            self.schedule.len(),
            self.access.trap_mode()
        );
    }

    // ── Per-pass orchestration ────────────────────────────────

    /// Run one scheduler pass.
    pub fn tick(
        &mut self,
        clock: &impl Clock,
        hw: &mut impl FeederHardware,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        let now = clock.uptime_ms();

        // 1. Schedule evaluation
        let due = self
            .last_eval_ms
            .is_none_or(|last| now.saturating_sub(last) >= SCHEDULE_EVAL_INTERVAL_MS);
        if due {
            self.last_eval_ms = Some(now);
            self.evaluate_schedule(clock, sink);
        }

        // 2. Dispense controller
        self.run_dispenser(clock, hw, sink);

        // 3. Access arbiter
        self.access.tick(clock, hw, &mut self.gate, sink);

        // 4. Gate housekeeping
        self.gate.tick(clock, hw, sink);

        // 5. Health
        self.update_health(sink);
    }

    fn evaluate_schedule(&mut self, clock: &impl Clock, sink: &mut impl EventSink) {
        let epoch = clock.epoch_secs();
        let local = match LocalTime::from_synced_epoch(epoch, self.config.utc_offset_secs) {
            Ok(local) => local,
            Err(e) => {
                debug!("Schedule: {}, evaluation skipped", e);
                return;
            }
        };

        if !self.time_synced {
            self.time_synced = true;
            self.current_day = Some(local.day_index);
            self.schedule.reset_dispense_status(local.minutes);
            info!(
                "Schedule: time synced ({} local, day {})",
                schedule::format_time_of_day(local.minutes),
                local.day_index
            );
            sink.emit(&AppEvent::TimeSynced { epoch_secs: epoch });
        } else if self.current_day != Some(local.day_index) {
            self.current_day = Some(local.day_index);
            self.schedule.reset_dispense_status(0);
            self.slot_generation = self.slot_generation.wrapping_add(1);
            let dropped = self.drop_scheduled_pending();
            info!(
                "Schedule: day rollover to {}, {} queued slots dropped",
                local.day_index, dropped
            );
            sink.emit(&AppEvent::DayRollover {
                day_index: local.day_index,
            });
        }

        let active_slot = self.active_slot();
        for index in self.schedule.due_entries(local.minutes) {
            let source = DispenseSource::Scheduled { index };
            if active_slot == Some(index) || self.pending.iter().any(|p| p.source == source) {
                continue;
            }
            let grams = self
                .schedule
                .get(index)
                .map_or(0, |e| e.quantity_grams);
            debug!("Schedule: slot {} due ({}g)", index, grams);
            self.pending.push_back(PendingDispense { source, grams });
        }
    }

    fn run_dispenser(
        &mut self,
        clock: &impl Clock,
        hw: &mut impl FeederHardware,
        sink: &mut impl EventSink,
    ) {
        if self.dispenser.is_active() {
            if let Some(report) = self.dispenser.step(clock, hw, sink) {
                self.finish_session(&report);
            }
            return;
        }

        let Some(next) = self.pending.pop_front() else {
            return;
        };
        match self.dispenser.start(next.grams, next.source, clock, hw, sink) {
            Ok(_) => {
                self.session_generation = self.slot_generation;
                if self.config.close_gate_while_dispensing {
                    self.gate.hold_closed();
                }
            }
            Err(e) => warn!("Dispense: start rejected ({})", e),
        }
    }

    fn finish_session(&mut self, report: &DispenseReport) {
        self.gate.release_hold();
        if let DispenseSource::Scheduled { index } = report.source {
            if self.session_generation == self.slot_generation {
                self.schedule.mark_dispensed(index);
            } else {
                info!("Dispense: slot {} belongs to a previous day, not marked", index);
            }
        }
    }

    fn update_health(&mut self, sink: &mut impl EventSink) {
        let before = self.health.flags();
        let after = self.health.evaluate(HealthInputs {
            time_synced: self.time_synced,
            schedule_len: self.schedule.len(),
            last_dispense_failed: self
                .dispenser
                .last_report()
                .is_some_and(|r| r.outcome == DispenseOutcome::Failure),
        });
        if after != before {
            sink.emit(&AppEvent::HealthChanged(after));
        }
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (remote app, backend poll, console).
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        clock: &impl Clock,
        hw: &mut impl FeederHardware,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::DispenseNow { grams } => {
                if grams == 0 {
                    warn!("DispenseNow: zero grams ignored");
                    return;
                }
                let manual = self
                    .pending
                    .iter()
                    .filter(|p| p.source == DispenseSource::Manual)
                    .count();
                if manual >= MAX_PENDING_MANUAL {
                    warn!("DispenseNow: {}g refused, {} already queued", grams, manual);
                    return;
                }
                info!("DispenseNow: {}g queued", grams);
                self.pending.push_back(PendingDispense {
                    source: DispenseSource::Manual,
                    grams,
                });
            }
            AppCommand::CancelDispense => {
                if let Some(report) = self.dispenser.cancel(clock, hw, sink) {
                    self.finish_session(&report);
                }
            }
            AppCommand::LoadSchedule(items) => self.load_schedule(items, clock, sink),
            AppCommand::LoadScheduleJson(doc) => match schedule::parse_schedule_json(&doc) {
                Ok(items) => self.load_schedule(items, clock, sink),
                Err(e) => {
                    warn!("Schedule: {}, loading zero entries", e);
                    self.load_schedule(Vec::new(), clock, sink);
                }
            },
            AppCommand::SetTrapMode(mode) => {
                self.config.trap_mode = mode;
                self.access.set_trap_mode(mode);
            }
            AppCommand::SetRegisteredTags(tags) => {
                self.config.registered_tags = tags;
                self.access.set_registered_tags(tags);
            }
            AppCommand::UpdateConfig(new_config) => {
                self.access.set_registered_tags(new_config.registered_tags);
                self.access.set_trap_mode(new_config.trap_mode);
                self.access.set_timeout_ms(new_config.tag_timeout_ms as u64);
                if !new_config.close_gate_while_dispensing {
                    self.gate.release_hold();
                }
                self.config = new_config;
                info!("Configuration updated at runtime");
            }
            AppCommand::ReloadConfig => {
                // The config source owner re-reads it and sends `UpdateConfig`.
            }
        }
    }

    fn load_schedule(
        &mut self,
        items: Vec<(String, u32)>,
        clock: &impl Clock,
        sink: &mut impl EventSink,
    ) {
        let summary = self.schedule.load(items);
        self.slot_generation = self.slot_generation.wrapping_add(1);
        self.drop_scheduled_pending();

        if self.time_synced {
            if let Ok(local) =
                LocalTime::from_synced_epoch(clock.epoch_secs(), self.config.utc_offset_secs)
            {
                self.schedule.reset_dispense_status(local.minutes);
            }
        }
        // Evaluate on the next pass rather than waiting out the interval.
        self.last_eval_ms = None;

        sink.emit(&AppEvent::ScheduleLoaded {
            entries: summary.loaded,
            invalid: summary.invalid,
        });
    }

    /// Forget queued slot dispenses; manual requests stay.  Returns how
    /// many were dropped.
    fn drop_scheduled_pending(&mut self) -> usize {
        let before = self.pending.len();
        self.pending
            .retain(|p| !matches!(p.source, DispenseSource::Scheduled { .. }));
        before - self.pending.len()
    }

    // ── Queries ───────────────────────────────────────────────

    fn active_slot(&self) -> Option<usize> {
        match self.dispenser.session().map(|s| s.source) {
            Some(DispenseSource::Scheduled { index })
                if self.session_generation == self.slot_generation =>
            {
                Some(index)
            }
            _ => None,
        }
    }

    pub fn schedule(&self) -> &ScheduleStore {
        &self.schedule
    }

    pub fn gate_operation(&self) -> GateOperation {
        self.gate.operation()
    }

    pub fn gate_busy(&self, now_ms: u64) -> bool {
        self.gate.is_busy(now_ms)
    }

    pub fn gate_held(&self) -> bool {
        self.gate.is_held()
    }

    pub fn trap_mode(&self) -> TrapMode {
        self.access.trap_mode()
    }

    pub fn is_dispensing(&self) -> bool {
        self.dispenser.is_active()
    }

    pub fn last_dispense(&self) -> Option<&DispenseReport> {
        self.dispenser.last_report()
    }

    /// Sessions completed since boot.
    pub fn dispense_count(&self) -> u32 {
        self.dispenser.completed_count()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn time_synced(&self) -> bool {
        self.time_synced
    }

    /// Current health bitmask (0 = nominal).
    pub fn health_flags(&self) -> u8 {
        self.health.flags()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Clone of the live configuration (for persistence or read-back).
    pub fn current_config(&self) -> FeederConfig {
        self.config.clone()
    }
}
