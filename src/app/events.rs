//! Outbound application events.
//!
//! The [`FeederService`](super::service::FeederService) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, queue for the backend,
//! record in a test.

use crate::control::dispense::{DispenseReport, DispenseSource};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries the loaded schedule size).
    Started { entries: usize },

    /// A schedule document was applied.
    ScheduleLoaded { entries: usize, invalid: usize },

    /// Wall-clock time became available; schedule evaluation is live.
    TimeSynced { epoch_secs: u64 },

    /// Local day index changed; every slot was re-armed.
    DayRollover { day_index: u8 },

    /// A dispense session began.
    DispenseStarted {
        source: DispenseSource,
        target_grams: u32,
        initial_grams: i32,
        expected_grams: i32,
    },

    /// A dispense session reached a terminal outcome.
    Dispensed(DispenseReport),

    /// The gate completed an open/close cycle with both timestamps known.
    GateUsage {
        open_timestamp: u64,
        close_timestamp: u64,
    },

    /// Fresh bowl weight after a dispense.
    WeightReported { grams: i32, timestamp: u64 },

    /// Health bitmask changed.
    HealthChanged(u8),
}
