//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::control::dispense::DispenseOutcome;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { entries } => {
                info!("START | schedule_entries={}", entries);
            }
            AppEvent::ScheduleLoaded { entries, invalid } => {
                info!("SCHEDULE | loaded={} invalid_keys={}", entries, invalid);
            }
            AppEvent::TimeSynced { epoch_secs } => {
                info!("TIME | synced epoch={}", epoch_secs);
            }
            AppEvent::DayRollover { day_index } => {
                info!("TIME | new day index={}, slots re-armed", day_index);
            }
            AppEvent::DispenseStarted {
                source,
                target_grams,
                initial_grams,
                expected_grams,
            } => {
                info!(
                    "DISPENSE | start {:?} | target={}g initial={}g expected={}g",
                    source, target_grams, initial_grams, expected_grams
                );
            }
            AppEvent::Dispensed(r) => {
                let line = format!(
                    "DISPENSE | {} {}g | {:?} target={}g final={}g | {}ms @{}",
                    r.outcome.label(),
                    r.outcome.grams(),
                    r.source,
                    r.target_grams,
                    r.final_weight_grams,
                    r.duration_ms,
                    r.timestamp,
                );
                if matches!(r.outcome, DispenseOutcome::Failure) {
                    warn!("{}", line);
                } else {
                    info!("{}", line);
                }
            }
            AppEvent::GateUsage {
                open_timestamp,
                close_timestamp,
            } => {
                info!(
                    "GATE | open={} close={} ({}s)",
                    open_timestamp,
                    close_timestamp,
                    close_timestamp.saturating_sub(*open_timestamp)
                );
            }
            AppEvent::WeightReported { grams, timestamp } => {
                info!("WEIGHT | {}g @{}", grams, timestamp);
            }
            AppEvent::HealthChanged(flags) => {
                info!("HEALTH | flags=0b{:08b}", flags);
            }
        }
    }
}
