//! Telemetry outbox event sink.
//!
//! Implements [`EventSink`] by turning the three backend-facing events
//! (dispense result, gate usage, bowl weight) into JSON records with the
//! backend's field names, queued in a bounded ring.  Whatever owns the
//! network connection drains it with [`TelemetryOutbox::pop`].
//!
//! Delivery is fire-and-forget: when the ring is full the oldest record
//! is overwritten.  Dispense and gate records without a wall-clock
//! timestamp are refused, as the backend rejects them anyway.

use heapless::Deque;
use log::{debug, warn};
use serde::Serialize;

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::error::Result;

/// Records kept while the network is down.
pub const OUTBOX_CAPACITY: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TelemetryRecord {
    FoodDispense {
        #[serde(rename = "dispensedAt")]
        dispensed_at: u64,
        #[serde(rename = "quantityDispensed")]
        quantity_grams: u32,
    },
    GateUsage {
        #[serde(rename = "startTime")]
        start_time: u64,
        #[serde(rename = "endTime")]
        end_time: u64,
    },
    FoodWeight {
        #[serde(rename = "FoodCurrentWeight")]
        grams: i32,
        #[serde(rename = "LastFoodCurrentWeightUpdateTime")]
        updated_at: u64,
    },
}

impl TelemetryRecord {
    /// Backend script that accepts this record.
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::FoodDispense { .. } => "add_food_dispense_event.php",
            Self::GateUsage { .. } => "add_gate_event.php",
            Self::FoodWeight { .. } => "update_food_weight.php",
        }
    }

    /// Weight updates replace the stored value; the rest are new rows.
    pub fn is_update(&self) -> bool {
        matches!(self, Self::FoodWeight { .. })
    }

    pub fn to_json(&self) -> core::result::Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    fn from_event(event: &AppEvent) -> Option<Self> {
        match *event {
            AppEvent::Dispensed(report) => Some(Self::FoodDispense {
                dispensed_at: report.timestamp,
                quantity_grams: report.outcome.grams(),
            }),
            AppEvent::GateUsage {
                open_timestamp,
                close_timestamp,
            } => Some(Self::GateUsage {
                start_time: open_timestamp,
                end_time: close_timestamp,
            }),
            AppEvent::WeightReported { grams, timestamp } => Some(Self::FoodWeight {
                grams,
                updated_at: timestamp,
            }),
            _ => None,
        }
    }

    fn has_valid_time(&self) -> bool {
        match *self {
            Self::FoodDispense { dispensed_at, .. } => dispensed_at != 0,
            Self::GateUsage {
                start_time,
                end_time,
            } => start_time != 0 && end_time != 0,
            Self::FoodWeight { .. } => true,
        }
    }
}

pub struct TelemetryOutbox {
    queue: Deque<TelemetryRecord, OUTBOX_CAPACITY>,
    dropped: u32,
}

impl Default for TelemetryOutbox {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetryOutbox {
    pub fn new() -> Self {
        Self {
            queue: Deque::new(),
            dropped: 0,
        }
    }

    pub fn push(&mut self, record: TelemetryRecord) {
        if !record.has_valid_time() {
            warn!("Outbox: {} refused, time not synchronized", record.endpoint());
            return;
        }
        if self.queue.is_full() {
            self.queue.pop_front();
            self.dropped = self.dropped.saturating_add(1);
            warn!("Outbox: full, oldest record dropped ({} total)", self.dropped);
        }
        // Room was made above.
        let _ = self.queue.push_back(record);
    }

    pub fn pop(&mut self) -> Option<TelemetryRecord> {
        self.queue.pop_front()
    }

    /// Hand every queued record to `send`, oldest first.  A record whose
    /// delivery fails is logged and dropped, never retried.  Returns the
    /// number delivered.
    pub fn flush(&mut self, mut send: impl FnMut(&TelemetryRecord) -> Result<()>) -> usize {
        let mut delivered = 0;
        while let Some(record) = self.queue.pop_front() {
            match send(&record) {
                Ok(()) => delivered += 1,
                Err(e) => warn!("Outbox: {} dropped ({})", record.endpoint(), e),
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

impl EventSink for TelemetryOutbox {
    fn emit(&mut self, event: &AppEvent) {
        if let Some(record) = TelemetryRecord::from_event(event) {
            if let TelemetryRecord::FoodWeight { updated_at: 0, .. } = record {
                debug!("Outbox: weight update without timestamp");
            }
            self.push(record);
        }
    }
}
