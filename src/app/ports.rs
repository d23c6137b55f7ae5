//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ FeederService (domain)
//! ```
//!
//! Driven adapters (load cell, feed relay, gate stepper, tag reader, event
//! sinks, storage) implement these traits.  The
//! [`FeederService`](super::service::FeederService) consumes them via
//! generics, so the domain core never touches hardware directly.
//!
//! ## Notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **Clock::epoch_secs** returns 0 until wall-clock time is synchronized;
//!   the service treats 0 as "no time", never as 1970-01-01.
//! - All port errors are typed; callers must handle every variant explicitly.

use crate::access::TagId;
use crate::config::FeederConfig;

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: RTC / SNTP → domain)
// ───────────────────────────────────────────────────────────────

/// Monotonic uptime plus wall-clock time.
pub trait Clock {
    /// Milliseconds since boot (monotonic).
    fn uptime_ms(&self) -> u64;

    /// Seconds since the Unix epoch (UTC), or `0` when not synchronized.
    fn epoch_secs(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Sensor ports (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Bowl load cell.
pub trait WeightPort {
    /// Current bowl weight in grams.
    ///
    /// Never fails: when the amplifier is not ready the last good reading
    /// is returned (initially `-1`).
    fn read_weight_grams(&mut self) -> i32;
}

/// RFID tag reader.
pub trait TagReaderPort {
    /// Next decoded tag since the previous call, if any.
    fn read_tag(&mut self) -> Option<TagId>;
}

// ───────────────────────────────────────────────────────────────
// Actuator ports (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Feed auger / vibration motor relay.
pub trait FeedActuatorPort {
    fn set_feed_actuator(&mut self, on: bool);
}

/// Gate stepper motor.
pub trait GateActuatorPort {
    /// Travel the given number of steps (sign = direction).
    fn step_gate(&mut self, steps: i32);

    /// Release all coils (no holding torque).
    fn deenergize_gate(&mut self);
}

/// Everything the feeder core drives or samples, in one bound.
///
/// The service takes `&mut impl FeederHardware` so a single adapter can
/// satisfy every port without a double mutable borrow.
pub trait FeederHardware: WeightPort + TagReaderPort + FeedActuatorPort + GateActuatorPort {}

impl<T> FeederHardware for T where T: WeightPort + TagReaderPort + FeedActuatorPort + GateActuatorPort {}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log,
/// telemetry outbox, test recorder).  Emission is fire-and-forget.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn emit(&mut self, event: &super::events::AppEvent) {
        (**self).emit(event);
    }
}

/// Fan-out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration and the feeding schedule.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`FeederConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<FeederConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &FeederConfig) -> Result<(), ConfigError>;

    /// Load the raw schedule document (`{"HH:MM": grams, ...}`).
    /// Returns `Ok(None)` on first boot.
    fn load_schedule_json(&self) -> Result<Option<String>, ConfigError>;

    /// Persist the raw schedule document as received.
    fn save_schedule_json(&self, json: &str) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Namespaced key-value store for small values that outlive a reboot
/// (the carried bowl weight).  A write either lands whole or not at all.
pub trait StoragePort {
    /// Copy the value into `buf`, returning its length.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    /// Nothing stored yet.
    NotFound,
    /// Stored blob or schedule document would not decode.
    Corrupted,
    /// Range check failed; names the offending field.
    ValidationFailed(&'static str),
    StorageFull,
    IoError,
}

#[derive(Debug)]
pub enum StorageError {
    NotFound,
    Full,
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
