//! Unified error types for the PetFeeder firmware.
//!
//! One `Error` enum that every subsystem can convert into.  All variants are
//! `Copy` so they pass through the cooperative scheduler and the dispense
//! state machine without allocation.  Nearly every condition here is
//! recoverable and absorbed where it happens; the enum exists so that the
//! absorption is explicit and loggable.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Schedule document could not be parsed; the store falls back to zero
    /// entries.
    ConfigParse,
    /// A schedule key is not a valid `HH:MM`; the entry is kept but never
    /// dispenses.
    InvalidTimeFormat,
    /// Wall-clock time is not available yet; schedule evaluation is skipped.
    TimeNotSynced,
    /// A dispense session hit its deadline before reaching the expected
    /// weight.
    DispenseTimeout,
    /// A sensor could not be read.
    Sensor(SensorError),
    /// An actuator command was refused (e.g. gate busy or held).
    Actuator(ActuatorError),
    /// Network collaborator unavailable; telemetry stays queued or is dropped.
    NetworkUnavailable,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse => write!(f, "schedule document malformed"),
            Self::InvalidTimeFormat => write!(f, "invalid HH:MM time key"),
            Self::TimeNotSynced => write!(f, "time not synchronized"),
            Self::DispenseTimeout => write!(f, "dispense deadline reached"),
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::NetworkUnavailable => write!(f, "network unavailable"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Load-cell amplifier did not signal data-ready.
    NotReady,
    /// Tag reader frame failed its checksum.
    BadChecksum,
    /// Tag reader frame had the wrong framing bytes or length.
    MalformedFrame,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotReady => write!(f, "sensor not ready"),
            Self::BadChecksum => write!(f, "checksum mismatch"),
            Self::MalformedFrame => write!(f, "malformed frame"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Gate is inside its settle window.
    GateBusy,
    /// Gate is held closed by an active dispense session.
    GateHeld,
    /// A dispense session is already running.
    DispenseActive,
    /// GPIO set failed.
    GpioWriteFailed,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GateBusy => write!(f, "gate busy"),
            Self::GateHeld => write!(f, "gate held closed"),
            Self::DispenseActive => write!(f, "dispense already active"),
            Self::GpioWriteFailed => write!(f, "GPIO write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
