//! System configuration parameters
//!
//! All tunable parameters for the PetFeeder system.
//! Values can be overridden via NVS (non-volatile storage) or a remote
//! `UpdateFeeder` command.  The feeding schedule itself is a separate JSON
//! document (see [`crate::schedule`]).

use serde::{Deserialize, Serialize};

use crate::access::TagId;

/// How the access gate decides to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrapMode {
    /// Open only while a registered tag is present.
    TagBased,
    /// Keep the gate open regardless of tags.
    AlwaysOpen,
}

impl TrapMode {
    /// Parse the remote-config spelling (`TAG_BASED` / `ALWAYS_OPEN`).
    pub fn from_remote(s: &str) -> Option<Self> {
        match s {
            "TAG_BASED" => Some(Self::TagBased),
            "ALWAYS_OPEN" => Some(Self::AlwaysOpen),
            _ => None,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeederConfig {
    // --- Access gate ---
    /// Presence window after the last registered tag read (milliseconds)
    pub tag_timeout_ms: u32,
    /// The two tags allowed through the gate
    pub registered_tags: [TagId; 2],
    /// Gate opening policy
    pub trap_mode: TrapMode,
    /// Hold the gate closed for the duration of every dispense session
    pub close_gate_while_dispensing: bool,

    // --- Time ---
    /// Offset added to UTC before computing day index and minute of day
    pub utc_offset_secs: i32,

    // --- Timing ---
    /// Main loop pass interval (milliseconds)
    pub tick_interval_ms: u32,
    /// Task watchdog timeout (milliseconds)
    pub watchdog_timeout_ms: u32,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            // Access gate
            tag_timeout_ms: 10_000,
            registered_tags: [TagId(0x7E_3FE9), TagId(0x1E_CADE)],
            trap_mode: TrapMode::TagBased,
            close_gate_while_dispensing: true,

            // Time
            utc_offset_secs: 7200, // UTC+2

            // Timing
            tick_interval_ms: 100,
            watchdog_timeout_ms: 10_000,
        }
    }
}
