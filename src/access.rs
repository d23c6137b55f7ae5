//! Access gate arbiter.
//!
//! Turns the stream of RFID tag reads into open/close requests for the
//! [`GateStateMachine`].  Presence is debounced asymmetrically:
//!
//! | Read                 | Effect                                      |
//! |----------------------|---------------------------------------------|
//! | registered tag       | refresh `last_presence_ms`, mark valid      |
//! | any other tag        | invalidate immediately                      |
//! | nothing              | unchanged; presence decays by timeout alone |
//!
//! Every pass the arbiter asks the gate to open while presence holds and to
//! close otherwise; the gate itself filters redundant requests.

use core::fmt;
use core::str::FromStr;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{Clock, EventSink, GateActuatorPort, TagReaderPort};
use crate::config::TrapMode;
use crate::gate::GateStateMachine;

// ───────────────────────────────────────────────────────────────
// Tag identifier
// ───────────────────────────────────────────────────────────────

/// RFID tag identifier.  Printed as upper-case hex without leading zeros
/// (`7E3FE9`), the same form as the label on the fob.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagId(pub u32);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:X}", self.0)
    }
}

/// Tag string was empty, too long, or not hexadecimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagParseError;

impl fmt::Display for TagParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid tag id")
    }
}

impl FromStr for TagId {
    type Err = TagParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(TagParseError);
        }
        u32::from_str_radix(s, 16).map(TagId).map_err(|_| TagParseError)
    }
}

// ───────────────────────────────────────────────────────────────
// Presence window
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceWindow {
    pub last_presence_ms: u64,
    pub timeout_ms: u64,
    pub is_valid: bool,
}

impl PresenceWindow {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            last_presence_ms: 0,
            timeout_ms,
            is_valid: false,
        }
    }

    /// Presence covers `[last_presence_ms, last_presence_ms + timeout_ms)`.
    pub fn is_present(&self, now_ms: u64) -> bool {
        self.is_valid && now_ms.saturating_sub(self.last_presence_ms) < self.timeout_ms
    }

    fn refresh(&mut self, now_ms: u64) {
        self.last_presence_ms = now_ms;
        self.is_valid = true;
    }

    fn invalidate(&mut self) {
        self.last_presence_ms = 0;
        self.is_valid = false;
    }
}

// ───────────────────────────────────────────────────────────────
// Arbiter
// ───────────────────────────────────────────────────────────────

pub struct AccessArbiter {
    registered: [TagId; 2],
    window: PresenceWindow,
    trap_mode: TrapMode,
}

impl AccessArbiter {
    pub fn new(registered: [TagId; 2], timeout_ms: u64, trap_mode: TrapMode) -> Self {
        Self {
            registered,
            window: PresenceWindow::new(timeout_ms),
            trap_mode,
        }
    }

    /// Apply one tag read to the presence window.
    pub fn on_tag_read(&mut self, tag: TagId, now_ms: u64) {
        if self.registered.contains(&tag) {
            if !self.window.is_present(now_ms) {
                info!("Access: registered tag {} present", tag);
            }
            self.window.refresh(now_ms);
        } else {
            warn!("Access: unregistered tag {}, presence cleared", tag);
            self.window.invalidate();
        }
    }

    /// Poll the reader and route the decision through the gate.
    pub fn tick(
        &mut self,
        clock: &impl Clock,
        hw: &mut (impl TagReaderPort + GateActuatorPort),
        gate: &mut GateStateMachine,
        sink: &mut impl EventSink,
    ) {
        let now = clock.uptime_ms();
        if let Some(tag) = hw.read_tag() {
            self.on_tag_read(tag, now);
        }

        let want_open = match self.trap_mode {
            TrapMode::AlwaysOpen => true,
            TrapMode::TagBased => self.window.is_present(now),
        };

        if want_open {
            gate.open(clock, hw);
        } else {
            gate.close(clock, hw, sink, true);
        }
    }

    pub fn is_present(&self, now_ms: u64) -> bool {
        self.window.is_present(now_ms)
    }

    /// Drop any current presence.
    pub fn invalidate(&mut self) {
        self.window.invalidate();
    }

    pub fn set_registered_tags(&mut self, tags: [TagId; 2]) {
        info!("Access: registered tags {} / {}", tags[0], tags[1]);
        self.registered = tags;
        self.window.invalidate();
    }

    pub fn registered_tags(&self) -> [TagId; 2] {
        self.registered
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u64) {
        self.window.timeout_ms = timeout_ms;
    }

    pub fn set_trap_mode(&mut self, mode: TrapMode) {
        if mode != self.trap_mode {
            info!("Access: trap mode {:?}", mode);
        }
        self.trap_mode = mode;
    }

    pub fn trap_mode(&self) -> TrapMode {
        self.trap_mode
    }

    pub fn window(&self) -> &PresenceWindow {
        &self.window
    }
}
