//! Health monitor.
//!
//! Runs **every tick after the gate** and accumulates a bitmask of
//! degraded-mode conditions.  None of these stop the feeder; they are the
//! operator-visible summary of what the control loop is silently absorbing.
//!
//! | Flag                 | Set while                                       |
//! |----------------------|-------------------------------------------------|
//! | `TimeNotSynced`      | wall clock unavailable, schedule evaluation off |
//! | `ScheduleEmpty`      | no feed slots loaded (parse failure or none)    |
//! | `LastDispenseFailed` | the most recent session ended in `Failure`      |

use core::fmt;

use log::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HealthFlag {
    TimeNotSynced = 0b0000_0001,
    ScheduleEmpty = 0b0000_0010,
    LastDispenseFailed = 0b0000_0100,
}

impl HealthFlag {
    /// Return the bitmask for this flag.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for HealthFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeNotSynced => write!(f, "time not synced"),
            Self::ScheduleEmpty => write!(f, "schedule empty"),
            Self::LastDispenseFailed => write!(f, "last dispense failed"),
        }
    }
}

/// Inputs sampled from the service each tick.
#[derive(Debug, Clone, Copy)]
pub struct HealthInputs {
    pub time_synced: bool,
    pub schedule_len: usize,
    pub last_dispense_failed: bool,
}

#[derive(Debug, Default)]
pub struct HealthMonitor {
    flags: u8,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-evaluate every flag.  Returns the updated bitmask.
    pub fn evaluate(&mut self, inputs: HealthInputs) -> u8 {
        self.eval_flag(HealthFlag::TimeNotSynced, !inputs.time_synced);
        self.eval_flag(HealthFlag::ScheduleEmpty, inputs.schedule_len == 0);
        self.eval_flag(HealthFlag::LastDispenseFailed, inputs.last_dispense_failed);
        self.flags
    }

    pub fn flags(&self) -> u8 {
        self.flags
    }

    pub fn has_flag(&self, flag: HealthFlag) -> bool {
        self.flags & flag.mask() != 0
    }

    fn eval_flag(&mut self, flag: HealthFlag, condition: bool) {
        if condition {
            if self.flags & flag.mask() == 0 {
                warn!("HEALTH SET: {flag}");
            }
            self.flags |= flag.mask();
        } else {
            if self.flags & flag.mask() != 0 {
                info!("HEALTH CLEARED: {flag}");
            }
            self.flags &= !flag.mask();
        }
    }
}
