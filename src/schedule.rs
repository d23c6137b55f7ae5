//! Feeding schedule store.
//!
//! Holds the day's feed slots in ascending time order, each with a
//! per-day "already dispensed" flag.  The store is pure data: the
//! [`FeederService`](crate::app::service::FeederService) decides when
//! to scan it and when a day has rolled over.
//!
//! ```text
//!   {"08:00": 20, "20:00": 15}
//!            │ parse_schedule_json
//!            ▼
//!   [(08:00, 20g, ☐), (20:00, 15g, ☐)]  ── reset_dispense_status(09:00) ──▶
//!   [(08:00, 20g, ☑), (20:00, 15g, ☐)]  ── due_entries(20:00) ──▶ [1]
//! ```
//!
//! Keys that are not a valid `HH:MM` are kept with no time of day.  They
//! sort before every valid slot, always read as dispensed, and never fire.

use log::{info, warn};
use serde_json::Value;

use crate::error::{Error, Result};

// ═══════════════════════════════════════════════════════════════
//  Entry types
// ═══════════════════════════════════════════════════════════════

/// One slot per minute of the day at most.
pub const MAX_ENTRIES: usize = 1440;

/// A single feed slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedEntry {
    /// Minutes since local midnight (0–1439), `None` for an unparseable key.
    pub time_of_day: Option<u16>,
    /// Food to dispense, in grams.
    pub quantity_grams: u32,
    /// Set once the slot has been handled today.
    pub dispensed_today: bool,
}

impl FeedEntry {
    pub fn is_valid(&self) -> bool {
        self.time_of_day.is_some()
    }
}

/// Outcome counts of a [`ScheduleStore::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadSummary {
    pub loaded: usize,
    pub invalid: usize,
    pub dropped: usize,
}

/// Parse `"HH:MM"` into minutes since midnight.
///
/// The colon must be neither the first nor the last character, both
/// halves must be plain decimal digits, hour 0–23 and minute 0–59.
pub fn parse_time_of_day(s: &str) -> Option<u16> {
    let (h, m) = s.split_once(':')?;
    if h.is_empty() || m.is_empty() {
        return None;
    }
    if !h.bytes().all(|b| b.is_ascii_digit()) || !m.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u16 = h.parse().ok()?;
    let minute: u16 = m.parse().ok()?;
    if hour >= 24 || minute >= 60 {
        return None;
    }
    Some(hour * 60 + minute)
}

/// [`parse_time_of_day`] for schedule keys, as a firmware error.
pub fn parse_time_key(key: &str) -> Result<u16> {
    parse_time_of_day(key).ok_or(Error::InvalidTimeFormat)
}

/// Format minutes since midnight as `HH:MM`.
pub fn format_time_of_day(minutes: u16) -> heapless::String<5> {
    use core::fmt::Write;
    let mut out = heapless::String::new();
    let _ = write!(out, "{:02}:{:02}", minutes / 60, minutes % 60);
    out
}

/// Parse a schedule document: a top-level JSON object mapping `"HH:MM"`
/// keys to gram quantities.
///
/// Quantities that are not integers are truncated, negatives clamp to 0
/// and non-numeric values read as 0.  A document whose top level is not
/// an object is a [`Error::ConfigParse`].
pub fn parse_schedule_json(doc: &str) -> Result<Vec<(String, u32)>> {
    let value: Value = serde_json::from_str(doc).map_err(|_| Error::ConfigParse)?;
    let Value::Object(map) = value else {
        return Err(Error::ConfigParse);
    };

    Ok(map
        .into_iter()
        .map(|(key, v)| (key, quantity_from_json(&v)))
        .collect())
}

fn quantity_from_json(v: &Value) -> u32 {
    match v {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                u.min(u32::MAX as u64) as u32
            } else if let Some(f) = n.as_f64() {
                if f <= 0.0 { 0 } else { f.min(u32::MAX as f64) as u32 }
            } else {
                0
            }
        }
        _ => 0,
    }
}

// ═══════════════════════════════════════════════════════════════
//  Store
// ═══════════════════════════════════════════════════════════════

/// Ordered, bounded set of feed slots.
#[derive(Debug, Clone, Default)]
pub struct ScheduleStore {
    entries: Vec<FeedEntry>,
    invalid: usize,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole schedule.
    ///
    /// Entries past [`MAX_ENTRIES`] are dropped.  The result is sorted by
    /// time of day (stable, so duplicate times keep document order) and
    /// every flag starts cleared.
    pub fn load<I, K>(&mut self, items: I) -> LoadSummary
    where
        I: IntoIterator<Item = (K, u32)>,
        K: AsRef<str>,
    {
        self.entries.clear();
        self.invalid = 0;
        let mut summary = LoadSummary::default();

        for (key, quantity_grams) in items {
            if self.entries.len() >= MAX_ENTRIES {
                summary.dropped += 1;
                continue;
            }
            let key = key.as_ref();
            let time_of_day = match parse_time_key(key) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!("Schedule: '{}': {}, slot will never fire", key, e);
                    self.invalid += 1;
                    None
                }
            };
            self.entries.push(FeedEntry {
                time_of_day,
                quantity_grams,
                dispensed_today: false,
            });
        }

        if summary.dropped > 0 {
            warn!(
                "Schedule: capacity {} reached, dropped {} entries",
                MAX_ENTRIES, summary.dropped
            );
        }

        self.entries.sort_by_key(|e| e.time_of_day);
        summary.loaded = self.entries.len();
        summary.invalid = self.invalid;
        info!(
            "Schedule: loaded {} entries ({} invalid)",
            summary.loaded, summary.invalid
        );
        summary
    }

    /// Re-arm the day: every slot strictly before `current_minutes` counts
    /// as already handled, every later slot is pending.
    ///
    /// Called with the current minute on first time sync and with `0` at
    /// day rollover.  Invalid slots always come out handled.
    pub fn reset_dispense_status(&mut self, current_minutes: u16) {
        for e in &mut self.entries {
            e.dispensed_today = match e.time_of_day {
                Some(t) => t < current_minutes,
                None => true,
            };
        }
    }

    /// Indices (ascending) of slots that are due and not yet handled.
    pub fn due_entries(&self, current_minutes: u16) -> impl Iterator<Item = usize> + '_ {
        self.entries
            .iter()
            .enumerate()
            .filter(move |(_, e)| {
                !e.dispensed_today && e.time_of_day.is_some_and(|t| t <= current_minutes)
            })
            .map(|(i, _)| i)
    }

    /// Flag a slot as handled for today.  Returns `false` for a stale index.
    pub fn mark_dispensed(&mut self, index: usize) -> bool {
        match self.entries.get_mut(index) {
            Some(e) => {
                e.dispensed_today = true;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<&FeedEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[FeedEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of slots with an unparseable key.
    pub fn invalid_count(&self) -> usize {
        self.invalid
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
