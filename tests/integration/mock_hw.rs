//! Mock hardware adapter for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO registers.  The bowl weight and the
//! tag reader are driven directly by the test.

use petfeeder::access::TagId;
use petfeeder::app::events::AppEvent;
use petfeeder::app::ports::{
    Clock, ConfigError, ConfigPort, EventSink, FeedActuatorPort, GateActuatorPort, StorageError,
    StoragePort, TagReaderPort, WeightPort,
};
use petfeeder::config::FeederConfig;
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};

/// 2023-11-14, a Tuesday.
pub const TEST_DAY: u64 = 19_675;

/// UTC epoch for a local wall-clock time under the default +2h offset.
pub fn local_epoch(day: u64, hour: u64, minute: u64) -> u64 {
    day * 86_400 + hour * 3_600 + minute * 60 - 7_200
}

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwCall {
    Feed(bool),
    Step(i32),
    Deenergize,
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub calls: Vec<HwCall>,
    /// Grams returned by every scale read.
    pub weight: i32,
    pub tags: VecDeque<TagId>,
    pub weight_reads: u32,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            weight: 0,
            tags: VecDeque::new(),
            weight_reads: 0,
        }
    }

    pub fn feed_on(&self) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match c {
                HwCall::Feed(on) => Some(*on),
                _ => None,
            })
            .unwrap_or(false)
    }

    pub fn steps(&self) -> Vec<i32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::Step(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn feed_calls(&self) -> Vec<bool> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                HwCall::Feed(on) => Some(*on),
                _ => None,
            })
            .collect()
    }

    pub fn present(&mut self, tag: TagId) {
        self.tags.push_back(tag);
    }
}

impl Default for MockHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightPort for MockHardware {
    fn read_weight_grams(&mut self) -> i32 {
        self.weight_reads += 1;
        self.weight
    }
}

impl TagReaderPort for MockHardware {
    fn read_tag(&mut self) -> Option<TagId> {
        self.tags.pop_front()
    }
}

impl FeedActuatorPort for MockHardware {
    fn set_feed_actuator(&mut self, on: bool) {
        self.calls.push(HwCall::Feed(on));
    }
}

impl GateActuatorPort for MockHardware {
    fn step_gate(&mut self, steps: i32) {
        self.calls.push(HwCall::Step(steps));
    }

    fn deenergize_gate(&mut self) {
        // Only record transitions to keep the history readable.
        if self.calls.last() != Some(&HwCall::Deenergize) {
            self.calls.push(HwCall::Deenergize);
        }
    }
}

// ── ManualClock ───────────────────────────────────────────────

pub struct ManualClock {
    pub uptime: Cell<u64>,
    pub epoch: Cell<u64>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new(uptime_ms: u64, epoch_secs: u64) -> Self {
        Self {
            uptime: Cell::new(uptime_ms),
            epoch: Cell::new(epoch_secs),
        }
    }

    /// Move both clocks forward (wall clock only when synced).
    pub fn advance_ms(&self, ms: u64) {
        self.uptime.set(self.uptime.get() + ms);
        let epoch = self.epoch.get();
        if epoch != 0 {
            self.epoch.set(epoch + ms / 1000);
        }
    }

    pub fn set_epoch(&self, epoch_secs: u64) {
        self.epoch.set(epoch_secs);
    }

    pub fn now_ms(&self) -> u64 {
        self.uptime.get()
    }
}

impl Clock for ManualClock {
    fn uptime_ms(&self) -> u64 {
        self.uptime.get()
    }

    fn epoch_secs(&self) -> u64 {
        self.epoch.get()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispensed(&self) -> Vec<petfeeder::control::dispense::DispenseReport> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::Dispensed(r) => Some(*r),
                _ => None,
            })
            .collect()
    }

    pub fn gate_usages(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::GateUsage { .. }))
            .count()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: RefCell<HashMap<String, Vec<u8>>>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.borrow().get(&format!("{}::{}", namespace, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .remove(&format!("{}::{}", namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store
            .borrow()
            .contains_key(&format!("{}::{}", namespace, key))
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<FeederConfig, ConfigError> {
        Ok(FeederConfig::default())
    }

    fn save(&self, _config: &FeederConfig) -> Result<(), ConfigError> {
        Ok(())
    }

    fn load_schedule_json(&self) -> Result<Option<String>, ConfigError> {
        Ok(self
            .store
            .borrow()
            .get("feeder::foodConfig")
            .and_then(|v| String::from_utf8(v.clone()).ok()))
    }

    fn save_schedule_json(&self, json: &str) -> Result<(), ConfigError> {
        self.store
            .borrow_mut()
            .insert("feeder::foodConfig".into(), json.as_bytes().to_vec());
        Ok(())
    }
}
