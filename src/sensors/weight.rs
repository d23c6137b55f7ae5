//! HX711 load-cell driver for the food bowl.
//!
//! 24-bit conversions clocked out over two GPIOs (DOUT, PD_SCK).  The
//! driver tares at boot, converts counts to grams with a fixed calibration
//! factor and adds a carried-over offset for food that was already in the
//! bowl before a restart (the tare zeroes it otherwise).
//!
//! ## Fallback
//!
//! When the amplifier has no conversion ready the last good reading is
//! returned (initially `-1`).  A flaky scale degrades to stale data, never
//! to an error in the control loop.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: bit-bangs the HX711 via hw_init helpers.
//! On host/test: reads raw counts injected through `sim_set_raw`.

use log::warn;

use crate::app::ports::{StoragePort, StorageError};
use crate::error::SensorError;

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
#[cfg(target_os = "espidf")]
use crate::pins;

/// Counts per kilogram for the fitted load cell.
pub const DEFAULT_CALIBRATION: f32 = 466_170.1;

/// Reading before any conversion has completed.
pub const INVALID_WEIGHT: i32 = -1;

#[cfg(not(target_os = "espidf"))]
static SIM_RAW: AtomicI32 = AtomicI32::new(0);
#[cfg(not(target_os = "espidf"))]
static SIM_READY: AtomicBool = AtomicBool::new(true);

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_raw(counts: i32) {
    SIM_RAW.store(counts, Ordering::Relaxed);
}

#[cfg(not(target_os = "espidf"))]
pub fn sim_set_ready(ready: bool) {
    SIM_READY.store(ready, Ordering::Relaxed);
}

/// Convert tared counts to whole grams, clamped at zero, plus `offset`.
pub fn counts_to_grams(raw: i32, tare: i32, calibration: f32, offset: i32) -> i32 {
    let kg = (raw.saturating_sub(tare)) as f32 / calibration;
    let grams = (kg * 1000.0) as i32;
    grams.max(0).saturating_add(offset)
}

pub struct WeightSensor {
    calibration: f32,
    tare: i32,
    offset: i32,
    cached: i32,
}

impl Default for WeightSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl WeightSensor {
    pub fn new() -> Self {
        Self {
            calibration: DEFAULT_CALIBRATION,
            tare: 0,
            offset: 0,
            cached: INVALID_WEIGHT,
        }
    }

    /// Zero the scale on the current load.  Returns `false` if the
    /// amplifier was not ready.
    pub fn tare(&mut self) -> bool {
        match self.read_raw() {
            Ok(raw) => {
                self.tare = raw;
                true
            }
            Err(e) => {
                warn!("Weight: tare skipped, {}", e);
                false
            }
        }
    }

    /// Grams already in the bowl when the scale was tared.
    pub fn set_offset(&mut self, grams: i32) {
        self.offset = grams;
    }

    pub fn set_calibration(&mut self, counts_per_kg: f32) {
        if counts_per_kg.is_finite() && counts_per_kg != 0.0 {
            self.calibration = counts_per_kg;
        }
    }

    /// Fresh conversion in grams.  Leaves the cache untouched on error.
    pub fn try_read_grams(&mut self) -> Result<i32, SensorError> {
        let raw = self.read_raw()?;
        self.cached = counts_to_grams(raw, self.tare, self.calibration, self.offset);
        Ok(self.cached)
    }

    /// Current bowl weight, or the last good one when not ready.
    pub fn read_grams(&mut self) -> i32 {
        match self.try_read_grams() {
            Ok(grams) => grams,
            Err(e) => {
                log::debug!("Weight: {}, cached {}g", e, self.cached);
                self.cached
            }
        }
    }

    pub fn cached_grams(&self) -> i32 {
        self.cached
    }

    #[cfg(target_os = "espidf")]
    fn read_raw(&self) -> Result<i32, SensorError> {
        // DOUT high = conversion in progress.
        if hw_init::gpio_read(pins::SCALE_DATA_GPIO) {
            return Err(SensorError::NotReady);
        }
        let mut value: u32 = 0;
        for _ in 0..24 {
            hw_init::gpio_write(pins::SCALE_CLOCK_GPIO, true);
            hw_init::delay_us(1);
            value = (value << 1) | u32::from(hw_init::gpio_read(pins::SCALE_DATA_GPIO));
            hw_init::gpio_write(pins::SCALE_CLOCK_GPIO, false);
            hw_init::delay_us(1);
        }
        // 25th pulse: channel A, gain 128 for the next conversion.
        hw_init::gpio_write(pins::SCALE_CLOCK_GPIO, true);
        hw_init::delay_us(1);
        hw_init::gpio_write(pins::SCALE_CLOCK_GPIO, false);

        // Sign-extend 24-bit two's complement.
        Ok(((value << 8) as i32) >> 8)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_raw(&self) -> Result<i32, SensorError> {
        if !SIM_READY.load(Ordering::Relaxed) {
            return Err(SensorError::NotReady);
        }
        Ok(SIM_RAW.load(Ordering::Relaxed))
    }
}

// ── Restart carry-over ────────────────────────────────────────

const RESTART_NAMESPACE: &str = "feeder";
const RESTART_KEY: &str = "restartWeight";

/// Remember the bowl weight so the next boot can re-apply it as offset.
pub fn store_restart_weight(storage: &mut impl StoragePort, grams: i32) -> Result<(), StorageError> {
    storage.write(RESTART_NAMESPACE, RESTART_KEY, &grams.to_le_bytes())
}

/// Read and clear the carried-over bowl weight.  `0` when none is stored.
pub fn take_restart_weight(storage: &mut impl StoragePort) -> i32 {
    let mut buf = [0u8; 4];
    let grams = match storage.read(RESTART_NAMESPACE, RESTART_KEY, &mut buf) {
        Ok(4) => i32::from_le_bytes(buf).max(0),
        Ok(_) => {
            warn!("Weight: restart weight has wrong size, ignored");
            0
        }
        Err(StorageError::NotFound) => return 0,
        Err(e) => {
            warn!("Weight: restart weight read failed ({})", e);
            0
        }
    };
    if let Err(e) = storage.delete(RESTART_NAMESPACE, RESTART_KEY) {
        warn!("Weight: restart weight clear failed ({})", e);
    }
    grams
}
