//! ESP32 time adapter.
//!
//! Implements [`Clock`] for the PetFeeder system.
//!
//! - **`target_os = "espidf"`**: uptime from `esp_timer_get_time()`
//!   (microsecond precision, monotonic), wall clock from `gettimeofday()`
//!   as set by SNTP.
//! - **`not(target_os = "espidf")`**: `std::time::Instant` and
//!   `SystemTime` for host-side simulation.

use crate::app::ports::Clock;

/// Anything earlier is an unsynchronized RTC, not a real date.
const EPOCH_2020: u64 = 1_577_836_800;

/// Time adapter for the ESP32 platform.
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    #[cfg(target_os = "espidf")]
    fn raw_epoch_secs() -> u64 {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return 0;
        }
        u64::try_from(tv.tv_sec).unwrap_or(0)
    }

    #[cfg(not(target_os = "espidf"))]
    fn raw_epoch_secs() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// Map an RTC reading to the `0 = unsynchronized` convention.
pub fn synced_or_zero(raw_secs: u64) -> u64 {
    if raw_secs < EPOCH_2020 { 0 } else { raw_secs }
}

impl Clock for Esp32TimeAdapter {
    #[cfg(target_os = "espidf")]
    fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    #[cfg(not(target_os = "espidf"))]
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn epoch_secs(&self) -> u64 {
        synced_or_zero(Self::raw_epoch_secs())
    }
}
