//! PetFeeder Firmware: Main Entry Point
//!
//! Hexagonal architecture around a single cooperative scheduler loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        LogEventSink   NvsAdapter   Esp32Time  │
//! │  (Weight+Tag+Feed+Gate) TelemetryOutbox (Config+NVS) (Clock)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              FeederService (pure logic)                │    │
//! │  │  Schedule · Dispense · Gate · Access · Health          │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::Result;
use log::{error, info, warn};

use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{OutputPin as _, PinDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::sntp::EspSntp;

use petfeeder::adapters::hardware::HardwareAdapter;
use petfeeder::adapters::log_sink::LogEventSink;
use petfeeder::adapters::nvs::NvsAdapter;
use petfeeder::adapters::outbox::TelemetryOutbox;
use petfeeder::adapters::time::Esp32TimeAdapter;
use petfeeder::app::commands::AppCommand;
use petfeeder::app::ports::{Clock, ConfigPort};
use petfeeder::app::service::FeederService;
use petfeeder::config::FeederConfig;
use petfeeder::drivers::feed_motor::FeedMotor;
use petfeeder::drivers::stepper::GateStepper;
use petfeeder::drivers::{hw_init, watchdog::Watchdog};
use petfeeder::error::Error;
use petfeeder::pins;
use petfeeder::sensors::rfid::TagReader;
use petfeeder::sensors::weight::{self, WeightSensor};

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PetFeeder v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Raw peripherals (HX711 GPIO, RFID UART) ────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Halt; the watchdog is not armed yet, so reset explicitly.
        error!("HAL init failed: {}, restarting", e);
        esp_idf_hal::reset::restart();
    }

    // ── 3. Load config and schedule from NVS ──────────────────
    let mut nvs = NvsAdapter::new().map_err(|e| anyhow::anyhow!("NVS init failed: {}", e))?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            FeederConfig::default()
        }
    };
    let schedule_doc = match nvs.load_schedule_json() {
        Ok(doc) => doc,
        Err(e) => {
            warn!("NVS schedule load failed ({}), starting empty", e);
            None
        }
    };

    let watchdog = Watchdog::new(config.watchdog_timeout_ms);

    // ── 4. Construct hardware adapter ─────────────────────────
    let mut scale = WeightSensor::new();
    let carried = weight::take_restart_weight(&mut nvs);
    scale.tare();
    scale.set_offset(carried);
    info!("Scale tared, restart offset {}g", carried);

    let p = Peripherals::take()?;
    let relay = PinDriver::output(p.pins.gpio21)?;
    let coils = [
        PinDriver::output(p.pins.gpio19.downgrade_output())?, // IN1
        PinDriver::output(p.pins.gpio5.downgrade_output())?,  // IN3
        PinDriver::output(p.pins.gpio18.downgrade_output())?, // IN2
        PinDriver::output(p.pins.gpio17.downgrade_output())?, // IN4
    ];

    let mut hw = HardwareAdapter::new(
        scale,
        TagReader::new(),
        FeedMotor::new(relay).map_err(|e| anyhow::anyhow!("feed relay: {}", e))?,
        GateStepper::new(coils, Ets, pins::GATE_STEPS_PER_REV, pins::GATE_SPEED_RPM),
    );

    // ── 5. Wall clock ─────────────────────────────────────────
    // Syncs once the network link is up; evaluation waits for it.
    let _sntp = match EspSntp::new_default() {
        Ok(s) => Some(s),
        Err(e) => {
            warn!("SNTP unavailable ({}), schedule stays idle until time is set", e);
            None
        }
    };
    let clock = Esp32TimeAdapter::new();

    // ── 6. Construct app service ──────────────────────────────
    let mut log_sink = LogEventSink::new();
    let mut outbox = TelemetryOutbox::new();
    let mut app = FeederService::new(config.clone());

    if let Some(doc) = schedule_doc {
        app.handle_command(
            AppCommand::LoadScheduleJson(doc),
            &clock,
            &mut hw,
            &mut (&mut log_sink, &mut outbox),
        );
    }
    app.start(&mut (&mut log_sink, &mut outbox));

    info!("System ready. Entering scheduler loop.");

    // ── 7. Scheduler loop ─────────────────────────────────────
    let mut persisted_count = app.dispense_count();

    loop {
        esp_idf_hal::delay::FreeRtos::delay_ms(config.tick_interval_ms);

        app.tick(&clock, &mut hw, &mut (&mut log_sink, &mut outbox));

        // No uplink is attached yet: log each payload, report it undelivered.
        outbox.flush(|record| {
            if let Ok(json) = record.to_json() {
                info!("OUTBOX | {} {}", record.endpoint(), json);
            }
            Err(Error::NetworkUnavailable)
        });

        // Carry the bowl weight across a reboot.
        if app.dispense_count() != persisted_count {
            persisted_count = app.dispense_count();
            if let Err(e) = weight::store_restart_weight(&mut nvs, hw.cached_weight().max(0)) {
                warn!("Restart weight not persisted ({})", e);
            }
        }

        // Feed watchdog on every iteration.
        watchdog.feed();

        if app.tick_count() % 600 == 0 {
            info!(
                "HEALTH | flags=0b{:08b} uptime={}s slots={}",
                app.health_flags(),
                clock.uptime_ms() / 1000,
                app.schedule().len()
            );
        }
    }
}
