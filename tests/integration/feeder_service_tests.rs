//! Integration tests for the FeederService scheduling and dispense pipeline.
//!
//! Every test drives the service pass by pass with a manual clock and a
//! scripted bowl weight, then asserts on the actuator history and the
//! emitted events.

use crate::mock_hw::{local_epoch, HwCall, ManualClock, MockHardware, RecordingSink, TEST_DAY};

use petfeeder::app::commands::AppCommand;
use petfeeder::app::events::AppEvent;
use petfeeder::app::service::{FeederService, MAX_PENDING_MANUAL, SCHEDULE_EVAL_INTERVAL_MS};
use petfeeder::config::FeederConfig;
use petfeeder::control::dispense::{DispenseOutcome, DispenseSource};
use petfeeder::health::HealthFlag;

fn make_app(epoch: u64) -> (FeederService, MockHardware, ManualClock, RecordingSink) {
    let mut app = FeederService::new(FeederConfig::default());
    let mut sink = RecordingSink::new();
    app.start(&mut sink);
    (app, MockHardware::new(), ManualClock::new(0, epoch), sink)
}

fn load(
    app: &mut FeederService,
    doc: &str,
    clock: &ManualClock,
    hw: &mut MockHardware,
    sink: &mut RecordingSink,
) {
    app.handle_command(AppCommand::LoadScheduleJson(doc.into()), clock, hw, sink);
}

fn flags(app: &FeederService) -> Vec<bool> {
    app.schedule()
        .entries()
        .iter()
        .map(|e| e.dispensed_today)
        .collect()
}

// ── Loading and time sync ────────────────────────────────────

#[test]
fn schedule_loaded_at_nine_marks_earlier_slot_done() {
    let (mut app, mut hw, clock, mut sink) = make_app(local_epoch(TEST_DAY, 9, 0));
    load(&mut app, r#"{"08:00":20,"20:00":15}"#, &clock, &mut hw, &mut sink);

    app.tick(&clock, &mut hw, &mut sink);

    assert!(app.time_synced());
    assert_eq!(flags(&app), vec![true, false]);
    assert!(!hw.feed_calls().contains(&true), "08:00 must not fire at 09:00");
    assert_eq!(sink.count(|e| matches!(e, AppEvent::TimeSynced { .. })), 1);
}

#[test]
fn evening_slot_fires_once_its_minute_arrives() {
    let (mut app, mut hw, clock, mut sink) = make_app(local_epoch(TEST_DAY, 9, 0));
    load(&mut app, r#"{"08:00":20,"20:00":15}"#, &clock, &mut hw, &mut sink);
    app.tick(&clock, &mut hw, &mut sink);

    clock.uptime.set(5_000);
    clock.set_epoch(local_epoch(TEST_DAY, 19, 59));
    app.tick(&clock, &mut hw, &mut sink);
    assert!(!app.is_dispensing());
    assert_eq!(flags(&app), vec![true, false]);

    clock.uptime.set(10_000);
    clock.set_epoch(local_epoch(TEST_DAY, 20, 0));
    app.tick(&clock, &mut hw, &mut sink);

    assert!(app.is_dispensing());
    assert_eq!(
        sink.count(|e| matches!(
            e,
            AppEvent::DispenseStarted {
                target_grams: 15,
                source: DispenseSource::Scheduled { index: 1 },
                ..
            }
        )),
        1
    );
}

#[test]
fn evaluation_waits_out_the_interval() {
    let (mut app, mut hw, clock, mut sink) = make_app(local_epoch(TEST_DAY, 7, 59));
    load(&mut app, r#"{"08:00":10}"#, &clock, &mut hw, &mut sink);
    app.tick(&clock, &mut hw, &mut sink);
    assert!(app.time_synced());

    // The slot is due, but the last evaluation was too recent.
    clock.uptime.set(SCHEDULE_EVAL_INTERVAL_MS - 1);
    clock.set_epoch(local_epoch(TEST_DAY, 8, 0));
    app.tick(&clock, &mut hw, &mut sink);
    assert!(!app.is_dispensing());
    assert_eq!(app.pending_len(), 0);
    assert_eq!(flags(&app), vec![false]);

    clock.uptime.set(SCHEDULE_EVAL_INTERVAL_MS);
    app.tick(&clock, &mut hw, &mut sink);
    assert!(app.is_dispensing());
}

#[test]
fn schedule_reloaded_after_sync_is_rearmed_to_now() {
    let (mut app, mut hw, clock, mut sink) = make_app(local_epoch(TEST_DAY, 9, 0));
    app.tick(&clock, &mut hw, &mut sink);
    assert!(app.time_synced());

    load(&mut app, r#"{"20:00":15,"08:00":20}"#, &clock, &mut hw, &mut sink);

    let times: Vec<_> = app
        .schedule()
        .entries()
        .iter()
        .map(|e| e.time_of_day)
        .collect();
    assert_eq!(times, vec![Some(480), Some(1200)]);
    assert_eq!(flags(&app), vec![true, false]);
}

#[test]
fn nothing_fires_until_time_is_synced() {
    let (mut app, mut hw, clock, mut sink) = make_app(0);
    load(&mut app, r#"{"00:00":10,"12:00":5}"#, &clock, &mut hw, &mut sink);

    for _ in 0..3 {
        app.tick(&clock, &mut hw, &mut sink);
        clock.advance_ms(5_000);
    }
    assert!(!app.time_synced());
    assert!(hw.feed_calls().is_empty());
    assert_ne!(app.health_flags() & HealthFlag::TimeNotSynced.mask(), 0);

    // Sync lands exactly on the 12:00 slot: 00:00 is history, 12:00 is due.
    clock.set_epoch(local_epoch(TEST_DAY, 12, 0));
    app.tick(&clock, &mut hw, &mut sink);

    assert!(app.time_synced());
    assert_eq!(app.health_flags() & HealthFlag::TimeNotSynced.mask(), 0);
    assert!(app.is_dispensing());
    assert_eq!(hw.feed_calls(), vec![true]);
    assert_eq!(flags(&app), vec![true, false]);
}

#[test]
fn malformed_schedule_document_loads_nothing() {
    let (mut app, mut hw, clock, mut sink) = make_app(local_epoch(TEST_DAY, 9, 0));
    load(&mut app, r#"{"08:00":20}"#, &clock, &mut hw, &mut sink);
    load(&mut app, "not json", &clock, &mut hw, &mut sink);

    app.tick(&clock, &mut hw, &mut sink);
    assert!(app.schedule().is_empty());
    assert_ne!(app.health_flags() & HealthFlag::ScheduleEmpty.mask(), 0);
}

// ── Dispense outcomes ────────────────────────────────────────

/// Sync at 07:59, then step to 08:00 so the single slot starts.
fn start_eight_oclock_slot(grams: u32, initial: i32) -> (FeederService, MockHardware, ManualClock, RecordingSink) {
    let (mut app, mut hw, clock, mut sink) = make_app(local_epoch(TEST_DAY, 7, 59));
    let doc = format!(r#"{{"08:00":{}}}"#, grams);
    load(&mut app, &doc, &clock, &mut hw, &mut sink);
    app.tick(&clock, &mut hw, &mut sink);
    assert_eq!(flags(&app), vec![false]);

    hw.weight = initial;
    clock.uptime.set(5_000);
    clock.set_epoch(local_epoch(TEST_DAY, 8, 0));
    app.tick(&clock, &mut hw, &mut sink);
    assert!(app.is_dispensing());
    (app, hw, clock, sink)
}

#[test]
fn full_success_when_expected_weight_reached() {
    let (mut app, mut hw, clock, mut sink) = start_eight_oclock_slot(10, 20);
    assert!(sink.events.contains(&AppEvent::DispenseStarted {
        source: DispenseSource::Scheduled { index: 0 },
        target_grams: 10,
        initial_grams: 20,
        expected_grams: 30,
    }));

    hw.weight = 30;
    clock.advance_ms(100);
    app.tick(&clock, &mut hw, &mut sink);

    assert!(!app.is_dispensing());
    assert!(!hw.feed_on());
    let reports = sink.dispensed();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, DispenseOutcome::FullSuccess { grams: 10 });
    assert_eq!(reports[0].final_weight_grams, 30);
    assert_eq!(flags(&app), vec![true]);
    assert_eq!(
        sink.count(|e| matches!(e, AppEvent::WeightReported { grams: 30, .. })),
        1
    );

    // The slot does not fire again later the same day.
    for _ in 0..4 {
        clock.advance_ms(5_000);
        app.tick(&clock, &mut hw, &mut sink);
    }
    assert_eq!(hw.feed_calls(), vec![true, false]);
}

#[test]
fn partial_success_reports_actual_gain() {
    let (mut app, mut hw, clock, mut sink) = start_eight_oclock_slot(10, 20);

    hw.weight = 27;
    clock.advance_ms(69_900);
    app.tick(&clock, &mut hw, &mut sink);
    assert!(app.is_dispensing(), "deadline not reached yet");

    clock.advance_ms(100);
    app.tick(&clock, &mut hw, &mut sink);

    let reports = sink.dispensed();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].outcome, DispenseOutcome::PartialSuccess { grams: 7 });
    assert_eq!(reports[0].duration_ms, 70_000);
    assert_eq!(flags(&app), vec![true]);
    assert!(!hw.feed_on());
}

#[test]
fn stalled_actuator_is_a_failure() {
    let (mut app, mut hw, clock, mut sink) = start_eight_oclock_slot(10, 20);

    hw.weight = 24;
    clock.advance_ms(70_000);
    app.tick(&clock, &mut hw, &mut sink);

    let reports = sink.dispensed();
    assert_eq!(reports[0].outcome, DispenseOutcome::Failure);
    assert_eq!(reports[0].outcome.grams(), 0);
    assert!(!hw.feed_on());
    assert_ne!(app.health_flags() & HealthFlag::LastDispenseFailed.mask(), 0);
}

#[test]
fn expected_weight_is_capped_at_ceiling() {
    let (_app, _hw, _clock, sink) = start_eight_oclock_slot(100, 20);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::DispenseStarted { expected_grams: 60, .. }
    )));
}

#[test]
fn due_slots_run_one_at_a_time_in_order() {
    let (mut app, mut hw, clock, mut sink) = make_app(local_epoch(TEST_DAY, 7, 59));
    load(&mut app, r#"{"08:01":5,"08:00":5}"#, &clock, &mut hw, &mut sink);
    app.tick(&clock, &mut hw, &mut sink);

    clock.uptime.set(5_000);
    clock.set_epoch(local_epoch(TEST_DAY, 8, 5));
    app.tick(&clock, &mut hw, &mut sink);
    assert!(app.is_dispensing());
    assert_eq!(app.pending_len(), 1);

    hw.weight = 5;
    clock.advance_ms(100);
    app.tick(&clock, &mut hw, &mut sink); // slot 0 completes
    clock.advance_ms(100);
    app.tick(&clock, &mut hw, &mut sink); // slot 1 starts at 5 g
    hw.weight = 10;
    clock.advance_ms(100);
    app.tick(&clock, &mut hw, &mut sink);

    let sources: Vec<_> = sink.dispensed().iter().map(|r| r.source).collect();
    assert_eq!(
        sources,
        vec![
            DispenseSource::Scheduled { index: 0 },
            DispenseSource::Scheduled { index: 1 }
        ]
    );
    assert_eq!(hw.feed_calls(), vec![true, false, true, false]);
    assert_eq!(flags(&app), vec![true, true]);
}

// ── Day rollover ─────────────────────────────────────────────

#[test]
fn rollover_rearms_every_slot() {
    let (mut app, mut hw, clock, mut sink) = make_app(local_epoch(TEST_DAY, 9, 0));
    load(&mut app, r#"{"08:00":10}"#, &clock, &mut hw, &mut sink);
    app.tick(&clock, &mut hw, &mut sink);
    assert_eq!(flags(&app), vec![true]);

    clock.uptime.set(5_000);
    clock.set_epoch(local_epoch(TEST_DAY + 1, 0, 1));
    app.tick(&clock, &mut hw, &mut sink);

    assert_eq!(flags(&app), vec![false]);
    assert!(sink.events.contains(&AppEvent::DayRollover { day_index: 3 }));
    assert!(!app.is_dispensing());

    clock.uptime.set(10_000);
    clock.set_epoch(local_epoch(TEST_DAY + 1, 8, 0));
    app.tick(&clock, &mut hw, &mut sink);
    assert!(app.is_dispensing());
}

#[test]
fn session_straddling_midnight_does_not_mark_new_day() {
    let (mut app, mut hw, clock, mut sink) = make_app(local_epoch(TEST_DAY, 23, 58));
    load(&mut app, r#"{"23:59":10}"#, &clock, &mut hw, &mut sink);
    app.tick(&clock, &mut hw, &mut sink);

    clock.uptime.set(5_000);
    clock.set_epoch(local_epoch(TEST_DAY, 23, 59));
    app.tick(&clock, &mut hw, &mut sink);
    assert!(app.is_dispensing());

    hw.weight = 10;
    clock.uptime.set(10_000);
    clock.set_epoch(local_epoch(TEST_DAY + 1, 0, 0));
    app.tick(&clock, &mut hw, &mut sink);

    assert!(!app.is_dispensing());
    assert_eq!(sink.dispensed().len(), 1);
    assert_eq!(flags(&app), vec![false], "new day's 23:59 must stay armed");
}

// ── Manual commands ──────────────────────────────────────────

#[test]
fn manual_dispense_runs_without_time_sync() {
    let (mut app, mut hw, clock, mut sink) = make_app(0);
    hw.weight = 5;
    app.handle_command(AppCommand::DispenseNow { grams: 15 }, &clock, &mut hw, &mut sink);
    app.tick(&clock, &mut hw, &mut sink);
    assert!(app.is_dispensing());

    hw.weight = 20;
    clock.advance_ms(100);
    app.tick(&clock, &mut hw, &mut sink);

    let r = sink.dispensed()[0];
    assert_eq!(r.source, DispenseSource::Manual);
    assert_eq!(r.outcome, DispenseOutcome::FullSuccess { grams: 15 });
    assert_eq!(r.timestamp, 0);
    assert!(app.schedule().is_empty());
}

#[test]
fn remote_command_string_queues_dispense() {
    let (mut app, mut hw, clock, mut sink) = make_app(0);
    let cmd = AppCommand::from_remote("DispenseNow_12").unwrap();
    app.handle_command(cmd, &clock, &mut hw, &mut sink);
    assert_eq!(app.pending_len(), 1);

    app.tick(&clock, &mut hw, &mut sink);
    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::DispenseStarted { target_grams: 12, source: DispenseSource::Manual, .. }
    )));
}

#[test]
fn manual_requests_are_capped() {
    let (mut app, mut hw, clock, mut sink) = make_app(0);
    for _ in 0..MAX_PENDING_MANUAL + 2 {
        app.handle_command(AppCommand::DispenseNow { grams: 5 }, &clock, &mut hw, &mut sink);
    }
    assert_eq!(app.pending_len(), MAX_PENDING_MANUAL);
}

#[test]
fn queued_manual_request_survives_rollover() {
    let (mut app, mut hw, clock, mut sink) = make_app(local_epoch(TEST_DAY, 23, 59));
    app.tick(&clock, &mut hw, &mut sink);
    app.handle_command(AppCommand::DispenseNow { grams: 10 }, &clock, &mut hw, &mut sink);
    app.tick(&clock, &mut hw, &mut sink);
    assert!(app.is_dispensing());

    app.handle_command(AppCommand::DispenseNow { grams: 5 }, &clock, &mut hw, &mut sink);
    assert_eq!(app.pending_len(), 1);

    clock.uptime.set(5_000);
    clock.set_epoch(local_epoch(TEST_DAY + 1, 0, 0));
    app.tick(&clock, &mut hw, &mut sink);

    assert!(sink.events.contains(&AppEvent::DayRollover { day_index: 3 }));
    assert!(app.is_dispensing());
    assert_eq!(app.pending_len(), 1);
}

#[test]
fn cancel_stops_actuator_and_reports_failure() {
    let (mut app, mut hw, clock, mut sink) = make_app(0);
    app.handle_command(AppCommand::DispenseNow { grams: 10 }, &clock, &mut hw, &mut sink);
    app.tick(&clock, &mut hw, &mut sink);
    assert!(hw.feed_on());
    assert!(app.gate_held());

    app.handle_command(AppCommand::CancelDispense, &clock, &mut hw, &mut sink);

    assert!(!app.is_dispensing());
    assert!(!app.gate_held());
    assert_eq!(hw.calls.last(), Some(&HwCall::Feed(false)));
    assert_eq!(sink.dispensed()[0].outcome, DispenseOutcome::Failure);
}

#[test]
fn cancel_when_idle_is_harmless() {
    let (mut app, mut hw, clock, mut sink) = make_app(0);
    app.handle_command(AppCommand::CancelDispense, &clock, &mut hw, &mut sink);
    assert!(hw.feed_calls().is_empty());
    assert!(sink.dispensed().is_empty());
}
