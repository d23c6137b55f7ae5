//! Integration tests for tag-gated access and the gate interlock.

use crate::mock_hw::{local_epoch, ManualClock, MockHardware, RecordingSink, TEST_DAY};

use petfeeder::access::TagId;
use petfeeder::app::commands::{parse_feeder_document, AppCommand};
use petfeeder::app::service::FeederService;
use petfeeder::config::{FeederConfig, TrapMode};
use petfeeder::gate::{GateOperation, CLOSE_TRAVEL_STEPS, OPEN_TRAVEL_STEPS};

const T1: TagId = TagId(0x7E_3FE9);
const T2: TagId = TagId(0x1E_CADE);
const STRANGER: TagId = TagId(0x12_3456);

fn make_app(config: FeederConfig) -> (FeederService, MockHardware, ManualClock, RecordingSink) {
    let mut app = FeederService::new(config);
    let mut sink = RecordingSink::new();
    app.start(&mut sink);
    (
        app,
        MockHardware::new(),
        ManualClock::new(0, local_epoch(TEST_DAY, 10, 0)),
        sink,
    )
}

/// Tick every 100 ms up to and including `until_ms`.
fn run_until(
    app: &mut FeederService,
    hw: &mut MockHardware,
    clock: &ManualClock,
    sink: &mut RecordingSink,
    until_ms: u64,
) {
    while clock.now_ms() < until_ms {
        clock.advance_ms(100);
        app.tick(clock, hw, sink);
    }
}

#[test]
fn gate_closes_on_boot_without_a_tag() {
    let (mut app, mut hw, clock, mut sink) = make_app(FeederConfig::default());
    app.tick(&clock, &mut hw, &mut sink);
    assert_eq!(hw.steps(), vec![CLOSE_TRAVEL_STEPS]);
    assert_eq!(app.gate_operation(), GateOperation::Close);
    assert_eq!(sink.gate_usages(), 0, "no open stamp, no usage event");
}

#[test]
fn registered_tag_holds_gate_open_for_timeout() {
    let (mut app, mut hw, clock, mut sink) = make_app(FeederConfig::default());
    hw.present(T1);
    app.tick(&clock, &mut hw, &mut sink);
    assert_eq!(app.gate_operation(), GateOperation::Open);

    run_until(&mut app, &mut hw, &clock, &mut sink, 9_900);
    assert_eq!(app.gate_operation(), GateOperation::Open);
    assert_eq!(hw.steps(), vec![OPEN_TRAVEL_STEPS]);

    run_until(&mut app, &mut hw, &clock, &mut sink, 10_000);
    assert_eq!(app.gate_operation(), GateOperation::Close);
    assert_eq!(hw.steps(), vec![OPEN_TRAVEL_STEPS, CLOSE_TRAVEL_STEPS]);
    assert_eq!(sink.gate_usages(), 1);
}

#[test]
fn repeated_reads_extend_presence() {
    let (mut app, mut hw, clock, mut sink) = make_app(FeederConfig::default());
    hw.present(T1);
    app.tick(&clock, &mut hw, &mut sink);

    run_until(&mut app, &mut hw, &clock, &mut sink, 8_000);
    hw.present(T2);
    run_until(&mut app, &mut hw, &clock, &mut sink, 17_900);
    assert_eq!(app.gate_operation(), GateOperation::Open);

    run_until(&mut app, &mut hw, &clock, &mut sink, 18_100);
    assert_eq!(app.gate_operation(), GateOperation::Close);
}

#[test]
fn unregistered_tag_clears_presence() {
    let (mut app, mut hw, clock, mut sink) = make_app(FeederConfig::default());
    hw.present(T1);
    app.tick(&clock, &mut hw, &mut sink);

    run_until(&mut app, &mut hw, &clock, &mut sink, 4_000);
    hw.present(STRANGER);
    run_until(&mut app, &mut hw, &clock, &mut sink, 4_100);

    assert_eq!(app.gate_operation(), GateOperation::Close);
    assert_eq!(hw.steps(), vec![OPEN_TRAVEL_STEPS, CLOSE_TRAVEL_STEPS]);
}

#[test]
fn close_requested_inside_settle_window_waits() {
    let (mut app, mut hw, clock, mut sink) = make_app(FeederConfig::default());
    hw.present(T1);
    app.tick(&clock, &mut hw, &mut sink);

    hw.present(STRANGER);
    run_until(&mut app, &mut hw, &clock, &mut sink, 2_900);
    assert_eq!(app.gate_operation(), GateOperation::Open, "still settling");

    run_until(&mut app, &mut hw, &clock, &mut sink, 3_000);
    assert_eq!(app.gate_operation(), GateOperation::Close);
}

#[test]
fn gate_held_closed_while_dispensing() {
    let (mut app, mut hw, clock, mut sink) = make_app(FeederConfig::default());
    hw.present(T1);
    app.tick(&clock, &mut hw, &mut sink);

    run_until(&mut app, &mut hw, &clock, &mut sink, 3_400);
    app.handle_command(AppCommand::DispenseNow { grams: 10 }, &clock, &mut hw, &mut sink);
    run_until(&mut app, &mut hw, &clock, &mut sink, 3_500);

    assert!(app.is_dispensing());
    assert!(app.gate_held());
    assert_eq!(app.gate_operation(), GateOperation::Close);
    assert_eq!(sink.gate_usages(), 1);

    // Tag still in range, gate stays shut.
    hw.present(T1);
    run_until(&mut app, &mut hw, &clock, &mut sink, 3_600);
    assert_eq!(app.gate_operation(), GateOperation::Close);

    hw.weight = 10;
    run_until(&mut app, &mut hw, &clock, &mut sink, 3_700);
    assert!(!app.is_dispensing());
    assert!(!app.gate_held());

    // Reopens once the close stroke has settled.
    run_until(&mut app, &mut hw, &clock, &mut sink, 6_600);
    assert_eq!(app.gate_operation(), GateOperation::Open);
    assert_eq!(
        hw.steps(),
        vec![OPEN_TRAVEL_STEPS, CLOSE_TRAVEL_STEPS, OPEN_TRAVEL_STEPS]
    );
}

#[test]
fn interlock_can_be_disabled() {
    let config = FeederConfig {
        close_gate_while_dispensing: false,
        ..Default::default()
    };
    let (mut app, mut hw, clock, mut sink) = make_app(config);
    hw.present(T1);
    app.tick(&clock, &mut hw, &mut sink);

    app.handle_command(AppCommand::DispenseNow { grams: 10 }, &clock, &mut hw, &mut sink);
    run_until(&mut app, &mut hw, &clock, &mut sink, 5_000);

    assert!(app.is_dispensing());
    assert!(!app.gate_held());
    assert_eq!(app.gate_operation(), GateOperation::Open);
}

#[test]
fn always_open_ignores_tags() {
    let (mut app, mut hw, clock, mut sink) = make_app(FeederConfig::default());
    app.handle_command(
        AppCommand::SetTrapMode(TrapMode::AlwaysOpen),
        &clock,
        &mut hw,
        &mut sink,
    );
    app.tick(&clock, &mut hw, &mut sink);
    run_until(&mut app, &mut hw, &clock, &mut sink, 30_000);

    assert_eq!(app.gate_operation(), GateOperation::Open);
    assert_eq!(hw.steps(), vec![OPEN_TRAVEL_STEPS]);
}

#[test]
fn replacing_tags_revokes_presence() {
    let (mut app, mut hw, clock, mut sink) = make_app(FeederConfig::default());
    hw.present(T1);
    app.tick(&clock, &mut hw, &mut sink);
    run_until(&mut app, &mut hw, &clock, &mut sink, 3_000);

    app.handle_command(
        AppCommand::SetRegisteredTags([T2, STRANGER]),
        &clock,
        &mut hw,
        &mut sink,
    );
    hw.present(T1);
    run_until(&mut app, &mut hw, &clock, &mut sink, 3_100);
    assert_eq!(app.gate_operation(), GateOperation::Close);
}

#[test]
fn feeder_document_applies_trap_mode_and_schedule() {
    let (mut app, mut hw, clock, mut sink) = make_app(FeederConfig::default());
    let doc = r#"{"TrapMode":"ALWAYS_OPEN","FeedFoodConfiguration":"{\"08:00\":20,\"18:30\":15}"}"#;
    for cmd in parse_feeder_document(doc).unwrap() {
        app.handle_command(cmd, &clock, &mut hw, &mut sink);
    }
    app.tick(&clock, &mut hw, &mut sink);

    assert_eq!(app.schedule().len(), 2);
    assert_eq!(app.current_config().trap_mode, TrapMode::AlwaysOpen);
    assert_eq!(app.trap_mode(), TrapMode::AlwaysOpen);
    assert_eq!(app.gate_operation(), GateOperation::Open);
}
