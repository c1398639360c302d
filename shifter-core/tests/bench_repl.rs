use shifter_core::bench::BenchHarness;
use shifter_core::controller::{Ineligible, ShiftState, Transition};
use shifter_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome};
use shifter_core::telemetry::TelemetryEventKind;

fn run_script(executor: &mut CommandExecutor, lines: &[&str]) {
    for line in lines {
        executor
            .execute(line)
            .unwrap_or_else(|err| panic!("`{line}` failed: {err}"));
    }
}

#[test]
fn scripted_shift_records_full_history() {
    let mut executor = CommandExecutor::new(BenchHarness::default());
    run_script(
        &mut executor,
        &["speed 0x4000", "gear 2", "sensor on", "tick", "sensor off"],
    );
    assert_eq!(executor.harness().controller().state(), ShiftState::Active);

    let outcome = executor.execute("advance 75ms").expect("advance");
    let CommandOutcome::Advanced { report, .. } = outcome else {
        panic!("expected advance outcome");
    };
    assert!(matches!(
        report.transitions.as_slice(),
        [Transition::CutReleased {
            held_ticks: 701_000,
            ..
        }]
    ));

    run_script(&mut executor, &["advance 301ms"]);
    assert_eq!(executor.harness().controller().state(), ShiftState::Ready);

    let kinds: Vec<TelemetryEventKind> = executor
        .harness()
        .telemetry()
        .oldest_first()
        .map(|record| record.event)
        .collect();
    assert_eq!(
        kinds,
        [
            TelemetryEventKind::CutStarted,
            TelemetryEventKind::CutReleased,
            TelemetryEventKind::Rearmed,
        ]
    );
}

#[test]
fn shortened_kill_time_applies_to_next_cut() {
    let mut executor = CommandExecutor::new(BenchHarness::default());
    run_script(
        &mut executor,
        &["set kill 10", "rpm 5000", "gear 3", "sensor on", "tick"],
    );
    assert_eq!(
        executor.harness().controller().kill_target_duration(),
        100_000
    );

    run_script(&mut executor, &["sensor off", "advance 11ms"]);
    assert_eq!(executor.harness().controller().state(), ShiftState::Cooldown);
}

#[test]
fn status_text_tracks_active_cut() {
    let mut executor = CommandExecutor::new(BenchHarness::default());
    run_script(
        &mut executor,
        &["speed 0x4000", "gear 2", "sensor on", "tick", "advance 20ms"],
    );

    let CommandOutcome::Status(status) = executor.execute("status").expect("status") else {
        panic!("expected status outcome");
    };
    let text = status.to_string();
    assert!(text.starts_with("state=active kill-start=0 target=700000 remaining=50.0ms"));
    assert!(text.contains("limit=on flags=0x03"));
    assert!(text.ends_with("cuts=1 rejections=0"));
}

#[test]
fn zero_kill_time_is_accepted_and_released_next_tick() {
    let mut executor = CommandExecutor::new(BenchHarness::default());
    run_script(
        &mut executor,
        &["set kill 0", "speed 0x4000", "gear 2", "sensor on", "tick"],
    );
    assert_eq!(executor.harness().controller().state(), ShiftState::Active);

    run_script(&mut executor, &["sensor off", "counter 1", "tick"]);
    assert_eq!(executor.harness().controller().state(), ShiftState::Cooldown);
}

#[test]
fn errors_leave_state_untouched() {
    let mut executor = CommandExecutor::new(BenchHarness::default());
    run_script(&mut executor, &["speed 0x4000"]);

    let error = executor.execute("speed 0x10000").expect_err("speed is 16 bits");
    assert_eq!(
        error,
        CommandError::OutOfRange {
            field: "speed",
            value: 0x1_0000,
            max: 0xFFFF,
        }
    );
    assert_eq!(executor.harness().inputs().engine_speed, 0x4000);

    let error = executor.execute("set cooldown 65535").map(|_| ());
    assert_eq!(error, Ok(()));
}

#[test]
fn each_rejection_reason_then_a_cut() {
    let mut executor = CommandExecutor::new(BenchHarness::default());
    run_script(
        &mut executor,
        &[
            "rpm 2000",
            "gear 2",
            "sensor on",
            "tick",
            "sensor off",
            "advance 301ms",
            "rpm 4000",
            "gear 6",
            "sensor on",
            "tick",
            "sensor off",
            "advance 301ms",
            "gear 3",
            "set min-throttle 10",
            "throttle 5",
            "sensor on",
            "tick",
            "sensor off",
            "advance 301ms",
            "throttle 15",
            "sensor on",
            "tick",
        ],
    );

    let telemetry = executor.harness().telemetry();
    assert_eq!(telemetry.counters().rejections, 3);
    assert_eq!(telemetry.counters().cuts, 1);

    let kinds: Vec<TelemetryEventKind> = telemetry
        .oldest_first()
        .map(|record| record.event)
        .collect();
    assert_eq!(
        kinds,
        [
            TelemetryEventKind::CutRejected(Ineligible::SpeedTooLow),
            TelemetryEventKind::Rearmed,
            TelemetryEventKind::CutRejected(Ineligible::TopGear),
            TelemetryEventKind::Rearmed,
            TelemetryEventKind::CutRejected(Ineligible::ThrottleTooLow),
            TelemetryEventKind::Rearmed,
            TelemetryEventKind::CutStarted,
        ]
    );
    assert_eq!(executor.harness().controller().state(), ShiftState::Active);
}
