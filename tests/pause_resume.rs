mod common;

use std::time::Duration;

use common::Rig;
use krusty_pause::config::{Config, ParkPoint};
use krusty_pause::hardware::{MediaStream, Position, PrintTimer, Screen, ThermalControl};
use krusty_pause::heater_timeout::{IdleTimeoutProvider, TimeoutState};
use krusty_pause::pause::{PauseError, PausePhase, STATUS_PARKED, STATUS_WAITING};
use krusty_pause::print_source::PrintSource;

const START: Position = Position {
    x: 100.0,
    y: 80.0,
    z: 10.0,
    e: 500.0,
};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

/// Media print in progress with `commands` read ahead into the queue.
fn media_rig(commands: &[&str]) -> Rig {
    let mut rig = Rig::with_defaults();
    rig.hw.motion.position = START;
    rig.heat(0, 210.0);
    rig.heat(1, 60.0);
    rig.start_media_print();
    rig.hw.timer.start();
    for cmd in commands {
        rig.hw.card.next_line();
        assert!(rig.queue.enqueue(cmd, false));
    }
    rig
}

fn host_rig() -> Rig {
    let mut rig = Rig::with_defaults();
    rig.hw.motion.position = START;
    rig.heat(0, 210.0);
    rig.source.set_host();
    rig.hw.timer.start();
    rig
}

#[test]
fn test_media_pause_resume_round_trip() {
    let mut rig = media_rig(&["G1 X1", "M600", "G1 X2", "m1125 p", "G1 X3"]);
    assert!(rig.pause().is_ok());

    assert!(rig.source.is_sd());
    assert!(rig.queue.is_empty());
    assert_eq!(
        rig.controller.saved_commands().collect::<Vec<_>>(),
        ["G1 X1", "G1 X2", "G1 X3"]
    );
    assert_eq!(rig.hw.card.offset(), 5);
    assert!(!rig.hw.card.is_streaming());
    assert_eq!(rig.hw.buzzer.beeps.len(), 6);
    assert_eq!(rig.hw.display.status, STATUS_PARKED);
    assert_eq!(rig.hw.display.screen, Screen::PrintPaused);
    assert!(rig.hw.timer.is_paused());
    assert!(rig.host_lines().is_empty());
    assert!(rig.controller.popup_pause_response_suppressed());
    assert!(rig.controller.auto_job_timer_suppressed());
    assert_eq!(rig.controller.phase(), PausePhase::Parked);
    assert_eq!(rig.controller.saved_position(), Some(START));

    // Retracted, lifted by z_lift + the fallback raise, wiped back to X.
    let parked = rig.hw.motion.position;
    assert!(approx(parked.x, START.x));
    assert!(approx(parked.z, START.z + 0.4 + 2.0));
    assert!(approx(parked.e, START.e - 2.0));

    rig.resume(None).unwrap();
    assert_eq!(rig.controller.phase(), PausePhase::ResumePending);
    rig.poll();

    assert_eq!(rig.controller.phase(), PausePhase::Idle);
    assert_eq!(rig.hw.motion.position, START);
    assert_eq!(rig.queued(), ["G1 X1", "G1 X2", "G1 X3"]);
    assert!(rig.hw.card.is_streaming());
    assert_eq!(rig.hw.card.offset(), 5);
    assert!(rig.source.is_sd());
    assert!(rig.hw.timer.is_running());
    assert!(!rig.controller.popup_pause_response_suppressed());
    assert!(!rig.controller.auto_job_timer_suppressed());
    assert!(rig.controller.saved_position().is_none());
    assert_eq!(rig.hw.display.status, "");
    assert_eq!(rig.hw.display.screen, Screen::Printing);
    assert!(rig.host_lines().is_empty());
}

#[test]
fn test_host_pause_notifies_and_skips_e_restore() {
    let mut rig = host_rig();
    rig.pause().unwrap();
    assert!(rig.source.is_host());
    assert_eq!(rig.host_lines(), ["//action:pause"]);

    rig.resume(None).unwrap();
    rig.poll();

    let pos = rig.hw.motion.position;
    assert_eq!((pos.x, pos.y, pos.z), (START.x, START.y, START.z));
    // The host owns E; the retracted coordinate is left alone.
    assert!(approx(pos.e, START.e - 2.0));
    assert_eq!(rig.host_lines(), ["//action:pause", "//action:resume"]);
    assert!(rig.source.is_host());
}

#[test]
fn test_open_file_without_streaming_counts_as_host() {
    let mut rig = host_rig();
    rig.start_media_print();
    rig.hw.card.pause_stream();
    rig.source.set_host();

    rig.pause().unwrap();
    assert_eq!(rig.controller.paused_source(), PrintSource::Host);
    assert_eq!(rig.host_lines(), ["//action:pause"]);
}

#[test]
fn test_second_pause_is_rejected_without_mutation() {
    let mut rig = media_rig(&["G1 X1"]);
    rig.pause().unwrap();
    let targets = *rig.controller.watchdog().saved_targets().unwrap();
    let beeps = rig.hw.buzzer.beeps.len();
    let moves = rig.hw.motion.moves.len();

    rig.hw.motion.position = Position::new(1.0, 2.0, 3.0, 4.0);
    rig.hw.thermal.set_target(0, 150.0);
    rig.source.set_host();
    assert_eq!(rig.pause(), Err(PauseError::AlreadyActive));

    assert_eq!(rig.controller.saved_position(), Some(START));
    assert_eq!(rig.controller.paused_source(), PrintSource::OnboardMedia);
    assert_eq!(*rig.controller.watchdog().saved_targets().unwrap(), targets);
    assert_eq!(rig.hw.buzzer.beeps.len(), beeps);
    assert_eq!(rig.hw.motion.moves.len(), moves);
    assert_eq!(rig.controller.saved_commands().count(), 1);
}

#[test]
fn test_resume_waits_for_heaters() {
    let mut rig = media_rig(&["G1 X1"]);
    rig.pause().unwrap();
    rig.hw.thermal.set_temperature(0, 150.0);

    rig.resume(None).unwrap();
    let moves = rig.hw.motion.moves.len();
    for _ in 0..5 {
        rig.poll();
        assert_eq!(rig.hw.motion.moves.len(), moves);
        assert!(rig.controller.is_pause_active());
        assert!(rig.controller.is_resume_pending());
    }
    assert_eq!(rig.hw.display.status, STATUS_WAITING);
    assert!(rig.queue.is_empty());

    // Within the 3 °C tolerance.
    rig.hw.thermal.set_temperature(0, 207.5);
    rig.poll();
    assert_eq!(rig.controller.phase(), PausePhase::Idle);
    let after = rig.hw.motion.moves.len();
    assert!(after > moves);
    assert_eq!(rig.queued(), ["G1 X1"]);

    rig.poll();
    assert_eq!(rig.hw.motion.moves.len(), after);
    assert_eq!(rig.queued(), ["G1 X1"]);
}

#[test]
fn test_resume_with_no_heaters_set_finishes_immediately() {
    let mut rig = Rig::with_defaults();
    rig.hw.motion.position = START;
    rig.pause().unwrap();
    rig.resume(None).unwrap();
    rig.poll();
    assert_eq!(rig.controller.phase(), PausePhase::Idle);
}

#[test]
fn test_resume_without_episode_is_noop() {
    let mut rig = host_rig();
    assert!(rig.resume(Some(20.0)).is_ok());
    rig.poll();
    assert!(rig.hw.motion.moves.is_empty());
    assert!(rig.hw.display.status_history.is_empty());
    assert_eq!(rig.controller.phase(), PausePhase::Idle);
}

#[test]
fn test_resume_feedrate_override() {
    let mut rig = host_rig();
    rig.pause().unwrap();
    let moves = rig.hw.motion.moves.len();
    rig.resume(Some(25.0)).unwrap();
    rig.poll();
    let returns = &rig.hw.motion.moves[moves..];
    assert!(!returns.is_empty());
    assert!(returns.iter().all(|(_, feedrate)| *feedrate == 25.0));
}

#[test]
fn test_return_move_lowers_z_last() {
    let mut rig = host_rig();
    rig.pause().unwrap();
    let moves = rig.hw.motion.moves.len();
    rig.resume(None).unwrap();
    rig.poll();
    let returns = &rig.hw.motion.moves[moves..];
    assert_eq!(returns.len(), 2);
    assert!(returns[0].0.z > START.z);
    assert_eq!(returns[1].0.z, START.z);
}

#[test]
fn test_park_point_clamped_to_max_z() {
    let mut config = Config::default();
    config.pause.park = Some(ParkPoint {
        x: 10.0,
        y: 200.0,
        z_raise: 20.0,
    });
    config.pause.max_z = 15.0;
    let mut rig = Rig::new(config);
    rig.hw.motion.position = START;
    rig.pause().unwrap();

    let parked = rig.hw.motion.position;
    assert_eq!((parked.x, parked.y, parked.z), (10.0, 200.0, 15.0));
}

#[test]
fn test_heater_timeout_disables_and_resume_reapplies() {
    let mut rig = media_rig(&[]);
    rig.pause().unwrap();

    rig.advance(Duration::from_secs(300));
    rig.poll();
    assert_eq!(rig.controller.phase(), PausePhase::GracePending);
    assert_eq!(rig.hw.display.popups.len(), 1);

    rig.advance(Duration::from_secs(30));
    rig.poll();
    assert_eq!(rig.controller.phase(), PausePhase::HeatersDisabled);
    assert_eq!(rig.hw.thermal.target(0), 0.0);
    assert_eq!(rig.hw.thermal.target(1), 0.0);
    assert_eq!(rig.hw.display.status, "Heaters disabled (timeout)");

    rig.resume(None).unwrap();
    assert_eq!(rig.hw.thermal.target(0), 210.0);
    assert_eq!(rig.hw.thermal.target(1), 60.0);
    assert_eq!(rig.controller.watchdog().state(), TimeoutState::Armed);
    rig.poll();
    assert_eq!(rig.controller.phase(), PausePhase::Idle);
}

#[test]
fn test_continue_during_grace_keeps_heaters_on() {
    let mut rig = media_rig(&[]);
    rig.pause().unwrap();
    rig.advance(Duration::from_secs(300));
    rig.poll();
    rig.advance(Duration::from_secs(29));
    rig.run(|controller, io| controller.heater_timeout_continue(io));

    rig.advance(Duration::from_secs(2));
    rig.poll();
    assert_eq!(rig.hw.thermal.target(0), 210.0);
    assert_eq!(rig.controller.phase(), PausePhase::GracePending);
}

#[test]
fn test_countdown_status() {
    let mut rig = media_rig(&[]);
    rig.pause().unwrap();

    rig.advance(Duration::from_secs(9));
    rig.poll();
    assert_eq!(rig.hw.display.status, STATUS_PARKED);

    rig.advance(Duration::from_secs(1));
    rig.poll();
    assert_eq!(rig.hw.display.status, "Heaters timeout in 290 seconds");

    let shown = rig.hw.display.status_history.len();
    rig.advance(Duration::from_secs(1));
    rig.poll();
    assert_eq!(rig.hw.display.status_history.len(), shown);

    rig.advance(Duration::from_secs(4));
    rig.poll();
    assert_eq!(rig.hw.display.status, "Heaters timeout in 285 seconds");
}

#[test]
fn test_abort_clears_everything_without_motion() {
    let mut rig = media_rig(&["G1 X1"]);
    rig.pause().unwrap();
    rig.hw.thermal.set_temperature(0, 100.0);
    rig.resume(None).unwrap();
    rig.poll();
    let moves = rig.hw.motion.moves.len();

    rig.run(|controller, io| controller.abort(io));
    assert_eq!(rig.controller.phase(), PausePhase::Idle);
    assert!(!rig.controller.is_resume_pending());
    assert!(!rig.controller.popup_pause_response_suppressed());
    assert!(!rig.controller.auto_job_timer_suppressed());
    assert_eq!(rig.source.get(), PrintSource::None);
    assert_eq!(rig.controller.watchdog().state(), TimeoutState::Idle);

    rig.hw.thermal.set_temperature(0, 210.0);
    rig.advance(Duration::from_secs(1000));
    rig.poll();
    assert_eq!(rig.hw.motion.moves.len(), moves);
    assert!(rig.queue.is_empty());
    assert_eq!(rig.hw.display.popups.len(), 0);

    // A new pause is accepted after the abort.
    rig.hw.card.start_print();
    assert!(rig.pause().is_ok());
}

#[test]
fn test_pause_goes_from_idle_straight_to_parked() {
    let mut rig = host_rig();
    assert_eq!(rig.controller.phase(), PausePhase::Idle);
    let before = rig.clock.elapsed();
    rig.pause().unwrap();
    assert_eq!(rig.controller.phase(), PausePhase::Parked);
    // Six pulses, five gaps of 200 ms on + 150 ms off, all on the injected clock.
    assert_eq!(rig.clock.elapsed() - before, Duration::from_millis(1750));
}

#[test]
fn test_media_pause_after_queue_wrapped() {
    let mut rig = media_rig(&[]);
    for _ in 0..6 {
        assert!(rig.queue.enqueue("G1 X0", false));
        assert!(rig.queue.dequeue().is_some());
    }
    for cmd in ["G1 X1", "M600", "G1 X2", "G1 X3", "m1125 p"] {
        rig.hw.card.next_line();
        assert!(rig.queue.enqueue(cmd, false));
    }
    // Slots 6, 7 then 0..2.
    assert_eq!(rig.queue.index_r(), 6);
    assert_eq!(rig.queue.index_w(), 3);

    rig.pause().unwrap();
    assert!(rig.queue.is_empty());
    assert_eq!(
        rig.controller.saved_commands().collect::<Vec<_>>(),
        ["G1 X1", "G1 X2", "G1 X3"]
    );

    rig.resume(None).unwrap();
    rig.poll();
    assert_eq!(rig.controller.phase(), PausePhase::Idle);
    assert_eq!(rig.queued(), ["G1 X1", "G1 X2", "G1 X3"]);
}
