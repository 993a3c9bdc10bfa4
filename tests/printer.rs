use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use krusty_pause::config::Config;
use krusty_pause::hardware::{MediaStream, PrintTimer, ThermalControl};
use krusty_pause::media::MediaPresence;
use krusty_pause::pause::PausePhase;
use krusty_pause::printer::{Printer, PrinterError};
use krusty_pause::print_source::PrintSource;
use krusty_pause::scheduler::{ManualClock, SystemClock};
use krusty_pause::simulator::{HostLog, SimHostChannel};

const TICK: Duration = Duration::from_millis(100);

fn printer() -> (Printer, Arc<ManualClock>, HostLog) {
    let clock = Arc::new(ManualClock::new());
    let (channel, log) = SimHostChannel::new();
    let printer = Printer::new(&Config::default(), clock.clone(), Box::new(channel));
    (printer, clock, log)
}

fn tick(printer: &mut Printer, clock: &ManualClock, n: usize) {
    for _ in 0..n {
        clock.advance(TICK);
        printer.tick(TICK);
    }
}

/// Boot poll, then card insertion and mount.
fn with_card(printer: &mut Printer, clock: &ManualClock) {
    tick(printer, clock, 1);
    printer.hardware.card.insert(MediaPresence::SdCard);
    tick(printer, clock, 1);
}

#[test]
fn test_usage_error_is_echoed_without_state_change() {
    let (mut printer, _clock, log) = printer();
    let err = printer.handle_line("M1125").unwrap_err();
    assert!(matches!(err, PrinterError::Usage(_)));
    let err = printer.handle_line("M1125 P R").unwrap_err();
    assert!(matches!(err, PrinterError::Usage(_)));

    let lines = log.lock().unwrap().clone();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line.starts_with("echo:")));
    assert_eq!(printer.controller().phase(), PausePhase::Idle);
    assert_eq!(printer.source().get(), PrintSource::None);
}

#[test]
fn test_media_print_pause_and_resume() {
    let (mut printer, clock, _log) = printer();
    with_card(&mut printer, &clock);
    printer.start_media_print().unwrap();
    tick(&mut printer, &clock, 3);
    assert!(printer.queue().len() > 0);

    printer.handle_line("M1125 P").unwrap();
    assert_eq!(printer.controller().phase(), PausePhase::Parked);
    assert!(printer.queue().is_empty());
    let preserved = printer.controller().saved_commands().count();
    assert!(preserved > 0);

    // Nothing is read from the card while parked.
    tick(&mut printer, &clock, 5);
    assert!(printer.queue().is_empty());

    printer.handle_line("M1125 R F3000").unwrap();
    tick(&mut printer, &clock, 1);
    assert_eq!(printer.controller().phase(), PausePhase::Idle);
    assert!(printer.source().is_sd());
}

#[test]
fn test_heater_wait_timer_auto_start_suppressed_while_paused() {
    let (mut printer, clock, _log) = printer();
    printer.start_host_print().unwrap();
    printer.handle_line("M1125 P").unwrap();
    assert!(!printer.hardware.timer.is_running());

    printer.handle_line("M109 S200").unwrap();
    assert_eq!(printer.hardware.thermal.target(0), 200.0);
    assert!(!printer.hardware.timer.is_running());

    printer.stop_print();
    tick(&mut printer, &clock, 1);
    printer.handle_line("M190 S60").unwrap();
    assert!(printer.hardware.timer.is_running());
}

#[test]
fn test_popup_response_during_pause_continues_heater_timeout() {
    let (mut printer, clock, _log) = printer();
    printer.handle_line("M104 S210").unwrap();
    printer.hardware.thermal.set_temperature(0, 210.0);
    printer.start_host_print().unwrap();
    printer.handle_line("M1125 P").unwrap();

    clock.advance(Duration::from_secs(300));
    printer.tick(Duration::ZERO);
    assert_eq!(printer.controller().phase(), PausePhase::GracePending);

    // Read as Continue on the timeout prompt, never as a resume.
    printer.popup_response(true);
    assert!(!printer.controller().is_resume_pending());

    clock.advance(Duration::from_secs(31));
    printer.tick(Duration::ZERO);
    assert_eq!(printer.hardware.thermal.target(0), 210.0);
    assert_eq!(printer.controller().phase(), PausePhase::GracePending);
}

#[test]
fn test_media_removal_while_paused_aborts_episode() {
    let (mut printer, clock, _log) = printer();
    with_card(&mut printer, &clock);
    printer.start_media_print().unwrap();
    tick(&mut printer, &clock, 2);
    printer.handle_line("M1125 P").unwrap();

    printer.hardware.card.remove();
    tick(&mut printer, &clock, 1);
    assert_eq!(printer.controller().phase(), PausePhase::Idle);
    assert_eq!(printer.source().get(), PrintSource::None);
    assert!(!printer.controller().popup_pause_response_suppressed());
    assert_eq!(printer.hardware.card.aborts(), 1);
}

#[test]
fn test_card_pull_keeps_host_driven_pause() {
    let (mut printer, clock, log) = printer();
    with_card(&mut printer, &clock);
    // Leftover open file on the card while the host streams the job.
    assert!(printer.hardware.card.start_print());
    printer.hardware.card.pause_stream();
    printer.start_host_print().unwrap();
    printer.handle_line("M1125 P").unwrap();
    assert_eq!(printer.controller().paused_source(), PrintSource::Host);

    printer.hardware.card.remove();
    tick(&mut printer, &clock, 1);
    assert_eq!(printer.hardware.card.aborts(), 1);
    assert_eq!(printer.controller().phase(), PausePhase::Parked);
    assert_eq!(printer.source().get(), PrintSource::Host);
    assert!(printer.controller().popup_pause_response_suppressed());

    printer.handle_line("M1125 R").unwrap();
    tick(&mut printer, &clock, 1);
    assert_eq!(printer.controller().phase(), PausePhase::Idle);
    assert_eq!(
        log.lock().unwrap().clone(),
        ["//action:start", "//action:pause", "//action:resume"]
    );
}

#[test]
fn test_popup_response_without_pause_is_ignored() {
    let (mut printer, clock, log) = printer();
    printer.start_host_print().unwrap();
    printer.popup_response(true);
    tick(&mut printer, &clock, 1);
    assert_eq!(printer.controller().phase(), PausePhase::Idle);
    assert_eq!(printer.source().get(), PrintSource::Host);
    assert!(printer.hardware.timer.is_running());
    assert_eq!(log.lock().unwrap().clone(), ["//action:start"]);
}

#[tokio::test]
async fn test_printer_loop_pause_does_not_block_runtime() {
    let (requests, inbox) = mpsc::channel();
    let (channel, log) = SimHostChannel::new();
    let worker = tokio::task::spawn_blocking(move || {
        let mut printer = Printer::new(&Config::default(), Arc::new(SystemClock), Box::new(channel));
        printer.run(&inbox, TICK);
        printer.controller().phase()
    });

    requests.send("start host".to_string()).unwrap();
    requests.send("M1125 P".to_string()).unwrap();
    // The pause beeps for 1.75 s of wall time on the printer thread.
    let started = Instant::now();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(started.elapsed() < Duration::from_millis(1000));

    drop(requests);
    assert_eq!(worker.await.unwrap(), PausePhase::Parked);
    assert_eq!(
        log.lock().unwrap().clone(),
        ["//action:start", "//action:pause"]
    );
}

#[test]
fn test_duplicate_pause_reported() {
    let (mut printer, _clock, _log) = printer();
    printer.start_host_print().unwrap();
    printer.handle_line("M1125 P").unwrap();
    assert!(matches!(
        printer.handle_line("m1125 p"),
        Err(PrinterError::Pause(_))
    ));
    assert!(matches!(
        printer.start_media_print(),
        Err(PrinterError::Busy(_))
    ));
}
