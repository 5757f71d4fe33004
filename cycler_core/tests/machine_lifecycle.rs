//! End-to-end runs of the assembled machine on simulated banks.
//!
//! Verifies that:
//! - buttons reach the controller through the sampler thread
//! - the run loop completes a short run and reports it
//! - purge, stop and input faults force the valve closed
//! - a stop during purge wins over the still-held chord
//! - every thread is joined on shutdown

use std::sync::Arc;
use std::time::{Duration, Instant};

use cycler_core::actuator::Valve;
use cycler_core::config::{ActuationMode, InputCfg, InputPins, MachineCfg, TimingConfig};
use cycler_core::error::CycleError;
use cycler_core::input::InputSampler;
use cycler_core::mocks::RecordingSink;
use cycler_core::runner::{Machine, MachineEvent};
use cycler_core::state::CycleMode;
use cycler_hardware::{SimInputs, SimOutputs};
use cycler_traits::{Level, MonotonicClock};

const STOP: u8 = 26;
const GO: u8 = 16;
const PAUSE: u8 = 14;
const VALVE: u8 = 6;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn cfg(total: Duration, interval: Duration) -> MachineCfg {
    MachineCfg {
        pins: InputPins {
            stop: STOP,
            go: GO,
            pause: Some(PAUSE),
            duration: None,
            interval: None,
        },
        inputs: InputCfg {
            purge_settle: ms(100),
            ..InputCfg::default()
        },
        tiers: None,
        timing: TimingConfig {
            total_duration: total,
            actuation_interval: interval,
            repeat_count: 2,
            fixed_overhead: Duration::ZERO,
            repeat_overhead: Duration::ZERO,
            safety_margin: ms(100),
        },
        mode: ActuationMode::Valve,
        tick: ms(5),
        refresh: ms(50),
    }
}

struct Rig {
    machine: Machine,
    buttons: SimInputs,
    valve: SimOutputs,
}

fn rig(cfg: &MachineCfg) -> Rig {
    let buttons = SimInputs::new();
    let valve = SimOutputs::new();
    let machine = Machine::start(
        cfg,
        buttons.clone(),
        Box::new(Valve::new(valve.clone(), VALVE)),
        Arc::new(MonotonicClock::new()),
    )
    .expect("machine starts");
    Rig {
        machine,
        buttons,
        valve,
    }
}

fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(ms(2));
    }
}

/// Hold a button until the machine reaches `mode`, then let go.
fn tap(r: &Rig, pin: u8, mode: CycleMode) {
    let h = r.machine.handle();
    r.buttons.press(pin);
    wait_for(&format!("{mode}"), || h.mode() == mode);
    r.buttons.release(pin);
}

#[test]
fn go_button_runs_to_completion() {
    let mut r = rig(&cfg(ms(2_000), ms(400)));
    tap(&r, GO, CycleMode::Running);

    let ev = r
        .machine
        .events()
        .recv_timeout(Duration::from_secs(5))
        .expect("completion event");
    assert_eq!(
        ev,
        MachineEvent::Completed {
            elapsed: ms(2_000),
            cycle_count: 5
        }
    );
    let h = r.machine.handle();
    assert_eq!(h.mode(), CycleMode::Setup);
    assert_eq!(r.valve.level(VALVE), Level::Low);
    assert!(
        r.valve.history().contains(&(VALVE, Level::High)),
        "valve opened during the run"
    );
    r.machine.shutdown().expect("clean shutdown");
}

#[test]
fn pause_button_holds_elapsed() {
    let mut r = rig(&cfg(ms(60_000), ms(400)));
    tap(&r, GO, CycleMode::Running);
    std::thread::sleep(ms(150));
    tap(&r, PAUSE, CycleMode::Paused);
    let h = r.machine.handle();
    let paused = h.snapshot().state.elapsed;
    std::thread::sleep(ms(100));
    assert_eq!(h.snapshot().state.elapsed, paused);
    assert_eq!(r.valve.level(VALVE), Level::Low);
    tap(&r, GO, CycleMode::Running);
    r.machine.shutdown().expect("clean shutdown");
    assert_eq!(r.valve.level(VALVE), Level::Low);
}

#[test]
fn purge_chord_opens_valve_and_settles_to_setup() {
    let mut r = rig(&cfg(ms(60_000), ms(400)));
    tap(&r, GO, CycleMode::Running);
    let h = r.machine.handle();

    r.buttons.press(STOP);
    r.buttons.press(GO);
    wait_for("purge", || h.mode() == CycleMode::Purge);
    assert_eq!(r.valve.level(VALVE), Level::High);

    r.buttons.release(GO);
    r.buttons.release(STOP);
    wait_for("valve closed", || r.valve.level(VALVE) == Level::Low);
    wait_for("setup", || h.mode() == CycleMode::Setup);
    let st = h.snapshot().state;
    assert_eq!(st.cycle_count, 0);
    assert_eq!(st.elapsed, Duration::ZERO);
    r.machine.shutdown().expect("clean shutdown");
}

#[test]
fn stop_during_purge_closes_valve_while_chord_is_held() {
    let mut r = rig(&cfg(ms(60_000), ms(400)));
    tap(&r, GO, CycleMode::Running);
    let h = r.machine.handle();

    r.buttons.press(STOP);
    r.buttons.press(GO);
    wait_for("purge", || h.mode() == CycleMode::Purge);
    assert!(h.stop(true).expect("stop accepted").is_applied());
    assert_eq!(h.mode(), CycleMode::Setup);
    assert_eq!(r.valve.level(VALVE), Level::Low);

    // Held chord, its release and the settle window change nothing.
    std::thread::sleep(ms(50));
    r.buttons.release(GO);
    r.buttons.release(STOP);
    std::thread::sleep(ms(250));
    let st = h.snapshot().state;
    assert_eq!(st.mode, CycleMode::Setup);
    assert_eq!(st.cycle_count, 0);
    assert_eq!(st.elapsed, Duration::ZERO);
    assert_eq!(r.valve.level(VALVE), Level::Low);
    r.machine.shutdown().expect("clean shutdown");
}

#[test]
fn stop_button_returns_to_setup_with_valve_closed() {
    let mut r = rig(&cfg(ms(60_000), ms(400)));
    tap(&r, GO, CycleMode::Running);
    tap(&r, STOP, CycleMode::Setup);
    assert_eq!(r.valve.level(VALVE), Level::Low);
    assert_eq!(r.machine.handle().snapshot().state.cycle_count, 0);
    r.machine.shutdown().expect("clean shutdown");
}

#[test]
fn input_fault_forces_safe_state() {
    let mut r = rig(&cfg(ms(60_000), ms(400)));
    tap(&r, GO, CycleMode::Running);
    r.buttons.fail_reads(true);
    let ev = r
        .machine
        .events()
        .recv_timeout(Duration::from_secs(5))
        .expect("fault event");
    assert!(matches!(ev, MachineEvent::Fault(CycleError::HardwareFault(_))));
    assert_eq!(r.machine.handle().mode(), CycleMode::Setup);
    assert_eq!(r.valve.level(VALVE), Level::Low);
    r.buttons.fail_reads(false);
    r.machine.shutdown().expect("clean shutdown");
}

#[test]
fn output_fault_during_run_is_reported() {
    let mut r = rig(&cfg(ms(60_000), ms(400)));
    r.valve.fail_writes(true);
    r.machine.handle().start().expect("start is accepted");
    let ev = r
        .machine
        .events()
        .recv_timeout(Duration::from_secs(5))
        .expect("fault event");
    assert!(matches!(ev, MachineEvent::Fault(CycleError::HardwareFault(_))));
    assert_eq!(r.machine.handle().mode(), CycleMode::Setup);
    r.valve.fail_writes(false);
    r.machine.shutdown().expect("clean shutdown");
}

#[test]
fn setters_through_handle_respect_mode() {
    let mut r = rig(&cfg(ms(60_000), ms(400)));
    let h = r.machine.handle();
    assert!(h.set_total_duration(ms(30_000)).unwrap().is_applied());
    h.start().unwrap();
    assert!(!h.set_repeat_count(9).unwrap().is_applied());
    assert_eq!(h.timing().repeat_count, 2);
    assert_eq!(h.timing().total_duration, ms(30_000));
    r.machine.shutdown().unwrap();
    assert!(matches!(
        h.start().unwrap_err().downcast_ref::<CycleError>(),
        Some(CycleError::Interrupted)
    ));
}

#[test]
fn publisher_delivers_snapshots() {
    let r = rig(&cfg(ms(60_000), ms(400)));
    let rx = r.machine.status().expect("publisher running");
    r.machine.handle().start().unwrap();
    wait_for("running snapshot", || {
        rx.recv_timeout(Duration::from_secs(1))
            .is_ok_and(|s| s.state.mode == CycleMode::Running)
    });
    drop(r);
}

#[test]
fn sampler_thread_exits_on_drop() {
    let sink = Arc::new(RecordingSink::new());
    let pins = cfg(ms(1_000), ms(400)).pins;
    let sampler = InputSampler::spawn(
        SimInputs::new(),
        pins,
        InputCfg::default(),
        MonotonicClock::new(),
        sink.clone(),
    );
    wait_for("a few polls", || sampler.polls() >= 3);
    drop(sampler);
    assert!(sink.commands().is_empty(), "nothing pressed");
}

#[test]
fn many_machines_do_not_leak_threads() {
    for _ in 0..10 {
        let r = rig(&cfg(ms(1_000), ms(400)));
        r.machine.handle().start().unwrap();
        std::thread::sleep(ms(10));
        drop(r);
    }
}
