// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end control cycles against the simulated register file
//!
//! These run the same Controller code path a hardware deployment runs; only
//! the backend differs.

use qnna_driver::regs::{status, Register};
use qnna_driver::{
    Clock, ControlState, Controller, Dimensions, MonotonicClock, SimulatedBackend, WaitOutcome,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

/// Wall clock that counts how often the poll loop sleeps.
#[derive(Debug, Default)]
struct CountingClock {
    inner: MonotonicClock,
    sleeps: AtomicU32,
}

impl CountingClock {
    fn sleeps(&self) -> u32 {
        self.sleeps.load(Ordering::Relaxed)
    }
}

impl Clock for CountingClock {
    fn now_ms(&self) -> u64 {
        self.inner.now_ms()
    }

    fn sleep_ms(&self, ms: u64) {
        self.sleeps.fetch_add(1, Ordering::Relaxed);
        self.inner.sleep_ms(ms);
    }
}

fn modelled(busy_polls: u32) -> Controller<SimulatedBackend, CountingClock> {
    Controller::new(
        SimulatedBackend::default().with_device_model(busy_polls),
        CountingClock::default(),
    )
}

#[test]
fn basic_cycle_completes_after_two_busy_polls() {
    let mut ctl = modelled(2);

    ctl.configure(Dimensions::new(4, 4, 4), false);
    ctl.start();
    let outcome = ctl.wait_for_completion(500);

    assert_eq!(outcome, WaitOutcome::Completed);
    assert_eq!(ctl.state(), ControlState::Completed);
    assert_eq!(ctl.last_polls(), 3, "two BUSY polls then DONE");
    assert_eq!(ctl.clock().sleeps(), 2);
    assert_eq!(ctl.read_dimensions(), Dimensions::new(4, 4, 4));
    assert_eq!(ctl.registers_mut().read(Register::Control), 0);
}

#[test]
fn relu_configuration_sets_only_bit0() {
    let mut ctl = modelled(2);
    ctl.configure(Dimensions::new(4, 4, 4), true);

    let control = ctl.registers_mut().read(Register::Control);
    assert_eq!(control & qnna_driver::regs::control::RELU_ENABLE, 1);
    assert_eq!(control & qnna_driver::regs::control::IRQ_ENABLE, 0);
    assert_eq!(control, 1);
}

#[test]
fn immediate_done_returns_without_sleeping() {
    let mut ctl = Controller::new(SimulatedBackend::default(), CountingClock::default());
    ctl.configure(Dimensions::square(4), false);
    ctl.start();
    ctl.registers_mut().write(Register::Status, status::DONE);

    assert_eq!(ctl.wait_for_completion(500), WaitOutcome::Completed);
    assert_eq!(ctl.clock().sleeps(), 0);
    assert_eq!(ctl.last_polls(), 1);
}

#[test]
fn error_wins_over_done() {
    let mut ctl = Controller::new(SimulatedBackend::default(), CountingClock::default());
    ctl.configure(Dimensions::square(4), false);
    ctl.start();
    ctl.registers_mut()
        .write(Register::Status, status::ERROR | status::DONE | status::BUSY);

    assert_eq!(ctl.wait_for_completion(500), WaitOutcome::Failed);
    assert_eq!(ctl.state(), ControlState::Failed);
    assert_eq!(ctl.clock().sleeps(), 0);
}

#[test]
fn zero_dimension_is_reported_as_device_error() {
    let mut ctl = modelled(2).with_poll_interval_ms(1);
    ctl.configure(Dimensions::new(0, 4, 4), false);
    ctl.start();
    assert_eq!(ctl.wait_for_completion(500), WaitOutcome::Failed);
}

#[test]
fn silent_device_times_out_within_one_poll_interval() {
    const TIMEOUT_MS: u64 = 250;
    const POLL_MS: u64 = 100;
    // scheduler slack on loaded CI machines
    const SLACK: Duration = Duration::from_millis(75);

    let mut ctl = Controller::new(SimulatedBackend::default(), MonotonicClock::new())
        .with_poll_interval_ms(POLL_MS);
    ctl.configure(Dimensions::square(4), false);
    ctl.start();
    ctl.registers_mut().write(Register::Status, status::BUSY);

    let t0 = Instant::now();
    let outcome = ctl.wait_for_completion(TIMEOUT_MS);
    let elapsed = t0.elapsed();

    assert_eq!(outcome, WaitOutcome::TimedOut);
    assert_eq!(ctl.state(), ControlState::TimedOut);
    assert!(
        elapsed >= Duration::from_millis(TIMEOUT_MS),
        "returned early: {elapsed:?}"
    );
    assert!(
        elapsed <= Duration::from_millis(TIMEOUT_MS + POLL_MS) + SLACK,
        "overshot deadline: {elapsed:?}"
    );
}

#[test]
fn reset_leaves_dimensions_and_status_alone() {
    let mut ctl = modelled(1);
    ctl.configure(Dimensions::new(9, 8, 7), true);
    ctl.registers_mut().write(Register::Status, status::BUSY);

    for _ in 0..3 {
        ctl.registers_mut().reset();
    }

    assert_eq!(ctl.registers_mut().read(Register::Control), 0);
    assert_eq!(ctl.read_dimensions(), Dimensions::new(9, 8, 7));
    assert_eq!(ctl.registers_mut().read(Register::Status), status::BUSY);
}

#[test]
fn dimensions_round_trip_across_u16_range() {
    let mut ctl = Controller::simulated();
    let samples = (0..=u16::MAX).step_by(4099).chain([u16::MAX]);
    for v in samples {
        let dims = Dimensions::new(v, v.rotate_left(5), !v);
        ctl.registers_mut().write_dimensions(dims);
        assert_eq!(ctl.read_dimensions(), dims);
    }
}

#[test]
fn cycles_can_be_rerun_after_terminal_state() {
    let mut ctl = modelled(0).with_poll_interval_ms(1);

    let first = ctl.run(Dimensions::new(0, 2, 2), false, 200);
    assert_eq!(first.outcome, WaitOutcome::Failed);

    let second = ctl.run(Dimensions::new(2, 2, 2), true, 200);
    assert_eq!(second.outcome, WaitOutcome::Completed);
    assert_eq!(second.polls, 1);
    assert_eq!(ctl.registers_mut().read(Register::Control), 1);
}

#[test]
fn performance_cycle_reports_elapsed_and_throughput() {
    let mut ctl = modelled(2).with_poll_interval_ms(10);
    let report = ctl.run(Dimensions::square(8), false, 2000);

    assert_eq!(report.outcome, WaitOutcome::Completed);
    assert!(report.elapsed_ms >= 10, "two 10 ms sleeps: {}", report.elapsed_ms);
    assert_eq!(report.dimensions.mac_ops(), 1024);
    assert_eq!(
        report.throughput_ops_per_sec(),
        1024 * 1000 / report.elapsed_ms
    );
}
