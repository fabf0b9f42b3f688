// SPDX-License-Identifier: AGPL-3.0-only

//! Control protocol for one QNNA computation
//!
//! ```text
//!   Idle ──configure──▶ Configured ──start──▶ Started ──wait_for_completion──▶ Completed
//!                            ▲                                              ├─▶ Failed
//!                            └──────────────── configure ───────────────────┴─▶ TimedOut
//! ```
//!
//! `configure` always begins with a reset (CONTROL = 0), then writes the
//! dimensions, then the full control word. `start` writes KICK and returns.
//! `wait_for_completion` polls STATUS until ERROR or DONE is seen or the
//! deadline passes. Terminal states are absorbing: running again takes a new
//! `configure` + `start`.
//!
//! There is no retry here. A device fault and a timeout are both ordinary
//! [`WaitOutcome`]s for the caller to act on.

use crate::backend::RegisterBackend;
use crate::backends::SimulatedBackend;
use crate::clock::{select_clock, Clock, MonotonicClock};
use crate::config::{DriverConfig, DEFAULT_POLL_INTERVAL_MS};
use crate::device::{ControlFlags, Dimensions, QnnaRegisters, StatusFlags};
use crate::error::Result;
use std::fmt;
use tracing::{debug, info, warn};

/// Terminal result of one control cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaitOutcome {
    /// DONE observed
    Completed,
    /// ERROR observed
    Failed,
    /// Deadline passed with neither DONE nor ERROR
    TimedOut,
}

impl WaitOutcome {
    /// `true` only for [`Completed`](Self::Completed).
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for WaitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "device error"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Where the controller is in the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ControlState {
    /// Nothing configured since construction
    #[default]
    Idle,
    /// Reset, dimensions and control written
    Configured,
    /// KICK written
    Started,
    /// Last wait saw DONE
    Completed,
    /// Last wait saw ERROR
    Failed,
    /// Last wait ran out of time
    TimedOut,
}

impl ControlState {
    /// Whether the state ends a cycle.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }
}

impl From<WaitOutcome> for ControlState {
    fn from(outcome: WaitOutcome) -> Self {
        match outcome {
            WaitOutcome::Completed => Self::Completed,
            WaitOutcome::Failed => Self::Failed,
            WaitOutcome::TimedOut => Self::TimedOut,
        }
    }
}

/// Resolve one STATUS observation.
///
/// ERROR wins over DONE, DONE wins over BUSY. `None` means keep polling.
/// A faulted completion that latches DONE and ERROR together is reported
/// as a failure.
#[must_use]
pub const fn classify(status: StatusFlags) -> Option<WaitOutcome> {
    if status.is_error() {
        Some(WaitOutcome::Failed)
    } else if status.is_done() {
        Some(WaitOutcome::Completed)
    } else {
        None
    }
}

/// Result of [`Controller::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// How the cycle ended
    pub outcome: WaitOutcome,
    /// Problem size that was run
    pub dimensions: Dimensions,
    /// Clock time from kick to outcome (poll count on a degraded clock)
    pub elapsed_ms: u64,
    /// STATUS reads performed while waiting
    pub polls: u32,
}

impl CycleReport {
    /// `mac_ops * 1000 / elapsed_ms`, or 0 when nothing elapsed or the run
    /// did not complete.
    #[must_use]
    pub const fn throughput_ops_per_sec(&self) -> u64 {
        if !self.outcome.is_success() || self.elapsed_ms == 0 {
            return 0;
        }
        self.dimensions.mac_ops().saturating_mul(1000) / self.elapsed_ms
    }
}

/// Drives configure / start / wait over a register map and a clock.
///
/// Single-threaded and blocking. The controller owns the register map, so
/// at most one cycle is in flight per backend; share it across threads only
/// behind a lock.
#[derive(Debug)]
pub struct Controller<B, C> {
    regs: QnnaRegisters<B>,
    clock: C,
    poll_interval_ms: u64,
    state: ControlState,
    last_polls: u32,
}

impl<B: RegisterBackend, C: Clock> Controller<B, C> {
    /// Controller over `backend`, timed by `clock`, polling every 100 ms.
    pub fn new(backend: B, clock: C) -> Self {
        if clock.is_degraded() {
            warn!("Controller uses a degraded clock: timeouts are poll-count budgets");
        }
        Self {
            regs: QnnaRegisters::new(backend),
            clock,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            state: ControlState::Idle,
            last_polls: 0,
        }
    }

    /// Change the sleep between STATUS polls.
    #[must_use]
    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Sleep between STATUS polls.
    pub const fn poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms
    }

    /// Current protocol state.
    pub const fn state(&self) -> ControlState {
        self.state
    }

    /// Reset, then write dimensions and the control word.
    ///
    /// No status check: the device accepts configuration while idle.
    pub fn configure(&mut self, dims: Dimensions, relu_enabled: bool) {
        info!("Configuring QNNA: {dims}, ReLU={relu_enabled}");
        self.regs.reset();
        self.regs.write_dimensions(dims);
        self.regs.write_control(ControlFlags::with_relu(relu_enabled));
        self.state = ControlState::Configured;
    }

    /// Write KICK. Does not wait.
    ///
    /// Calling this without a preceding [`configure`](Self::configure) is
    /// undefined sequencing on the device; the kick is still issued.
    pub fn start(&mut self) {
        if self.state != ControlState::Configured {
            warn!("Kick issued from state {:?}; configure first", self.state);
        }
        info!("Starting computation");
        self.regs.kick();
        self.state = ControlState::Started;
    }

    /// Poll STATUS until DONE, ERROR, or `timeout_ms` elapses on the clock.
    ///
    /// Each poll cycle is one STATUS read followed, if not terminal, by a
    /// sleep of the poll interval. A status that is terminal on the first
    /// read returns without sleeping.
    pub fn wait_for_completion(&mut self, timeout_ms: u64) -> WaitOutcome {
        debug!("Waiting for completion (timeout {timeout_ms} ms)");
        let deadline = self.clock.now_ms().saturating_add(timeout_ms);
        let mut polls = 0u32;

        let outcome = loop {
            if self.clock.now_ms() >= deadline {
                break WaitOutcome::TimedOut;
            }

            let status = self.regs.read_status();
            polls = polls.saturating_add(1);

            if let Some(outcome) = classify(status) {
                break outcome;
            }

            if status.is_busy() {
                debug!("Status: BUSY (poll {polls})");
            } else {
                debug!("Status: IDLE (poll {polls})");
            }
            self.clock.sleep_ms(self.poll_interval_ms);
        };

        match outcome {
            WaitOutcome::Completed => info!("Computation complete after {polls} polls"),
            WaitOutcome::Failed => warn!("Device reported ERROR after {polls} polls"),
            WaitOutcome::TimedOut => {
                warn!("Timeout after {timeout_ms} ms waiting for completion ({polls} polls)");
            }
        }

        self.last_polls = polls;
        self.state = outcome.into();
        outcome
    }

    /// STATUS reads performed by the last [`wait_for_completion`](Self::wait_for_completion).
    pub const fn last_polls(&self) -> u32 {
        self.last_polls
    }

    /// One decoded STATUS read.
    pub fn read_status(&mut self) -> StatusFlags {
        self.regs.read_status()
    }

    /// Read back DIM_M/N/K.
    pub fn read_dimensions(&mut self) -> Dimensions {
        self.regs.read_dimensions()
    }

    /// Configure, start and wait, timing the cycle on the controller clock.
    pub fn run(&mut self, dims: Dimensions, relu_enabled: bool, timeout_ms: u64) -> CycleReport {
        self.configure(dims, relu_enabled);
        let start = self.clock.now_ms();
        self.start();
        let outcome = self.wait_for_completion(timeout_ms);
        let elapsed_ms = self.clock.now_ms().saturating_sub(start);

        CycleReport {
            outcome,
            dimensions: dims,
            elapsed_ms,
            polls: self.last_polls,
        }
    }

    /// Register map, for verification reads.
    pub const fn registers(&self) -> &QnnaRegisters<B> {
        &self.regs
    }

    /// Register map, mutably.
    pub fn registers_mut(&mut self) -> &mut QnnaRegisters<B> {
        &mut self.regs
    }

    /// Time source.
    pub const fn clock(&self) -> &C {
        &self.clock
    }
}

impl Controller<SimulatedBackend, MonotonicClock> {
    /// Simulated register file (no device model) on the wall clock.
    #[must_use]
    pub fn simulated() -> Self {
        Self::new(SimulatedBackend::default(), MonotonicClock::new())
    }
}

/// Controller with backend and clock chosen at runtime.
pub type DynController = Controller<Box<dyn RegisterBackend>, Box<dyn Clock>>;

impl DynController {
    /// Build backend, clock and poll interval from `config`.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the backend cannot
    /// be opened.
    pub fn from_config(config: &DriverConfig) -> Result<Self> {
        let backend = crate::backend::select_backend(config)?;
        let clock = select_clock(config.clock);
        Ok(Self::new(backend, clock).with_poll_interval_ms(config.poll_interval_ms))
    }
}
