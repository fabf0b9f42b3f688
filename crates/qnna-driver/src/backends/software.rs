// SPDX-License-Identifier: AGPL-3.0-only

//! Simulated register backend
//!
//! A zero-initialized array of words standing in for the QNNA register file.
//! Every write is visible to the next read, so the control protocol runs the
//! exact same code path it runs against hardware.
//!
//! ## Device model
//!
//! A bare register file never changes STATUS on its own. For end-to-end runs
//! without hardware, [`SimulatedBackend::with_device_model`] adds a small
//! behavioural model of the accelerator's control logic:
//!
//! ```text
//! write KICK=1, any DIM_* == 0   →  STATUS = ERROR
//! write KICK=1, dims valid       →  STATUS = BUSY
//! read STATUS while BUSY         →  after `busy_polls` BUSY reads, STATUS = DONE
//! ```
//!
//! A kick always clears the DONE/ERROR latch of the previous computation.
//! No arithmetic is modelled.

use crate::backend::{check_access, BackendType, RegisterBackend};
use qnna_chip::regs::{self, status, DIM_MASK, KICK_START};
use qnna_chip::window;
use tracing::{debug, trace};

/// Behavioural model of the accelerator's completion logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceModel {
    /// STATUS reads that observe BUSY before DONE is raised.
    pub busy_polls: u32,
    /// BUSY reads still to go for the running computation.
    remaining: u32,
    running: bool,
}

impl DeviceModel {
    /// Model that completes after `busy_polls` BUSY observations.
    #[must_use]
    pub const fn new(busy_polls: u32) -> Self {
        Self {
            busy_polls,
            remaining: 0,
            running: false,
        }
    }

    /// Whether a computation is in flight.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }
}

/// In-process QNNA register file.
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    words: Vec<u32>,
    model: Option<DeviceModel>,
    reads: u64,
    writes: u64,
}

impl SimulatedBackend {
    /// Create a zeroed register file of `extent` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `extent` is not a multiple of 4.
    #[must_use]
    pub fn new(extent: usize) -> Self {
        assert!(extent % 4 == 0, "window size {extent:#x} is not word aligned");
        Self {
            words: vec![0; extent / 4],
            model: None,
            reads: 0,
            writes: 0,
        }
    }

    /// Attach a [`DeviceModel`] that raises DONE after `busy_polls` BUSY reads.
    #[must_use]
    pub fn with_device_model(mut self, busy_polls: u32) -> Self {
        self.model = Some(DeviceModel::new(busy_polls));
        self
    }

    /// Current device model state, if one is attached.
    #[must_use]
    pub const fn device_model(&self) -> Option<&DeviceModel> {
        self.model.as_ref()
    }

    /// Raw word at `offset` without counting an access or advancing the model.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is misaligned or outside the window.
    #[must_use]
    pub fn peek(&self, offset: usize) -> u32 {
        check_access(offset, self.extent());
        self.words[offset / 4]
    }

    /// Number of reads performed through [`RegisterBackend::read`].
    #[must_use]
    pub const fn reads(&self) -> u64 {
        self.reads
    }

    /// Number of writes performed through [`RegisterBackend::write`].
    #[must_use]
    pub const fn writes(&self) -> u64 {
        self.writes
    }

    fn word(&self, offset: usize) -> u32 {
        self.words[offset / 4]
    }

    fn set_word(&mut self, offset: usize, value: u32) {
        self.words[offset / 4] = value;
    }

    fn on_kick(&mut self) {
        let dims = [regs::DIM_M, regs::DIM_N, regs::DIM_K].map(|off| self.word(off) & DIM_MASK);
        let Some(model) = self.model.as_mut() else {
            return;
        };

        let latched = self.words[regs::STATUS / 4] & !(status::DONE | status::ERROR | status::BUSY);
        if dims.contains(&0) {
            model.running = false;
            self.words[regs::STATUS / 4] = latched | status::ERROR;
            debug!("Simulated kick rejected: zero dimension in {dims:?}");
        } else {
            model.running = true;
            model.remaining = model.busy_polls;
            self.words[regs::STATUS / 4] = latched | status::BUSY;
            debug!(
                "Simulated kick accepted: {dims:?}, done after {} busy polls",
                model.busy_polls
            );
        }
    }

    fn on_status_read(&mut self) {
        let Some(model) = self.model.as_mut() else {
            return;
        };
        if !model.running {
            return;
        }

        if model.remaining == 0 {
            model.running = false;
            let word = &mut self.words[regs::STATUS / 4];
            *word = (*word & !status::BUSY) | status::DONE;
            trace!("Simulated computation done");
        } else {
            model.remaining -= 1;
        }
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(window::SIZE)
    }
}

impl RegisterBackend for SimulatedBackend {
    fn read(&mut self, offset: usize) -> u32 {
        check_access(offset, self.extent());
        self.reads += 1;

        if offset == regs::STATUS {
            self.on_status_read();
        }

        let value = self.word(offset);
        trace!("Sim read u32 @ {offset:#x} = {value:#x}");
        value
    }

    fn write(&mut self, offset: usize, value: u32) {
        check_access(offset, self.extent());
        self.writes += 1;
        trace!("Sim write u32 @ {offset:#x} = {value:#x}");

        self.set_word(offset, value);
        if offset == regs::KICK && value == KICK_START {
            self.on_kick();
        }
    }

    fn extent(&self) -> usize {
        self.words.len() * 4
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Simulated
    }
}
