// SPDX-License-Identifier: AGPL-3.0-only

//! Register map of the QNNA control block.
//!
//! All registers are 32 bits wide and word aligned. Offsets are bytes from
//! the device base.
//!
//! ```text
//! 0x000  CONTROL  R/W  bit0 RELU_ENABLE, bit3 IRQ_ENABLE
//! 0x004  STATUS   R    bit7 BUSY, bit8 DONE, bit15 ERROR
//! 0x008  DIM_M    R/W  operand row count      (16 bits)
//! 0x00C  DIM_N    R/W  operand column count   (16 bits)
//! 0x010  DIM_K    R/W  inner dimension        (16 bits)
//! 0x020  KICK     W    write 1 to start
//! ```

// ── Control and status ───────────────────────────────────────────────────────

/// Control register.
pub const CONTROL: usize = 0x000;

/// Status register. Read-only from the driver's point of view.
pub const STATUS: usize = 0x004;

// ── Operand dimensions ───────────────────────────────────────────────────────

/// Operand row count.
pub const DIM_M: usize = 0x008;
/// Operand column count.
pub const DIM_N: usize = 0x00C;
/// Inner dimension.
pub const DIM_K: usize = 0x010;

/// Meaningful bits of each dimension register.
pub const DIM_MASK: u32 = 0xFFFF;

// ── Start trigger ────────────────────────────────────────────────────────────

/// Kick register: edge-triggers a computation. Write-only.
pub const KICK: usize = 0x020;

/// Value written to [`KICK`] to start a computation.
pub const KICK_START: u32 = 1;

// ── Control register bit definitions ─────────────────────────────────────────

pub mod control {
    /// Apply ReLU to the output tile.
    pub const RELU_ENABLE: u32 = 1 << 0;
    /// Raise the completion interrupt. Unused by the polling driver.
    pub const IRQ_ENABLE: u32 = 1 << 3;
    /// Every bit the driver is allowed to set.
    pub const VALID_MASK: u32 = RELU_ENABLE | IRQ_ENABLE;
}

// ── Status register bit definitions ──────────────────────────────────────────

pub mod status {
    /// Computation in progress.
    pub const BUSY: u32 = 1 << 7;
    /// Computation finished.
    pub const DONE: u32 = 1 << 8;
    /// Device fault latched.
    pub const ERROR: u32 = 1 << 15;
    /// Every bit with a defined meaning.
    pub const VALID_MASK: u32 = BUSY | DONE | ERROR;
}

/// Named register of the control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// See [`CONTROL`].
    Control,
    /// See [`STATUS`].
    Status,
    /// See [`DIM_M`].
    DimM,
    /// See [`DIM_N`].
    DimN,
    /// See [`DIM_K`].
    DimK,
    /// See [`KICK`].
    Kick,
}

impl Register {
    /// Every register, in offset order.
    pub const ALL: [Self; 6] = [
        Self::Control,
        Self::Status,
        Self::DimM,
        Self::DimN,
        Self::DimK,
        Self::Kick,
    ];

    /// Byte offset from the device base.
    #[must_use]
    pub const fn offset(self) -> usize {
        match self {
            Self::Control => CONTROL,
            Self::Status => STATUS,
            Self::DimM => DIM_M,
            Self::DimN => DIM_N,
            Self::DimK => DIM_K,
            Self::Kick => KICK,
        }
    }

    /// Register name as it appears in the hardware documentation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Control => "CONTROL",
            Self::Status => "STATUS",
            Self::DimM => "DIM_M",
            Self::DimN => "DIM_N",
            Self::DimK => "DIM_K",
            Self::Kick => "KICK",
        }
    }

    /// Whether the driver may read the register.
    #[must_use]
    pub const fn is_readable(self) -> bool {
        !matches!(self, Self::Kick)
    }

    /// Whether the driver may write the register.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::Status)
    }
}

impl core::fmt::Display for Register {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} @ {:#05x}", self.name(), self.offset())
    }
}
