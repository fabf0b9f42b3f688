// SPDX-License-Identifier: AGPL-3.0-only

//! Register window of the QNNA block.
//!
//! ```text
//! Base          Size    Type                  Purpose
//! ───────────── ─────── ───────────────────── ───────────────────────────
//! 0x8000_0000   1 KiB   32-bit non-prefetch   Control/status registers
//! ```
//!
//! The base is where the reference SoC integration (Microwatt, Wishbone
//! slave) decodes the block. Other integrations place it elsewhere, so the
//! driver takes the base as a parameter and only uses this value as a
//! default.

use crate::regs;

/// Base address in the reference SoC integration.
pub const REFERENCE_BASE: u64 = 0x8000_0000;

/// Window size in bytes (256 words).
pub const SIZE: usize = 0x400;

/// Window size in 32-bit words.
pub const WORDS: usize = SIZE / 4;

/// Smallest window that still contains every register.
pub const MIN_SIZE: usize = regs::KICK + 4;
