// SPDX-License-Identifier: AGPL-3.0-only

//! Register model of the QNNA matrix-multiply accelerator.
//!
//! This crate has **no dependencies** and **no hardware access**. It is a
//! pure description of the device as seen from the bus: register offsets,
//! bit definitions and the size of the register window.
//!
//! The layout is taken from the CSR block of the accelerator
//! (`csr_status = {23'h0, csr_done, csr_busy, 7'h0}` plus the error latch in
//! bit 15).
//!
//! # Crate organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`regs`] | Register offsets, bit definitions, the [`Register`] enum |
//! | [`window`] | Register window size and the reference base address |

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod regs;
pub mod window;

pub use regs::Register;
