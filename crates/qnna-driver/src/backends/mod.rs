// SPDX-License-Identifier: AGPL-3.0-only

//! Register backend implementations
//!
//! Two backends available:
//! - **Hardware**: volatile MMIO over a mapped physical window (`/dev/mem`
//!   or a caller-provided mapping)
//! - **Simulated**: in-process register file with an optional device model,
//!   for development and CI without hardware

pub mod mmap;
pub mod software;

pub use mmap::HardwareBackend;
pub use software::{DeviceModel, SimulatedBackend};
