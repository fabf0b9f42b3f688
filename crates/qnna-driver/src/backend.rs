// SPDX-License-Identifier: AGPL-3.0-only

//! Register backend abstraction
//!
//! Everything above this layer talks to a [`RegisterBackend`] and never knows
//! whether the words land in a mapped MMIO window or in an in-process array.

use crate::backends::{HardwareBackend, SimulatedBackend};
use crate::config::DriverConfig;
use crate::error::Result;
use std::fmt::Debug;

/// Word-addressed 32-bit register space.
///
/// Offsets are byte offsets from the start of the window and must be a
/// multiple of four. An offset outside [`extent`](Self::extent) is a defect
/// in the caller, so implementations panic instead of returning an error.
///
/// Both methods take `&mut self`: the handle is owned by exactly one register
/// map, and a read of a status register may itself have side effects.
pub trait RegisterBackend: Debug + Send {
    /// Read the word at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is misaligned or outside the window.
    fn read(&mut self, offset: usize) -> u32;

    /// Write `value` to the word at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is misaligned or outside the window.
    fn write(&mut self, offset: usize, value: u32);

    /// Size of the window in bytes.
    fn extent(&self) -> usize;

    /// Backend type for diagnostics
    fn backend_type(&self) -> BackendType;
}

impl<B: RegisterBackend + ?Sized> RegisterBackend for Box<B> {
    fn read(&mut self, offset: usize) -> u32 {
        (**self).read(offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        (**self).write(offset, value);
    }

    fn extent(&self) -> usize {
        (**self).extent()
    }

    fn backend_type(&self) -> BackendType {
        (**self).backend_type()
    }
}

/// Enforce the word-access contract shared by all backends.
///
/// # Panics
///
/// Panics if `offset` is not 4-byte aligned or `offset + 4 > extent`.
#[inline]
#[track_caller]
pub fn check_access(offset: usize, extent: usize) {
    assert!(
        offset % 4 == 0,
        "Register offset {offset:#x} is not word aligned"
    );
    assert!(
        offset.checked_add(4).is_some_and(|end| end <= extent),
        "Register offset {offset:#x} out of bounds (window {extent:#x})"
    );
}

/// Backend type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// Volatile accesses to a mapped physical window
    Hardware,

    /// In-process register file, no hardware required
    Simulated,
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hardware => write!(f, "Hardware (MMIO)"),
            Self::Simulated => write!(f, "Simulated"),
        }
    }
}

/// Build the backend named by `config`.
///
/// The simulated backend always succeeds. The hardware backend maps
/// `config.window_size` bytes at `config.base_addr` through
/// `config.mem_path`.
///
/// # Errors
///
/// Returns error if the configuration is invalid or the hardware window
/// cannot be mapped.
pub fn select_backend(config: &DriverConfig) -> Result<Box<dyn RegisterBackend>> {
    use crate::config::BackendSelection;

    config.validate()?;

    match config.backend {
        BackendSelection::Simulated => {
            let mut sim = SimulatedBackend::new(config.window_size);
            if let Some(busy_polls) = config.sim_busy_polls {
                sim = sim.with_device_model(busy_polls);
            }
            tracing::info!(
                "Using simulated backend ({} bytes, device model: {})",
                config.window_size,
                config.sim_busy_polls.is_some()
            );
            Ok(Box::new(sim))
        }

        BackendSelection::Hardware => {
            let hw = HardwareBackend::map(&config.mem_path, config.base_addr, config.window_size)?;
            tracing::info!(
                "Using hardware backend at {:#x} via {}",
                config.base_addr,
                config.mem_path.display()
            );
            Ok(Box::new(hw))
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligned_offsets_inside_window_pass() {
        check_access(0x000, 0x400);
        check_access(0x3FC, 0x400);
    }

    #[test]
    #[should_panic(expected = "not word aligned")]
    fn misaligned_offset_panics() {
        check_access(0x002, 0x400);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn offset_past_window_panics() {
        check_access(0x400, 0x400);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn overflowing_offset_panics() {
        check_access(usize::MAX - 3, 0x400);
    }

    #[test]
    fn backend_type_display() {
        assert_eq!(BackendType::Simulated.to_string(), "Simulated");
        assert_eq!(BackendType::Hardware.to_string(), "Hardware (MMIO)");
    }

    #[test]
    fn select_simulated_backend() {
        let backend = select_backend(&DriverConfig::default()).unwrap();
        assert_eq!(backend.backend_type(), BackendType::Simulated);
        assert_eq!(backend.extent(), qnna_chip::window::SIZE);
    }
}
