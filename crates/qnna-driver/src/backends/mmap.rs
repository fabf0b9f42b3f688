// SPDX-License-Identifier: AGPL-3.0-only

//! Hardware register backend
//!
//! Maps the QNNA register window from a physical-memory device file
//! (`/dev/mem` by default) and performs every access as a single volatile
//! 32-bit load or store. No access is cached, merged or reordered with
//! respect to the others.
//!
//! The base address is a constructor parameter. Nothing in the driver
//! assumes the reference SoC address.

use crate::backend::{check_access, BackendType, RegisterBackend};
use crate::error::{QnnaError, Result};
use rustix::fs::OFlags;
use rustix::mm::{mmap, munmap, MapFlags, ProtFlags};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsFd;
use std::path::Path;
use std::ptr::NonNull;

/// Mapped QNNA register window
#[derive(Debug)]
pub struct HardwareBackend {
    ptr: NonNull<u8>,
    extent: usize,
    base: u64,
    /// Keeps the mapping's file open; `None` for windows mapped elsewhere.
    file: Option<File>,
}

impl HardwareBackend {
    /// Map `extent` bytes of physical memory at `base` through `path`.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `path` does not exist ([`QnnaError::DeviceNotFound`])
    /// - `path` cannot be opened read/write ([`QnnaError::Io`])
    /// - `base` is not page aligned, `extent` is zero, or mmap fails
    ///   ([`QnnaError::MapFailed`])
    pub fn map(path: &Path, base: u64, extent: usize) -> Result<Self> {
        if !path.exists() {
            return Err(QnnaError::device_not_found(path));
        }

        if extent == 0 {
            return Err(QnnaError::map_failed("window size is 0"));
        }

        let page = rustix::param::page_size() as u64;
        if base % page != 0 {
            return Err(QnnaError::map_failed(format!(
                "base {base:#x} is not aligned to the {page:#x}-byte page size"
            )));
        }

        tracing::debug!("Mapping {extent:#x} bytes at {base:#x} via {}", path.display());

        // Flag bits are small positive values
        #[allow(clippy::cast_possible_wrap)]
        let sync_flag = OFlags::SYNC.bits() as i32;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(sync_flag)
            .open(path)
            .inspect_err(|e| tracing::warn!("Cannot open {}: {e}", path.display()))?;

        // SAFETY: mmap necessary for MMIO - maps the register window into the process.
        // Invariants: (1) fd valid, just opened read/write; (2) extent non-zero (checked);
        // (3) offset page aligned (checked); (4) MAP_SHARED so stores reach the device;
        // (5) file kept alive in self, unmapped in Drop.
        let ptr = unsafe {
            let addr = mmap(
                std::ptr::null_mut(),
                extent,
                ProtFlags::READ | ProtFlags::WRITE,
                MapFlags::SHARED,
                file.as_fd(),
                base,
            )
            .map_err(|e| QnnaError::map_failed(format!("mmap at {base:#x} failed: {e}")))?;

            NonNull::new(addr.cast::<u8>())
                .ok_or_else(|| QnnaError::map_failed("mmap returned a null pointer"))?
        };

        tracing::info!("Mapped QNNA window {base:#x}+{extent:#x} at {ptr:p}");

        Ok(Self {
            ptr,
            extent,
            base,
            file: Some(file),
        })
    }

    /// Wrap a window that is already mapped (bare metal, UIO, a parent
    /// driver's mapping).
    ///
    /// The window is not unmapped on drop.
    ///
    /// # Safety
    ///
    /// `ptr` must be 4-byte aligned and valid for volatile reads and writes
    /// of `extent` bytes for the lifetime of the returned backend, and no
    /// other code may access the window concurrently.
    pub const unsafe fn from_raw(ptr: NonNull<u8>, extent: usize) -> Self {
        Self {
            ptr,
            extent,
            base: 0,
            file: None,
        }
    }

    /// Physical base the window was mapped from (0 for [`from_raw`](Self::from_raw)).
    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }
}

impl RegisterBackend for HardwareBackend {
    fn read(&mut self, offset: usize) -> u32 {
        check_access(offset, self.extent);

        // SAFETY: read_volatile necessary for MMIO - hardware can change value.
        // Invariants: (1) ptr valid for self.extent bytes; (2) offset+4 <= extent and
        // offset word aligned (check_access); (3) window base is page or caller aligned.
        #[allow(clippy::cast_ptr_alignment)]
        let value = unsafe { self.ptr.as_ptr().add(offset).cast::<u32>().read_volatile() };

        tracing::trace!("Read u32 @ {offset:#x} = {value:#x}");
        value
    }

    fn write(&mut self, offset: usize, value: u32) {
        check_access(offset, self.extent);

        tracing::trace!("Write u32 @ {offset:#x} = {value:#x}");

        // SAFETY: write_volatile necessary for MMIO - stores trigger device side effects.
        // Invariants: (1) ptr valid for self.extent bytes; (2) offset+4 <= extent and
        // offset word aligned (check_access); (3) &mut self gives exclusive access.
        #[allow(clippy::cast_ptr_alignment)]
        unsafe {
            self.ptr.as_ptr().add(offset).cast::<u32>().write_volatile(value);
        }
    }

    fn extent(&self) -> usize {
        self.extent
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Hardware
    }
}

impl Drop for HardwareBackend {
    fn drop(&mut self) {
        if self.file.is_none() {
            return;
        }

        tracing::debug!("Unmapping QNNA window {:#x}+{:#x}", self.base, self.extent);

        // SAFETY: munmap of the exact range returned by mmap in map().
        // Drop runs at most once and no references into the window outlive self.
        unsafe {
            if let Err(e) = munmap(self.ptr.as_ptr().cast(), self.extent) {
                tracing::error!("munmap failed during drop: {e}");
            }
        }
    }
}

// SAFETY: Send - the backend owns its mapping exclusively; the mapping is
// process-wide so moving the handle between threads does not invalidate it.
unsafe impl Send for HardwareBackend {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn backing_file(len: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&vec![0u8; len]).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn missing_device_file() {
        let err = HardwareBackend::map(Path::new("/nonexistent/qnna-mem"), 0, 0x400).unwrap_err();
        assert!(matches!(err, QnnaError::DeviceNotFound { .. }));
    }

    #[test]
    fn unopenable_device_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = HardwareBackend::map(dir.path(), 0, 0x400).unwrap_err();
        assert!(matches!(err, QnnaError::Io { .. }), "{err}");
    }

    #[test]
    fn unaligned_base_rejected() {
        let file = backing_file(0x2000);
        let err = HardwareBackend::map(file.path(), 0x10, 0x400).unwrap_err();
        assert!(matches!(err, QnnaError::MapFailed { .. }));
    }

    #[test]
    fn empty_window_rejected() {
        let file = backing_file(0x1000);
        assert!(HardwareBackend::map(file.path(), 0, 0).is_err());
    }

    #[test]
    fn file_backed_window_round_trips_words() {
        let file = backing_file(0x1000);
        let mut hw = HardwareBackend::map(file.path(), 0, 0x400).unwrap();
        hw.write(0x008, 0xDEAD_BEEF);
        hw.write(0x3FC, 7);
        assert_eq!(hw.read(0x008), 0xDEAD_BEEF);
        assert_eq!(hw.read(0x3FC), 7);
        assert_eq!(hw.read(0x000), 0);
        assert_eq!(hw.backend_type(), BackendType::Hardware);
    }

    #[test]
    fn raw_window_uses_caller_memory() {
        let mut words = [0u32; 16];
        let ptr = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();
        // SAFETY: `words` outlives `hw` and is only touched through it below.
        let mut hw = unsafe { HardwareBackend::from_raw(ptr, 64) };
        hw.write(0x004, 0x100);
        assert_eq!(hw.read(0x004), 0x100);
        assert_eq!(hw.base(), 0);
        drop(hw);
        assert_eq!(words[1], 0x100);
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn access_past_window_panics() {
        let mut words = [0u32; 4];
        let ptr = NonNull::new(words.as_mut_ptr().cast::<u8>()).unwrap();
        // SAFETY: `words` outlives `hw`.
        let mut hw = unsafe { HardwareBackend::from_raw(ptr, 16) };
        hw.read(0x010);
    }

    #[test]
    #[ignore] // Requires QNNA hardware and root
    fn map_reference_window() {
        let mut hw = HardwareBackend::map(
            Path::new("/dev/mem"),
            qnna_chip::window::REFERENCE_BASE,
            qnna_chip::window::SIZE,
        )
        .expect("map /dev/mem");
        hw.write(qnna_chip::regs::CONTROL, 0);
        assert_eq!(hw.read(qnna_chip::regs::CONTROL), 0);
    }
}
