// SPDX-License-Identifier: AGPL-3.0-only

//! Typed view of the QNNA register map
//!
//! [`QnnaRegisters`] turns named operations (reset, dimensions, control,
//! kick, status) into word accesses on a [`RegisterBackend`]. It holds no
//! state besides the backend itself.

use crate::backend::RegisterBackend;
use bitflags::bitflags;
use qnna_chip::regs::{self, control, status, Register, DIM_MASK, KICK_START};
use std::fmt;
use tracing::{debug, trace};

/// Operand extents of one matrix multiply: `[M×K] · [K×N]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimensions {
    /// Operand row count
    pub m: u16,
    /// Operand column count
    pub n: u16,
    /// Inner dimension
    pub k: u16,
}

impl Dimensions {
    /// Build from the three extents.
    #[must_use]
    pub const fn new(m: u16, n: u16, k: u16) -> Self {
        Self { m, n, k }
    }

    /// Square problem `size × size × size`.
    #[must_use]
    pub const fn square(size: u16) -> Self {
        Self::new(size, size, size)
    }

    /// Arithmetic operations of the multiply, counting a MAC as two.
    #[must_use]
    pub const fn mac_ops(&self) -> u64 {
        2 * self.m as u64 * self.n as u64 * self.k as u64
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.m, self.n, self.k)
    }
}

bitflags! {
    /// Bits the driver writes to CONTROL. Reserved bits are always zero.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ControlFlags: u32 {
        /// Apply ReLU to the output.
        const RELU_ENABLE = control::RELU_ENABLE;
        /// Completion interrupt. The polling driver never sets it.
        const IRQ_ENABLE = control::IRQ_ENABLE;
    }
}

impl ControlFlags {
    /// Control word for a polled run with ReLU on or off.
    #[must_use]
    pub fn with_relu(relu_enabled: bool) -> Self {
        if relu_enabled {
            Self::RELU_ENABLE
        } else {
            Self::empty()
        }
    }
}

bitflags! {
    /// Decoded STATUS register.
    ///
    /// BUSY and DONE are not mutually exclusive; see
    /// [`classify`](crate::protocol::classify) for how combinations resolve.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct StatusFlags: u32 {
        /// Computation in progress.
        const BUSY = status::BUSY;
        /// Computation finished.
        const DONE = status::DONE;
        /// Device fault latched.
        const ERROR = status::ERROR;
    }
}

impl StatusFlags {
    /// Decode a raw STATUS word, dropping bits without a defined meaning.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self::from_bits_truncate(raw)
    }

    /// BUSY set.
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.contains(Self::BUSY)
    }

    /// DONE set.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.contains(Self::DONE)
    }

    /// ERROR set.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.contains(Self::ERROR)
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "BUSY={} DONE={} ERROR={}",
            self.is_busy(),
            self.is_done(),
            self.is_error()
        )
    }
}

/// QNNA register map over an exclusively owned backend.
#[derive(Debug)]
pub struct QnnaRegisters<B> {
    backend: B,
}

impl<B: RegisterBackend> QnnaRegisters<B> {
    /// Wrap `backend`.
    ///
    /// # Panics
    ///
    /// Panics if the backend window is too small to hold every register.
    pub fn new(backend: B) -> Self {
        assert!(
            backend.extent() >= qnna_chip::window::MIN_SIZE,
            "{} window of {:#x} bytes cannot hold the register map",
            backend.backend_type(),
            backend.extent()
        );
        Self { backend }
    }

    /// Write CONTROL = 0. Safe to repeat; touches nothing else.
    pub fn reset(&mut self) {
        trace!("reset");
        self.backend.write(regs::CONTROL, 0);
    }

    /// Write DIM_M, DIM_N, DIM_K, in that order.
    pub fn write_dimensions(&mut self, dims: Dimensions) {
        debug!("Dimensions: {dims}");
        self.backend.write(regs::DIM_M, u32::from(dims.m));
        self.backend.write(regs::DIM_N, u32::from(dims.n));
        self.backend.write(regs::DIM_K, u32::from(dims.k));
    }

    /// Write the full CONTROL word. No read-modify-write.
    pub fn write_control(&mut self, flags: ControlFlags) {
        let value = flags.bits() & control::VALID_MASK;
        debug!("Control: {value:#x}");
        self.backend.write(regs::CONTROL, value);
    }

    /// Edge-trigger a computation. Nothing is read back.
    pub fn kick(&mut self) {
        self.backend.write(regs::KICK, KICK_START);
    }

    /// One STATUS read, decoded.
    pub fn read_status(&mut self) -> StatusFlags {
        StatusFlags::from_raw(self.backend.read(regs::STATUS))
    }

    /// Read back the dimension registers, truncated to 16 bits each.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_dimensions(&mut self) -> Dimensions {
        let m = self.backend.read(regs::DIM_M) & DIM_MASK;
        let n = self.backend.read(regs::DIM_N) & DIM_MASK;
        let k = self.backend.read(regs::DIM_K) & DIM_MASK;
        Dimensions::new(m as u16, n as u16, k as u16)
    }

    /// Raw read of a named register.
    ///
    /// Reading [`Register::Kick`] is undefined on hardware; the simulated
    /// backend returns the last value written.
    pub fn read(&mut self, reg: Register) -> u32 {
        if !reg.is_readable() {
            debug!("Reading write-only register {reg}; value is backend defined");
        }
        self.backend.read(reg.offset())
    }

    /// Raw write of a named register.
    ///
    /// Writing [`Register::Status`] has no effect on hardware; on the
    /// simulated backend it is how tests inject a device status.
    pub fn write(&mut self, reg: Register, value: u32) {
        if !reg.is_writable() {
            debug!("Writing read-only register {reg}; hardware ignores it");
        }
        self.backend.write(reg.offset(), value);
    }

    /// One read of every readable register, in address order.
    pub fn snapshot(&mut self) -> Vec<(Register, u32)> {
        Register::ALL
            .into_iter()
            .filter(|reg| reg.is_readable())
            .map(|reg| (reg, self.backend.read(reg.offset())))
            .collect()
    }

    /// Underlying backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Underlying backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Give the backend back.
    pub fn into_backend(self) -> B {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::testing::RecordingBackend;
    use crate::backends::SimulatedBackend;

    fn sim() -> QnnaRegisters<SimulatedBackend> {
        QnnaRegisters::new(SimulatedBackend::default())
    }

    #[test]
    fn reset_is_idempotent_and_local() {
        let mut map = sim();
        map.write_dimensions(Dimensions::new(3, 5, 7));
        map.write(Register::Status, status::BUSY);
        map.write(Register::Control, 0xFFFF_FFFF);

        for _ in 0..4 {
            map.reset();
            assert_eq!(map.read(Register::Control), 0);
        }
        assert_eq!(map.read_dimensions(), Dimensions::new(3, 5, 7));
        assert_eq!(map.read(Register::Status), status::BUSY);
    }

    #[test]
    fn dimensions_round_trip_extremes() {
        let mut map = sim();
        for dims in [
            Dimensions::new(0, 0, 0),
            Dimensions::new(1, 2, 3),
            Dimensions::square(u16::MAX),
            Dimensions::new(u16::MAX, 0, 0x8000),
        ] {
            map.write_dimensions(dims);
            assert_eq!(map.read_dimensions(), dims);
        }
    }

    #[test]
    fn dimension_writes_are_ordered() {
        let mut map = QnnaRegisters::new(RecordingBackend::default());
        map.write_dimensions(Dimensions::new(1, 2, 3));
        assert_eq!(
            map.backend().writes,
            [(regs::DIM_M, 1), (regs::DIM_N, 2), (regs::DIM_K, 3)]
        );
    }

    #[test]
    fn snapshot_skips_write_only_kick() {
        let mut map = sim();
        map.write_dimensions(Dimensions::new(4, 5, 6));
        map.kick();
        let reads = map.backend().reads();

        let snap = map.snapshot();
        let names: Vec<_> = snap.iter().map(|(reg, _)| reg.name()).collect();
        assert_eq!(names, ["CONTROL", "STATUS", "DIM_M", "DIM_N", "DIM_K"]);
        assert_eq!(snap[2..], [(Register::DimM, 4), (Register::DimN, 5), (Register::DimK, 6)]);
        assert_eq!(map.backend().reads(), reads + 5);
    }

    #[test]
    fn read_dimensions_truncates_upper_bits() {
        let mut map = sim();
        map.write(Register::DimM, 0xABCD_0004);
        map.write(Register::DimN, 0x0001_0000);
        map.write(Register::DimK, 0xFFFF_FFFF);
        assert_eq!(map.read_dimensions(), Dimensions::new(4, 0, u16::MAX));
    }

    #[test]
    fn control_bit_fidelity() {
        let mut map = sim();
        map.write_control(ControlFlags::with_relu(true));
        assert_eq!(map.read(Register::Control), 0b1);

        map.write_control(ControlFlags::with_relu(false));
        assert_eq!(map.read(Register::Control), 0);

        map.write_control(ControlFlags::RELU_ENABLE | ControlFlags::IRQ_ENABLE);
        assert_eq!(map.read(Register::Control), 0b1001);
    }

    #[test]
    fn control_never_writes_reserved_bits() {
        let mut map = sim();
        map.write_control(ControlFlags::from_bits_retain(0xFFFF_FFFF));
        assert_eq!(map.read(Register::Control), control::VALID_MASK);
    }

    #[test]
    fn kick_writes_one() {
        let mut map = sim();
        map.kick();
        assert_eq!(map.backend().peek(regs::KICK), 1);
    }

    #[test]
    fn status_decodes_defined_bits_only() {
        let mut map = sim();
        map.write(Register::Status, 0xFFFF_FFFF);
        let st = map.read_status();
        assert!(st.is_busy() && st.is_done() && st.is_error());
        assert_eq!(st.bits(), status::VALID_MASK);

        map.write(Register::Status, status::DONE | 0x7F);
        assert_eq!(map.read_status(), StatusFlags::DONE);
    }

    #[test]
    fn mac_ops_uses_wide_arithmetic() {
        assert_eq!(Dimensions::square(8).mac_ops(), 1024);
        assert_eq!(
            Dimensions::square(u16::MAX).mac_ops(),
            2 * 65_535u64 * 65_535 * 65_535
        );
        assert_eq!(Dimensions::new(4, 4, 8).to_string(), "4x4x8");
    }

    #[test]
    #[should_panic(expected = "cannot hold the register map")]
    fn undersized_window_rejected() {
        let _ = QnnaRegisters::new(SimulatedBackend::new(0x10));
    }
}
