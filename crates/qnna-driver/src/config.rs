// SPDX-License-Identifier: AGPL-3.0-only

//! Driver configuration
//!
//! Defaults describe the simulated device. Environment variables override
//! them, and binaries layer their own flags on top:
//!
//! | Variable | Meaning | Example |
//! |----------|---------|---------|
//! | `QNNA_BACKEND` | `sim` or `hw` | `hw` |
//! | `QNNA_BASE_ADDR` | physical base of the register window | `0x80000000` |
//! | `QNNA_MEM_PATH` | physical-memory device file | `/dev/mem` |
//! | `QNNA_POLL_INTERVAL_MS` | sleep between STATUS polls | `100` |
//! | `QNNA_CLOCK` | `monotonic` or `step` | `step` |

use crate::clock::ClockKind;
use crate::error::{QnnaError, Result};
use qnna_chip::window;
use std::path::PathBuf;
use std::str::FromStr;

/// Default sleep between two STATUS reads.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default latency of the simulated device, in BUSY polls.
pub const DEFAULT_SIM_BUSY_POLLS: u32 = 2;

/// Default physical-memory device file.
pub const DEFAULT_MEM_PATH: &str = "/dev/mem";

/// Backend selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendSelection {
    /// In-process register file
    #[default]
    Simulated,

    /// Mapped physical window
    Hardware,
}

impl FromStr for BackendSelection {
    type Err = QnnaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sim" | "simulated" | "simulation" => Ok(Self::Simulated),
            "hw" | "hardware" => Ok(Self::Hardware),
            other => Err(QnnaError::invalid_config(format!(
                "unknown backend '{other}' (expected sim or hw)"
            ))),
        }
    }
}

/// Everything needed to build a [`Controller`](crate::Controller).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Which register backend to use
    pub backend: BackendSelection,

    /// Physical base address of the register window (hardware only)
    pub base_addr: u64,

    /// Register window size in bytes
    pub window_size: usize,

    /// Physical-memory device file (hardware only)
    pub mem_path: PathBuf,

    /// Sleep between STATUS polls
    pub poll_interval_ms: u64,

    /// Time source
    pub clock: ClockKind,

    /// Simulated device latency in BUSY polls; `None` for a bare register file
    pub sim_busy_polls: Option<u32>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            backend: BackendSelection::Simulated,
            base_addr: window::REFERENCE_BASE,
            window_size: window::SIZE,
            mem_path: PathBuf::from(DEFAULT_MEM_PATH),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            clock: ClockKind::Monotonic,
            sim_busy_polls: Some(DEFAULT_SIM_BUSY_POLLS),
        }
    }
}

impl DriverConfig {
    /// Defaults overlaid with `QNNA_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns error if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with values from `lookup` (used by [`from_env`](Self::from_env)).
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(backend) = lookup("QNNA_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(base) = lookup("QNNA_BASE_ADDR") {
            config.base_addr = parse_u64(&base)?;
        }
        if let Some(path) = lookup("QNNA_MEM_PATH") {
            config.mem_path = PathBuf::from(path);
        }
        if let Some(interval) = lookup("QNNA_POLL_INTERVAL_MS") {
            config.poll_interval_ms = parse_u64(&interval)?;
        }
        if let Some(clock) = lookup("QNNA_CLOCK") {
            config.clock = clock.parse().map_err(QnnaError::invalid_config)?;
        }

        tracing::debug!("Driver config: {config:?}");
        Ok(config)
    }

    /// Set the backend.
    #[must_use]
    pub fn with_backend(mut self, backend: BackendSelection) -> Self {
        self.backend = backend;
        self
    }

    /// Set the physical base address.
    #[must_use]
    pub fn with_base_addr(mut self, base_addr: u64) -> Self {
        self.base_addr = base_addr;
        self
    }

    /// Set the physical-memory device file.
    #[must_use]
    pub fn with_mem_path(mut self, mem_path: impl Into<PathBuf>) -> Self {
        self.mem_path = mem_path.into();
        self
    }

    /// Set the poll interval.
    #[must_use]
    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Set the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: ClockKind) -> Self {
        self.clock = clock;
        self
    }

    /// Set the simulated device latency (`None` disables the device model).
    #[must_use]
    pub fn with_sim_busy_polls(mut self, busy_polls: Option<u32>) -> Self {
        self.sim_busy_polls = busy_polls;
        self
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns error if the window cannot hold the register map or is not a
    /// whole number of words, the poll interval is zero, or the base address
    /// is not word aligned.
    pub fn validate(&self) -> Result<()> {
        if self.window_size < window::MIN_SIZE {
            return Err(QnnaError::invalid_config(format!(
                "window of {:#x} bytes is smaller than the register map ({:#x})",
                self.window_size,
                window::MIN_SIZE
            )));
        }
        if self.window_size % 4 != 0 {
            return Err(QnnaError::invalid_config(format!(
                "window of {:#x} bytes is not a whole number of words",
                self.window_size
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(QnnaError::invalid_config("poll interval must be at least 1 ms"));
        }
        if self.base_addr % 4 != 0 {
            return Err(QnnaError::invalid_config(format!(
                "base address {:#x} is not word aligned",
                self.base_addr
            )));
        }
        Ok(())
    }
}

/// Parse `0x`-prefixed hexadecimal or plain decimal.
///
/// # Errors
///
/// Returns error if `text` is neither.
pub fn parse_u64(text: &str) -> Result<u64> {
    let text = text.trim().replace('_', "");
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| QnnaError::invalid_config(format!("cannot parse '{text}' as a number: {e}")))
}
