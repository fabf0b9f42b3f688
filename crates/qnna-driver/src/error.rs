// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for QNNA driver operations
//!
//! Only environmental failures are errors. A device fault or a timeout is an
//! ordinary [`WaitOutcome`](crate::WaitOutcome), and register misuse panics.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for QNNA operations
pub type Result<T> = std::result::Result<T, QnnaError>;

/// Errors that can occur while setting up access to the device
#[derive(Debug, Error)]
pub enum QnnaError {
    /// Physical-memory device file not found
    #[error("Device not found: {path}")]
    DeviceNotFound {
        /// Path that was checked
        path: PathBuf,
    },

    /// I/O error while opening or inspecting the device file
    #[error("I/O error: {source}")]
    Io {
        /// Underlying I/O error
        #[from]
        source: std::io::Error,
    },

    /// Register window could not be mapped
    #[error("Failed to map register window: {reason}")]
    MapFailed {
        /// Reason for failure
        reason: String,
    },

    /// Driver configuration rejected
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Reason for rejection
        reason: String,
    },
}

impl QnnaError {
    /// Create a device not found error
    pub fn device_not_found(path: impl Into<PathBuf>) -> Self {
        Self::DeviceNotFound { path: path.into() }
    }

    /// Create a map failed error
    pub fn map_failed(reason: impl Into<String>) -> Self {
        Self::MapFailed {
            reason: reason.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
