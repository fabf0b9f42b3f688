// SPDX-License-Identifier: AGPL-3.0-only

//! Control driver for the QNNA matrix-multiply accelerator.
//!
//! The driver configures operand dimensions and the activation mode, kicks a
//! computation, and polls STATUS until the device reports DONE or ERROR or a
//! deadline passes. It runs unchanged over real MMIO or an in-process
//! register file.
//!
//! # Layers
//!
//! ```text
//! Controller          configure → start → wait_for_completion   (protocol)
//!   └─ QnnaRegisters  named registers, bit-field decode          (device)
//!        ├─ RegisterBackend   HardwareBackend | SimulatedBackend (backends)
//!        └─ Clock             MonotonicClock  | StepClock        (clock)
//! ```
//!
//! # Quick start
//!
//! ```
//! use qnna_driver::{Controller, Dimensions, MonotonicClock, SimulatedBackend, WaitOutcome};
//!
//! let backend = SimulatedBackend::default().with_device_model(2);
//! let mut ctl = Controller::new(backend, MonotonicClock::new()).with_poll_interval_ms(1);
//!
//! ctl.configure(Dimensions::square(4), false);
//! ctl.start();
//! assert_eq!(ctl.wait_for_completion(500), WaitOutcome::Completed);
//! assert_eq!(ctl.read_dimensions(), Dimensions::square(4));
//! ```
//!
//! On hardware, map the window instead:
//!
//! ```no_run
//! use qnna_driver::{DriverConfig, DynController, BackendSelection, Dimensions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DriverConfig::from_env()?.with_backend(BackendSelection::Hardware);
//! let mut ctl = DynController::from_config(&config)?;
//! let report = ctl.run(Dimensions::square(8), false, 2000);
//! println!("{} in {} ms", report.outcome, report.elapsed_ms);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

mod backend;
pub mod backends;
pub mod clock;
mod config;
mod device;
mod error;
pub mod protocol;

/// Register map constants (re-exported from qnna-chip).
pub mod regs {
    pub use qnna_chip::regs::*;
    pub use qnna_chip::window;
}

pub use backend::{check_access, select_backend, BackendType, RegisterBackend};
pub use backends::{DeviceModel, HardwareBackend, SimulatedBackend};
pub use clock::{select_clock, Clock, ClockKind, MonotonicClock, StepClock};
pub use config::{
    parse_u64, BackendSelection, DriverConfig, DEFAULT_MEM_PATH, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SIM_BUSY_POLLS,
};
pub use device::{ControlFlags, Dimensions, QnnaRegisters, StatusFlags};
pub use error::{QnnaError, Result};
pub use protocol::{classify, ControlState, Controller, CycleReport, DynController, WaitOutcome};

/// Commonly used types.
pub mod prelude {
    pub use crate::{
        Clock, ControlState, Controller, CycleReport, Dimensions, DriverConfig, DynController,
        QnnaError, RegisterBackend, Result, SimulatedBackend, StatusFlags, WaitOutcome,
    };
}
