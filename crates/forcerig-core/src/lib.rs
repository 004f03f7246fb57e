//! # ForceRig Core Library
//!
//! Serial transport and device protocols for the magnet force measurement rig.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - CRC-16/CCITT-FALSE packet framing with stream resynchronization
//! - An async transport that keeps blocking serial I/O on a dedicated worker
//! - Digitizer readings and calibration write-and-verify
//! - Step driver commands with acknowledgement
//! - Force computation, filtering and detachment detection
//!
//! ## Example
//!
//! ```rust,ignore
//! use forcerig_core::device::{Digitizer, StepDrive};
//! use forcerig_core::protocol::DEFAULT_BAUD_RATE;
//! use std::time::Duration;
//!
//! let mut drive = StepDrive::open("/dev/ttyUSB1", DEFAULT_BAUD_RATE)?;
//! drive.up().await?;
//!
//! let mut digitizer = Digitizer::open("/dev/ttyUSB0", DEFAULT_BAUD_RATE)?;
//! let reading = digitizer.fetch(Duration::from_secs(1)).await?;
//! println!("#{}: {:?}", reading.seq_num, reading.adc_readings);
//!
//! drive.stop().await?;
//! ```

pub mod config;
pub mod device;
pub mod force;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::RigConfig;
    pub use crate::device::{Calibration, Command, Digitizer, Reading, Step, StepDrive};
    pub use crate::force::{compute_forces, ForceSensor, PullMonitor, PullState};
    pub use crate::protocol::{Packet, ProtocolError, Transport};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
