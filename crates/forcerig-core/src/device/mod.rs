//! Device protocols
//!
//! Typed payloads and request/confirm exchanges for the strain gauge
//! digitizer and the stepper motor driver.

mod command;
mod digitizer;
mod reading;
mod step_drive;

pub use command::{Command, Step};
pub use digitizer::Digitizer;
pub use reading::{Calibration, Reading, CHANNEL_COUNT, READING_MIN_SIZE, READING_PAYLOAD_SIZE};
pub use step_drive::StepDrive;

use std::time::Duration;

/// Request/confirm timing for one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeTiming {
    /// Wait after a write before reading the device back
    pub settle: Duration,
    /// How long to wait for the confirming reply
    pub confirm_timeout: Duration,
}
