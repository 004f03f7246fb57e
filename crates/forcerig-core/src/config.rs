//! Rig configuration stored as JSON

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::device::ExchangeTiming;
use crate::protocol::DEFAULT_BAUD_RATE;

/// Errors loading or saving a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid configuration
    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serial ports and measurement parameters of the rig
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RigConfig {
    /// Digitizer serial port
    pub force_port: String,

    /// Step driver serial port
    pub drive_port: String,

    /// Baud rate of both devices
    pub baud_rate: u32,

    /// Wait after a write before the device is read back
    pub settle_ms: u64,

    /// Wait for the step driver to echo a command
    pub command_confirm_timeout_ms: u64,

    /// Wait for the digitizer to report a written calibration
    pub calibration_confirm_timeout_ms: u64,

    /// Moving average depth applied to forces
    pub filter_depth: usize,

    /// Readings averaged into the zero bias
    pub bias_samples: usize,

    /// Force drop below the peak, in newtons, that counts as detachment
    pub detach_threshold: f64,
}

impl Default for RigConfig {
    fn default() -> Self {
        Self {
            force_port: "/dev/ttyUSB0".to_string(),
            drive_port: "/dev/ttyUSB1".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            settle_ms: 1000,
            command_confirm_timeout_ms: 1000,
            calibration_confirm_timeout_ms: 10_000,
            filter_depth: 2,
            bias_samples: 50,
            detach_threshold: 1.0,
        }
    }
}

impl RigConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save as pretty-printed JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Timing for step driver commands
    pub fn command_timing(&self) -> ExchangeTiming {
        ExchangeTiming {
            settle: Duration::from_millis(self.settle_ms),
            confirm_timeout: Duration::from_millis(self.command_confirm_timeout_ms),
        }
    }

    /// Timing for digitizer calibration writes
    pub fn calibration_timing(&self) -> ExchangeTiming {
        ExchangeTiming {
            settle: Duration::from_millis(self.settle_ms),
            confirm_timeout: Duration::from_millis(self.calibration_confirm_timeout_ms),
        }
    }
}
