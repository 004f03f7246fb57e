//! Protocol errors

use thiserror::Error;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Timed out waiting for a packet")]
    Timeout,

    #[error("I/O worker has stopped")]
    WorkerStopped,

    #[error("Payload too large: {size} > {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("Payload layout mismatch: expected at least {expected} bytes, got {actual}")]
    LayoutMismatch { expected: usize, actual: usize },

    #[error("Invalid step value: {0}")]
    InvalidStep(i32),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
