//! Step driver command payload

use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

use crate::protocol::{FromPayload, ProtocolError};

/// Motor direction code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Step {
    /// Moves the arm up
    Backward = -1,
    /// Holds the arm in place
    Stop = 0,
    /// Moves the arm down
    Forward = 1,
}

impl Step {
    /// Wire value
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Direction name as reported by the driver firmware
    pub fn name(self) -> &'static str {
        match self {
            Step::Backward => "BACKWARD",
            Step::Stop => "STOP",
            Step::Forward => "FORWARD",
        }
    }
}

impl TryFrom<i32> for Step {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, ProtocolError> {
        match value {
            -1 => Ok(Step::Backward),
            0 => Ok(Step::Stop),
            1 => Ok(Step::Forward),
            other => Err(ProtocolError::InvalidStep(other)),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A command sent to, or echoed back by, the step driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command {
    /// Raw direction code, kept as received
    pub step: i32,
}

impl Command {
    /// Payload size on the wire
    pub const PAYLOAD_SIZE: usize = 4;

    /// Command for `step`
    pub fn new(step: Step) -> Self {
        Self { step: step.code() }
    }

    /// Interpret the raw code
    pub fn direction(&self) -> Result<Step, ProtocolError> {
        Step::try_from(self.step)
    }

    /// Encode as a payload
    pub fn to_payload(&self) -> [u8; Self::PAYLOAD_SIZE] {
        let mut buf = [0u8; Self::PAYLOAD_SIZE];
        LittleEndian::write_i32(&mut buf, self.step);
        buf
    }
}

impl FromPayload for Command {
    fn from_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < Self::PAYLOAD_SIZE {
            return Err(ProtocolError::LayoutMismatch {
                expected: Self::PAYLOAD_SIZE,
                actual: payload.len(),
            });
        }
        Ok(Self {
            step: LittleEndian::read_i32(&payload[..Self::PAYLOAD_SIZE]),
        })
    }
}
