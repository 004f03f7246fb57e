//! Serial Protocol Communication
//!
//! Implements the point-to-point packet protocol spoken by the strain gauge
//! digitizer and the stepper motor driver.
//!
//! Both devices share one envelope: a 4-byte magic, a 1-byte payload length,
//! three reserved bytes, the payload and a big-endian CRC-16/CCITT-FALSE of
//! the payload. Frames arrive on a continuous byte stream and are recovered
//! by scanning for the magic.

pub mod channel;
mod codec;
mod crc;
mod error;
mod packet;
pub mod serial;
mod transport;
mod worker;

pub use channel::{LoopbackChannel, SerialChannel, SerialPortChannel};
pub use codec::PacketCodec;
pub use crc::Crc16CcittFalse;
pub use error::ProtocolError;
pub use packet::{encode, Packet, PayloadBuilder};
pub use serial::{list_ports, open_port, PortInfo};
pub use transport::{FromPayload, Transport};
pub use worker::IoWorker;

use std::time::Duration;

/// Baud rate used by both the digitizer and the step driver
pub const DEFAULT_BAUD_RATE: u32 = 38400;

/// Largest payload a single frame can carry
pub const MAX_PAYLOAD_SIZE: usize = 255;

/// Frame magic as it appears on the wire (0xF2EC4CB4, little-endian)
pub const MAGIC: [u8; 4] = [0xB4, 0x4C, 0xEC, 0xF2];

/// Magic + payload length + 3 reserved bytes
pub const HEADER_SIZE: usize = 8;

/// CRC trailer size
pub const CRC_SIZE: usize = 2;

/// Pause between polls while waiting for a packet
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Wait after a write before the device output is trusted again
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(1);
