//! Packet encoding/decoding
//!
//! Packet format (shared by the digitizer and the step driver):
//! - 4 bytes: Magic `B4 4C EC F2`
//! - 1 byte: Payload length
//! - 3 bytes: Reserved (zero on send, ignored on receive)
//! - N bytes: Payload
//! - 2 bytes: CRC-16/CCITT-FALSE of the payload only (big-endian)

use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, trace};

use super::{Crc16CcittFalse, ProtocolError, CRC_SIZE, HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE};

/// A protocol packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    payload: Vec<u8>,
}

impl Packet {
    /// Create a new packet with the given payload
    pub fn new(payload: Vec<u8>) -> Result<Self, ProtocolError> {
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }
        Ok(Self { payload })
    }

    /// Packet payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Encode the packet to raw bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.encoded_size());

        bytes.extend_from_slice(&MAGIC);
        // Length fits in a byte, enforced by `new`
        bytes.push(self.payload.len() as u8);
        bytes.extend_from_slice(&[0u8; 3]);
        bytes.extend_from_slice(&self.payload);
        bytes.extend_from_slice(&Crc16CcittFalse::of(&self.payload).to_be_bytes());

        bytes
    }

    /// Get the total encoded size
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.payload.len() + CRC_SIZE
    }

    /// Extract the next packet from a stream buffer.
    ///
    /// Returns the unconsumed remainder and the packet, if one was found.
    /// Leading garbage and frames with a bad CRC are skipped. When a packet is
    /// returned the caller should parse the remainder again, as more packets
    /// may already be buffered. A `None` packet means more data is needed; the
    /// remainder must be kept and extended with newly received bytes.
    pub fn parse(mut data: &[u8]) -> (&[u8], Option<Packet>) {
        while data.len() > HEADER_SIZE {
            let before = data.len();
            while data.len() >= MAGIC.len() && !data.starts_with(&MAGIC) {
                data = &data[1..];
            }
            if before != data.len() {
                trace!("Skipped {} bytes looking for packet magic", before - data.len());
            }
            if data.len() < HEADER_SIZE {
                return (data, None);
            }

            let payload_size = usize::from(data[MAGIC.len()]);
            if data.len() < HEADER_SIZE + payload_size + CRC_SIZE {
                return (data, None);
            }

            // Header is no longer needed, the scan resumes after it on a bad CRC
            data = &data[HEADER_SIZE..];
            if !Crc16CcittFalse::of(&data[..payload_size + CRC_SIZE]).check_residue() {
                trace!("Dropped {}-byte frame with bad CRC", payload_size);
                continue;
            }

            let (payload, rest) = data.split_at(payload_size);
            let packet = Packet {
                payload: payload.to_vec(),
            };
            let rest = &rest[CRC_SIZE..];
            debug!("Parsed {}-byte packet, remainder {} bytes", payload_size, rest.len());
            return (rest, Some(packet));
        }
        (data, None)
    }
}

/// Encode a payload into a complete frame
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    Ok(Packet::new(payload.to_vec())?.to_bytes())
}

/// Builder for fixed-layout little-endian payloads
pub struct PayloadBuilder {
    payload: Vec<u8>,
}

impl PayloadBuilder {
    /// Create a new payload builder
    pub fn new() -> Self {
        Self {
            payload: Vec::new(),
        }
    }

    /// Add a 32-bit signed value (little-endian)
    pub fn i32_le(mut self, value: i32) -> Self {
        let mut bytes = [0u8; 4];
        LittleEndian::write_i32(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Add a single-precision float (little-endian)
    pub fn f32_le(mut self, value: f32) -> Self {
        let mut bytes = [0u8; 4];
        LittleEndian::write_f32(&mut bytes, value);
        self.payload.extend_from_slice(&bytes);
        self
    }

    /// Add raw bytes
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.payload.extend_from_slice(data);
        self
    }

    /// Build the packet
    pub fn build(self) -> Result<Packet, ProtocolError> {
        Packet::new(self.payload)
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const EMPTY_FRAME: [u8; 10] = [0xB4, 0x4C, 0xEC, 0xF2, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF];

    fn digits_frame() -> Vec<u8> {
        let mut frame = vec![0xB4, 0x4C, 0xEC, 0xF2, 0x09, 0x00, 0x00, 0x00];
        frame.extend_from_slice(b"123456789");
        frame.extend_from_slice(&[0x29, 0xB1]);
        frame
    }

    #[test]
    fn test_encode_known_frames() {
        assert_eq!(encode(b"").unwrap(), EMPTY_FRAME.to_vec());
        assert_eq!(encode(b"123456789").unwrap(), digits_frame());
    }

    #[test]
    fn test_parse_empty_input() {
        let (rest, packet) = Packet::parse(b"");
        assert!(rest.is_empty());
        assert!(packet.is_none());
    }

    #[test]
    fn test_parse_empty_payload() {
        let (rest, packet) = Packet::parse(&EMPTY_FRAME);
        assert!(rest.is_empty());
        assert_eq!(packet.unwrap().payload(), b"");
    }

    #[test]
    fn test_parse_keeps_trailing_bytes() {
        let mut data = digits_frame();
        data.extend_from_slice(b"123");

        let (rest, packet) = Packet::parse(&data);
        assert_eq!(rest, b"123");
        assert_eq!(packet.unwrap().payload(), b"123456789");
    }

    #[test]
    fn test_parse_skips_truncated_frame_prefix() {
        let mut data = EMPTY_FRAME[..3].to_vec();
        data.extend_from_slice(&EMPTY_FRAME);
        data.extend_from_slice(b"123");

        let (rest, packet) = Packet::parse(&data);
        assert_eq!(rest, b"123");
        assert_eq!(packet.unwrap().payload(), b"");

        let mut data = digits_frame()[..10].to_vec();
        data.extend_from_slice(&digits_frame());
        data.extend_from_slice(b"123");

        let (rest, packet) = Packet::parse(&data);
        assert_eq!(rest, b"123");
        assert_eq!(packet.unwrap().payload(), b"123456789");
    }

    #[test]
    fn test_parse_waits_for_complete_frame() {
        let frame = digits_frame();
        for split in 0..frame.len() {
            let (rest, packet) = Packet::parse(&frame[..split]);
            assert!(packet.is_none(), "split at {}", split);

            let mut backlog = rest.to_vec();
            backlog.extend_from_slice(&frame[split..]);
            let (rest, packet) = Packet::parse(&backlog);
            assert!(rest.is_empty(), "split at {}", split);
            assert_eq!(packet.unwrap().payload(), b"123456789");
        }
    }

    #[test]
    fn test_parse_discards_garbage_without_magic() {
        let garbage = [0x55u8; 32];
        let (rest, packet) = Packet::parse(&garbage);
        assert!(packet.is_none());
        assert!(rest.len() < HEADER_SIZE);
    }

    #[test]
    fn test_parse_skips_corrupted_frame() {
        let frame = digits_frame();
        for i in HEADER_SIZE..frame.len() {
            let mut data = frame.clone();
            data[i] ^= 0x40;
            data.extend_from_slice(&EMPTY_FRAME);

            let (rest, packet) = Packet::parse(&data);
            assert!(rest.is_empty(), "corrupted byte {}", i);
            assert_eq!(packet.unwrap().payload(), b"", "corrupted byte {}", i);
        }
    }

    #[test]
    fn test_payload_size_limits() {
        let max = vec![0xA5u8; MAX_PAYLOAD_SIZE];
        let encoded = encode(&max).unwrap();
        assert_eq!(encoded.len(), HEADER_SIZE + MAX_PAYLOAD_SIZE + CRC_SIZE);
        let (rest, packet) = Packet::parse(&encoded);
        assert!(rest.is_empty());
        assert_eq!(packet.unwrap().payload(), &max[..]);

        let too_large = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            encode(&too_large),
            Err(ProtocolError::PayloadTooLarge { size: 256, max: 255 })
        ));
    }

    #[test]
    fn test_payload_builder() {
        let packet = PayloadBuilder::new()
            .i32_le(-1)
            .f32_le(1.0)
            .bytes(&[7])
            .build()
            .unwrap();

        assert_eq!(
            packet.payload(),
            &[0xFF, 0xFF, 0xFF, 0xFF, 0x00, 0x00, 0x80, 0x3F, 0x07]
        );
    }
}
