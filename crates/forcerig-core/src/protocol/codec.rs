//! Stream framing over an owned backlog buffer

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{Packet, ProtocolError};

/// Frames packets out of a continuously growing byte buffer.
///
/// Decoding never fails: garbage and corrupted frames are consumed silently
/// and `Ok(None)` means more bytes are needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketCodec;

impl PacketCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, ProtocolError> {
        let (consumed, packet) = {
            let (rest, packet) = Packet::parse(&src[..]);
            (src.len() - rest.len(), packet)
        };
        src.advance(consumed);
        Ok(packet)
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Packet, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        dst.extend_from_slice(&item.to_bytes());
        Ok(())
    }
}

impl<'a> Encoder<&'a [u8]> for PacketCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: &'a [u8], dst: &mut BytesMut) -> Result<(), ProtocolError> {
        Encoder::<Packet>::encode(self, Packet::new(item.to_vec())?, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode;

    #[test]
    fn test_decode_consecutive_packets() {
        let mut backlog = BytesMut::new();
        backlog.extend_from_slice(&encode(b"first").unwrap());
        backlog.extend_from_slice(b"noise");
        backlog.extend_from_slice(&encode(b"second").unwrap());

        let mut codec = PacketCodec::new();
        let first = codec.decode(&mut backlog).unwrap().unwrap();
        assert_eq!(first.payload(), b"first");
        let second = codec.decode(&mut backlog).unwrap().unwrap();
        assert_eq!(second.payload(), b"second");
        assert!(codec.decode(&mut backlog).unwrap().is_none());
        assert!(backlog.is_empty());
    }

    #[test]
    fn test_decode_keeps_partial_frame() {
        let frame = encode(b"partial").unwrap();
        let mut backlog = BytesMut::from(&frame[..6]);

        let mut codec = PacketCodec::new();
        assert!(codec.decode(&mut backlog).unwrap().is_none());
        assert_eq!(backlog.len(), 6);

        backlog.extend_from_slice(&frame[6..]);
        let packet = codec.decode(&mut backlog).unwrap().unwrap();
        assert_eq!(packet.payload(), b"partial");
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        let mut dst = BytesMut::new();
        let payload = [0u8; 300];
        let mut codec = PacketCodec::new();
        let result = Encoder::<&[u8]>::encode(&mut codec, &payload[..], &mut dst);
        assert!(matches!(result, Err(ProtocolError::PayloadTooLarge { .. })));
        assert!(dst.is_empty());
    }
}
