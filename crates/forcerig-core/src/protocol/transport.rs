//! Transport management
//!
//! Owns one serial endpoint: its I/O worker and the backlog of received bytes
//! that have not been framed into packets yet.

use bytes::BytesMut;
use std::time::Duration;
use tokio::time::{self, Instant};
use tokio_util::codec::Decoder;
use tracing::{debug, trace};

use super::{
    encode, open_port, IoWorker, Packet, PacketCodec, ProtocolError, SerialChannel,
    SerialPortChannel, POLL_INTERVAL,
};

/// A value with a fixed payload layout
pub trait FromPayload: Sized {
    /// Decode from a checksum-validated payload
    fn from_payload(payload: &[u8]) -> Result<Self, ProtocolError>;
}

/// Packet transport over one serial endpoint.
///
/// Operations take `&mut self`, so only one read or write is ever in flight.
/// [`Transport::close`] consumes the transport.
pub struct Transport {
    worker: IoWorker,
    backlog: BytesMut,
    codec: PacketCodec,
}

impl Transport {
    /// Open a serial port and start its I/O worker
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, ProtocolError> {
        let port = open_port(port_name, Some(baud_rate))?;
        Self::new(Box::new(SerialPortChannel::new(port)), port_name)
    }

    /// Wrap an already opened channel
    pub fn new(channel: Box<dyn SerialChannel>, name: &str) -> Result<Self, ProtocolError> {
        Ok(Self {
            worker: IoWorker::spawn(channel, name)?,
            backlog: BytesMut::new(),
            codec: PacketCodec::new(),
        })
    }

    /// Endpoint name
    pub fn name(&self) -> &str {
        self.worker.name()
    }

    /// Bytes received but not yet framed
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Pull whatever the device has sent and frame at most one packet
    pub async fn poll_once(&mut self) -> Result<Option<Packet>, ProtocolError> {
        let data = self.worker.read_available().await?;
        self.backlog.extend_from_slice(&data);
        let packet = self.codec.decode(&mut self.backlog)?;
        trace!(
            "{}: polled {} bytes, packet: {}, backlog {} bytes",
            self.name(),
            data.len(),
            packet.is_some(),
            self.backlog.len()
        );
        Ok(packet)
    }

    /// Wait for the next packet until `deadline`.
    ///
    /// `Ok(None)` means the deadline passed without a packet. A deadline that
    /// is already in the past still polls the device once.
    pub async fn read(&mut self, deadline: Instant) -> Result<Option<Packet>, ProtocolError> {
        loop {
            if let Some(packet) = self.poll_once().await? {
                return Ok(Some(packet));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait for the next packet and decode it as `T`
    pub async fn read_decoded<T: FromPayload>(
        &mut self,
        deadline: Instant,
    ) -> Result<Option<T>, ProtocolError> {
        match self.read(deadline).await? {
            Some(packet) => Ok(Some(T::from_payload(packet.payload())?)),
            None => Ok(None),
        }
    }

    /// Like [`Transport::read_decoded`] with a relative timeout, treating
    /// expiry as [`ProtocolError::Timeout`]
    pub async fn fetch<T: FromPayload>(&mut self, timeout: Duration) -> Result<T, ProtocolError> {
        self.read_decoded(Instant::now() + timeout)
            .await?
            .ok_or(ProtocolError::Timeout)
    }

    /// Drop everything received so far, including complete packets
    pub async fn flush(&mut self) -> Result<(), ProtocolError> {
        self.poll_once().await?;
        if !self.backlog.is_empty() {
            debug!("{}: flushed {} backlog bytes", self.name(), self.backlog.len());
        }
        self.backlog.clear();
        Ok(())
    }

    /// Frame `payload` and write it to the device
    pub async fn send(&mut self, payload: &[u8]) -> Result<(), ProtocolError> {
        let frame = encode(payload)?;
        debug!("{}: sending {}-byte payload", self.name(), payload.len());
        self.worker.write(frame).await
    }

    /// Single-shot request/confirm exchange.
    ///
    /// Writes `payload`, waits `settle`, discards stale input, then reads the
    /// next value reported by the device and passes it to `accept`. A missing
    /// reply within `confirm_timeout` counts as not confirmed. Retrying is up
    /// to the caller.
    pub async fn request_confirm<T, F>(
        &mut self,
        payload: &[u8],
        settle: Duration,
        confirm_timeout: Duration,
        accept: F,
    ) -> Result<bool, ProtocolError>
    where
        T: FromPayload,
        F: FnOnce(&T) -> bool,
    {
        self.send(payload).await?;
        time::sleep(settle).await;
        self.flush().await?;
        let reply = self
            .read_decoded::<T>(Instant::now() + confirm_timeout)
            .await?;
        match reply {
            Some(value) => Ok(accept(&value)),
            None => {
                debug!("{}: no reply within {:?}", self.name(), confirm_timeout);
                Ok(false)
            }
        }
    }

    /// Close the serial endpoint
    pub async fn close(self) -> Result<(), ProtocolError> {
        self.worker.shutdown().await
    }
}
