//! Strain gauge digitizer

use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::{Calibration, ExchangeTiming, Reading};
use crate::protocol::{ProtocolError, Transport, DEFAULT_SETTLE};

/// Reads strain gauge samples and programs the digitizer calibration
pub struct Digitizer {
    transport: Transport,
    timing: ExchangeTiming,
}

impl Digitizer {
    /// Absolute tolerance when confirming a calibration write
    pub const CALIBRATION_ATOL: f64 = 1e-3;
    /// Relative tolerance when confirming a calibration write
    pub const CALIBRATION_RTOL: f64 = 1e-3;

    /// Default request/confirm timing
    pub const DEFAULT_TIMING: ExchangeTiming = ExchangeTiming {
        settle: DEFAULT_SETTLE,
        confirm_timeout: Duration::from_secs(10),
    };

    /// Open the digitizer on a serial port
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self, ProtocolError> {
        Ok(Self::new(Transport::open(port_name, baud_rate)?))
    }

    /// Use an existing transport with the default timing
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            timing: Self::DEFAULT_TIMING,
        }
    }

    /// Override the request/confirm timing
    pub fn with_timing(mut self, timing: ExchangeTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Next reading, or `None` once `deadline` passes
    pub async fn read(&mut self, deadline: Instant) -> Result<Option<Reading>, ProtocolError> {
        self.transport.read_decoded(deadline).await
    }

    /// Next reading within `timeout`, failing with [`ProtocolError::Timeout`]
    pub async fn fetch(&mut self, timeout: Duration) -> Result<Reading, ProtocolError> {
        self.transport.fetch(timeout).await
    }

    /// Drop readings buffered so far
    pub async fn flush(&mut self) -> Result<(), ProtocolError> {
        self.transport.flush().await
    }

    /// Write a calibration matrix and check that the digitizer reports it back.
    ///
    /// Returns `false` when the next reading carries a different matrix or
    /// no reading arrives in time.
    pub async fn write_calibration(&mut self, cal: &Calibration) -> Result<bool, ProtocolError> {
        let timing = self.timing;
        let confirmed = self
            .transport
            .request_confirm::<Reading, _>(
                &cal.to_payload(),
                timing.settle,
                timing.confirm_timeout,
                |reading| {
                    reading
                        .calibration
                        .approx_eq(cal, Self::CALIBRATION_ATOL, Self::CALIBRATION_RTOL)
                },
            )
            .await?;
        if !confirmed {
            warn!("{}: calibration write not confirmed", self.transport.name());
        }
        Ok(confirmed)
    }

    /// Repeat [`Digitizer::write_calibration`] until it is confirmed
    pub async fn write_calibration_until_confirmed(
        &mut self,
        cal: &Calibration,
    ) -> Result<(), ProtocolError> {
        while !self.write_calibration(cal).await? {
            info!("Resending calibration");
        }
        Ok(())
    }

    /// Close the serial port
    pub async fn close(self) -> Result<(), ProtocolError> {
        self.transport.close().await
    }
}
