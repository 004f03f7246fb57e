//! Stepper motor driver

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{Command, ExchangeTiming, Step};
use crate::protocol::{ProtocolError, Transport, DEFAULT_SETTLE};

/// Drives the arm through the step driver.
///
/// Every command is acknowledged by the driver echoing it back.
pub struct StepDrive {
    transport: Transport,
    timing: ExchangeTiming,
}

impl StepDrive {
    /// Direction that raises the arm
    pub const UP: Step = Step::Backward;
    /// Direction that lowers the arm
    pub const DOWN: Step = Step::Forward;

    /// Default request/confirm timing
    pub const DEFAULT_TIMING: ExchangeTiming = ExchangeTiming {
        settle: DEFAULT_SETTLE,
        confirm_timeout: Duration::from_secs(1),
    };

    /// Open the driver on a serial port
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

    /// Next command reported by the driver, or `None` once `deadline` passes
    pub async fn read(&mut self, deadline: Instant) -> Result<Option<Command>, ProtocolError> {
        self.transport.read_decoded(deadline).await
    }

    /// Drop driver output buffered so far
    pub async fn flush(&mut self) -> Result<(), ProtocolError> {
        self.transport.flush().await
    }

    /// Send one command; `true` if the driver echoed exactly this step
    pub async fn send_command(&mut self, step: Step) -> Result<bool, ProtocolError> {
        let command = Command::new(step);
        let timing = self.timing;
        let acknowledged = self
            .transport
            .request_confirm::<Command, _>(
                &command.to_payload(),
                timing.settle,
                timing.confirm_timeout,
                |reply| reply.step == command.step,
            )
            .await?;
        debug!("{}: {} acknowledged: {}", self.transport.name(), step, acknowledged);
        Ok(acknowledged)
    }

    /// Raise the arm, retrying until the driver acknowledges
    pub async fn up(&mut self) -> Result<(), ProtocolError> {
        self.drive(Self::UP, "pull arm up").await
    }

    /// Lower the arm, retrying until the driver acknowledges
    pub async fn down(&mut self) -> Result<(), ProtocolError> {
        self.drive(Self::DOWN, "pull arm down").await
    }

    /// Stop the arm, retrying until the driver acknowledges
    pub async fn stop(&mut self) -> Result<(), ProtocolError> {
        self.drive(Step::Stop, "stop arm").await
    }

    async fn drive(&mut self, step: Step, action: &str) -> Result<(), ProtocolError> {
        while !self.send_command(step).await? {
            info!("Sending command to {}", action);
        }
        Ok(())
    }

    /// Close the serial port
    pub async fn close(self) -> Result<(), ProtocolError> {
        self.transport.close().await
    }
}
