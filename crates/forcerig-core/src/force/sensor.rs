//! Force sensor session on top of the digitizer

use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::{compute_forces, ChannelForces, Channels, MovingAverage, Sample};
use crate::device::{Digitizer, CHANNEL_COUNT};
use crate::protocol::ProtocolError;

/// Errors from force measurement
#[derive(Error, Debug)]
pub enum ForceError {
    /// A force was requested before the zero bias was set
    #[error("Zero bias calibration has not been done")]
    NotCalibrated,

    /// Digitizer communication failed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// One filtered, bias-corrected measurement
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ForceSample {
    /// Digitizer sequence number
    pub seq_num: u64,
    /// Per-channel forces
    pub forces: ChannelForces,
    /// Sum over all channels
    pub total: f64,
}

/// Measures force through a digitizer after zero-bias calibration
pub struct ForceSensor {
    digitizer: Digitizer,
    filter_depth: usize,
    filter: Option<MovingAverage<Channels<CHANNEL_COUNT>>>,
    zero_bias: Option<ChannelForces>,
    peak: f64,
}

impl ForceSensor {
    /// Wait for the first reading of a calibration run
    pub const FIRST_READING_TIMEOUT: Duration = Duration::from_secs(5);
    /// Wait for each subsequent reading
    pub const SAMPLE_TIMEOUT: Duration = Duration::from_secs(1);

    /// Wrap a digitizer; forces are averaged over `filter_depth` readings
    pub fn new(digitizer: Digitizer, filter_depth: usize) -> Self {
        Self {
            digitizer,
            filter_depth,
            filter: None,
            zero_bias: None,
            peak: 0.0,
        }
    }

    /// Average `n_samples` unloaded readings into the zero bias and reset
    /// the low-pass filter
    pub async fn calibrate_bias(&mut self, n_samples: usize) -> Result<ChannelForces, ForceError> {
        let first = self.seed_filter().await?;

        info!("Zero bias calibration over {} samples", n_samples);
        let bias = if n_samples == 0 {
            first
        } else {
            let mut sum = Channels([0.0; CHANNEL_COUNT]);
            for i in 0..n_samples {
                let reading = self.digitizer.fetch(Self::SAMPLE_TIMEOUT).await?;
                sum = sum + Channels(compute_forces(&reading));
                debug!("Bias sample {}/{}", i + 1, n_samples);
            }
            sum.scale(1.0 / n_samples as f64).0
        };

        self.zero_bias = Some(bias);
        Ok(bias)
    }

    /// Start measuring without a tare: the bias is zero and the filter is
    /// seeded from the next reading
    pub async fn skip_bias(&mut self) -> Result<(), ForceError> {
        self.seed_filter().await?;
        self.zero_bias = Some([0.0; CHANNEL_COUNT]);
        Ok(())
    }

    async fn seed_filter(&mut self) -> Result<ChannelForces, ForceError> {
        let first = compute_forces(&self.digitizer.fetch(Self::FIRST_READING_TIMEOUT).await?);
        self.filter = Some(MovingAverage::new(self.filter_depth, Channels(first)));
        Ok(first)
    }

    /// Zero bias, once calibrated
    pub fn zero_bias(&self) -> Option<ChannelForces> {
        self.zero_bias
    }

    /// Read, filter and bias-correct the next reading
    pub async fn read_sample(&mut self, timeout: Duration) -> Result<ForceSample, ForceError> {
        let bias = self.zero_bias.ok_or(ForceError::NotCalibrated)?;
        let reading = self.digitizer.fetch(timeout).await?;
        let filter = self.filter.as_mut().ok_or(ForceError::NotCalibrated)?;

        let forces = filter
            .update(Channels(compute_forces(&reading)) - Channels(bias))
            .0;
        let total = forces.iter().sum::<f64>();
        if total.abs() > self.peak.abs() {
            self.peak = total;
        }

        Ok(ForceSample {
            seq_num: reading.seq_num,
            forces,
            total,
        })
    }

    /// Total force on all channels
    pub async fn read_instant_force(&mut self, timeout: Duration) -> Result<f64, ForceError> {
        Ok(self.read_sample(timeout).await?.total)
    }

    /// Largest absolute total force seen since the last reset
    pub fn peak_force(&self) -> f64 {
        self.peak
    }

    /// Forget the peak force
    pub fn reset_peak(&mut self) {
        self.peak = 0.0;
    }

    /// Underlying digitizer
    pub fn digitizer_mut(&mut self) -> &mut Digitizer {
        &mut self.digitizer
    }

    /// Close the digitizer port
    pub async fn close(self) -> Result<(), ProtocolError> {
        self.digitizer.close().await
    }
}
