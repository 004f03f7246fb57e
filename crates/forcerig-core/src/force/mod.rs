//! Force computation
//!
//! Turns digitizer readings into forces: calibration polynomials, low-pass
//! filtering, zero-bias removal, peak tracking and detachment detection,
//! plus fitting new calibration coefficients from known loads.

mod detach;
mod filter;
mod fit;
mod sensor;

pub use detach::{PullMonitor, PullState};
pub use filter::{Channels, MovingAverage, Sample};
pub use fit::{average_adc, fit_line, CALIBRATION_SAMPLE_TIMEOUT, MIN_FIT_POINTS};
pub use sensor::{ForceError, ForceSample, ForceSensor};

use crate::device::{Reading, CHANNEL_COUNT};

/// Per-channel forces in newtons
pub type ChannelForces = [f64; CHANNEL_COUNT];

/// Evaluate each channel's calibration polynomial at its ADC sample
pub fn compute_forces(reading: &Reading) -> ChannelForces {
    let mut forces = [0f64; CHANNEL_COUNT];
    for (ch, force) in forces.iter_mut().enumerate() {
        let x = f64::from(reading.adc_readings[ch]);
        // Horner, highest degree first
        *force = reading
            .calibration
            .channel(ch)
            .iter()
            .fold(0.0, |acc, &c| acc * x + c);
    }
    forces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::Calibration;

    #[test]
    fn test_compute_forces_linear() {
        let reading = Reading {
            seq_num: 1,
            adc_readings: [100, -200, 0, 1024],
            calibration: Calibration([[0.5, 0.25, 2.0, 0.0009765625], [1.0, 0.0, -3.0, 0.5]]),
        };
        assert_eq!(compute_forces(&reading), [51.0, -50.0, -3.0, 1.5]);
    }
}
