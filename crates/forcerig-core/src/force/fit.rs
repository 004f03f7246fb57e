//! Strain gauge calibration from known loads
//!
//! Each channel is calibrated separately: the operator applies known forces,
//! the averaged ADC value is recorded for every load, and a straight line
//! through the `(adc, force)` points becomes the channel's coefficients.

use std::time::Duration;
use tracing::debug;

use crate::device::Digitizer;
use crate::protocol::ProtocolError;

/// Fewer points than this cannot define a line
pub const MIN_FIT_POINTS: usize = 2;

/// Wait for each reading while collecting a calibration point
pub const CALIBRATION_SAMPLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Least-squares line through `(x, y)` points.
///
/// Returns `[slope, intercept]`, highest degree first like a calibration
/// column, or `None` with fewer than [`MIN_FIT_POINTS`] points, when all `x`
/// are equal, or when the inputs are not finite.
pub fn fit_line(points: &[(f64, f64)]) -> Option<[f64; 2]> {
    if points.len() < MIN_FIT_POINTS {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;

    let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), &(x, y)| {
        let dx = x - mean_x;
        (sxx + dx * dx, sxy + dx * (y - mean_y))
    });
    if !(sxx.is_finite() && sxy.is_finite()) || sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    Some([slope, mean_y - slope * mean_x])
}

/// Drop stale readings, then average `n_samples` ADC values of `channel`
pub async fn average_adc(
    digitizer: &mut Digitizer,
    channel: usize,
    n_samples: usize,
) -> Result<f64, ProtocolError> {
    digitizer.flush().await?;
    let mut sum = 0.0;
    for i in 0..n_samples {
        let reading = digitizer.fetch(CALIBRATION_SAMPLE_TIMEOUT).await?;
        sum += f64::from(reading.adc_readings[channel]);
        debug!(
            "Channel {} sample {}/{}: running mean {:.1}",
            channel,
            i + 1,
            n_samples,
            sum / (i + 1) as f64
        );
    }
    Ok(sum / n_samples.max(1) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "{} != {}", actual, expected);
    }

    #[test]
    fn test_exact_line() {
        let [slope, intercept] = fit_line(&[(0.0, -3.0), (100.0, 47.0), (300.0, 147.0)]).unwrap();
        assert_close(slope, 0.5);
        assert_close(intercept, -3.0);
    }

    #[test]
    fn test_least_squares_through_noise() {
        let points = [(0.0, 2.0), (1.0, 2.0), (2.0, 6.0), (3.0, 6.0)];
        let [slope, intercept] = fit_line(&points).unwrap();
        assert_close(slope, 1.6);
        assert_close(intercept, 1.6);
    }

    #[test]
    fn test_large_adc_values() {
        let points = [(261_069_056.0, 0.0), (261_169_056.0, 10.0), (261_269_056.0, 20.0)];
        let [slope, intercept] = fit_line(&points).unwrap();
        assert!((slope - 1e-4).abs() < 1e-12);
        assert!((slope * 261_069_056.0 + intercept).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(fit_line(&[]), None);
        assert_eq!(fit_line(&[(5.0, 1.0)]), None);
        assert_eq!(fit_line(&[(5.0, 1.0), (5.0, 2.0)]), None);
        assert_eq!(fit_line(&[(f64::NAN, 1.0), (5.0, 2.0)]), None);
    }
}
