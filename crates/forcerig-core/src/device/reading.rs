//! Digitizer reading payload
//!
//! Layout (little-endian, 80 bytes as sent by the firmware):
//! - 0..8: sequence number (u64)
//! - 8..24: reserved
//! - 24..40: raw ADC samples (4 x i32)
//! - 40..72: calibration coefficients (2 rows x 4 channels x f32, row-major)
//! - 72..80: reserved

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use crate::protocol::{FromPayload, ProtocolError};

/// Strain gauge channels on the digitizer
pub const CHANNEL_COUNT: usize = 4;

/// Payload size as observed on the wire
pub const READING_PAYLOAD_SIZE: usize = 80;

/// Bytes actually covered by decoded fields
pub const READING_MIN_SIZE: usize = CAL_OFFSET + Calibration::PAYLOAD_SIZE;

const SEQ_OFFSET: usize = 0;
const ADC_OFFSET: usize = 24;
const CAL_OFFSET: usize = 40;
const CAL_ROWS: usize = 2;

/// Per-channel calibration polynomial coefficients.
///
/// Row 0 holds the highest-degree coefficient, so with two rows
/// `force = row0 * adc + row1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration(pub [[f64; CHANNEL_COUNT]; CAL_ROWS]);

impl Calibration {
    /// Bytes taken by the matrix on the wire
    pub const PAYLOAD_SIZE: usize = CAL_ROWS * CHANNEL_COUNT * 4;

    /// Coefficients for one channel, highest degree first
    pub fn channel(&self, channel: usize) -> [f64; CAL_ROWS] {
        [self.0[0][channel], self.0[1][channel]]
    }

    /// Replace one channel's coefficients, highest degree first
    pub fn set_channel(&mut self, channel: usize, coefficients: [f64; CAL_ROWS]) {
        for (row, c) in self.0.iter_mut().zip(coefficients) {
            row[channel] = c;
        }
    }

    /// Zero every channel that has a NaN coefficient; returns those channels
    pub fn zero_invalid_channels(&mut self) -> Vec<usize> {
        let invalid: Vec<usize> = (0..CHANNEL_COUNT)
            .filter(|&ch| self.channel(ch).iter().any(|c| c.is_nan()))
            .collect();
        for &ch in &invalid {
            self.set_channel(ch, [0.0; CAL_ROWS]);
        }
        invalid
    }

    /// Serialize as single-precision floats, row-major
    pub fn to_payload(&self) -> Vec<u8> {
        let mut values = [0f32; CAL_ROWS * CHANNEL_COUNT];
        for (v, &c) in values.iter_mut().zip(self.0.iter().flatten()) {
            *v = c as f32;
        }
        let mut buf = [0u8; Self::PAYLOAD_SIZE];
        LittleEndian::write_f32_into(&values, &mut buf);
        buf.to_vec()
    }

    /// Element-wise `|a - b| <= atol + rtol * |b|` against `expected`,
    /// with NaN matching NaN
    pub fn approx_eq(&self, expected: &Calibration, atol: f64, rtol: f64) -> bool {
        self.0
            .iter()
            .flatten()
            .zip(expected.0.iter().flatten())
            .all(|(&a, &b)| close(a, b, atol, rtol))
    }
}

fn close(a: f64, b: f64, atol: f64, rtol: f64) -> bool {
    if a.is_nan() || b.is_nan() {
        return a.is_nan() && b.is_nan();
    }
    if a.is_infinite() || b.is_infinite() {
        return a == b;
    }
    (a - b).abs() <= atol + rtol * b.abs()
}

/// A single reading reported by the digitizer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Increments with every reading sent
    pub seq_num: u64,
    /// Raw ADC sample per channel
    pub adc_readings: [i32; CHANNEL_COUNT],
    /// Calibration currently applied by the firmware
    pub calibration: Calibration,
}

impl FromPayload for Reading {
    fn from_payload(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < READING_MIN_SIZE {
            return Err(ProtocolError::LayoutMismatch {
                expected: READING_MIN_SIZE,
                actual: payload.len(),
            });
        }

        let seq_num = LittleEndian::read_u64(&payload[SEQ_OFFSET..SEQ_OFFSET + 8]);

        let mut adc_readings = [0i32; CHANNEL_COUNT];
        LittleEndian::read_i32_into(
            &payload[ADC_OFFSET..ADC_OFFSET + CHANNEL_COUNT * 4],
            &mut adc_readings,
        );

        let mut calibration = [[0f64; CHANNEL_COUNT]; CAL_ROWS];
        for (row, coefficients) in calibration.iter_mut().enumerate() {
            let start = CAL_OFFSET + row * CHANNEL_COUNT * 4;
            for (ch, c) in coefficients.iter_mut().enumerate() {
                let offset = start + ch * 4;
                *c = f64::from(LittleEndian::read_f32(&payload[offset..offset + 4]));
            }
        }

        Ok(Self {
            seq_num,
            adc_readings,
            calibration: Calibration(calibration),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn test_decode_firmware_payload() {
        let payload = hex(concat!(
            "020000000000000000000000000000000000000000000000",
            "00998F0F00BC64040000000000000000",
            "FFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFF",
        ));
        assert_eq!(payload.len(), READING_PAYLOAD_SIZE);

        let reading = Reading::from_payload(&payload).unwrap();
        assert_eq!(reading.seq_num, 2);
        assert_eq!(reading.adc_readings, [261069056, 73710592, 0, 0]);
        assert!(reading.calibration.0.iter().flatten().all(|c| c.is_nan()));
    }

    #[test]
    fn test_decode_calibration_rows() {
        let cal = Calibration([[1.0, 2.0, 3.0, 4.0], [0.5, -0.25, 0.0, 10.0]]);
        let mut payload = vec![0u8; ADC_OFFSET];
        payload[0] = 7;
        payload.extend_from_slice(&[0u8; CHANNEL_COUNT * 4]);
        payload.extend_from_slice(&cal.to_payload());

        let reading = Reading::from_payload(&payload).unwrap();
        assert_eq!(reading.seq_num, 7);
        assert_eq!(reading.calibration, cal);
        assert_eq!(reading.calibration.channel(1), [2.0, -0.25]);
    }

    #[test]
    fn test_decode_short_payload() {
        let result = Reading::from_payload(&[0u8; 40]);
        assert!(matches!(
            result,
            Err(ProtocolError::LayoutMismatch { expected: 72, actual: 40 })
        ));
    }

    #[test]
    fn test_calibration_payload_is_row_major_f32() {
        let cal = Calibration([[1.0, 0.0, 0.0, 0.0], [0.0, 0.0, 0.0, -2.0]]);
        let payload = cal.to_payload();
        assert_eq!(payload.len(), Calibration::PAYLOAD_SIZE);
        assert_eq!(&payload[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&payload[28..32], &(-2.0f32).to_le_bytes());
    }

    #[test]
    fn test_calibration_payload_is_always_full_size() {
        // Out of f32 range and NaN still take four bytes each
        let cal = Calibration([[1e300, f64::NAN, -1e300, 0.0], [f64::INFINITY, 0.0, 0.0, 0.0]]);
        let payload = cal.to_payload();
        assert_eq!(payload.len(), Calibration::PAYLOAD_SIZE);
        assert_eq!(&payload[0..4], &f32::INFINITY.to_le_bytes());
        assert!(f32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]).is_nan());
        assert_eq!(&payload[8..12], &f32::NEG_INFINITY.to_le_bytes());
    }

    #[test]
    fn test_set_channel_and_zero_invalid() {
        let mut cal = Calibration([[f64::NAN; 4], [f64::NAN; 4]]);
        cal.set_channel(2, [0.5, -1.0]);
        assert_eq!(cal.channel(2), [0.5, -1.0]);

        assert_eq!(cal.zero_invalid_channels(), vec![0, 1, 3]);
        assert_eq!(cal, Calibration([[0.0, 0.0, 0.5, 0.0], [0.0, 0.0, -1.0, 0.0]]));
        assert!(cal.zero_invalid_channels().is_empty());
    }

    #[test]
    fn test_approx_eq_tolerance() {
        let sent = Calibration([[1000.0, 1.0, 0.0, f64::NAN], [0.5, -3.0, 2.0, 1.0]]);

        let within = Calibration([[1000.9, 1.0015, 0.0009, f64::NAN], [0.5, -3.0, 2.0, 1.0]]);
        assert!(within.approx_eq(&sent, 1e-3, 1e-3));

        let outside = Calibration([[1000.0, 1.003, 0.0, f64::NAN], [0.5, -3.0, 2.0, 1.0]]);
        assert!(!outside.approx_eq(&sent, 1e-3, 1e-3));

        let nan_mismatch = Calibration([[1000.0, 1.0, 0.0, 0.0], [0.5, -3.0, 2.0, 1.0]]);
        assert!(!nan_mismatch.approx_eq(&sent, 1e-3, 1e-3));
    }

    #[test]
    fn test_approx_eq_infinities() {
        let inf = Calibration([[f64::INFINITY; 4], [f64::NEG_INFINITY; 4]]);
        assert!(inf.approx_eq(&inf, 1e-3, 1e-3));

        let flipped = Calibration([[f64::NEG_INFINITY; 4], [f64::NEG_INFINITY; 4]]);
        assert!(!flipped.approx_eq(&inf, 1e-3, 1e-3));
    }
}
