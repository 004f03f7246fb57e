//! Shared helpers for the integration tests

#![allow(dead_code)]

use forcerig_core::device::{Calibration, Command, Step, CHANNEL_COUNT, READING_PAYLOAD_SIZE};
use forcerig_core::protocol::{encode, Packet, SerialChannel, Transport};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

#[derive(Default)]
struct Script {
    reads: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    responder: Option<Responder>,
}

/// Serial channel that hands out one scripted chunk per read.
///
/// A responder can queue more chunks whenever something is written, standing
/// in for device firmware.
#[derive(Clone, Default)]
pub struct ScriptedChannel {
    script: Arc<Mutex<Script>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_read(&self, chunk: Vec<u8>) {
        self.script.lock().unwrap().reads.push_back(chunk);
    }

    pub fn respond_with<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    {
        self.script.lock().unwrap().responder = Some(Box::new(responder));
    }

    /// Payloads of every frame written so far
    pub fn written_payloads(&self) -> Vec<Vec<u8>> {
        self.script
            .lock()
            .unwrap()
            .writes
            .iter()
            .filter_map(|w| Packet::parse(w).1.map(Packet::into_payload))
            .collect()
    }

    pub fn transport(&self) -> Transport {
        Transport::new(Box::new(self.clone()), "scripted").unwrap()
    }
}

impl SerialChannel for ScriptedChannel {
    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        Ok(self
            .script
            .lock()
            .unwrap()
            .reads
            .pop_front()
            .unwrap_or_default())
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut script = self.script.lock().unwrap();
        script.writes.push(data.to_vec());
        if let Some(responder) = script.responder.as_mut() {
            let chunks = responder(data);
            script.reads.extend(chunks);
        }
        Ok(())
    }
}

/// Digitizer payload in the firmware layout
pub fn reading_payload(seq_num: u64, adc: [i32; CHANNEL_COUNT], cal: &Calibration) -> Vec<u8> {
    let mut payload = Vec::with_capacity(READING_PAYLOAD_SIZE);
    payload.extend_from_slice(&seq_num.to_le_bytes());
    payload.extend_from_slice(&[0u8; 16]);
    for sample in adc {
        payload.extend_from_slice(&sample.to_le_bytes());
    }
    payload.extend_from_slice(&cal.to_payload());
    payload.resize(READING_PAYLOAD_SIZE, 0);
    payload
}

pub fn reading_frame(seq_num: u64, adc: [i32; CHANNEL_COUNT], cal: &Calibration) -> Vec<u8> {
    encode(&reading_payload(seq_num, adc, cal)).unwrap()
}

pub fn command_frame(step: Step) -> Vec<u8> {
    encode(&Command::new(step).to_payload()).unwrap()
}

/// Calibration decoded from a written calibration payload
pub fn calibration_from_payload(payload: &[u8]) -> Calibration {
    let mut rows = [[0f64; CHANNEL_COUNT]; 2];
    for (i, chunk) in payload.chunks_exact(4).take(2 * CHANNEL_COUNT).enumerate() {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        rows[i / CHANNEL_COUNT][i % CHANNEL_COUNT] = f64::from(value);
    }
    Calibration(rows)
}

pub fn hex(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

/// Route library logs to the test harness output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .try_init();
}
