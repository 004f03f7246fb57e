//! Byte channels the I/O worker can drive

use serialport::SerialPort;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

/// A serial byte stream owned by the I/O worker
pub trait SerialChannel: Send {
    /// Read every byte currently buffered, without waiting for more.
    /// Returns an empty vector when nothing is pending.
    fn read_available(&mut self) -> io::Result<Vec<u8>>;

    /// Write all bytes, blocking until the device has accepted them
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;
}

/// Serial port wrapper implementing SerialChannel
pub struct SerialPortChannel {
    port: Box<dyn SerialPort>,
}

impl SerialPortChannel {
    /// Take ownership of an opened port
    pub fn new(port: Box<dyn SerialPort>) -> Self {
        Self { port }
    }

    /// Name of the underlying port, if the driver knows it
    pub fn name(&self) -> Option<String> {
        self.port.name()
    }
}

impl SerialChannel for SerialPortChannel {
    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))? as usize;
        if pending == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; pending];
        let mut filled = 0;
        while filled < pending {
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    break
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        buf.truncate(filled);
        Ok(buf)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }
}

/// In-memory loopback: every byte written becomes readable.
///
/// Clones share the same buffer, so a clone kept outside the worker can
/// inject device output or observe what was written.
#[derive(Clone, Default)]
pub struct LoopbackChannel {
    buffer: Arc<Mutex<VecDeque<u8>>>,
}

impl LoopbackChannel {
    /// Empty loopback
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bytes as if the far end had sent them
    pub fn inject(&self, data: &[u8]) {
        self.lock().extend(data.iter().copied());
    }

    /// Number of bytes waiting to be read
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<u8>> {
        // A poisoned buffer is still a valid byte queue
        self.buffer.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SerialChannel for LoopbackChannel {
    fn read_available(&mut self) -> io::Result<Vec<u8>> {
        Ok(self.lock().drain(..).collect())
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.inject(data);
        Ok(())
    }
}
