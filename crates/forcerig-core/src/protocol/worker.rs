//! Dedicated I/O worker
//!
//! One OS thread owns the serial channel and executes device operations one at
//! a time. Async callers hand requests over a queue and await the reply on a
//! oneshot, so the scheduler is never stalled on a blocking system call and
//! reads and writes never interleave on the wire.

use std::io;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tokio::sync::oneshot;
use tracing::{debug, trace};

use super::{ProtocolError, SerialChannel};

enum IoRequest {
    ReadAvailable(oneshot::Sender<io::Result<Vec<u8>>>),
    Write(Vec<u8>, oneshot::Sender<io::Result<()>>),
    Close(oneshot::Sender<()>),
}

/// Handle to the thread that owns a serial channel
pub struct IoWorker {
    requests: mpsc::Sender<IoRequest>,
    handle: Option<JoinHandle<()>>,
    name: String,
}

impl IoWorker {
    /// Move `channel` onto a new worker thread
    pub fn spawn(channel: Box<dyn SerialChannel>, name: &str) -> Result<Self, ProtocolError> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name(format!("io-{}", name))
            .spawn(move || run(channel, rx))?;

        Ok(Self {
            requests: tx,
            handle: Some(handle),
            name: name.to_string(),
        })
    }

    /// Endpoint name this worker serves
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fetch every byte the device has buffered so far
    pub async fn read_available(&self) -> Result<Vec<u8>, ProtocolError> {
        let (tx, rx) = oneshot::channel();
        self.submit(IoRequest::ReadAvailable(tx))?;
        let data = rx.await.map_err(|_| ProtocolError::WorkerStopped)??;
        Ok(data)
    }

    /// Write bytes to the device
    pub async fn write(&self, data: Vec<u8>) -> Result<(), ProtocolError> {
        let (tx, rx) = oneshot::channel();
        self.submit(IoRequest::Write(data, tx))?;
        rx.await.map_err(|_| ProtocolError::WorkerStopped)??;
        Ok(())
    }

    /// Close the channel and wait for the thread to exit
    pub async fn shutdown(mut self) -> Result<(), ProtocolError> {
        let (tx, rx) = oneshot::channel();
        self.submit(IoRequest::Close(tx))?;
        rx.await.map_err(|_| ProtocolError::WorkerStopped)?;

        if let Some(handle) = self.handle.take() {
            tokio::task::spawn_blocking(move || handle.join())
                .await
                .map_err(|_| ProtocolError::WorkerStopped)?
                .map_err(|_| ProtocolError::WorkerStopped)?;
        }
        debug!("{}: I/O worker stopped", self.name);
        Ok(())
    }

    fn submit(&self, request: IoRequest) -> Result<(), ProtocolError> {
        self.requests
            .send(request)
            .map_err(|_| ProtocolError::WorkerStopped)
    }
}

fn run(mut channel: Box<dyn SerialChannel>, requests: mpsc::Receiver<IoRequest>) {
    // Exits when every sender is gone or on an explicit close
    while let Ok(request) = requests.recv() {
        match request {
            IoRequest::ReadAvailable(reply) => {
                let result = channel.read_available();
                if let Ok(data) = &result {
                    if !data.is_empty() {
                        trace!("read {} bytes", data.len());
                    }
                }
                let _ = reply.send(result);
            }
            IoRequest::Write(data, reply) => {
                trace!("writing {} bytes", data.len());
                let _ = reply.send(channel.write_all(&data));
            }
            IoRequest::Close(reply) => {
                drop(channel);
                let _ = reply.send(());
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LoopbackChannel;

    #[tokio::test]
    async fn test_worker_round_trip() {
        let channel = LoopbackChannel::new();
        let worker = IoWorker::spawn(Box::new(channel.clone()), "loop").unwrap();

        worker.write(b"abc".to_vec()).await.unwrap();
        assert_eq!(worker.read_available().await.unwrap(), b"abc".to_vec());
        assert!(worker.read_available().await.unwrap().is_empty());

        worker.shutdown().await.unwrap();
    }

    #[test]
    fn test_worker_name() {
        let worker = IoWorker::spawn(Box::new(LoopbackChannel::new()), "digitizer").unwrap();
        assert_eq!(worker.name(), "digitizer");
    }
}
