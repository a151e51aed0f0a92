//! # Transport Module
//!
//! This module provides the abstraction over the link to the arm. The physical link (a serial
//! line in the real system) only has to be able to report whether it is connected and to write
//! bytes. Bytes coming back from the arm are delivered over a channel and pushed into a
//! [`ByteSink`] by a reader thread.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace};
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use thiserror::Error;

pub use sim::SimArmLink;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A writable link to the arm.
pub trait Transport: Send {
    /// Whether the link is currently usable.
    fn is_connected(&self) -> bool;

    /// Write the given bytes to the arm.
    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Close the link. Further writes must fail with [`TransportError::Disconnected`].
    fn close(&mut self) {}
}

/// Something which consumes bytes received from the arm.
pub trait ByteSink: Send + Sync {
    fn on_bytes(&self, bytes: &[u8]);
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("The transport is disconnected")]
    Disconnected,

    #[error("Transport IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Spawn a thread which forwards every chunk received on `rx` to `sink`.
///
/// The thread exits once all senders of the channel have been dropped.
pub fn spawn_reader<S>(rx: Receiver<Vec<u8>>, sink: S) -> std::io::Result<JoinHandle<()>>
where
    S: ByteSink + 'static,
{
    thread::Builder::new()
        .name("arm_reader".into())
        .spawn(move || {
            debug!("Arm reader started");

            while let Ok(chunk) = rx.recv() {
                trace!("Received {} bytes from the arm", chunk.len());
                sink.on_bytes(&chunk);
            }

            debug!("Arm link closed, reader stopping");
        })
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::{mpsc, Arc, Mutex};

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<u8>>>);

    impl ByteSink for Collect {
        fn on_bytes(&self, bytes: &[u8]) {
            self.0.lock().unwrap().extend_from_slice(bytes);
        }
    }

    #[test]
    fn test_reader_forwards_until_closed() {
        let (tx, rx) = mpsc::channel();
        let sink = Collect::default();

        let handle = spawn_reader(rx, sink.clone()).unwrap();

        tx.send(b"\nACK ".to_vec()).unwrap();
        tx.send(b"[1]".to_vec()).unwrap();
        drop(tx);

        handle.join().unwrap();
        assert_eq!(&*sink.0.lock().unwrap(), b"\nACK [1]");
    }
}
