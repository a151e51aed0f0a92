//! # Simulated arm link
//!
//! A loopback [`Transport`] standing in for the arm. Every complete frame written to it is
//! answered, after a fixed delay, with an informational line and then the acknowledgment for the
//! frame's id. The acknowledgment is delivered in two chunks so that readers see it split across
//! reads, as they would on a serial line.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::{Transport, TransportError};
use crate::eqpt::arm::ArmCommand;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct SimArmLink {
    connected: Arc<AtomicBool>,

    frame_tx: Option<Sender<Vec<u8>>>,

    worker: Option<JoinHandle<()>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimArmLink {
    /// Create a new connected link, returning the receiving end of the arm's output.
    pub fn new(ack_delay: Duration) -> std::io::Result<(Self, Receiver<Vec<u8>>)> {
        let (frame_tx, frame_rx) = mpsc::channel::<Vec<u8>>();
        let (out_tx, out_rx) = mpsc::channel::<Vec<u8>>();

        let worker = thread::Builder::new()
            .name("sim_arm".into())
            .spawn(move || run_sim_arm(frame_rx, out_tx, ack_delay))?;

        Ok((
            Self {
                connected: Arc::new(AtomicBool::new(true)),
                frame_tx: Some(frame_tx),
                worker: Some(worker),
            },
            out_rx,
        ))
    }

    /// Simulate the cable being pulled (or plugged back in). Writes made while disconnected fail.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Transport for SimArmLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.frame_tx.is_some()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected);
        }

        match self.frame_tx {
            Some(ref tx) => tx
                .send(bytes.to_vec())
                .map_err(|_| TransportError::Disconnected),
            None => Err(TransportError::Disconnected),
        }
    }

    fn close(&mut self) {
        self.connected.store(false, Ordering::SeqCst);

        // Dropping the sender stops the worker once it has answered everything already written
        self.frame_tx.take();

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Simulated arm worker panicked");
            }
        }
    }
}

impl Drop for SimArmLink {
    fn drop(&mut self) {
        self.close();
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn run_sim_arm(frame_rx: Receiver<Vec<u8>>, out_tx: Sender<Vec<u8>>, ack_delay: Duration) {
    let mut pending: Vec<u8> = Vec::new();

    debug!("Simulated arm started");

    while let Ok(bytes) = frame_rx.recv() {
        pending.extend_from_slice(&bytes);

        while let Some(end) = pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = pending.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);

            if !answer(&line, &out_tx, ack_delay) {
                debug!("Simulated arm output closed");
                return;
            }
        }
    }

    debug!("Simulated arm stopped");
}

/// Answer a single frame, returning false if nobody is listening any more.
fn answer(line: &str, out_tx: &Sender<Vec<u8>>, ack_delay: Duration) -> bool {
    let cmd = match ArmCommand::from_message(line) {
        Some(c) => c,
        None => {
            let err = format!("\r\nERR unrecognised frame: {}\r\n", line.trim_end());
            return out_tx.send(err.into_bytes()).is_ok();
        }
    };

    thread::sleep(ack_delay);

    let info = format!("\r\nExecuting {}\r\n", cmd.text());
    let ack = format!("\r\nACK [{}]\r\n", cmd.id());
    let (first, second) = ack.as_bytes().split_at(ack.len() / 2);

    out_tx.send(info.into_bytes()).is_ok()
        && out_tx.send(first.to_vec()).is_ok()
        && out_tx.send(second.to_vec()).is_ok()
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
