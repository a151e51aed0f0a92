//! # Command dispatcher
//!
//! The dispatcher owns the link to the arm. It gives every command a unique id, frames it and
//! writes it to the transport, then keeps it in a FIFO until the arm acknowledges it.
//!
//! Two threads use the dispatcher: a producer calling [`Dispatcher::enqueue`] and the transport
//! reader calling [`Dispatcher::feed_bytes`]. The FIFO and the acknowledgment scanner share one
//! lock. Sending holds a second lock for the whole append, rate limit and write sequence so that
//! the order on the wire is the order of the FIFO. The reader never takes the send lock.
//!
//! Everything that happens to a command is logged and published as a [`DispatchEvent`] to every
//! subscriber.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod queue;
mod scanner;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    eqpt::arm::ArmCommand,
    net::{ByteSink, Transport},
};
use log::{debug, error, info, warn};
use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    mpsc::{self, Receiver, Sender},
    Arc, Condvar, Mutex, MutexGuard, PoisonError,
};
use std::time::Duration;
use thiserror::Error;
use util::time::epoch_millis;

pub use queue::{CommandQueue, Retired};
pub use scanner::{AckScanner, ScanEvent};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Default delay before writing each command.
///
/// Units: milliseconds
pub const DEFAULT_TIME_BETWEEN_COMMANDS_MS: u64 = 600;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Problems with the data received from the arm. These are never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Corrupted data received from the arm: {0}")]
    CorruptedData(String),

    #[error("Wrong data received from the arm: {0:?}")]
    WrongData(String),

    #[error("Acknowledged command {0} is not pending")]
    CommandNotFound(String),
}

/// Something that happened to a command or on the link.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchEvent {
    /// The command was written to the transport
    Sent(ArmCommand),

    /// The command was queued but not written
    Simulated(ArmCommand),

    /// The arm acknowledged the command
    Executed(ArmCommand),

    /// A later command was acknowledged first, so this one was lost
    NotExecuted(ArmCommand),

    /// The command was discarded from the FIFO before being acknowledged
    Abandoned(ArmCommand),

    /// Bytes from the arm which are not an acknowledgment
    IgnoredData(String),

    Protocol(ProtocolError),

    TransportFault(String),
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Handle to a command dispatcher. Clones share the same dispatcher.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<DispatchState>,

    /// The send lock
    link: Mutex<Option<Box<dyn Transport>>>,

    simulation: AtomicBool,

    time_between_commands_ms: AtomicU64,

    limiter: RateLimiter,

    listeners: Mutex<Vec<Sender<DispatchEvent>>>,
}

struct DispatchState {
    queue: CommandQueue,
    scanner: AckScanner,
    next_id_counter: u64,
}

/// Interruptible sleep between commands.
struct RateLimiter {
    generation: Mutex<u64>,
    cvar: Condvar,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DispatchEvent {
    /// Log the event at a level matching its severity.
    pub fn log(&self) {
        match self {
            DispatchEvent::Sent(c) => info!("Command sent: {}", c),
            DispatchEvent::Simulated(c) => info!("Simulating command: {}", c),
            DispatchEvent::Executed(c) => info!("Command executed: {}", c),
            DispatchEvent::NotExecuted(c) => warn!("Command not executed: {}", c),
            DispatchEvent::Abandoned(c) => warn!("Command abandoned: {}", c),
            DispatchEvent::IgnoredData(d) => debug!("Arm says: {}", d),
            DispatchEvent::Protocol(e) => warn!("{}", e),
            DispatchEvent::TransportFault(e) => error!("Transport fault: {}", e),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a new dispatcher with no transport, outside of simulation mode.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(DispatchState {
                    queue: CommandQueue::new(),
                    scanner: AckScanner::new(),
                    next_id_counter: 1,
                }),
                link: Mutex::new(None),
                simulation: AtomicBool::new(false),
                time_between_commands_ms: AtomicU64::new(DEFAULT_TIME_BETWEEN_COMMANDS_MS),
                limiter: RateLimiter::new(),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Queue a command and send it if possible, returning its id.
    ///
    /// If the dispatcher is in simulation mode, or the transport is missing or disconnected, the
    /// command is queued without being written. Outside of simulation mode a transport fault is
    /// also reported.
    pub fn enqueue(&self, text: &str) -> String {
        let mut link = lock(&self.inner.link);

        let cmd = {
            let mut state = lock(&self.inner.state);
            let id = format!("{}{}", epoch_millis(), state.next_id_counter);
            state.next_id_counter += 1;

            let cmd = ArmCommand::new(text, id);
            state.queue.push(cmd.clone());
            cmd
        };

        let connected = link.as_ref().map(|l| l.is_connected()).unwrap_or(false);

        if self.is_simulation() || !connected {
            if !self.is_simulation() {
                self.emit(DispatchEvent::TransportFault("the arm is disconnected".into()));
            }
            self.emit(DispatchEvent::Simulated(cmd.clone()));
            return cmd.id().to_string();
        }

        self.inner.limiter.sleep(self.time_between_commands());

        let result = match link.as_mut() {
            Some(l) => l.write(cmd.frame().as_bytes()),
            None => Ok(()),
        };

        match result {
            Ok(()) => self.emit(DispatchEvent::Sent(cmd.clone())),
            Err(e) => self.emit(DispatchEvent::TransportFault(format!(
                "could not send {}: {}",
                cmd, e
            ))),
        }

        cmd.id().to_string()
    }

    /// Scan bytes received from the arm, retiring every acknowledged command.
    pub fn feed_bytes(&self, bytes: &[u8]) {
        let mut events = Vec::new();

        {
            let mut state = lock(&self.inner.state);
            let scanned = state.scanner.feed(bytes);

            for scan_event in scanned {
                match scan_event {
                    ScanEvent::Ack(id) => match state.queue.retire(&id) {
                        Ok(Retired { executed, skipped }) => {
                            events.push(DispatchEvent::Executed(executed));

                            if !skipped.is_empty() {
                                events.push(DispatchEvent::Protocol(
                                    ProtocolError::CorruptedData(format!(
                                        "acknowledgment for {} skipped {} earlier command(s)",
                                        id,
                                        skipped.len()
                                    )),
                                ));
                            }

                            events.extend(skipped.into_iter().map(DispatchEvent::NotExecuted));
                        }
                        Err(e) => events.push(DispatchEvent::Protocol(e)),
                    },
                    ScanEvent::Ignored(data) => events.push(DispatchEvent::IgnoredData(data)),
                    ScanEvent::Protocol(e) => events.push(DispatchEvent::Protocol(e)),
                }
            }
        }

        for event in events {
            self.emit(event);
        }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> Receiver<DispatchEvent> {
        let (tx, rx) = mpsc::channel();
        lock(&self.inner.listeners).push(tx);
        rx
    }

    /// Commands waiting for an acknowledgment, oldest first.
    pub fn pending(&self) -> Vec<ArmCommand> {
        lock(&self.inner.state).queue.iter().cloned().collect()
    }

    pub fn pending_len(&self) -> usize {
        lock(&self.inner.state).queue.len()
    }

    /// Discard every pending command, reporting each as abandoned.
    pub fn drain_abandoned(&self) -> Vec<ArmCommand> {
        let drained = lock(&self.inner.state).queue.drain();

        for cmd in &drained {
            self.emit(DispatchEvent::Abandoned(cmd.clone()));
        }

        drained
    }

    pub fn set_simulation(&self, simulation: bool) {
        self.inner.simulation.store(simulation, Ordering::SeqCst);
    }

    pub fn is_simulation(&self) -> bool {
        self.inner.simulation.load(Ordering::SeqCst)
    }

    pub fn set_time_between_commands(&self, delay: Duration) {
        self.inner
            .time_between_commands_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn time_between_commands(&self) -> Duration {
        Duration::from_millis(self.inner.time_between_commands_ms.load(Ordering::SeqCst))
    }

    /// Attach a transport, returning the previous one if any.
    ///
    /// Blocks while a command is being sent.
    pub fn set_transport(&self, transport: Box<dyn Transport>) -> Option<Box<dyn Transport>> {
        lock(&self.inner.link).replace(transport)
    }

    /// Detach the transport, returning it.
    ///
    /// Blocks while a command is being sent, call [`Dispatcher::interrupt`] first to cut the
    /// wait short.
    pub fn clear_transport(&self) -> Option<Box<dyn Transport>> {
        lock(&self.inner.link).take()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.inner.link)
            .as_ref()
            .map(|l| l.is_connected())
            .unwrap_or(false)
    }

    /// Wake a sender waiting between commands. The command is still sent.
    pub fn interrupt(&self) {
        self.inner.limiter.interrupt();
    }

    fn emit(&self, event: DispatchEvent) {
        event.log();

        lock(&self.inner.listeners).retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl ByteSink for Dispatcher {
    fn on_bytes(&self, bytes: &[u8]) {
        self.feed_bytes(bytes)
    }
}

impl RateLimiter {
    fn new() -> Self {
        Self {
            generation: Mutex::new(0),
            cvar: Condvar::new(),
        }
    }

    /// Sleep for `duration` or until interrupted.
    fn sleep(&self, duration: Duration) {
        if duration == Duration::from_millis(0) {
            return;
        }

        let guard = lock(&self.generation);
        let start = *guard;

        let (_guard, result) = self
            .cvar
            .wait_timeout_while(guard, duration, |g| *g == start)
            .unwrap_or_else(PoisonError::into_inner);

        if !result.timed_out() {
            debug!("Wait between commands interrupted");
        }
    }

    fn interrupt(&self) {
        let mut generation = lock(&self.generation);
        *generation = generation.wrapping_add(1);
        self.cvar.notify_all();
    }
}

/// Lock a mutex, carrying on with the data if another thread panicked while holding it.
fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use comms_if::net::TransportError;
    use std::thread;
    use std::time::Instant;

    /// Transport which records everything written to it.
    #[derive(Clone, Default)]
    struct MockLink {
        written: Arc<Mutex<Vec<u8>>>,
        disconnected: Arc<AtomicBool>,
    }

    impl Transport for MockLink {
        fn is_connected(&self) -> bool {
            !self.disconnected.load(Ordering::SeqCst)
        }

        fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
            self.written.lock().unwrap().extend_from_slice(bytes);
            Ok(())
        }
    }

    impl MockLink {
        fn written(&self) -> String {
            String::from_utf8(self.written.lock().unwrap().clone()).unwrap()
        }
    }

    fn connected_dispatcher() -> (Dispatcher, MockLink) {
        let d = Dispatcher::new();
        d.set_time_between_commands(Duration::from_millis(0));
        let link = MockLink::default();
        d.set_transport(Box::new(link.clone()));
        (d, link)
    }

    fn events(rx: &Receiver<DispatchEvent>) -> Vec<DispatchEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn test_ids_unique_and_increasing() {
        let d = Dispatcher::new();
        d.set_simulation(true);

        let a = d.enqueue("SV10");
        let b = d.enqueue("SV20");
        let c = d.enqueue("SV30");

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(a.ends_with('1'));
        assert!(b.ends_with('2'));
        assert!(c.ends_with('3'));
        assert_eq!(d.pending_len(), 3);

        // Each dispatcher counts from one
        let other = Dispatcher::new();
        other.set_simulation(true);
        assert!(other.enqueue("CO").ends_with('1'));
    }

    #[test]
    fn test_frames_written_in_order() {
        let (d, link) = connected_dispatcher();
        let rx = d.subscribe();

        let a = d.enqueue("SV-15");
        let b = d.enqueue("CO");

        assert_eq!(link.written(), format!("SV-15 [{}]\nCO [{}]\n", a, b));

        let evs = events(&rx);
        assert_eq!(evs.len(), 2);
        assert!(matches!(&evs[0], DispatchEvent::Sent(c) if c.id() == a));
        assert!(matches!(&evs[1], DispatchEvent::Sent(c) if c.id() == b));
    }

    #[test]
    fn test_round_trip() {
        let (d, _link) = connected_dispatcher();
        let rx = d.subscribe();

        let id = d.enqueue("SV10");
        d.feed_bytes(format!("\nACK [{}]\n", id).as_bytes());

        assert_eq!(d.pending_len(), 0);
        assert!(events(&rx)
            .iter()
            .any(|e| matches!(e, DispatchEvent::Executed(c) if c.id() == id)));
    }

    #[test]
    fn test_out_of_order_ack() {
        let (d, _link) = connected_dispatcher();

        let i1 = d.enqueue("SV10");
        let i2 = d.enqueue("SV20");
        let i3 = d.enqueue("SV30");

        let rx = d.subscribe();
        d.feed_bytes(format!("\r\nACK [{}]\r\n", i2).as_bytes());

        let evs = events(&rx);
        assert!(matches!(&evs[0], DispatchEvent::Executed(c) if c.id() == i2));
        assert!(matches!(&evs[1], DispatchEvent::Protocol(ProtocolError::CorruptedData(_))));
        assert!(matches!(&evs[2], DispatchEvent::NotExecuted(c) if c.id() == i1));
        assert_eq!(evs.len(), 3);

        let pending = d.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id(), i3);
    }

    #[test]
    fn test_unknown_and_duplicate_ack() {
        let (d, _link) = connected_dispatcher();

        let id = d.enqueue("SV10");
        let other = d.enqueue("SV20");
        let rx = d.subscribe();

        d.feed_bytes(b"\nACK [42]\n");
        assert_eq!(
            events(&rx),
            vec![DispatchEvent::Protocol(ProtocolError::CommandNotFound("42".into()))]
        );
        assert_eq!(d.pending_len(), 2);

        let ack = format!("\nACK [{}]", id);
        d.feed_bytes(ack.as_bytes());
        d.feed_bytes(ack.as_bytes());

        let evs = events(&rx);
        assert!(matches!(&evs[0], DispatchEvent::Executed(c) if c.id() == id));
        assert_eq!(
            evs[1],
            DispatchEvent::Protocol(ProtocolError::CommandNotFound(id.clone()))
        );
        assert_eq!(d.pending()[0].id(), other);
    }

    #[test]
    fn test_chunked_ack() {
        let (d, _link) = connected_dispatcher();
        let id = d.enqueue("EV5");

        let ack = format!("\nACK [{}]", id);
        let (a, rest) = ack.split_at(2);
        let (b, rest) = rest.split_at(3);
        let (c, e) = rest.split_at(4);

        for chunk in &[a, b, c, e] {
            d.feed_bytes(chunk.as_bytes());
        }

        assert_eq!(d.pending_len(), 0);
    }

    #[test]
    fn test_disconnected_is_simulated() {
        let d = Dispatcher::new();
        let rx = d.subscribe();

        d.enqueue("CO");

        let evs = events(&rx);
        assert!(matches!(&evs[0], DispatchEvent::TransportFault(_)));
        assert!(matches!(&evs[1], DispatchEvent::Simulated(_)));
        assert_eq!(d.pending_len(), 1);

        // In simulation mode no fault is reported
        d.set_simulation(true);
        d.enqueue("CC");
        let evs = events(&rx);
        assert_eq!(evs.len(), 1);
        assert!(matches!(&evs[0], DispatchEvent::Simulated(_)));
    }

    #[test]
    fn test_drain_abandoned() {
        let d = Dispatcher::new();
        d.set_simulation(true);
        d.enqueue("CO");
        d.enqueue("CC");

        let rx = d.subscribe();
        let drained = d.drain_abandoned();

        assert_eq!(drained.len(), 2);
        assert_eq!(d.pending_len(), 0);
        assert_eq!(
            events(&rx)
                .iter()
                .filter(|e| matches!(e, DispatchEvent::Abandoned(_)))
                .count(),
            2
        );
    }

    #[test]
    fn test_interrupt_cuts_wait_short() {
        let (d, link) = connected_dispatcher();
        d.set_time_between_commands(Duration::from_secs(30));

        let sender = d.clone();
        let start = Instant::now();
        let handle = thread::spawn(move || sender.enqueue("SV10"));

        // Keep interrupting until the sender has got through the wait
        while link.written().is_empty() {
            d.interrupt();
            thread::sleep(Duration::from_millis(5));
        }

        let id = handle.join().unwrap();
        assert!(start.elapsed() < Duration::from_secs(30));
        assert_eq!(link.written(), format!("SV10 [{}]\n", id));
    }

    #[test]
    fn test_ignored_data_reported() {
        let (d, _link) = connected_dispatcher();
        let rx = d.subscribe();

        d.feed_bytes(b"\r\nExecuting SV10\r\n");

        assert_eq!(
            events(&rx),
            vec![DispatchEvent::IgnoredData("Executing SV10".into())]
        );
    }
}
