//! Acknowledgment scanner
//!
//! Character level state machine which picks `\nACK [<digits>]` acknowledgments out of the byte
//! stream coming back from the arm. Everything else the arm says is reported as ignored data.
//! Ignored bytes are flushed at every line feed and at the end of every call to
//! [`AckScanner::feed`], so a line split across two chunks is reported as two fragments.
//!
//! Bytes are appended to an internal buffer and scanned from a cursor, the consumed prefix is
//! discarded at the end of every call. The scanner state between calls is the phase and the
//! digits of an open id, which is capped at [`MAX_ID_DIGITS`], so acknowledgments are found
//! however the stream is split into chunks and memory stays bounded when no line feed arrives.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::arm::{ACK_TAG, CR, ID_CLOSE, ID_OPEN, LF};

use super::ProtocolError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Longest acknowledgment id accepted. Ids are epoch milliseconds followed by a counter so real
/// ones are far shorter.
pub const MAX_ID_DIGITS: usize = 32;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Something found while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// A complete acknowledgment for the given id
    Ack(String),

    /// Bytes which are not part of an acknowledgment
    Ignored(String),

    /// A malformed acknowledgment
    Protocol(ProtocolError),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Idle,
    SawLf,
    SawA,
    SawC,
    SawK,
    SawSpace,
    InId,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AckScanner {
    buffer: Vec<u8>,
    cursor: usize,
    phase: Phase,

    /// Digits of the id being captured
    id: String,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for AckScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl AckScanner {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            cursor: 0,
            phase: Phase::Idle,
            id: String::new(),
        }
    }

    /// Number of bytes held in the buffer. Always zero between calls to `feed`.
    pub fn buffered(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// Scan a chunk of received bytes, returning everything found in it in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ScanEvent> {
        let mut events = Vec::new();
        let mut ignored: Vec<u8> = Vec::new();

        self.buffer.extend_from_slice(chunk);

        while self.cursor < self.buffer.len() {
            let byte = self.buffer[self.cursor];
            self.cursor += 1;

            if byte == CR {
                continue;
            }

            if byte == LF {
                flush_ignored(&mut ignored, &mut events);
                self.id.clear();
                self.phase = Phase::SawLf;
                continue;
            }

            self.phase = match (self.phase, byte) {
                (Phase::SawLf, b'A') => Phase::SawA,
                (Phase::SawA, b'C') => Phase::SawC,
                (Phase::SawC, b'K') => Phase::SawK,
                (Phase::SawK, b' ') => Phase::SawSpace,
                (Phase::SawSpace, ID_OPEN) => {
                    self.id.clear();
                    Phase::InId
                }
                // Only reachable straight after the tag at the start of a line
                (Phase::SawSpace, ID_CLOSE) => {
                    events.push(ScanEvent::Protocol(ProtocolError::WrongData(format!(
                        "{}{}",
                        ACK_TAG, ID_CLOSE as char
                    ))));
                    Phase::Idle
                }
                (Phase::InId, b'0'..=b'9') if self.id.len() >= MAX_ID_DIGITS => {
                    events.push(ScanEvent::Protocol(ProtocolError::CorruptedData(format!(
                        "acknowledgment id longer than {} digits",
                        MAX_ID_DIGITS
                    ))));
                    self.id.clear();
                    Phase::Idle
                }
                (Phase::InId, b'0'..=b'9') => {
                    self.id.push(byte as char);
                    Phase::InId
                }
                (Phase::InId, ID_CLOSE) => {
                    events.push(ScanEvent::Ack(std::mem::take(&mut self.id)));
                    Phase::Idle
                }
                (Phase::InId, ID_OPEN) => {
                    events.push(ScanEvent::Protocol(ProtocolError::CorruptedData(format!(
                        "new acknowledgment id opened while reading id \"{}\"",
                        self.id
                    ))));
                    self.id.clear();
                    Phase::InId
                }
                (Phase::InId, other) => {
                    events.push(ScanEvent::Protocol(ProtocolError::CorruptedData(format!(
                        "unexpected byte {:?} in acknowledgment id \"{}\"",
                        other as char, self.id
                    ))));
                    self.id.clear();
                    Phase::Idle
                }
                (_, other) => {
                    ignored.push(other);
                    Phase::Idle
                }
            };
        }

        flush_ignored(&mut ignored, &mut events);

        // Compact
        self.buffer.drain(..self.cursor);
        self.cursor = 0;

        events
    }
}

fn flush_ignored(ignored: &mut Vec<u8>, events: &mut Vec<ScanEvent>) {
    if !ignored.is_empty() {
        events.push(ScanEvent::Ignored(
            String::from_utf8_lossy(ignored).into_owned(),
        ));
        ignored.clear();
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn acks(events: &[ScanEvent]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                ScanEvent::Ack(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_single_ack() {
        let mut s = AckScanner::new();
        let events = s.feed(b"\nACK [123]");
        assert_eq!(events, vec![ScanEvent::Ack("123".into())]);
        assert_eq!(s.buffered(), 0);
    }

    #[test]
    fn test_chunk_boundaries() {
        let mut whole = AckScanner::new();
        let expected = whole.feed(b"\r\nACK [123]\r\n");

        let mut split = AckScanner::new();
        let mut events = Vec::new();
        for chunk in &[&b"\r\nA"[..], b"CK [", b"12", b"3]\r\n"] {
            events.extend(split.feed(chunk));
        }

        assert_eq!(events, expected);
        assert_eq!(acks(&events), vec!["123".to_string()]);

        // Byte at a time
        let mut bytewise = AckScanner::new();
        let mut events = Vec::new();
        for b in b"\r\nACK [123]\r\n".iter() {
            events.extend(bytewise.feed(&[*b]));
        }
        assert_eq!(acks(&events), vec!["123".to_string()]);
    }

    #[test]
    fn test_ignored_lines() {
        let mut s = AckScanner::new();
        let events = s.feed(b"\r\nExecuting SV10\r\nACK [7]\r\n");

        assert_eq!(
            events,
            vec![
                ScanEvent::Ignored("Executing SV10".into()),
                ScanEvent::Ack("7".into()),
            ]
        );
    }

    #[test]
    fn test_ack_requires_line_start() {
        let mut s = AckScanner::new();
        let events = s.feed(b"xACK [5]");
        assert!(acks(&events).is_empty());
        assert_eq!(events, vec![ScanEvent::Ignored("xACK [5]".into())]);
    }

    #[test]
    fn test_wrong_data() {
        let mut s = AckScanner::new();
        let events = s.feed(b"\nACK ]");
        assert_eq!(
            events,
            vec![ScanEvent::Protocol(ProtocolError::WrongData("ACK ]".into()))]
        );
    }

    #[test]
    fn test_corrupted_id() {
        let mut s = AckScanner::new();
        let events = s.feed(b"\nACK [12x]");
        assert!(matches!(
            events[0],
            ScanEvent::Protocol(ProtocolError::CorruptedData(_))
        ));
        assert!(acks(&events).is_empty());

        // A second opening bracket restarts the capture
        let events = s.feed(b"\nACK [12[34]");
        assert!(matches!(
            events[0],
            ScanEvent::Protocol(ProtocolError::CorruptedData(_))
        ));
        assert_eq!(acks(&events), vec!["34".to_string()]);
    }

    #[test]
    fn test_line_feed_abandons_capture() {
        let mut s = AckScanner::new();
        let events = s.feed(b"\nACK [12\nACK [34]");
        assert_eq!(events, vec![ScanEvent::Ack("34".into())]);
    }

    #[test]
    fn test_ignored_flushed_per_call() {
        let mut s = AckScanner::new();
        assert_eq!(s.feed(b"hello"), vec![ScanEvent::Ignored("hello".into())]);
        assert_eq!(s.feed(b" world"), vec![ScanEvent::Ignored(" world".into())]);
        assert!(s.feed(b"\r").is_empty());

        // A line split across two chunks comes out as two fragments, the ack after it still counts
        let mut s = AckScanner::new();
        let mut events = s.feed(b"\nExecuting ");
        events.extend(s.feed(b"SV10\nACK [9]"));
        assert_eq!(
            events,
            vec![
                ScanEvent::Ignored("Executing ".into()),
                ScanEvent::Ignored("SV10".into()),
                ScanEvent::Ack("9".into()),
            ]
        );
    }

    #[test]
    fn test_bounded_without_line_feed() {
        let mut s = AckScanner::new();
        let chunk = vec![b'x'; 1024];

        // 1 MiB of chatter with no line feed
        for _ in 0..1024 {
            let events = s.feed(&chunk);
            assert_eq!(events.len(), 1);
            assert!(matches!(&events[0], ScanEvent::Ignored(d) if d.len() == chunk.len()));
            assert_eq!(s.buffered(), 0);
            assert!(s.id.is_empty());
        }
        assert!(s.buffer.capacity() <= 4 * chunk.len());

        // Still finds the next acknowledgment
        assert_eq!(s.feed(b"\nACK [1]"), vec![ScanEvent::Ack("1".into())]);
    }

    #[test]
    fn test_id_too_long() {
        let mut s = AckScanner::new();
        let mut events = s.feed(b"\nACK [");

        let digits = vec![b'7'; 1024];
        for _ in 0..1024 {
            events.extend(s.feed(&digits));
        }
        assert!(s.id.len() <= MAX_ID_DIGITS);

        events.extend(s.feed(b"]\nACK [42]"));

        assert!(matches!(
            events[0],
            ScanEvent::Protocol(ProtocolError::CorruptedData(_))
        ));
        assert_eq!(acks(&events), vec!["42".to_string()]);

        // The longest id accepted still goes through
        let id = "1".repeat(MAX_ID_DIGITS);
        let events = s.feed(format!("\nACK [{}]", id).as_bytes());
        assert_eq!(events, vec![ScanEvent::Ack(id)]);
    }
}
