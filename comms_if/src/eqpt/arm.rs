//! # Arm wire interface
//!
//! Commands are sent to the arm as a single line of the form `<text> [<id>]\n`, for example
//! `SV-15 [16023456781]`. When the arm has executed a command it replies with `\nACK [<id>]`,
//! possibly surrounded by carriage returns and interleaved with free-form informational lines.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

pub const LF: u8 = b'\n';
pub const CR: u8 = b'\r';
pub const ID_OPEN: u8 = b'[';
pub const ID_CLOSE: u8 = b']';

/// Tag which precedes the id in an acknowledgment, after a line feed.
pub const ACK_TAG: &str = "ACK ";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A command which has been accepted for sending to the arm.
///
/// Commands are immutable. Two commands are equal when their ids are equal, and commands are
/// ordered by comparing their ids as strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmCommand {
    text: String,
    id: String,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// The acknowledgment the arm sends once the command with `id` has been executed.
pub fn ack_frame(id: &str) -> String {
    format!("\n{}[{}]", ACK_TAG, id)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ArmCommand {
    pub fn new<T: Into<String>, I: Into<String>>(text: T, id: I) -> Self {
        Self {
            text: text.into(),
            id: id.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The command as it appears on the wire without the terminating line feed.
    pub fn message(&self) -> String {
        format!("{} [{}]", self.text, self.id)
    }

    /// The complete frame written to the transport.
    pub fn frame(&self) -> String {
        let mut frame = self.message();
        frame.push(LF as char);
        frame
    }

    /// Recover a command from its wire message.
    ///
    /// Trailing line terminators are ignored. Returns `None` if the message has no bracketed
    /// numeric id or no text.
    pub fn from_message(message: &str) -> Option<Self> {
        let message = message.trim_end_matches(|c| c == '\r' || c == '\n');

        if !message.ends_with(ID_CLOSE as char) {
            return None;
        }

        let open = message.rfind(" [")?;
        let text = &message[..open];
        let id = &message[open + 2..message.len() - 1];

        if text.is_empty() || id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        Some(Self::new(text, id))
    }
}

impl PartialEq for ArmCommand {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ArmCommand {}

impl Hash for ArmCommand {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state)
    }
}

impl PartialOrd for ArmCommand {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ArmCommand {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for ArmCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.text, self.id)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_framing() {
        let cmd = ArmCommand::new("SV-15", "16023456781");
        assert_eq!(cmd.message(), "SV-15 [16023456781]");
        assert_eq!(cmd.frame(), "SV-15 [16023456781]\n");
        assert_eq!(cmd.to_string(), cmd.message());
        assert_eq!(ack_frame("16023456781"), "\nACK [16023456781]");
    }

    #[test]
    fn test_from_message() {
        let cmd = ArmCommand::from_message("CO [42]\n").unwrap();
        assert_eq!(cmd.text(), "CO");
        assert_eq!(cmd.id(), "42");

        assert!(ArmCommand::from_message("CO").is_none());
        assert!(ArmCommand::from_message("CO []").is_none());
        assert!(ArmCommand::from_message("CO [4a]").is_none());
        assert!(ArmCommand::from_message(" [42]").is_none());
    }

    #[test]
    fn test_identity_is_id() {
        let a = ArmCommand::new("SV10", "101");
        let b = ArmCommand::new("EV10", "101");
        let c = ArmCommand::new("SV10", "102");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a < c);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }
}
