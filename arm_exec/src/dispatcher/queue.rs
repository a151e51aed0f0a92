//! FIFO of commands sent to the arm but not yet acknowledged

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::eqpt::arm::ArmCommand;
use std::collections::VecDeque;

use super::ProtocolError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct CommandQueue {
    entries: VecDeque<ArmCommand>,
}

/// Result of retiring an acknowledged id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retired {
    /// The acknowledged command
    pub executed: ArmCommand,

    /// Commands ahead of the acknowledged one, in FIFO order. The arm acknowledges in send order,
    /// so these were lost.
    pub skipped: Vec<ArmCommand>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: ArmCommand) {
        self.entries.push_back(cmd);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ArmCommand> {
        self.entries.iter()
    }

    /// Remove every entry, in FIFO order.
    pub fn drain(&mut self) -> Vec<ArmCommand> {
        self.entries.drain(..).collect()
    }

    /// Retire the command with the given id along with every command queued before it.
    ///
    /// If no queued command has the id the queue is left untouched.
    pub fn retire(&mut self, id: &str) -> Result<Retired, ProtocolError> {
        let pos = match self.entries.iter().position(|c| c.id() == id) {
            Some(p) => p,
            None => return Err(ProtocolError::CommandNotFound(id.to_string())),
        };

        let skipped: Vec<ArmCommand> = self.entries.drain(..pos).collect();

        match self.entries.pop_front() {
            Some(executed) => Ok(Retired { executed, skipped }),
            None => Err(ProtocolError::CommandNotFound(id.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn queue(ids: &[&str]) -> CommandQueue {
        let mut q = CommandQueue::new();
        for id in ids {
            q.push(ArmCommand::new(format!("SV{}", id), *id));
        }
        q
    }

    fn ids(q: &CommandQueue) -> Vec<String> {
        q.iter().map(|c| c.id().to_string()).collect()
    }

    #[test]
    fn test_retire_head() {
        let mut q = queue(&["1", "2"]);
        let r = q.retire("1").unwrap();
        assert_eq!(r.executed.id(), "1");
        assert!(r.skipped.is_empty());
        assert_eq!(ids(&q), vec!["2"]);
    }

    #[test]
    fn test_retire_skips_earlier() {
        let mut q = queue(&["1", "2", "3"]);
        let r = q.retire("2").unwrap();
        assert_eq!(r.executed.id(), "2");
        assert_eq!(r.skipped.iter().map(|c| c.id()).collect::<Vec<_>>(), vec!["1"]);
        assert_eq!(ids(&q), vec!["3"]);
    }

    #[test]
    fn test_retire_unknown() {
        let mut q = queue(&["1", "2"]);
        assert_eq!(q.retire("9"), Err(ProtocolError::CommandNotFound("9".into())));
        assert_eq!(ids(&q), vec!["1", "2"]);
    }

    #[test]
    fn test_drain() {
        let mut q = queue(&["1", "2"]);
        let drained = q.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].id(), "1");
        assert!(q.is_empty());
    }
}
