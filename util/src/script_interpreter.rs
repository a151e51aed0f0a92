//! # Arm program script interpreter module
//!
//! This module loads arm programs, text files holding one instruction per
//! line, and hands the executable lines out one at a time. Blank lines and
//! comment lines (`# ...`) are dropped while loading, but every remaining
//! line keeps its original line number so errors can be reported against the
//! source file.
//!
//! Instructions are not validated here. Validation happens when a line is
//! executed, so a program with a bad instruction still runs every line before
//! it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::fs;
use thiserror::Error;

// Internal
use comms_if::tc::{is_blank, is_comment};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An executable line of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    /// 1-based line number within the script source
    pub line_num: usize,

    /// The instruction text exactly as written, without the line terminator
    pub text: String
}

/// A script interpreter.
///
/// After initialising with the path to the script use `.next_line` to
/// acquire the lines that need executing, in order.
pub struct ScriptInterpreter {
    name: String,
    lines: VecDeque<ScriptLine>
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0}")]
    ScriptNotFound(String),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or only contains comments)")]
    ScriptEmpty,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {

        // Get the path in a buffer
        let path = PathBuf::from(script_path.as_ref());
        
        // Check that the script file exists.
        if !path.exists() {
            return Err(
                ScriptError::ScriptNotFound(path.display().to_string()));
        }

        // Load the script into a string
        let script = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => return Err(ScriptError::ScriptLoadError(e))
        };

        Self::from_source(path.display().to_string(), &script)
    }

    /// Create a new interpreter from script source held in memory.
    ///
    /// `name` is only used to identify the script in logs.
    pub fn from_source<S: Into<String>>(
        name: S,
        source: &str
    ) -> Result<Self, ScriptError> {
        let lines: VecDeque<ScriptLine> = source
            .lines()
            .enumerate()
            .filter(|(_, l)| !is_blank(l) && !is_comment(l))
            .map(|(i, l)| ScriptLine {
                line_num: i + 1,
                text: l.trim_end_matches('\r').to_string()
            })
            .collect();

        if lines.is_empty() {
            return Err(ScriptError::ScriptEmpty)
        }

        Ok(ScriptInterpreter {
            name: name.into(),
            lines
        })
    }

    /// Pop the next line to execute, or `None` at the end of the script.
    pub fn next_line(&mut self) -> Option<ScriptLine> {
        self.lines.pop_front()
    }

    /// Get the number of lines still to be executed
    pub fn get_num_lines(&self) -> usize {
        self.lines.len()
    }

    /// Name of the script, the path if it was loaded from a file
    pub fn name(&self) -> &str {
        &self.name
    }
}
