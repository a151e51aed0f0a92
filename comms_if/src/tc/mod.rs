//! # Arm command language
//!
//! One instruction per line: a two letter action code optionally followed by a signed integer
//! amount, e.g. `SV-15` or `CO`. Lines starting with `#` (after optional whitespace) are
//! comments, blank lines are ignored.
//!
//! Parsing validates the action against the [`catalog`] and the amount against the action's
//! range. All functions here are pure.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod catalog;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use conquer_once::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub use catalog::{catalog, ActionCode, ActionSpec, Joint, JointCatalog, JointSpec};

// ------------------------------------------------------------------------------------------------
// STATICS
// ------------------------------------------------------------------------------------------------

static ACTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z]+").unwrap());

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?[0-9]+$").unwrap());

static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*#").unwrap());

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A successfully parsed instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Instruction {
    /// The action token as it was written, case preserved
    pub action: String,

    /// The catalog action the token resolved to
    pub code: ActionCode,

    /// The amount, 0 when none was given
    pub amount: i32,

    /// Whether an amount was present in the line
    pub has_amount: bool,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("No command found in \"{0}\"")]
    NoCommandFound(String),

    #[error("Command {action} does not take a value")]
    UnexpectedValue { action: String },

    #[error("Invalid value {amount} for command {action}, expected a value in [{min}, {max}]")]
    InvalidValueForCommand {
        action: String,
        amount: i64,
        min: i32,
        max: i32,
    },
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Parse a single instruction line.
///
/// Trailing line terminators are ignored. The amount, if any, must be anchored at the end of the
/// line.
pub fn parse(line: &str) -> Result<Instruction, ParseError> {
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');

    let action = match ACTION_RE.find(line) {
        Some(m) => m.as_str(),
        None => return Err(ParseError::NoCommandFound(line.to_string())),
    };

    let spec = match action.parse::<ActionCode>() {
        Ok(code) => match catalog().action(code) {
            Some(s) => s,
            None => return Err(ParseError::NoCommandFound(line.to_string())),
        },
        Err(_) => return Err(ParseError::NoCommandFound(line.to_string())),
    };

    // Only look for the amount after the action token so that digits can't be shared between them
    let amount = AMOUNT_RE
        .find(&line[action.len()..])
        .map(|m| parse_amount(m.as_str()));

    match amount {
        // A missing amount defaults to 0, which must still be in range
        None if !spec.accepts(0) => Err(ParseError::InvalidValueForCommand {
            action: action.to_string(),
            amount: 0,
            min: spec.min,
            max: spec.max,
        }),
        None => Ok(Instruction {
            action: action.to_string(),
            code: spec.code,
            amount: 0,
            has_amount: false,
        }),
        Some(_) if !spec.has_parameter => Err(ParseError::UnexpectedValue {
            action: action.to_string(),
        }),
        Some(a) if !spec.accepts(a) => Err(ParseError::InvalidValueForCommand {
            action: action.to_string(),
            amount: a,
            min: spec.min,
            max: spec.max,
        }),
        Some(a) => Ok(Instruction {
            action: action.to_string(),
            code: spec.code,
            // Range checked above, the catalog ranges are all within i32
            amount: a as i32,
            has_amount: true,
        }),
    }
}

/// Returns true if the line is a comment.
pub fn is_comment(line: &str) -> bool {
    COMMENT_RE.is_match(line)
}

/// Returns true if the line is empty or contains only whitespace.
pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// All action codes known to the language.
pub fn list_actions() -> Vec<ActionCode> {
    catalog().actions().collect()
}

/// Parse an amount, saturating if it doesn't fit in an `i64`. A saturated amount is always out of
/// range for every action so it will be rejected by the range check.
fn parse_amount(s: &str) -> i64 {
    match s.parse::<i64>() {
        Ok(a) => a,
        Err(_) if s.starts_with('-') => i64::MIN,
        Err(_) => i64::MAX,
    }
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Instruction {
    /// Build an instruction directly from a code and amount, without validation.
    pub fn new(code: ActionCode, amount: Option<i32>) -> Self {
        Self {
            action: code.as_str().to_string(),
            code,
            amount: amount.unwrap_or(0),
            has_amount: amount.is_some(),
        }
    }

    /// The text sent to the arm for this instruction, e.g. `SV-15` or `CO`.
    pub fn wire_text(&self) -> String {
        if self.has_amount {
            format!("{}{}", self.code, self.amount)
        } else {
            self.code.to_string()
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_text())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
