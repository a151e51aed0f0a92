//! Parameters for the arm executable

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::collision;
use crate::dispatcher::DEFAULT_TIME_BETWEEN_COMMANDS_MS;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the arm executable, loaded from `params/arm_exec.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmExecParams {
    /// If true commands are queued and logged but never written to the arm.
    pub simulation: bool,

    /// Delay before each command is written, giving the arm time to finish the previous move.
    ///
    /// Units: milliseconds
    pub time_between_commands_ms: u64,

    /// Delay before the simulated arm acknowledges a command.
    ///
    /// Units: milliseconds
    pub sim_ack_delay_ms: u64,

    /// How long to wait for outstanding acknowledgments before shutting down.
    ///
    /// Units: seconds
    pub drain_timeout_s: f64,

    /// Default log level, one of `warn`, `info`, `debug` or `trace`
    pub log_level: String,

    /// Log levels for individual targets, e.g. `"comms_if::net" = "info"`
    pub log_targets: BTreeMap<String, String>,

    pub geometry: collision::Params,
}

impl Default for ArmExecParams {
    fn default() -> Self {
        Self {
            simulation: false,
            time_between_commands_ms: DEFAULT_TIME_BETWEEN_COMMANDS_MS,
            sim_ack_delay_ms: 50,
            drain_timeout_s: 10.0,
            log_level: "info".into(),
            log_targets: default_log_targets(),
            geometry: collision::Params::default(),
        }
    }
}

/// The arm link traces every chunk it receives, which drowns out the dispatcher.
fn default_log_targets() -> BTreeMap<String, String> {
    let mut targets = BTreeMap::new();
    targets.insert("comms_if::net".to_string(), "info".to_string());
    targets
}
