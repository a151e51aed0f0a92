//! # Arm library.
//!
//! This library allows other crates in the workspace (and the benches) to access items defined
//! inside the arm executable crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Arm control - validates moves, tracks the pose and runs programs
pub mod arm_ctrl;

/// Collision predictor - forward kinematics used to refuse unsafe vertical moves
pub mod collision;

/// Command dispatcher - sends commands to the arm and tracks their acknowledgments
pub mod dispatcher;

/// Executable parameters
pub mod params;
