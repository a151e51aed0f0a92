//! Parameters structure for the collision predictor

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Geometry of the arm as seen from the side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Height of the shoulder joint above the ground plane.
    ///
    /// Units: meters.
    pub base_height_m: f64,

    /// The length of the shoulder link.
    ///
    /// Units: meters.
    pub shoulder_length_m: f64,

    /// The length of the elbow link.
    ///
    /// Units: meters.
    pub elbow_length_m: f64,

    /// The length of the clamp, from the wrist to the tip.
    ///
    /// Units: meters.
    pub clamp_length_m: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            base_height_m: 0.135,
            shoulder_length_m: 0.105,
            elbow_length_m: 0.100,
            clamp_length_m: 0.155,
        }
    }
}
