//! Arm pose tracking

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::collision::VerticalPose;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Clamp aperture the arm is left at after homing.
///
/// Units: degrees
pub const CLAMP_REST_DEG: i32 = 55;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The last requested angle of every degree of freedom of the arm. This is what was asked for,
/// the arm gives no feedback on where it actually is.
///
/// Units: degrees
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pose {
    pub shoulder_horizontal: i32,
    pub shoulder_vertical: i32,
    pub elbow_vertical: i32,
    pub wrist_vertical: i32,
    pub wrist_rotation: i32,
    pub clamp: i32,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Pose {
    fn default() -> Self {
        Self {
            shoulder_horizontal: 0,
            shoulder_vertical: 0,
            elbow_vertical: 0,
            wrist_vertical: 0,
            wrist_rotation: 0,
            clamp: CLAMP_REST_DEG,
        }
    }
}

impl Pose {
    /// The joints which move the clamp tip in the vertical plane.
    pub fn vertical(&self) -> VerticalPose {
        VerticalPose::new(self.shoulder_vertical, self.elbow_vertical, self.wrist_vertical)
    }
}
