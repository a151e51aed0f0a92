//! # Collision predictor
//!
//! Forward kinematics of the arm in its vertical plane, used to refuse vertical moves which would
//! drive the clamp into the ground or swing it through the arm's own base.
//!
//! The model is a side profile: the shoulder sits `base_height_m` above the ground and the
//! shoulder, elbow and clamp links are chained at the shoulder, elbow and wrist vertical angles.
//! Angles are measured from the vertical, so an arm with all joints at zero points straight up.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

pub use params::Params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The vertical joint angles of the arm.
///
/// Units: degrees
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerticalPose {
    pub shoulder_deg: i32,
    pub elbow_deg: i32,
    pub wrist_deg: i32,
}

/// Predicts whether moving between two vertical poses is unsafe.
#[derive(Debug, Clone, Default)]
pub struct CollisionPredictor {
    params: Params,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VerticalPose {
    pub fn new(shoulder_deg: i32, elbow_deg: i32, wrist_deg: i32) -> Self {
        Self {
            shoulder_deg,
            elbow_deg,
            wrist_deg,
        }
    }

    /// Cumulative absolute angles of the three links.
    ///
    /// Units: radians
    fn link_angles_rad(&self) -> [f64; 3] {
        let sh = self.shoulder_deg as f64;
        let el = sh + self.elbow_deg as f64;
        let wr = el + self.wrist_deg as f64;

        [sh.to_radians(), el.to_radians(), wr.to_radians()]
    }
}

impl CollisionPredictor {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Horizontal distance of the clamp tip from the shoulder axis. Positive values are in front
    /// of the arm.
    ///
    /// Units: meters
    pub fn horizontal_m(&self, pose: &VerticalPose) -> f64 {
        let [sh, el, wr] = pose.link_angles_rad();

        self.params.shoulder_length_m * sh.sin()
            + self.params.elbow_length_m * el.sin()
            + self.params.clamp_length_m * wr.sin()
    }

    /// Height of the clamp tip above the ground plane.
    ///
    /// Units: meters
    pub fn vertical_m(&self, pose: &VerticalPose) -> f64 {
        let [sh, el, wr] = pose.link_angles_rad();

        self.params.base_height_m
            + self.params.shoulder_length_m * sh.cos()
            + self.params.elbow_length_m * el.cos()
            + self.params.clamp_length_m * wr.cos()
    }

    /// Returns true if moving from `from` to `to` is predicted to cause a collision.
    ///
    /// A target with the tip at or below the ground plane always collides. Above the plane but
    /// below the shoulder, the tip may not cross from one side of the base to the other.
    pub fn collision(&self, from: &VerticalPose, to: &VerticalPose) -> bool {
        let ver = self.vertical_m(to);

        if ver <= 0.0 {
            return true;
        }

        if ver >= self.params.base_height_m {
            return false;
        }

        let hor = self.horizontal_m(to);
        let prev = self.horizontal_m(from);

        let same_side = (hor >= 0.0 && prev >= 0.0) || (hor < 0.0 && prev < 0.0);

        !same_side
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_kinematics() {
        let cp = CollisionPredictor::default();

        let upright = VerticalPose::default();
        assert!((cp.vertical_m(&upright) - 0.495).abs() < EPS);
        assert!(cp.horizontal_m(&upright).abs() < EPS);

        let folded = VerticalPose::new(90, 90, 0);
        assert!((cp.vertical_m(&folded) + 0.12).abs() < EPS);
        assert!((cp.horizontal_m(&folded) - 0.105).abs() < EPS);
    }

    #[test]
    fn test_no_move_is_safe() {
        let cp = CollisionPredictor::default();
        let p = VerticalPose::new(0, 0, 0);
        assert!(!cp.collision(&p, &p));
    }

    #[test]
    fn test_below_plane_collides() {
        let cp = CollisionPredictor::default();
        assert!(cp.collision(&VerticalPose::new(0, 0, 0), &VerticalPose::new(90, 90, 0)));
    }

    #[test]
    fn test_side_flip_below_shoulder() {
        let cp = CollisionPredictor::default();

        let from = VerticalPose::new(-90, -90, 90);
        let to = VerticalPose::new(90, 90, -90);

        let ver = cp.vertical_m(&to);
        assert!(ver > 0.0 && ver < cp.params().base_height_m);
        assert!(cp.horizontal_m(&from) < 0.0);
        assert!(cp.horizontal_m(&to) > 0.0);

        assert!(cp.collision(&from, &to));

        // Same target from the front side is fine
        assert!(!cp.collision(&VerticalPose::new(0, 0, 0), &to));
    }

    #[test]
    fn test_custom_geometry() {
        let cp = CollisionPredictor::new(Params {
            base_height_m: 1.0,
            ..Params::default()
        });

        // The folded pose no longer reaches the ground with a tall base
        assert!(!cp.collision(&VerticalPose::default(), &VerticalPose::new(90, 90, 0)));
    }
}
