//! Camera poses and camera ↔ world frame transforms.
//!
//! # Conventions
//!
//! Poses come from the upstream tracker as `T_cw` (world → camera):
//!
//! ```text
//! p_c = R_cw · p_w + t_cw
//! ```
//!
//! Directions (such as gravity) ignore the translation, so a camera-frame
//! direction is brought into the world frame with `R_wc = R_cwᵀ`:
//!
//! ```text
//! g_w = R_cwᵀ · g_c
//! ```
//!
//! Gravity vectors carry no frame tag of their own. Callers keep track of
//! whether a vector is `g_c` (camera) or `g_w` (world) by where it sits in the
//! pipeline.

use nalgebra::{Matrix3, Vector3};

use super::so3::is_rotation;

/// Tolerance used when checking that an incoming `R_cw` is a rotation.
pub const POSE_ROTATION_TOLERANCE: f64 = 1e-3;

/// Camera pose as reported by the pose producer.
#[derive(Debug, Clone, PartialEq)]
pub struct Pose {
    /// Rotation world → camera.
    pub r_cw: Matrix3<f64>,
    /// Translation world → camera.
    pub t_cw: Vector3<f64>,
    /// Producer timestamp (seconds).
    pub timestamp: f64,
    pub frame_id: i64,
}

impl Pose {
    pub fn new(r_cw: Matrix3<f64>, t_cw: Vector3<f64>, timestamp: f64, frame_id: i64) -> Self {
        Self {
            r_cw,
            t_cw,
            timestamp,
            frame_id,
        }
    }

    /// Identity rotation at `t_cw`.
    pub fn from_translation(t_cw: Vector3<f64>, timestamp: f64, frame_id: i64) -> Self {
        Self::new(Matrix3::identity(), t_cw, timestamp, frame_id)
    }

    /// Rotation camera → world.
    pub fn r_wc(&self) -> Matrix3<f64> {
        self.r_cw.transpose()
    }

    /// Whether the pose is finite and `R_cw` is a proper rotation within `tolerance`.
    pub fn is_well_formed(&self, tolerance: f64) -> bool {
        self.r_cw.iter().all(|v| v.is_finite())
            && self.t_cw.iter().all(|v| v.is_finite())
            && is_rotation(&self.r_cw, tolerance)
    }

    /// Express a camera-frame direction in the world frame.
    pub fn camera_to_world(&self, v_c: &Vector3<f64>) -> Vector3<f64> {
        camera_to_world(v_c, &self.r_cw)
    }
}

/// `R_cwᵀ · v_c`: camera-frame direction to world frame.
#[inline]
pub fn camera_to_world(v_c: &Vector3<f64>, r_cw: &Matrix3<f64>) -> Vector3<f64> {
    r_cw.transpose() * v_c
}

/// `R_cw · v_w`: world-frame direction to camera frame.
#[inline]
pub fn world_to_camera(v_w: &Vector3<f64>, r_cw: &Matrix3<f64>) -> Vector3<f64> {
    r_cw * v_w
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::so3::rodrigues;
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_pose_keeps_vector() {
        let g_c = Vector3::new(0.0, 0.1, 0.995);
        assert_relative_eq!(camera_to_world(&g_c, &Matrix3::identity()), g_c);
    }

    #[test]
    fn test_round_trip_through_pose() {
        let r_cw = rodrigues(&Vector3::new(1.0, -2.0, 0.5).normalize(), 0.7);
        let g_c = Vector3::new(0.2, 0.9, -0.1);

        let g_w = camera_to_world(&g_c, &r_cw);
        assert_relative_eq!(world_to_camera(&g_w, &r_cw), g_c, epsilon = 1e-12);
        assert_relative_eq!(g_w.norm(), g_c.norm(), epsilon = 1e-12);
    }

    #[test]
    fn test_quarter_turn_about_x() {
        // Camera rotated so that world +y appears as camera +z
        let r_cw = rodrigues(&Vector3::x(), std::f64::consts::FRAC_PI_2);
        let pose = Pose::new(r_cw, Vector3::zeros(), 0.0, 1);

        assert_relative_eq!(pose.camera_to_world(&Vector3::z()), Vector3::y(), epsilon = 1e-12);
        assert_relative_eq!(pose.r_wc() * pose.r_cw, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_rotation_detected() {
        let mut pose = Pose::from_translation(Vector3::zeros(), 0.0, 0);
        assert!(pose.is_well_formed(POSE_ROTATION_TOLERANCE));

        pose.r_cw[(0, 0)] = 2.0;
        assert!(!pose.is_well_formed(POSE_ROTATION_TOLERANCE));

        pose.r_cw = Matrix3::identity();
        pose.t_cw.x = f64::INFINITY;
        assert!(!pose.is_well_formed(POSE_ROTATION_TOLERANCE));
    }
}
