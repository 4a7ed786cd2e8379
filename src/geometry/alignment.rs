//! Closed-form alignment of a world-frame gravity vector onto a fixed "down" axis.
//!
//! The rotation is built from the axis `g × d` and the angle between `g` and
//! `d` using Rodrigues' formula. Two degenerate cases are handled explicitly:
//!
//! - `g ≈ d`: identity.
//! - `g ≈ -d`: half turn about an axis perpendicular to `d`.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Vector3};
use tracing::debug;

use crate::error::{GravityError, Result};

use super::so3::rodrigues;

/// Default canonical down axis.
pub const DEFAULT_DOWN_AXIS: Vector3<f64> = Vector3::new(0.0, 0.0, 1.0);

/// Default tolerance for the aligned / parallel checks.
pub const DEFAULT_ALIGNMENT_TOLERANCE: f64 = 1e-6;

/// Norm below which a gravity vector has no usable direction.
pub const MIN_GRAVITY_NORM: f64 = 1e-9;

/// Which branch produced an alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignmentCase {
    /// Input already pointed along the down axis.
    AlreadyAligned,
    /// Input pointed opposite to the down axis.
    Antiparallel,
    /// Any other direction.
    General,
}

/// Result of aligning a gravity vector.
#[derive(Debug, Clone, Copy)]
pub struct Alignment {
    /// Rotation mapping the normalized gravity onto the down axis.
    pub rotation: Matrix3<f64>,
    /// Unit rotation axis (zero for the identity case).
    pub axis: Vector3<f64>,
    /// Rotation angle in radians.
    pub angle: f64,
    pub case: AlignmentCase,
}

/// Computes rotations that bring a gravity vector onto a fixed down axis.
#[derive(Debug, Clone, Copy)]
pub struct GravityAligner {
    down_axis: Vector3<f64>,
    tolerance: f64,
}

impl GravityAligner {
    /// Create an aligner for `down_axis` (normalized here).
    pub fn new(down_axis: Vector3<f64>, tolerance: f64) -> Result<Self> {
        let norm = down_axis.norm();
        if !norm.is_finite() || norm < MIN_GRAVITY_NORM {
            return Err(GravityError::InvalidInput(format!(
                "down axis {:?} has no direction",
                down_axis.as_slice()
            )));
        }
        if !(tolerance > 0.0) {
            return Err(GravityError::InvalidInput(format!(
                "alignment tolerance must be positive, got {tolerance}"
            )));
        }
        Ok(Self {
            down_axis: down_axis / norm,
            tolerance,
        })
    }

    pub fn down_axis(&self) -> Vector3<f64> {
        self.down_axis
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// Rotation `R` with `R · normalize(g_w) = down_axis`.
    pub fn rotation(&self, g_w: &Vector3<f64>) -> Result<Matrix3<f64>> {
        self.align(g_w).map(|a| a.rotation)
    }

    /// Full alignment result, including axis, angle and branch taken.
    pub fn align(&self, g_w: &Vector3<f64>) -> Result<Alignment> {
        let norm = g_w.norm();
        if !norm.is_finite() || norm < MIN_GRAVITY_NORM {
            return Err(GravityError::InvalidInput(format!(
                "gravity vector {:?} has no direction",
                g_w.as_slice()
            )));
        }
        let g = g_w / norm;
        let d = self.down_axis;

        if (g - d).amax() <= self.tolerance {
            debug!("gravity already aligned with down axis");
            return Ok(Alignment {
                rotation: Matrix3::identity(),
                axis: Vector3::zeros(),
                angle: 0.0,
                case: AlignmentCase::AlreadyAligned,
            });
        }

        let cross = g.cross(&d);
        let cross_norm = cross.norm();

        let (axis, angle, case) = if cross_norm < self.tolerance {
            if g.dot(&d) >= 0.0 {
                return Ok(Alignment {
                    rotation: Matrix3::identity(),
                    axis: Vector3::zeros(),
                    angle: 0.0,
                    case: AlignmentCase::AlreadyAligned,
                });
            }
            (perpendicular_axis(&d), PI, AlignmentCase::Antiparallel)
        } else {
            let angle = g.dot(&d).clamp(-1.0, 1.0).acos();
            (cross / cross_norm, angle, AlignmentCase::General)
        };

        let rotation = rodrigues(&axis, angle);
        debug!(
            angle_deg = angle.to_degrees(),
            axis = ?[axis.x, axis.y, axis.z],
            "computed alignment rotation"
        );

        Ok(Alignment {
            rotation,
            axis,
            angle,
            case,
        })
    }

    /// ‖R · normalize(g_w) − down_axis‖, the residual of an alignment.
    pub fn residual(&self, rotation: &Matrix3<f64>, g_w: &Vector3<f64>) -> f64 {
        let norm = g_w.norm();
        if norm < MIN_GRAVITY_NORM {
            return f64::NAN;
        }
        (rotation * (g_w / norm) - self.down_axis).norm()
    }
}

impl Default for GravityAligner {
    fn default() -> Self {
        Self {
            down_axis: DEFAULT_DOWN_AXIS,
            tolerance: DEFAULT_ALIGNMENT_TOLERANCE,
        }
    }
}

/// Rotation aligning `g_w` onto the default down axis (0, 0, 1).
pub fn align_to_down(g_w: &Vector3<f64>) -> Result<Matrix3<f64>> {
    GravityAligner::default().rotation(g_w)
}

/// Unit axis perpendicular to `d` for the half-turn case.
///
/// Starts from x unless `d` is mostly along x, in which case z is used, then
/// removes the component along `d`. For the default down axis this is exactly x.
fn perpendicular_axis(d: &Vector3<f64>) -> Vector3<f64> {
    let candidate = if d.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::z()
    };
    let projected = candidate - d * candidate.dot(d);
    projected.normalize()
}
