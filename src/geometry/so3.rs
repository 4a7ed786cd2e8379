//! SO(3) helpers used by the gravity aligner.
//!
//! Provides skew-symmetric matrix construction, Rodrigues' formula for an
//! axis-angle rotation, and a couple of checks used to validate poses and
//! alignment results.

use nalgebra::{Matrix3, Vector3};

/// Constructs the skew-symmetric matrix [v]× such that [v]× u = v × u.
///
/// ```text
/// [v]× = |  0   -v_z   v_y |
///        |  v_z   0   -v_x |
///        | -v_y  v_x    0  |
/// ```
#[inline]
pub fn skew(v: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -v.z, v.y,
        v.z, 0.0, -v.x,
        -v.y, v.x, 0.0,
    )
}

/// Rotation of `angle` radians about the unit vector `axis`.
///
/// ```text
/// R = I + sin θ [a]× + (1 - cos θ) [a]×²
/// ```
///
/// `axis` must already be normalized.
pub fn rodrigues(axis: &Vector3<f64>, angle: f64) -> Matrix3<f64> {
    let k = skew(axis);
    Matrix3::identity() + angle.sin() * k + (1.0 - angle.cos()) * (k * k)
}

/// Rotation angle of `r` in radians, in [0, π].
pub fn rotation_angle(r: &Matrix3<f64>) -> f64 {
    let cos_theta = ((r.trace() - 1.0) * 0.5).clamp(-1.0, 1.0);
    cos_theta.acos()
}

/// Whether `r` is orthonormal with determinant +1, within `tolerance`.
pub fn is_rotation(r: &Matrix3<f64>, tolerance: f64) -> bool {
    let gram_error = (r.transpose() * r - Matrix3::identity()).amax();
    gram_error <= tolerance && (r.determinant() - 1.0).abs() <= tolerance
}
