//! The persisted result of one estimation cycle.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::geometry::{Alignment, GravityAligner, Pose};
use crate::io::pose_file::{matrix_to_rows, rows_to_matrix};

/// Alignment computed from one (image, pose) sample.
///
/// Written as a whole; every write replaces the previous record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "AlignmentRecordFile", from = "AlignmentRecordFile")]
pub struct AlignmentRecord {
    /// Rotation taking `g_w` onto the down axis.
    pub r_align: Matrix3<f64>,
    pub r_cw: Matrix3<f64>,
    pub r_wc: Matrix3<f64>,
    /// Unit gravity in the camera frame.
    pub g_c: Vector3<f64>,
    /// Unit gravity in the world frame.
    pub g_w: Vector3<f64>,
    /// `r_align · g_w`, the down axis up to `alignment_error`.
    pub g_aligned: Vector3<f64>,
    pub timestamp: f64,
    pub frame_id: i64,
    /// ‖g_aligned − down_axis‖.
    pub alignment_error: f64,
    /// Whether the pose jumped relative to the previous estimate.
    pub pose_jump: bool,
}

impl AlignmentRecord {
    /// `g_c` and `g_w` are expected to be unit length.
    pub fn new(
        pose: &Pose,
        g_c: Vector3<f64>,
        g_w: Vector3<f64>,
        alignment: &Alignment,
        aligner: &GravityAligner,
        pose_jump: bool,
    ) -> Self {
        let g_aligned = alignment.rotation * g_w;
        Self {
            r_align: alignment.rotation,
            r_cw: pose.r_cw,
            r_wc: pose.r_wc(),
            g_c,
            g_w,
            g_aligned,
            timestamp: pose.timestamp,
            frame_id: pose.frame_id,
            alignment_error: aligner.residual(&alignment.rotation, &g_w),
            pose_jump,
        }
    }
}

/// Field names and layout of the persisted file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AlignmentRecordFile {
    #[serde(rename = "R_align")]
    r_align: [[f64; 3]; 3],
    #[serde(rename = "R_cw")]
    r_cw: [[f64; 3]; 3],
    #[serde(rename = "R_wc")]
    r_wc: [[f64; 3]; 3],
    g_c: [f64; 3],
    g_w: [f64; 3],
    g_aligned: [f64; 3],
    timestamp: f64,
    #[serde(default)]
    frame_id: i64,
    #[serde(default)]
    alignment_error: f64,
    #[serde(default)]
    pose_jump: bool,
}

impl From<AlignmentRecord> for AlignmentRecordFile {
    fn from(r: AlignmentRecord) -> Self {
        Self {
            r_align: matrix_to_rows(&r.r_align),
            r_cw: matrix_to_rows(&r.r_cw),
            r_wc: matrix_to_rows(&r.r_wc),
            g_c: r.g_c.into(),
            g_w: r.g_w.into(),
            g_aligned: r.g_aligned.into(),
            timestamp: r.timestamp,
            frame_id: r.frame_id,
            alignment_error: r.alignment_error,
            pose_jump: r.pose_jump,
        }
    }
}

impl From<AlignmentRecordFile> for AlignmentRecord {
    fn from(f: AlignmentRecordFile) -> Self {
        Self {
            r_align: rows_to_matrix(&f.r_align),
            r_cw: rows_to_matrix(&f.r_cw),
            r_wc: rows_to_matrix(&f.r_wc),
            g_c: Vector3::from(f.g_c),
            g_w: Vector3::from(f.g_w),
            g_aligned: Vector3::from(f.g_aligned),
            timestamp: f.timestamp,
            frame_id: f.frame_id,
            alignment_error: f.alignment_error,
            pose_jump: f.pose_jump,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_record_from_identity_pose() {
        let aligner = GravityAligner::default();
        let pose = Pose::from_translation(Vector3::zeros(), 4.0, 11);
        let g_c = Vector3::new(0.0, 0.1, 0.995).normalize();
        let g_w = pose.camera_to_world(&g_c);
        let alignment = aligner.align(&g_w).unwrap();

        let record = AlignmentRecord::new(&pose, g_c, g_w, &alignment, &aligner, false);
        assert_eq!(record.frame_id, 11);
        assert_relative_eq!(record.g_w, g_c);
        assert_relative_eq!(record.r_wc, Matrix3::identity());
        assert_relative_eq!(record.g_aligned, Vector3::z(), epsilon = 1e-6);
        assert!(record.alignment_error < 1e-6);
        assert!((record.g_aligned - Vector3::z()).norm() <= record.alignment_error + 1e-12);
    }

    #[test]
    fn test_yaml_uses_downstream_field_names() {
        let aligner = GravityAligner::default();
        let pose = Pose::from_translation(Vector3::zeros(), 1.0, 2);
        let g = Vector3::new(0.0, 1.0, 0.0);
        let alignment = aligner.align(&g).unwrap();
        let record = AlignmentRecord::new(&pose, g, g, &alignment, &aligner, true);

        let yaml = serde_yaml::to_string(&record).unwrap();
        for key in ["R_align:", "R_cw:", "R_wc:", "g_c:", "g_w:", "g_aligned:", "frame_id:"] {
            assert!(yaml.contains(key), "missing {key} in\n{yaml}");
        }

        let parsed: AlignmentRecord = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.frame_id, 2);
        assert!(parsed.pose_jump);
        assert_relative_eq!(parsed.r_align, record.r_align, epsilon = 1e-12);
    }
}
