//! Filesystem transport for the latest (image, pose) pair.
//!
//! The pose producer keeps overwriting two files in a shared exchange directory:
//! the newest camera image and a small JSON record describing the pose at which
//! it was taken:
//!
//! ```json
//! {
//!   "R_cw": [[1, 0, 0], [0, 1, 0], [0, 0, 1]],
//!   "t_cw": [0.0, 0.0, 0.0],
//!   "timestamp": 1712345678.25,
//!   "frame_id": 1042,
//!   "image_path": "/tmp/GE_information/latest_img.png"
//! }
//! ```
//!
//! The modification time of the JSON file is the freshness token.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, bail};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GravityError, Result};
use crate::geometry::frames::POSE_ROTATION_TOLERANCE;
use crate::geometry::Pose;

use super::sample::{FreshnessToken, ImageRef, LatestSampleStore, Sample};

/// On-disk layout of the pose record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseRecord {
    #[serde(rename = "R_cw")]
    pub r_cw: [[f64; 3]; 3],
    pub t_cw: [f64; 3],
    pub timestamp: f64,
    #[serde(default)]
    pub frame_id: i64,
    #[serde(default)]
    pub image_path: Option<PathBuf>,
}

impl PoseRecord {
    pub fn from_pose(pose: &Pose, image_path: impl Into<PathBuf>) -> Self {
        Self {
            r_cw: matrix_to_rows(&pose.r_cw),
            t_cw: [pose.t_cw.x, pose.t_cw.y, pose.t_cw.z],
            timestamp: pose.timestamp,
            frame_id: pose.frame_id,
            image_path: Some(image_path.into()),
        }
    }

    pub fn to_pose(&self) -> Pose {
        Pose::new(
            rows_to_matrix(&self.r_cw),
            Vector3::from(self.t_cw),
            self.timestamp,
            self.frame_id,
        )
    }
}

/// Row-major nested array, the layout used by every file this crate reads or writes.
pub fn matrix_to_rows(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

pub fn rows_to_matrix(rows: &[[f64; 3]; 3]) -> Matrix3<f64> {
    Matrix3::new(
        rows[0][0], rows[0][1], rows[0][2],
        rows[1][0], rows[1][1], rows[1][2],
        rows[2][0], rows[2][1], rows[2][2],
    )
}

/// Reads the newest sample from a pose JSON file.
#[derive(Debug, Clone)]
pub struct FilePoseStore {
    pose_path: PathBuf,
}

impl FilePoseStore {
    pub fn new(pose_path: impl Into<PathBuf>) -> Self {
        Self {
            pose_path: pose_path.into(),
        }
    }

    pub fn pose_path(&self) -> &Path {
        &self.pose_path
    }

    fn read_record(&self) -> anyhow::Result<PoseRecord> {
        let text = fs::read_to_string(&self.pose_path)
            .with_context(|| format!("Failed to read {}", self.pose_path.display()))?;
        let record: PoseRecord = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse {}", self.pose_path.display()))?;
        Ok(record)
    }

    fn freshness(&self) -> anyhow::Result<FreshnessToken> {
        let modified = fs::metadata(&self.pose_path)
            .and_then(|m| m.modified())
            .with_context(|| format!("No modification time for {}", self.pose_path.display()))?;
        let since_epoch = modified
            .duration_since(UNIX_EPOCH)
            .context("Pose file modification time is before the epoch")?;
        Ok(FreshnessToken(since_epoch.as_nanos()))
    }
}

impl LatestSampleStore for FilePoseStore {
    fn latest(&self) -> Result<Option<Sample>> {
        if !self.pose_path.exists() {
            return Ok(None);
        }

        // Token first: a rewrite racing with the read yields a newer token next tick.
        let freshness = self
            .freshness()
            .map_err(|e| GravityError::SampleUnavailable(format!("{e:#}")))?;
        let record = self
            .read_record()
            .map_err(|e| GravityError::SampleUnavailable(format!("{e:#}")))?;

        let Some(image_path) = record.image_path.clone() else {
            warn!(pose_file = %self.pose_path.display(), "Pose record has no image_path");
            return Ok(None);
        };
        if !image_path.is_file() {
            warn!(image = %image_path.display(), "Image referenced by pose record does not exist");
            return Ok(None);
        }

        let pose = record.to_pose();
        if !pose.is_well_formed(POSE_ROTATION_TOLERANCE) {
            return Err(GravityError::SampleUnavailable(format!(
                "frame {}: R_cw is not a rotation matrix",
                pose.frame_id
            )));
        }

        Ok(Some(Sample {
            image: ImageRef::Path(image_path),
            pose,
            freshness,
        }))
    }

    fn describe(&self) -> String {
        format!("pose file {}", self.pose_path.display())
    }
}

/// Atomically replace `path` with `bytes` (temp file in the same directory, then rename).
pub fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let Some(file_name) = path.file_name() else {
        bail!("{} has no file name", path.display());
    };
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    {
        let mut file = fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("Failed to flush {}", tmp_path.display()))?;
    }

    fs::rename(&tmp_path, path).with_context(|| {
        format!("Failed to move {} into place at {}", tmp_path.display(), path.display())
    })?;
    Ok(())
}

/// Producer side: publish a pose record for `image_path` at `pose_path`.
pub fn write_latest_pose(pose_path: &Path, pose: &Pose, image_path: &Path) -> anyhow::Result<()> {
    let record = PoseRecord::from_pose(pose, image_path);
    let json = serde_json::to_string_pretty(&record)?;
    write_atomic(pose_path, json.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::{Rgb, RgbImage};

    fn write_image(dir: &Path) -> PathBuf {
        let path = dir.join("latest_img.png");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(&path).unwrap();
        path
    }

    #[test]
    fn test_missing_pose_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePoseStore::new(dir.path().join("latest_pose.json"));
        assert!(store.latest().unwrap().is_none());
    }

    #[test]
    fn test_reads_pose_written_by_producer() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_image(dir.path());
        let pose_path = dir.path().join("latest_pose.json");
        let pose = Pose::from_translation(Vector3::new(0.5, -1.0, 2.0), 12.5, 7);
        write_latest_pose(&pose_path, &pose, &image_path).unwrap();

        let store = FilePoseStore::new(&pose_path);
        let sample = store.latest().unwrap().expect("sample");
        assert_eq!(sample.pose.frame_id, 7);
        assert_relative_eq!(sample.pose.timestamp, 12.5);
        assert_relative_eq!(sample.pose.t_cw, pose.t_cw);
        assert_eq!(sample.image.path(), Some(image_path.as_path()));

        // Unchanged file, unchanged token
        let again = store.latest().unwrap().expect("sample");
        assert_eq!(again.freshness, sample.freshness);
    }

    #[test]
    fn test_frame_id_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_image(dir.path());
        let pose_path = dir.path().join("latest_pose.json");
        let json = format!(
            r#"{{"R_cw": [[1,0,0],[0,1,0],[0,0,1]], "t_cw": [0,0,0], "timestamp": 3.0, "image_path": {:?}}}"#,
            image_path.to_str().unwrap()
        );
        fs::write(&pose_path, json).unwrap();

        let sample = FilePoseStore::new(&pose_path).latest().unwrap().expect("sample");
        assert_eq!(sample.pose.frame_id, 0);
    }

    #[test]
    fn test_missing_image_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let pose_path = dir.path().join("latest_pose.json");
        let pose = Pose::from_translation(Vector3::zeros(), 0.0, 1);
        write_latest_pose(&pose_path, &pose, &dir.path().join("gone.png")).unwrap();

        assert!(FilePoseStore::new(&pose_path).latest().unwrap().is_none());
    }

    #[test]
    fn test_malformed_json_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let pose_path = dir.path().join("latest_pose.json");
        fs::write(&pose_path, "{ not json").unwrap();

        let err = FilePoseStore::new(&pose_path).latest().unwrap_err();
        assert!(matches!(err, GravityError::SampleUnavailable(_)));
    }

    #[test]
    fn test_non_rotation_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let image_path = write_image(dir.path());
        let pose_path = dir.path().join("latest_pose.json");
        let mut pose = Pose::from_translation(Vector3::zeros(), 0.0, 3);
        pose.r_cw *= 2.0;
        write_latest_pose(&pose_path, &pose, &image_path).unwrap();

        let err = FilePoseStore::new(&pose_path).latest().unwrap_err();
        assert!(err.to_string().contains("frame 3"));
    }

    #[test]
    fn test_write_atomic_replaces_content_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("out.txt.tmp").exists());
    }

    #[test]
    fn test_matrix_rows_are_row_major() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        let rows = matrix_to_rows(&m);
        assert_eq!(rows[0], [1.0, 2.0, 3.0]);
        assert_eq!(rows_to_matrix(&rows), m);
    }
}
