//! Estimator configuration.
//!
//! Every field has a default, so a YAML file only lists what it changes.
//!
//! ```yaml
//! estimate_interval_s: 0.1
//! pose_jump_threshold: 1.0
//! down_axis: [0.0, 0.0, 1.0]
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::estimation::pose_jump::DEFAULT_POSE_JUMP_THRESHOLD;
use crate::geometry::{DEFAULT_ALIGNMENT_TOLERANCE, GravityAligner};

/// Tunables of the estimation loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorConfig {
    /// Minimum time between two estimation cycles (seconds).
    pub estimate_interval_s: f64,
    /// Sleep between loop ticks (seconds).
    pub tick_interval_s: f64,
    /// Sleep between polls while waiting for the first sample (seconds).
    pub first_sample_backoff_s: f64,
    /// Translation delta above which a pose jump is reported.
    pub pose_jump_threshold: f64,
    /// Canonical down axis gravity is aligned to.
    pub down_axis: [f64; 3],
    /// Tolerance for the already-aligned and parallel checks.
    pub alignment_tolerance: f64,
    /// Extra attempts on a sample whose cycle failed, before waiting for new data.
    pub max_sample_retries: u32,
    /// Width the image is resized to before inference.
    pub input_width: u32,
    /// Height the image is resized to before inference.
    pub input_height: u32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            estimate_interval_s: 0.1,
            tick_interval_s: 0.1,
            first_sample_backoff_s: 0.5,
            pose_jump_threshold: DEFAULT_POSE_JUMP_THRESHOLD,
            down_axis: [0.0, 0.0, 1.0],
            alignment_tolerance: DEFAULT_ALIGNMENT_TOLERANCE,
            max_sample_retries: 0,
            input_width: 640,
            input_height: 480,
        }
    }
}

impl EstimatorConfig {
    /// Load from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let config: Self = serde_yaml::from_reader(file)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("estimate_interval_s", self.estimate_interval_s),
            ("tick_interval_s", self.tick_interval_s),
            ("first_sample_backoff_s", self.first_sample_backoff_s),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                bail!("{name} must be a non-negative number of seconds, got {value}");
            }
        }
        if self.tick_interval_s == 0.0 || self.first_sample_backoff_s == 0.0 {
            bail!("tick_interval_s and first_sample_backoff_s must be positive");
        }
        if !(self.pose_jump_threshold.is_finite() && self.pose_jump_threshold >= 0.0) {
            bail!("pose_jump_threshold must be non-negative, got {}", self.pose_jump_threshold);
        }
        if self.input_width == 0 || self.input_height == 0 {
            bail!(
                "input size must be non-zero, got {}x{}",
                self.input_width,
                self.input_height
            );
        }
        self.aligner()?;
        Ok(())
    }

    pub fn estimate_interval(&self) -> Duration {
        Duration::from_secs_f64(self.estimate_interval_s)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(self.tick_interval_s)
    }

    pub fn first_sample_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.first_sample_backoff_s)
    }

    pub fn down_axis(&self) -> Vector3<f64> {
        Vector3::from(self.down_axis)
    }

    /// Aligner for the configured down axis and tolerance.
    pub fn aligner(&self) -> Result<GravityAligner> {
        GravityAligner::new(self.down_axis(), self.alignment_tolerance)
            .context("Invalid down_axis / alignment_tolerance")
    }
}

/// File names inside the exchange directory shared with the pose producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub info_dir: PathBuf,
    pub pose_file: String,
    pub record_file: String,
}

impl StoreLayout {
    pub const DEFAULT_POSE_FILE: &'static str = "latest_pose.json";
    pub const DEFAULT_RECORD_FILE: &'static str = "rotation_matrices.yaml";

    pub fn new(info_dir: impl Into<PathBuf>) -> Self {
        Self {
            info_dir: info_dir.into(),
            pose_file: Self::DEFAULT_POSE_FILE.to_string(),
            record_file: Self::DEFAULT_RECORD_FILE.to_string(),
        }
    }

    pub fn pose_path(&self) -> PathBuf {
        self.info_dir.join(&self.pose_file)
    }

    pub fn record_path(&self) -> PathBuf {
        self.info_dir.join(&self.record_file)
    }

    /// Create the exchange directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.info_dir)
            .with_context(|| format!("Failed to create {}", self.info_dir.display()))
    }
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self::new("GE_information")
    }
}
