//! Destinations for the latest alignment record.
//!
//! Sinks hold a single slot: each write replaces the previous record and readers
//! never observe a partially written one.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use tracing::debug;

use crate::estimation::AlignmentRecord;

use super::pose_file::write_atomic;

/// Consumer-facing output of the estimator.
pub trait AlignmentSink: Send {
    /// Persist `record`, replacing whatever was stored before.
    fn persist(&mut self, record: &AlignmentRecord) -> anyhow::Result<()>;

    fn describe(&self) -> String;
}

/// Writes the record as YAML to a fixed path, atomically.
#[derive(Debug, Clone)]
pub struct YamlFileSink {
    path: PathBuf,
}

impl YamlFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlignmentSink for YamlFileSink {
    fn persist(&mut self, record: &AlignmentRecord) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(record).context("Failed to serialize alignment record")?;
        write_atomic(&self.path, yaml.as_bytes())?;
        debug!(path = %self.path.display(), frame_id = record.frame_id, "alignment record written");
        Ok(())
    }

    fn describe(&self) -> String {
        format!("YAML file {}", self.path.display())
    }
}

/// Load a record previously written by [`YamlFileSink`].
pub fn read_record(path: &Path) -> anyhow::Result<AlignmentRecord> {
    let file = fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let record = serde_yaml::from_reader(file)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(record)
}

#[derive(Debug, Default)]
struct SlotState {
    record: Option<AlignmentRecord>,
    writes: u64,
}

/// In-process single-slot sink; clones share the slot.
#[derive(Debug, Clone, Default)]
pub struct LatestRecordSlot {
    state: Arc<RwLock<SlotState>>,
}

impl LatestRecordSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<AlignmentRecord> {
        self.state.read().record.clone()
    }

    /// Number of records persisted so far.
    pub fn write_count(&self) -> u64 {
        self.state.read().writes
    }
}

impl AlignmentSink for LatestRecordSlot {
    fn persist(&mut self, record: &AlignmentRecord) -> anyhow::Result<()> {
        let mut state = self.state.write();
        state.record = Some(record.clone());
        state.writes += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "in-process record slot".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{GravityAligner, Pose};
    use approx::assert_relative_eq;
    use nalgebra::Vector3;

    fn record(frame_id: i64, g_c: Vector3<f64>) -> AlignmentRecord {
        let aligner = GravityAligner::default();
        let pose = Pose::from_translation(Vector3::zeros(), frame_id as f64 * 0.1, frame_id);
        let g_w = pose.camera_to_world(&g_c);
        let alignment = aligner.align(&g_w).unwrap();
        AlignmentRecord::new(&pose, g_c, g_w, &alignment, &aligner, false)
    }

    #[test]
    fn test_yaml_sink_overwrites_single_slot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rotation_matrices.yaml");
        let mut sink = YamlFileSink::new(&path);

        sink.persist(&record(1, Vector3::new(0.0, 0.1, 0.995))).unwrap();
        sink.persist(&record(2, Vector3::new(0.3, 0.0, 0.95))).unwrap();

        let stored = read_record(&path).unwrap();
        assert_eq!(stored.frame_id, 2);
        assert_relative_eq!(stored.g_c, Vector3::new(0.3, 0.0, 0.95));
        assert!(!dir.path().join("rotation_matrices.yaml.tmp").exists());
    }

    #[test]
    fn test_yaml_sink_reports_unwritable_location() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = YamlFileSink::new(dir.path().join("missing_dir").join("out.yaml"));
        assert!(sink.persist(&record(1, Vector3::z())).is_err());
    }

    #[test]
    fn test_slot_counts_writes() {
        let slot = LatestRecordSlot::new();
        let mut writer = slot.clone();
        assert!(slot.latest().is_none());

        writer.persist(&record(5, Vector3::z())).unwrap();
        writer.persist(&record(6, Vector3::z())).unwrap();
        assert_eq!(slot.write_count(), 2);
        assert_eq!(slot.latest().unwrap().frame_id, 6);
    }
}
