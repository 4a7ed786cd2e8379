//! Transport between the pose producer, the estimator and downstream consumers.

pub mod pose_file;
pub mod sample;
pub mod shared;
pub mod sink;

pub use pose_file::{write_latest_pose, FilePoseStore, PoseRecord};
pub use sample::{FreshnessToken, ImageRef, LatestSampleStore, Sample};
pub use shared::SharedSampleStore;
pub use sink::{read_record, AlignmentSink, LatestRecordSlot, YamlFileSink};
