//! Gravity estimation: the polling loop, pose-jump diagnostics and the persisted record.

pub mod poller;
pub mod pose_jump;
pub mod record;
pub mod state;

pub use poller::{EstimateSummary, EstimationPoller, PollerStats, TickOutcome};
pub use pose_jump::PoseJumpDetector;
pub use record::AlignmentRecord;
pub use state::PollerState;
