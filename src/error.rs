//! Error kinds of the estimation core.
//!
//! None of these is fatal to the estimator loop: a failing cycle is logged and
//! skipped, and the loop keeps polling until cancellation.

use thiserror::Error;

/// Errors produced while estimating and persisting a gravity alignment.
#[derive(Debug, Error)]
pub enum GravityError {
    /// Degenerate input, e.g. a zero gravity vector handed to the aligner.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The sample store has nothing usable, or the referenced image could not be resolved.
    #[error("sample unavailable: {0}")]
    SampleUnavailable(String),

    /// The gravity model failed on this frame.
    #[error("gravity inference failed for frame {frame_id}: {source:#}")]
    InferenceFailure {
        frame_id: i64,
        #[source]
        source: anyhow::Error,
    },

    /// The alignment record could not be persisted.
    #[error("failed to persist alignment for frame {frame_id}: {source:#}")]
    SinkWriteFailure {
        frame_id: i64,
        #[source]
        source: anyhow::Error,
    },
}

impl GravityError {
    /// Frame id the error refers to, if any.
    pub fn frame_id(&self) -> Option<i64> {
        match self {
            Self::InferenceFailure { frame_id, .. } | Self::SinkWriteFailure { frame_id, .. } => {
                Some(*frame_id)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, GravityError>;
