//! The estimation loop.
//!
//! Each tick the poller:
//! 1. Waits until `estimate_interval` has passed since the last cycle
//! 2. Reads the newest sample from the store
//! 3. Skips it unless its freshness token is newer than the last processed one
//! 4. Runs gravity inference on the image (camera frame)
//! 5. Rotates the estimate into the world frame with the sample's pose
//! 6. Checks for a pose jump (diagnostic only)
//! 7. Computes the alignment rotation and persists the record
//!
//! Only a fully successful cycle advances `last_process_time`, `last_pose` and
//! the freshness token. A failed cycle is logged and the loop keeps going.

use std::time::{Duration, Instant};

use anyhow::anyhow;
use nalgebra::Vector3;
use tracing::{debug, error, info, warn};

use crate::config::EstimatorConfig;
use crate::error::{GravityError, Result};
use crate::geometry::{AlignmentCase, GravityAligner, Pose, MIN_GRAVITY_NORM};
use crate::inference::GravityModel;
use crate::io::{AlignmentSink, FreshnessToken, LatestSampleStore, Sample};
use crate::system::ShutdownSignal;

use super::pose_jump::PoseJumpDetector;
use super::record::AlignmentRecord;
use super::state::PollerState;

/// What a single tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// Still waiting for the first usable sample.
    AwaitingFirstSample,
    /// Too soon since the last cycle.
    RateLimited,
    /// The store had nothing usable.
    NoSample,
    /// The newest sample was already processed (or already failed).
    Stale,
    /// A new alignment was computed and persisted.
    Estimated(EstimateSummary),
    /// The cycle failed; state was left unchanged.
    Failed(GravityError),
}

/// Summary of a successful cycle.
#[derive(Debug, Clone)]
pub struct EstimateSummary {
    pub frame_id: i64,
    pub freshness: FreshnessToken,
    pub pose_jump: bool,
    pub angle_rad: f64,
    pub case: AlignmentCase,
    pub alignment_error: f64,
}

/// Counters accumulated over the lifetime of a poller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    pub estimates: u64,
    pub failures: u64,
    pub no_sample: u64,
    pub stale_skipped: u64,
    pub pose_jumps: u64,
}

/// Sample whose cycle failed, and how many times it failed.
#[derive(Debug, Clone, Copy)]
struct FailedSample {
    freshness: FreshnessToken,
    attempts: u32,
}

/// Drives the estimation cycle over a sample store, a gravity model and a sink.
pub struct EstimationPoller {
    config: EstimatorConfig,
    aligner: GravityAligner,
    jump_detector: PoseJumpDetector,

    store: Box<dyn LatestSampleStore>,
    model: Box<dyn GravityModel>,
    sink: Box<dyn AlignmentSink>,

    state: PollerState,
    last_process_time: Option<Instant>,
    last_pose: Option<Pose>,
    last_freshness: Option<FreshnessToken>,
    failed: Option<FailedSample>,
    stats: PollerStats,
}

impl EstimationPoller {
    /// Create a poller. Fails if `config` does not validate.
    pub fn new(
        config: EstimatorConfig,
        store: Box<dyn LatestSampleStore>,
        model: Box<dyn GravityModel>,
        sink: Box<dyn AlignmentSink>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let aligner = config.aligner()?;
        let jump_detector = PoseJumpDetector::new(config.pose_jump_threshold);

        Ok(Self {
            config,
            aligner,
            jump_detector,
            store,
            model,
            sink,
            state: PollerState::default(),
            last_process_time: None,
            last_pose: None,
            last_freshness: None,
            failed: None,
            stats: PollerStats::default(),
        })
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn stats(&self) -> PollerStats {
        self.stats
    }

    pub fn last_pose(&self) -> Option<&Pose> {
        self.last_pose.as_ref()
    }

    pub fn last_freshness(&self) -> Option<FreshnessToken> {
        self.last_freshness
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Run ticks until `shutdown` is requested. Returns the final counters.
    pub fn run(&mut self, shutdown: &ShutdownSignal) -> PollerStats {
        info!(
            store = %self.store.describe(),
            sink = %self.sink.describe(),
            model = self.model.name(),
            interval_s = self.config.estimate_interval_s,
            "gravity estimation started, waiting for pose data"
        );

        while !shutdown.is_requested() {
            self.tick(Instant::now());
            if shutdown.wait(self.sleep_interval()) {
                break;
            }
        }

        self.state = PollerState::Stopped;
        info!(
            estimates = self.stats.estimates,
            failures = self.stats.failures,
            pose_jumps = self.stats.pose_jumps,
            "gravity estimation stopped"
        );
        self.stats
    }

    /// Time to sleep before the next tick in the current state.
    pub fn sleep_interval(&self) -> Duration {
        match self.state {
            PollerState::AwaitingFirstSample => self.config.first_sample_backoff(),
            PollerState::Running | PollerState::Stopped => self.config.tick_interval(),
        }
    }

    /// Advance the loop by one tick at time `now`.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        match self.state {
            PollerState::AwaitingFirstSample => {
                if !self.first_sample_available() {
                    return TickOutcome::AwaitingFirstSample;
                }
                self.state = PollerState::Running;
                self.running_tick(now)
            }
            PollerState::Running | PollerState::Stopped => self.running_tick(now),
        }
    }

    fn first_sample_available(&self) -> bool {
        match self.store.latest() {
            Ok(Some(sample)) if sample.image.is_resolvable() => {
                info!(frame_id = sample.pose.frame_id, "found pose data");
                true
            }
            Ok(_) => false,
            Err(e) => {
                debug!(error = %e, "no usable sample yet");
                false
            }
        }
    }

    fn running_tick(&mut self, now: Instant) -> TickOutcome {
        if let Some(last) = self.last_process_time {
            if now.saturating_duration_since(last) < self.config.estimate_interval() {
                return TickOutcome::RateLimited;
            }
        }

        let sample = match self.store.latest() {
            Ok(Some(sample)) => sample,
            Ok(None) => {
                warn!("no pose data available, skipping this estimate");
                return self.no_sample(now);
            }
            Err(e) => {
                warn!(error = %e, "could not read latest sample, skipping this estimate");
                return self.no_sample(now);
            }
        };

        if !sample.freshness.is_newer_than(self.last_freshness) || self.exhausted(&sample) {
            self.stats.stale_skipped += 1;
            return TickOutcome::Stale;
        }

        let frame_id = sample.pose.frame_id;
        info!(frame_id, "new data detected, estimating gravity");

        match self.estimate(&sample) {
            Ok(summary) => {
                self.last_process_time = Some(now);
                self.last_pose = Some(sample.pose);
                self.last_freshness = Some(sample.freshness);
                self.failed = None;
                self.stats.estimates += 1;
                if summary.pose_jump {
                    self.stats.pose_jumps += 1;
                }
                TickOutcome::Estimated(summary)
            }
            Err(e) => {
                error!(frame_id, error = %e, "gravity estimation failed");
                self.record_failure(sample.freshness);
                self.stats.failures += 1;
                TickOutcome::Failed(e)
            }
        }
    }

    fn no_sample(&mut self, now: Instant) -> TickOutcome {
        self.last_process_time = Some(now);
        self.stats.no_sample += 1;
        TickOutcome::NoSample
    }

    /// Whether `sample` already failed more often than retries allow.
    fn exhausted(&self, sample: &Sample) -> bool {
        self.failed.is_some_and(|f| {
            f.freshness == sample.freshness && f.attempts > self.config.max_sample_retries
        })
    }

    fn record_failure(&mut self, freshness: FreshnessToken) {
        self.failed = match self.failed {
            Some(f) if f.freshness == freshness => Some(FailedSample {
                freshness,
                attempts: f.attempts + 1,
            }),
            _ => Some(FailedSample {
                freshness,
                attempts: 1,
            }),
        };
    }

    /// One full cycle on `sample`. Does not touch the rolling state.
    fn estimate(&mut self, sample: &Sample) -> Result<EstimateSummary> {
        let pose = &sample.pose;
        let frame_id = pose.frame_id;

        let image = sample
            .image
            .load(self.config.input_width, self.config.input_height)?;

        let raw = self
            .model
            .infer_gravity(&image)
            .map_err(|source| GravityError::InferenceFailure { frame_id, source })?;
        if !raw.iter().all(|v| v.is_finite()) {
            return Err(GravityError::InferenceFailure {
                frame_id,
                source: anyhow!("model returned non-finite gravity {}", fmt_vec(&raw)),
            });
        }
        // Downstream vectors and the record are unit length
        let g_c = raw.try_normalize(MIN_GRAVITY_NORM).ok_or_else(|| {
            GravityError::InvalidInput(format!(
                "model returned gravity {} with no direction",
                fmt_vec(&raw)
            ))
        })?;
        debug!(frame_id, g_c = %fmt_vec(&g_c), norm = raw.norm(), "camera-frame gravity");

        let g_w = pose.camera_to_world(&g_c);
        debug!(frame_id, g_w = %fmt_vec(&g_w), "world-frame gravity");

        let previous = self.last_pose.as_ref();
        let pose_jump = self.jump_detector.is_jump(pose, previous);
        if pose_jump {
            match PoseJumpDetector::translation_delta(pose, previous) {
                Some(delta) => warn!(
                    frame_id,
                    delta = %format!("{delta:.3}"),
                    threshold = self.jump_detector.threshold(),
                    "pose jump detected, recomputing alignment"
                ),
                None => info!(frame_id, "no previous pose, computing initial alignment"),
            }
        }

        let alignment = self.aligner.align(&g_w)?;
        let record =
            AlignmentRecord::new(pose, g_c, g_w, &alignment, &self.aligner, pose_jump);
        debug!(
            frame_id,
            g_aligned = %fmt_vec(&record.g_aligned),
            error = record.alignment_error,
            "aligned gravity"
        );

        self.sink
            .persist(&record)
            .map_err(|source| GravityError::SinkWriteFailure { frame_id, source })?;

        info!(
            frame_id,
            angle_deg = %format!("{:.2}", alignment.angle.to_degrees()),
            alignment_error = %format!("{:.6}", record.alignment_error),
            "gravity alignment updated"
        );

        Ok(EstimateSummary {
            frame_id,
            freshness: sample.freshness,
            pose_jump,
            angle_rad: alignment.angle,
            case: alignment.case,
            alignment_error: record.alignment_error,
        })
    }
}

fn fmt_vec(v: &Vector3<f64>) -> String {
    format!("[{:.4}, {:.4}, {:.4}]", v.x, v.y, v.z)
}
