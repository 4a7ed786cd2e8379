//! Detection of discontinuities in the producer's pose stream.
//!
//! A large translation jump between consecutive estimates usually means the
//! upstream tracker re-initialized. The signal is diagnostic only: the
//! alignment is recomputed the same way whether or not a jump is reported.

use crate::geometry::Pose;

/// Default jump threshold, in the producer's translation units.
pub const DEFAULT_POSE_JUMP_THRESHOLD: f64 = 1.0;

/// Compares the current pose with the one used by the previous estimate.
#[derive(Debug, Clone, Copy)]
pub struct PoseJumpDetector {
    threshold: f64,
}

impl PoseJumpDetector {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// ‖t_current − t_previous‖, or `None` without a baseline.
    pub fn translation_delta(current: &Pose, previous: Option<&Pose>) -> Option<f64> {
        previous.map(|prev| (current.t_cw - prev.t_cw).norm())
    }

    /// True without a baseline, otherwise true iff the translation delta
    /// strictly exceeds the threshold. Logging is left to the caller.
    pub fn is_jump(&self, current: &Pose, previous: Option<&Pose>) -> bool {
        match Self::translation_delta(current, previous) {
            None => true,
            Some(delta) => delta > self.threshold,
        }
    }
}

impl Default for PoseJumpDetector {
    fn default() -> Self {
        Self::new(DEFAULT_POSE_JUMP_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn pose_at(x: f64) -> Pose {
        Pose::from_translation(Vector3::new(x, 0.0, 0.0), 0.0, 0)
    }

    #[test]
    fn test_no_baseline_is_jump() {
        assert!(PoseJumpDetector::default().is_jump(&pose_at(0.0), None));
    }

    #[test]
    fn test_identical_poses_no_jump() {
        let detector = PoseJumpDetector::default();
        let p = pose_at(3.0);
        assert!(!detector.is_jump(&p, Some(&p)));
    }

    #[test]
    fn test_threshold_boundary_is_exclusive() {
        let detector = PoseJumpDetector::new(1.0);
        assert!(!detector.is_jump(&pose_at(1.0), Some(&pose_at(0.0))));
        assert!(detector.is_jump(&pose_at(1.0 + 1e-9), Some(&pose_at(0.0))));
        assert!(detector.is_jump(&pose_at(2.0), Some(&pose_at(0.0))));
    }

    #[test]
    fn test_repeated_checks_agree() {
        let detector = PoseJumpDetector::new(1.0);
        let (prev, cur) = (pose_at(0.0), pose_at(1.5));
        assert!(detector.is_jump(&cur, Some(&prev)));
        assert!(detector.is_jump(&cur, Some(&prev)));
        assert!(!detector.is_jump(&prev, Some(&prev)));
        assert_eq!(detector.threshold(), 1.0);
    }

    #[test]
    fn test_delta_is_euclidean() {
        let a = Pose::from_translation(Vector3::new(0.0, 0.0, 0.0), 0.0, 0);
        let b = Pose::from_translation(Vector3::new(3.0, 4.0, 0.0), 0.0, 1);
        assert_eq!(PoseJumpDetector::translation_delta(&b, Some(&a)), Some(5.0));
        assert_eq!(PoseJumpDetector::translation_delta(&b, None), None);
        assert!(!PoseJumpDetector::new(5.0).is_jump(&b, Some(&a)));
    }
}
