//! In-process transport: the producer publishes into a shared slot.

use std::sync::Arc;

use image::RgbImage;
use parking_lot::RwLock;

use crate::error::Result;
use crate::geometry::Pose;

use super::sample::{FreshnessToken, ImageRef, LatestSampleStore, Sample};

#[derive(Debug, Default)]
struct Slot {
    sample: Option<Sample>,
    next_token: u128,
}

/// Single-slot sample store shared between a producer and the estimator.
///
/// Cloning gives another handle to the same slot.
#[derive(Debug, Clone, Default)]
pub struct SharedSampleStore {
    slot: Arc<RwLock<Slot>>,
}

impl SharedSampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new sample, replacing the previous one with a strictly newer token.
    pub fn publish(&self, image: Arc<RgbImage>, pose: Pose) -> FreshnessToken {
        self.publish_ref(ImageRef::InMemory(image), pose)
    }

    /// Like [`publish`](Self::publish) for any image reference.
    pub fn publish_ref(&self, image: ImageRef, pose: Pose) -> FreshnessToken {
        let mut slot = self.slot.write();
        slot.next_token += 1;
        let freshness = FreshnessToken(slot.next_token);
        slot.sample = Some(Sample {
            image,
            pose,
            freshness,
        });
        freshness
    }

    /// Replace the sample content but keep its token, as a rewrite that did not
    /// touch the file's modification time would.
    pub fn republish(&self, image: Arc<RgbImage>, pose: Pose) -> Option<FreshnessToken> {
        let mut slot = self.slot.write();
        let freshness = slot.sample.as_ref()?.freshness;
        slot.sample = Some(Sample {
            image: ImageRef::InMemory(image),
            pose,
            freshness,
        });
        Some(freshness)
    }

    pub fn clear(&self) {
        self.slot.write().sample = None;
    }
}

impl LatestSampleStore for SharedSampleStore {
    fn latest(&self) -> Result<Option<Sample>> {
        Ok(self.slot.read().sample.clone())
    }

    fn describe(&self) -> String {
        "in-process shared slot".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    fn image() -> Arc<RgbImage> {
        Arc::new(RgbImage::new(2, 2))
    }

    #[test]
    fn test_publish_increments_token() {
        let store = SharedSampleStore::new();
        assert!(store.latest().unwrap().is_none());

        let t1 = store.publish(image(), Pose::from_translation(Vector3::zeros(), 0.0, 1));
        let t2 = store.publish(image(), Pose::from_translation(Vector3::zeros(), 0.1, 2));
        assert!(t2 > t1);

        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.freshness, t2);
        assert_eq!(latest.pose.frame_id, 2);
    }

    #[test]
    fn test_republish_keeps_token() {
        let store = SharedSampleStore::new();
        assert!(store.republish(image(), Pose::from_translation(Vector3::zeros(), 0.0, 1)).is_none());

        let t1 = store.publish(image(), Pose::from_translation(Vector3::zeros(), 0.0, 1));
        let t2 = store
            .republish(image(), Pose::from_translation(Vector3::zeros(), 0.0, 9))
            .unwrap();
        assert_eq!(t1, t2);
        assert_eq!(store.latest().unwrap().unwrap().pose.frame_id, 9);
    }

    #[test]
    fn test_clones_share_the_slot() {
        let producer = SharedSampleStore::new();
        let consumer = producer.clone();
        producer.publish(image(), Pose::from_translation(Vector3::zeros(), 0.0, 4));
        assert_eq!(consumer.latest().unwrap().unwrap().pose.frame_id, 4);

        producer.clear();
        assert!(consumer.latest().unwrap().is_none());
    }
}
