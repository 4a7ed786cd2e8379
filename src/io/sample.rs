//! The "latest sample" handoff between the pose producer and the estimator.
//!
//! The producer periodically publishes an (image, pose) pair. The estimator only
//! ever looks at the newest pair and uses an opaque [`FreshnessToken`] to tell
//! whether it changed since the last successful cycle. Stores never block the
//! producer and never queue: older samples are simply overwritten.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::imageops::FilterType;
use image::{ImageReader, RgbImage};

use crate::error::{GravityError, Result};
use crate::geometry::Pose;

/// Opaque, totally ordered marker of a sample version.
///
/// Only compared, never decoded. The filesystem store uses the pose file's
/// modification time in nanoseconds; the in-process store uses a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FreshnessToken(pub u128);

impl FreshnessToken {
    /// Whether `self` is strictly newer than `previous` (anything beats `None`).
    pub fn is_newer_than(&self, previous: Option<FreshnessToken>) -> bool {
        previous.map_or(true, |prev| *self > prev)
    }
}

/// Where the image of a sample lives.
#[derive(Debug, Clone)]
pub enum ImageRef {
    /// Encoded image on disk.
    Path(PathBuf),
    /// Already decoded RGB image.
    InMemory(Arc<RgbImage>),
}

impl ImageRef {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path(p) => Some(p),
            Self::InMemory(_) => None,
        }
    }

    /// Whether the referenced image can currently be resolved.
    pub fn is_resolvable(&self) -> bool {
        match self {
            Self::Path(p) => p.is_file(),
            Self::InMemory(_) => true,
        }
    }

    /// Decode the image as RGB and resize it to `width` × `height`.
    pub fn load(&self, width: u32, height: u32) -> Result<RgbImage> {
        let rgb = match self {
            Self::Path(path) => decode_rgb(path)?,
            Self::InMemory(img) => RgbImage::clone(img),
        };

        if rgb.dimensions() == (width, height) {
            Ok(rgb)
        } else {
            Ok(image::imageops::resize(&rgb, width, height, FilterType::Triangle))
        }
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::InMemory(img) => write!(f, "<in-memory {}x{}>", img.width(), img.height()),
        }
    }
}

fn decode_rgb(path: &Path) -> Result<RgbImage> {
    let reader = ImageReader::open(path)
        .and_then(|r| r.with_guessed_format())
        .map_err(|e| {
            GravityError::SampleUnavailable(format!("cannot open image {}: {e}", path.display()))
        })?;
    let img = reader.decode().map_err(|e| {
        GravityError::SampleUnavailable(format!("cannot decode image {}: {e}", path.display()))
    })?;
    Ok(img.to_rgb8())
}

/// Newest (image, pose) pair with its freshness token.
#[derive(Debug, Clone)]
pub struct Sample {
    pub image: ImageRef,
    pub pose: Pose,
    pub freshness: FreshnessToken,
}

/// Read side of the producer → estimator handoff.
pub trait LatestSampleStore: Send {
    /// Newest available sample, or `Ok(None)` when nothing usable is there yet.
    ///
    /// Must be cheap relative to the poll interval and must not block on the producer.
    fn latest(&self) -> Result<Option<Sample>>;

    /// Short human-readable description of the transport, for logs.
    fn describe(&self) -> String;
}
