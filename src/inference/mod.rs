//! Single-view gravity inference.
//!
//! The learned calibration network lives outside this crate. The estimator only
//! sees it through [`GravityModel`]: an object constructed at startup (device
//! selection, weight loading) and handed to the poller explicitly.

use image::RgbImage;
use nalgebra::Vector3;

/// Camera-frame gravity from a single image.
pub trait GravityModel: Send {
    /// Gravity direction in the camera frame for `image`.
    ///
    /// Called synchronously from the estimator loop; never called concurrently.
    fn infer_gravity(&mut self, image: &RgbImage) -> anyhow::Result<Vector3<f64>>;

    fn name(&self) -> &str;
}

/// Returns the same camera-frame gravity for every image.
///
/// Lets the full pipeline run without a network, e.g. for a rigidly mounted
/// camera whose gravity direction is known.
#[derive(Debug, Clone)]
pub struct ConstantGravityModel {
    gravity: Vector3<f64>,
}

impl ConstantGravityModel {
    pub fn new(gravity: Vector3<f64>) -> Self {
        Self { gravity }
    }
}

impl GravityModel for ConstantGravityModel {
    fn infer_gravity(&mut self, _image: &RgbImage) -> anyhow::Result<Vector3<f64>> {
        Ok(self.gravity)
    }

    fn name(&self) -> &str {
        "constant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_model() {
        let mut model = ConstantGravityModel::new(Vector3::new(0.0, 0.1, 0.995));
        let g = model.infer_gravity(&RgbImage::new(4, 4)).unwrap();
        assert_eq!(g, Vector3::new(0.0, 0.1, 0.995));
        assert_eq!(model.name(), "constant");
    }
}
