//! Geometry: gravity alignment, camera/world frame transforms, SO(3) helpers.

pub mod alignment;
pub mod frames;
pub mod so3;

pub use alignment::{
    align_to_down, Alignment, AlignmentCase, GravityAligner, DEFAULT_ALIGNMENT_TOLERANCE,
    DEFAULT_DOWN_AXIS, MIN_GRAVITY_NORM,
};
pub use frames::{camera_to_world, world_to_camera, Pose};
