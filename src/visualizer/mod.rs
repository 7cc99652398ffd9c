// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton rendering.

/// Color definitions and palettes.
pub mod color;
/// Landmark and `OpenPose` renderers.
pub mod render;
/// Skeleton topologies.
pub mod skeleton;

pub use color::Color;
pub use render::{LandmarkStyle, OPENPOSE_THRESHOLD, draw_landmarks, draw_openpose};
