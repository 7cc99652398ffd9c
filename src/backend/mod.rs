// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Pose backends.
//!
//! A backend wraps one pose model and turns a single image into a
//! [`Detection`]. Two contracts coexist: a backend either renders the skeleton
//! itself ([`Detection::Skeleton`]) or hands back structured landmarks that the
//! driver draws ([`Detection::Landmarks`]).

pub mod dwpose;
pub mod yolo_pose;

use std::fmt;
use std::path::{Path, PathBuf};

use image::RgbImage;
use ndarray::Array3;

use crate::download::resolve_model;
use crate::error::{InitFailure, Result, SkeletonError};
use crate::image_io::{ChannelOrder, save_rgb_png};
use crate::results::Landmarks;

pub use dwpose::DwposeBackend;
pub use yolo_pose::YoloPoseBackend;

/// Which model family a backend runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// `DWPose` whole-body model, renders `OpenPose` skeletons.
    Dwpose,
    /// YOLO pose model, returns COCO-17 landmarks.
    YoloPose,
}

impl BackendKind {
    /// Human-readable backend name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Dwpose => "DWPose",
            Self::YoloPose => "YOLO pose",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An already-rendered skeleton that knows how to write itself to disk.
pub trait SkeletonHandle {
    /// Write the skeleton as PNG to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    fn save(&self, path: &Path) -> Result<()>;
}

impl SkeletonHandle for RgbImage {
    fn save(&self, path: &Path) -> Result<()> {
        save_rgb_png(self, path)
    }
}

/// Skeleton image produced by a rendering backend.
pub enum SkeletonOutput {
    /// Dense HWC buffer in the given channel order.
    Pixels {
        /// `H×W×3` pixels.
        data: Array3<u8>,
        /// Channel order of `data`.
        order: ChannelOrder,
    },
    /// Opaque image that persists itself.
    Handle(Box<dyn SkeletonHandle>),
    /// Output the driver cannot persist, with a short description.
    Unsupported(String),
}

impl fmt::Debug for SkeletonOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pixels { data, order } => f
                .debug_struct("Pixels")
                .field("shape", &data.shape())
                .field("order", order)
                .finish(),
            Self::Handle(_) => f.write_str("Handle(..)"),
            Self::Unsupported(kind) => f.debug_tuple("Unsupported").field(kind).finish(),
        }
    }
}

/// Result of running a backend on one image.
#[derive(Debug)]
pub enum Detection {
    /// The backend rendered the skeleton itself.
    Skeleton(SkeletonOutput),
    /// Normalized landmarks for every detected person.
    Landmarks(Landmarks),
    /// Nobody was found in the image.
    NoPose,
}

/// A pose-estimation backend.
///
/// Backends are initialized before a pass starts, called once per image, and
/// closed when the pass ends.
pub trait PoseBackend {
    /// Model family of this backend.
    fn kind(&self) -> BackendKind;

    /// Channel order `detect` expects its input in.
    fn input_order(&self) -> ChannelOrder;

    /// Run pose estimation on an HWC image in [`PoseBackend::input_order`].
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails or the backend was closed.
    fn detect(&mut self, image: &Array3<u8>) -> Result<Detection>;

    /// Release model resources. Later calls to `detect` fail.
    fn close(&mut self) {}
}

/// Wrap an initialization failure with its backend and classified cause.
pub(crate) fn init_error(kind: BackendKind, cause: InitFailure, err: impl fmt::Display) -> SkeletonError {
    SkeletonError::BackendInit {
        backend: kind.name().to_string(),
        cause,
        message: err.to_string(),
    }
}

/// Resolve a backend's model path, classifying failures.
pub(crate) fn resolve_backend_model(kind: BackendKind, path: &Path, download: bool) -> Result<PathBuf> {
    resolve_model(path, download).map_err(|e| {
        let cause = match e {
            SkeletonError::Download(_) => InitFailure::Download,
            _ => InitFailure::MissingModel,
        };
        init_error(kind, cause, e)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!(BackendKind::Dwpose.to_string(), "DWPose");
        assert_eq!(BackendKind::YoloPose.to_string(), "YOLO pose");
    }

    #[test]
    fn test_missing_model_is_classified() {
        let err = resolve_backend_model(BackendKind::Dwpose, Path::new("/nonexistent/custom.onnx"), true)
            .unwrap_err();
        assert_eq!(err.init_failure(), Some(InitFailure::MissingModel));
        assert!(err.to_string().starts_with("DWPose initialization failed"));
    }

    #[test]
    fn test_rgb_image_handle_saves_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("handle.png");
        let handle: Box<dyn SkeletonHandle> = Box::new(RgbImage::new(4, 3));
        handle.save(&path).unwrap();
        let loaded = image::open(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (4, 3));
    }

    #[test]
    fn test_skeleton_output_debug() {
        let out = SkeletonOutput::Pixels {
            data: Array3::zeros((2, 3, 3)),
            order: ChannelOrder::Bgr,
        };
        let dbg = format!("{out:?}");
        assert!(dbg.contains("Pixels"));
        assert!(dbg.contains("Bgr"));
    }
}
