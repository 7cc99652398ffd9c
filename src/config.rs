// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Extraction configuration.
//!
//! This module defines [`ExtractConfig`], which controls where skeletons are
//! written, which pose backend runs, the detection thresholds, and the hardware
//! execution options for the ONNX sessions.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::device::Device;
use crate::download::{DEFAULT_DWPOSE_MODEL, DEFAULT_POSE_MODEL};

/// Default output directory, relative to the repository root.
pub const DEFAULT_OUTPUT_DIR: &str = "public/pose-skeletons";

/// Default manifest path, relative to the working directory.
pub const DEFAULT_MANIFEST: &str = "pose-references.json";

/// Which backends the driver may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendSelection {
    /// Primary backend, falling back to the secondary if it fails to initialize.
    #[default]
    Auto,
    /// Primary (DWPose) backend only.
    Dwpose,
    /// Secondary (YOLO pose) backend only.
    Yolo,
}

impl fmt::Display for BackendSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Dwpose => write!(f, "dwpose"),
            Self::Yolo => write!(f, "yolo"),
        }
    }
}

impl FromStr for BackendSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "dwpose" | "primary" => Ok(Self::Dwpose),
            "yolo" | "yolo-pose" | "secondary" => Ok(Self::Yolo),
            _ => Err(format!(
                "invalid backend '{s}', expected one of: auto, dwpose, yolo"
            )),
        }
    }
}

/// Configuration for a skeleton extraction run.
///
/// Built with the `with_*` methods, starting from [`ExtractConfig::new`].
///
/// # Example
///
/// ```rust
/// use pose_skeletons::{BackendSelection, ExtractConfig};
///
/// let config = ExtractConfig::new()
///     .with_output_dir("out/skeletons")
///     .with_backend(BackendSelection::Yolo)
///     .with_confidence(0.5);
/// ```
#[derive(Debug, Clone)]
pub struct ExtractConfig {
    /// Directory that receives `<name>.png` skeletons.
    pub output_dir: PathBuf,
    /// Backend selection and fallback policy.
    pub backend: BackendSelection,
    /// DWPose whole-body model (SimCC heads).
    pub dwpose_model: PathBuf,
    /// YOLO pose model.
    pub pose_model: PathBuf,
    /// Person confidence threshold for the YOLO pose backend.
    pub confidence_threshold: f32,
    /// `IoU` threshold for NMS in the YOLO pose backend.
    pub iou_threshold: f32,
    /// Maximum number of people kept per image.
    pub max_detections: usize,
    /// Landmarks with visibility below this are not drawn.
    pub keypoint_threshold: f32,
    /// Explicit YOLO input size (height, width). `None` reads it from model metadata.
    pub imgsz: Option<(usize, usize)>,
    /// Intra-op threads for ONNX Runtime. `0` lets the runtime decide.
    pub num_threads: usize,
    /// Execution device. `None` means CPU.
    pub device: Option<Device>,
    /// Download known default models when they are missing.
    pub download: bool,
    /// Find people with the YOLO pose model before running `DWPose` on each
    /// box. When off, or when no person is found, the whole image is one box.
    pub person_detector: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            backend: BackendSelection::Auto,
            dwpose_model: PathBuf::from(DEFAULT_DWPOSE_MODEL),
            pose_model: PathBuf::from(DEFAULT_POSE_MODEL),
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            max_detections: 300,
            keypoint_threshold: 0.5,
            imgsz: None,
            num_threads: 0,
            device: None,
            download: true,
            person_detector: true,
        }
    }
}

impl ExtractConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set the backend selection.
    #[must_use]
    pub const fn with_backend(mut self, backend: BackendSelection) -> Self {
        self.backend = backend;
        self
    }

    /// Set the DWPose model path.
    #[must_use]
    pub fn with_dwpose_model<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.dwpose_model = path.into();
        self
    }

    /// Set the YOLO pose model path.
    #[must_use]
    pub fn with_pose_model<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.pose_model = path.into();
        self
    }

    /// Set the person confidence threshold.
    #[must_use]
    pub const fn with_confidence(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the `IoU` threshold for NMS.
    #[must_use]
    pub const fn with_iou(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the maximum number of people kept per image.
    #[must_use]
    pub const fn with_max_detections(mut self, max: usize) -> Self {
        self.max_detections = max;
        self
    }

    /// Set the landmark visibility threshold used when drawing.
    #[must_use]
    pub const fn with_keypoint_threshold(mut self, threshold: f32) -> Self {
        self.keypoint_threshold = threshold;
        self
    }

    /// Set the YOLO input image size.
    #[must_use]
    pub const fn with_imgsz(mut self, height: usize, width: usize) -> Self {
        self.imgsz = Some((height, width));
        self
    }

    /// Set the number of intra-op threads.
    #[must_use]
    pub const fn with_threads(mut self, threads: usize) -> Self {
        self.num_threads = threads;
        self
    }

    /// Set the execution device.
    #[must_use]
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Enable or disable automatic model downloads.
    #[must_use]
    pub const fn with_download(mut self, download: bool) -> Self {
        self.download = download;
        self
    }

    /// Enable or disable person detection ahead of `DWPose`.
    #[must_use]
    pub const fn with_person_detector(mut self, enabled: bool) -> Self {
        self.person_detector = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ExtractConfig::default();
        assert_eq!(config.output_dir, PathBuf::from("public/pose-skeletons"));
        assert_eq!(config.backend, BackendSelection::Auto);
        assert!((config.confidence_threshold - 0.5).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.45).abs() < f32::EPSILON);
        assert_eq!(config.max_detections, 300);
        assert!(config.download);
        assert!(config.person_detector);
    }

    #[test]
    fn test_config_builder() {
        let config = ExtractConfig::new()
            .with_output_dir("skeletons")
            .with_backend(BackendSelection::Yolo)
            .with_confidence(0.3)
            .with_iou(0.6)
            .with_max_detections(5)
            .with_imgsz(960, 960)
            .with_threads(4)
            .with_device(Device::Cpu)
            .with_download(false)
            .with_person_detector(false);

        assert_eq!(config.output_dir, PathBuf::from("skeletons"));
        assert_eq!(config.backend, BackendSelection::Yolo);
        assert!((config.confidence_threshold - 0.3).abs() < f32::EPSILON);
        assert!((config.iou_threshold - 0.6).abs() < f32::EPSILON);
        assert_eq!(config.max_detections, 5);
        assert_eq!(config.imgsz, Some((960, 960)));
        assert_eq!(config.num_threads, 4);
        assert_eq!(config.device, Some(Device::Cpu));
        assert!(!config.download);
        assert!(!config.person_detector);
    }

    #[test]
    fn test_backend_selection_parse() {
        assert_eq!("auto".parse::<BackendSelection>().unwrap(), BackendSelection::Auto);
        assert_eq!("DWPose".parse::<BackendSelection>().unwrap(), BackendSelection::Dwpose);
        assert_eq!("secondary".parse::<BackendSelection>().unwrap(), BackendSelection::Yolo);
        assert!("mediapipe".parse::<BackendSelection>().is_err());
        assert_eq!(BackendSelection::Yolo.to_string(), "yolo");
    }
}
