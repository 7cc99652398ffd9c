// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! YOLO pose backend.

use ndarray::Array3;

use super::{BackendKind, Detection, PoseBackend, init_error, resolve_backend_model};
use crate::config::ExtractConfig;
use crate::error::{InitFailure, Result, SkeletonError};
use crate::image_io::ChannelOrder;
use crate::model::PoseModel;

/// Secondary backend: COCO-17 landmarks from an Ultralytics YOLO pose model.
#[derive(Debug)]
pub struct YoloPoseBackend {
    model: Option<PoseModel>,
}

impl YoloPoseBackend {
    /// Resolve the model, downloading it if allowed, and load it.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::BackendInit`] if the model is missing, cannot
    /// be downloaded, or is not a pose model.
    pub fn new(config: &ExtractConfig) -> Result<Self> {
        let kind = BackendKind::YoloPose;
        let path = resolve_backend_model(kind, &config.pose_model, config.download)?;
        let model = PoseModel::load(&path, config).map_err(|e| init_error(kind, InitFailure::Runtime, e))?;
        crate::verbose!(
            "{kind} loaded from {} (imgsz {:?})",
            path.display(),
            model.imgsz()
        );
        Ok(Self { model: Some(model) })
    }
}

impl PoseBackend for YoloPoseBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::YoloPose
    }

    fn input_order(&self) -> ChannelOrder {
        ChannelOrder::Rgb
    }

    fn detect(&mut self, image: &Array3<u8>) -> Result<Detection> {
        let model = self
            .model
            .as_mut()
            .ok_or_else(|| SkeletonError::InferenceError("YOLO pose model is closed".to_string()))?;

        let results = model.predict(image)?;
        crate::verbose!("{} {}", results.verbose(), results.speed);

        if results.is_empty() {
            return Ok(Detection::NoPose);
        }
        Ok(Detection::Landmarks(results.keypoints.to_landmarks()))
    }

    fn close(&mut self) {
        self.model = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_model_without_download() {
        let config = ExtractConfig::new()
            .with_pose_model("/nonexistent/yolo11n-pose.onnx")
            .with_download(false);
        let err = YoloPoseBackend::new(&config).unwrap_err();
        assert_eq!(err.init_failure(), Some(InitFailure::MissingModel));
    }

    #[test]
    fn test_detect_after_close_fails() {
        let mut backend = YoloPoseBackend { model: None };
        backend.close();
        let image = Array3::<u8>::zeros((8, 8, 3));
        assert!(matches!(
            backend.detect(&image),
            Err(SkeletonError::InferenceError(_))
        ));
    }
}
