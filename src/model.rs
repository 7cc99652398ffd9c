// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! YOLO pose model loading and inference.

use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

use ndarray::{Array3, Array4};
use ort::session::Session;
use ort::value::TensorRef;

use crate::config::ExtractConfig;
use crate::device::build_session;
use crate::error::{Result, SkeletonError};
use crate::metadata::ModelMetadata;
use crate::postprocessing::postprocess_pose;
use crate::preprocessing::letterbox;
use crate::results::{PoseResults, Speed};

/// Ultralytics metadata keys stored on exported ONNX models.
const METADATA_KEYS: [&str; 9] = [
    "description",
    "version",
    "stride",
    "task",
    "batch",
    "imgsz",
    "names",
    "kpt_shape",
    "channels",
];

/// YOLO pose model.
///
/// Wraps an ONNX Runtime session for an Ultralytics pose export and turns RGB
/// images into [`PoseResults`].
///
/// # Example
///
/// ```no_run
/// use pose_skeletons::{ExtractConfig, PoseModel};
///
/// let config = ExtractConfig::default();
/// let mut model = PoseModel::load("yolo11n-pose.onnx", &config)?;
/// let image = ndarray::Array3::<u8>::zeros((480, 640, 3));
/// let results = model.predict(&image)?;
/// println!("{}", results.verbose());
/// # Ok::<(), pose_skeletons::SkeletonError>(())
/// ```
pub struct PoseModel {
    session: Session,
    metadata: ModelMetadata,
    input_name: String,
    output_names: Vec<String>,
    config: ExtractConfig,
    imgsz: (usize, usize),
    warmed_up: bool,
}

impl PoseModel {
    /// Load a pose model from an ONNX file.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::ModelLoadError`] if the file is missing, the
    /// session cannot be built, or the model is not a pose model.
    pub fn load<P: AsRef<Path>>(path: P, config: &ExtractConfig) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SkeletonError::ModelLoadError(format!(
                "Model file not found: {}",
                path.display()
            )));
        }

        let session = build_session(path, config.device, config.num_threads)?;
        let metadata = Self::extract_metadata(&session)?;

        if !metadata.is_pose() {
            return Err(SkeletonError::ModelLoadError(format!(
                "{} is a '{}' model, expected a pose model",
                path.display(),
                metadata.task
            )));
        }

        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "images".to_string(), |i| i.name.clone());
        let output_names: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.is_empty() {
            return Err(SkeletonError::ModelLoadError(format!(
                "{} has no outputs",
                path.display()
            )));
        }

        let imgsz = config.imgsz.unwrap_or(metadata.imgsz);

        Ok(Self {
            session,
            metadata,
            input_name,
            output_names,
            config: config.clone(),
            imgsz,
            warmed_up: false,
        })
    }

    /// Collect the Ultralytics metadata keys into one YAML document.
    fn extract_metadata(session: &Session) -> Result<ModelMetadata> {
        let model_metadata = session
            .metadata()
            .map_err(|e| SkeletonError::ModelLoadError(format!("Failed to get model metadata: {e}")))?;

        let parts: Vec<String> = METADATA_KEYS
            .iter()
            .filter_map(|key| match model_metadata.custom(key) {
                Ok(Some(value)) => Some(format!("{key}: {value}")),
                _ => None,
            })
            .collect();

        if parts.is_empty() {
            crate::verbose!("No Ultralytics metadata found, assuming a COCO pose model");
            return Ok(ModelMetadata::default());
        }

        let combined = HashMap::from([(String::new(), parts.join("\n"))]);
        ModelMetadata::from_onnx_metadata(&combined)
    }

    /// Run a dummy inference so the first real image is not slowed by graph setup.
    ///
    /// # Errors
    ///
    /// Returns an error if the session rejects the input.
    pub fn warmup(&mut self) -> Result<()> {
        if self.warmed_up {
            return Ok(());
        }
        let dummy = Array4::<f32>::zeros((1, 3, self.imgsz.0, self.imgsz.1));
        self.run_inference(&dummy)?;
        self.warmed_up = true;
        Ok(())
    }

    /// Detect people and their keypoints in an RGB HWC image.
    ///
    /// # Errors
    ///
    /// Returns an error if preprocessing or inference fails.
    pub fn predict(&mut self, image: &Array3<u8>) -> Result<PoseResults> {
        self.warmup()?;

        let start = Instant::now();
        let preprocess = letterbox(image, self.imgsz)?;
        let preprocess_time = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let (output, shape) = self.run_inference(&preprocess.tensor)?;
        let inference_time = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let mut results = postprocess_pose(
            &output,
            &shape,
            &preprocess,
            &self.config,
            self.metadata.kpt_shape,
            Speed::new(preprocess_time, inference_time, 0.0),
        );
        results.speed.postprocess = Some(start.elapsed().as_secs_f64() * 1000.0);

        Ok(results)
    }

    /// Run the session on an NCHW tensor, returning the first output.
    fn run_inference(&mut self, input: &Array4<f32>) -> Result<(Vec<f32>, Vec<usize>)> {
        let input = input.as_standard_layout();
        let tensor = TensorRef::from_array_view(&input)
            .map_err(|e| SkeletonError::InferenceError(format!("Failed to create input tensor: {e}")))?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| SkeletonError::InferenceError(format!("Inference failed: {e}")))?;

        let output_name = &self.output_names[0];
        let output = outputs
            .get(output_name.as_str())
            .ok_or_else(|| SkeletonError::InferenceError(format!("Output '{output_name}' not found")))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| SkeletonError::InferenceError(format!("Failed to extract output: {e}")))?;

        let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        Ok((data.to_vec(), shape))
    }

    /// Model metadata.
    #[must_use]
    pub const fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Inference input size (height, width).
    #[must_use]
    pub const fn imgsz(&self) -> (usize, usize) {
        self.imgsz
    }
}

impl std::fmt::Debug for PoseModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoseModel")
            .field("task", &self.metadata.task)
            .field("imgsz", &self.imgsz)
            .field("kpt_shape", &self.metadata.kpt_shape)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_not_found() {
        let result = PoseModel::load("nonexistent-pose.onnx", &ExtractConfig::default());
        assert!(matches!(result, Err(SkeletonError::ModelLoadError(_))));
    }
}
