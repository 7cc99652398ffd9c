// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! `DWPose` whole-body backend.
//!
//! Finds people with the YOLO pose model, runs a `DWPose` (RTMPose-style
//! `SimCC`) ONNX export top-down on each person box, and renders every person
//! as an `OpenPose` skeleton on one black canvas. Without a detector, or when
//! it finds nobody, the whole image is the box.

use std::time::Instant;

use image::RgbImage;
use ndarray::{Array2, Array3, ArrayView2};
use ort::session::Session;
use ort::value::TensorRef;

use super::{BackendKind, Detection, PoseBackend, SkeletonOutput, init_error, resolve_backend_model};
use crate::config::ExtractConfig;
use crate::device::build_session;
use crate::error::{InitFailure, Result, SkeletonError};
use crate::image_io::{ChannelOrder, convert_order};
use crate::model::PoseModel;
use crate::postprocessing::decode_simcc;
use crate::preprocessing::{Normalization, top_down_crop};
use crate::visualizer::{OPENPOSE_THRESHOLD, draw_openpose};

/// Model input as (width, height).
pub const DWPOSE_INPUT_SIZE: (usize, usize) = (288, 384);

/// `SimCC` bins per input pixel.
const SIMCC_SPLIT_RATIO: f32 = 2.0;

/// Padding applied to the person box before cropping.
const BBOX_PADDING: f32 = 1.25;

/// Primary backend: `DWPose` whole-body estimation rendered in `OpenPose` style.
pub struct DwposeBackend {
    session: Option<Session>,
    detector: Option<PoseModel>,
    input_name: String,
    simcc_x: String,
    simcc_y: String,
}

impl DwposeBackend {
    /// Resolve the model, downloading it if allowed, and build the session.
    ///
    /// # Errors
    ///
    /// Returns [`SkeletonError::BackendInit`] classified as missing model,
    /// download failure, or runtime failure.
    pub fn new(config: &ExtractConfig) -> Result<Self> {
        let kind = BackendKind::Dwpose;
        let path = resolve_backend_model(kind, &config.dwpose_model, config.download)?;
        let session = build_session(&path, config.device, config.num_threads)
            .map_err(|e| init_error(kind, InitFailure::Runtime, e))?;

        let outputs: Vec<String> = session.outputs.iter().map(|o| o.name.clone()).collect();
        if outputs.len() < 2 {
            return Err(init_error(
                kind,
                InitFailure::Runtime,
                format!(
                    "{} has {} output(s), expected SimCC x and y heads",
                    path.display(),
                    outputs.len()
                ),
            ));
        }
        let (simcc_x, simcc_y) = pick_simcc_outputs(&outputs);

        let input_name = session
            .inputs
            .first()
            .map_or_else(|| "input".to_string(), |i| i.name.clone());

        crate::verbose!(
            "{kind} loaded from {} (outputs: {simcc_x}, {simcc_y})",
            path.display()
        );

        Ok(Self {
            session: Some(session),
            detector: load_detector(config),
            input_name,
            simcc_x,
            simcc_y,
        })
    }

    /// Run the session and return both `SimCC` heads as `(K, bins)` arrays.
    fn run_heads(&mut self, input: &ndarray::Array4<f32>) -> Result<(Array2<f32>, Array2<f32>)> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| SkeletonError::InferenceError("DWPose session is closed".to_string()))?;

        let input = input.as_standard_layout();
        let tensor = TensorRef::from_array_view(&input)
            .map_err(|e| SkeletonError::InferenceError(format!("Failed to create input tensor: {e}")))?;
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => tensor])
            .map_err(|e| SkeletonError::InferenceError(format!("Inference failed: {e}")))?;

        let mut heads = Vec::with_capacity(2);
        for name in [&self.simcc_x, &self.simcc_y] {
            let value = outputs
                .get(name.as_str())
                .ok_or_else(|| SkeletonError::InferenceError(format!("Output '{name}' not found")))?;
            let (shape, data) = value
                .try_extract_tensor::<f32>()
                .map_err(|e| SkeletonError::InferenceError(format!("Failed to extract {name}: {e}")))?;
            let dims: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
            let (k, bins) = match dims.as_slice() {
                [1, k, bins] | [k, bins] => (*k, *bins),
                _ => {
                    return Err(SkeletonError::InferenceError(format!(
                        "unexpected SimCC shape {dims:?} for {name}"
                    )));
                }
            };
            let head = Array2::from_shape_vec((k, bins), data.to_vec())
                .map_err(|e| SkeletonError::InferenceError(format!("Bad SimCC buffer: {e}")))?;
            heads.push(head);
        }

        let simcc_y = heads.pop();
        let simcc_x = heads.pop();
        match (simcc_x, simcc_y) {
            (Some(x), Some(y)) if x.nrows() == y.nrows() => Ok((x, y)),
            _ => Err(SkeletonError::InferenceError(
                "SimCC heads disagree on keypoint count".to_string(),
            )),
        }
    }
}

/// Person detector for `DWPose`. Failures are logged and leave the backend on
/// whole-image boxes.
fn load_detector(config: &ExtractConfig) -> Option<PoseModel> {
    if !config.person_detector {
        return None;
    }
    let loaded = resolve_backend_model(BackendKind::YoloPose, &config.pose_model, config.download)
        .and_then(|path| PoseModel::load(&path, config));
    match loaded {
        Ok(model) => Some(model),
        Err(e) => {
            crate::warn!("Person detector unavailable, using whole-image boxes: {e}");
            None
        }
    }
}

/// Detected `xyxy` boxes clipped to the image, dropping empty ones. Falls back
/// to the whole image when nothing is left.
fn person_boxes(detected: ArrayView2<'_, f32>, width: f32, height: f32) -> Vec<[f32; 4]> {
    let mut boxes: Vec<[f32; 4]> = detected
        .rows()
        .into_iter()
        .filter(|row| row.len() >= 4)
        .filter_map(|row| {
            let bbox = [
                row[0].clamp(0.0, width),
                row[1].clamp(0.0, height),
                row[2].clamp(0.0, width),
                row[3].clamp(0.0, height),
            ];
            (bbox[2] - bbox[0] >= 1.0 && bbox[3] - bbox[1] >= 1.0).then_some(bbox)
        })
        .collect();
    if boxes.is_empty() {
        boxes.push([0.0, 0.0, width, height]);
    }
    boxes
}

/// Choose the x and y heads by name, falling back to output order.
fn pick_simcc_outputs(outputs: &[String]) -> (String, String) {
    let find = |axis: &str| outputs.iter().find(|n| n.to_lowercase().contains(axis)).cloned();
    match (find("simcc_x"), find("simcc_y")) {
        (Some(x), Some(y)) => (x, y),
        _ => (outputs[0].clone(), outputs[1].clone()),
    }
}

impl PoseBackend for DwposeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dwpose
    }

    fn input_order(&self) -> ChannelOrder {
        ChannelOrder::Bgr
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    fn detect(&mut self, image: &Array3<u8>) -> Result<Detection> {
        let (height, width, channels) = image.dim();
        if channels != 3 {
            return Ok(Detection::Skeleton(SkeletonOutput::Unsupported(format!(
                "{height}x{width}x{channels} input"
            ))));
        }

        let start = Instant::now();
        let (w, h) = (width as f32, height as f32);
        let detected = match self.detector.as_mut() {
            Some(detector) => {
                let rgb = convert_order(image.to_owned(), ChannelOrder::Bgr, ChannelOrder::Rgb);
                detector.predict(&rgb)?.boxes.xyxy().to_owned()
            }
            None => Array2::zeros((0, 4)),
        };
        let boxes = person_boxes(detected.view(), w, h);

        let mut canvas = RgbImage::new(width as u32, height as u32);
        for bbox in &boxes {
            let crop = top_down_crop(
                image,
                *bbox,
                DWPOSE_INPUT_SIZE,
                BBOX_PADDING,
                Normalization::IMAGENET,
            )?;
            let (simcc_x, simcc_y) = self.run_heads(&crop.tensor)?;
            let body = decode_simcc(
                simcc_x.view(),
                simcc_y.view(),
                &crop,
                DWPOSE_INPUT_SIZE,
                SIMCC_SPLIT_RATIO,
            );
            draw_openpose(&mut canvas, &body, OPENPOSE_THRESHOLD);
        }
        crate::verbose!(
            "{} person(s) decoded in {:.1}ms",
            boxes.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        let raw = canvas.into_raw();
        Ok(Detection::Skeleton(
            match Array3::from_shape_vec((height, width, 3), raw) {
                Ok(data) => SkeletonOutput::Pixels {
                    data,
                    order: ChannelOrder::Rgb,
                },
                Err(e) => SkeletonOutput::Unsupported(format!("rendered buffer: {e}")),
            },
        ))
    }

    fn close(&mut self) {
        self.session = None;
        self.detector = None;
    }
}

impl std::fmt::Debug for DwposeBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DwposeBackend")
            .field("input", &self.input_name)
            .field("simcc_x", &self.simcc_x)
            .field("simcc_y", &self.simcc_y)
            .field("open", &self.session.is_some())
            .field("person_detector", &self.detector.is_some())
            .finish()
    }
}
