// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Post-processing of raw model outputs.
//!
//! - [`postprocess_pose`] decodes YOLO pose output into person boxes and
//!   keypoints, with confidence filtering and per-class NMS.
//! - [`decode_simcc`] turns `SimCC` coordinate-classification heads into
//!   keypoints in image space for top-down whole-body models.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]

use ndarray::{Array2, Array3, ArrayView2, s};

use crate::config::ExtractConfig;
use crate::preprocessing::{PreprocessResult, TopDownCrop, clip_coords, scale_coords, scale_point};
use crate::results::{Boxes, Keypoints, PoseResults, Speed, WholeBody};

/// One decoded person before NMS.
struct Candidate {
    bbox: [f32; 4],
    score: f32,
    class: usize,
    keypoints: Vec<[f32; 3]>,
}

/// Decode YOLO pose output.
///
/// The output is `[1, 4 + nc + K*D, N]` (or its transpose): box in `xywh`,
/// class scores, then `K` keypoints of `D` values each (`x, y[, visibility]`),
/// all in letterboxed model space.
///
/// # Arguments
///
/// * `output` - Flat output tensor data.
/// * `output_shape` - Shape of the output tensor.
/// * `preprocess` - Letterbox transform used for the input.
/// * `config` - Thresholds and detection cap.
/// * `kpt_shape` - Keypoints per person and values per keypoint.
/// * `speed` - Timing so far.
#[must_use]
pub fn postprocess_pose(
    output: &[f32],
    output_shape: &[usize],
    preprocess: &PreprocessResult,
    config: &ExtractConfig,
    kpt_shape: (usize, usize),
    speed: Speed,
) -> PoseResults {
    let (num_keypoints, kpt_dim) = kpt_shape;
    let orig_shape = preprocess.orig_shape;
    let mut results = PoseResults::empty(orig_shape, num_keypoints);
    results.speed = speed;

    let kpt_features = num_keypoints * kpt_dim;
    let Some(output_2d) = output_to_rows(output, output_shape, 4 + kpt_features) else {
        return results;
    };

    let num_classes = output_2d.ncols().saturating_sub(4 + kpt_features).max(1);
    let kpt_start = 4 + num_classes;
    if output_2d.ncols() < kpt_start + kpt_features {
        crate::warn!(
            "Pose model has insufficient features ({}), expected at least {}",
            output_2d.ncols(),
            kpt_start + kpt_features
        );
        return results;
    }

    let (oh, ow) = orig_shape;
    let mut candidates = Vec::new();

    for row in output_2d.rows() {
        let (best_class, best_score) = row
            .slice(s![4..kpt_start])
            .iter()
            .map(|&v| if v.is_nan() { 0.0 } else { v })
            .enumerate()
            .fold((0, f32::MIN), |best, (i, v)| if v > best.1 { (i, v) } else { best });

        if best_score < config.confidence_threshold {
            continue;
        }

        let (cx, cy, w, h) = (row[0], row[1], row[2], row[3]);
        let xyxy = [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0];
        let bbox = clip_coords(
            &scale_coords(&xyxy, preprocess.scale, preprocess.padding),
            orig_shape,
        );

        let keypoints = (0..num_keypoints)
            .map(|k| {
                let offset = kpt_start + k * kpt_dim;
                let (x, y) = scale_point(row[offset], row[offset + 1], preprocess.scale, preprocess.padding);
                let visibility = if kpt_dim >= 3 { row[offset + 2] } else { 1.0 };
                [x.clamp(0.0, ow as f32), y.clamp(0.0, oh as f32), visibility]
            })
            .collect();

        candidates.push(Candidate {
            bbox,
            score: best_score,
            class: best_class,
            keypoints,
        });
    }

    if candidates.is_empty() {
        return results;
    }

    let nms_input: Vec<_> = candidates.iter().map(|c| (c.bbox, c.score, c.class)).collect();
    let keep = nms_per_class(&nms_input, config.iou_threshold);
    let num_kept = keep.len().min(config.max_detections);

    let mut boxes = Array2::<f32>::zeros((num_kept, 6));
    let mut kpts = Array3::<f32>::zeros((num_kept, num_keypoints, 3));
    for (out_idx, &idx) in keep.iter().take(num_kept).enumerate() {
        let c = &candidates[idx];
        boxes
            .row_mut(out_idx)
            .assign(&ndarray::arr1(&[c.bbox[0], c.bbox[1], c.bbox[2], c.bbox[3], c.score, c.class as f32]));
        for (k, kp) in c.keypoints.iter().enumerate() {
            kpts.slice_mut(s![out_idx, k, ..]).assign(&ndarray::arr1(kp));
        }
    }

    results.boxes = Boxes::new(boxes, orig_shape);
    results.keypoints = Keypoints::new(kpts, orig_shape);
    results
}

/// Reshape raw output to `[predictions, features]`, detecting transposed layouts.
fn output_to_rows(output: &[f32], shape: &[usize], min_features: usize) -> Option<Array2<f32>> {
    let (a, b) = match shape {
        [1, a, b] | [a, b] => (*a, *b),
        _ => return None,
    };
    if output.is_empty() || a == 0 || b == 0 || output.len() != a * b {
        return None;
    }

    // Features come first unless the first axis is clearly the prediction axis.
    let features_first = a >= min_features && (a < b || b < min_features);
    let arr = Array2::from_shape_vec((a, b), output.to_vec()).ok()?;
    Some(if features_first { arr.t().to_owned() } else { arr })
}

/// Calculate `IoU` (Intersection over Union) between two `xyxy` boxes.
#[must_use]
pub fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
    let x1 = box1[0].max(box2[0]);
    let y1 = box1[1].max(box2[1]);
    let x2 = box1[2].min(box2[2]);
    let y2 = box1[3].min(box2[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
    let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
    let union = area1 + area2 - intersection;

    if union > 0.0 { intersection / union } else { 0.0 }
}

/// Per-class Non-Maximum Suppression.
///
/// Only boxes of the same class suppress each other. Returns kept indices in
/// descending score order.
#[must_use]
pub fn nms_per_class(boxes: &[([f32; 4], f32, usize)], iou_threshold: f32) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..boxes.len()).collect();
    indices.sort_by(|&a, &b| boxes[b].1.total_cmp(&boxes[a].1));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for &i in &indices {
        if suppressed[i] {
            continue;
        }
        keep.push(i);

        for &j in &indices {
            if !suppressed[j]
                && i != j
                && boxes[j].2 == boxes[i].2
                && calculate_iou(&boxes[i].0, &boxes[j].0) > iou_threshold
            {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Arg-max location and value of each row.
fn argmax_rows(simcc: ArrayView2<'_, f32>) -> Vec<(usize, f32)> {
    simcc
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .copied()
                .enumerate()
                .fold((0, f32::MIN), |best, (i, v)| if v > best.1 { (i, v) } else { best })
        })
        .collect()
}

/// Decode `SimCC` heads into keypoints in model-input space.
///
/// `simcc_x` is `(K, Wx)` and `simcc_y` is `(K, Wy)`. Locations are the arg-max
/// bins divided by `split_ratio`. The score of each keypoint is the smaller of
/// the two maxima. Keypoints with a non-positive score get location `-1`.
#[must_use]
pub fn simcc_maximum(
    simcc_x: ArrayView2<'_, f32>,
    simcc_y: ArrayView2<'_, f32>,
    split_ratio: f32,
) -> (Vec<[f32; 2]>, Vec<f32>) {
    argmax_rows(simcc_x)
        .into_iter()
        .zip(argmax_rows(simcc_y))
        .map(|((x_loc, x_val), (y_loc, y_val))| {
            let score = x_val.min(y_val);
            let loc = if score > 0.0 {
                [x_loc as f32 / split_ratio, y_loc as f32 / split_ratio]
            } else {
                [-1.0 / split_ratio, -1.0 / split_ratio]
            };
            (loc, score)
        })
        .unzip()
}

/// Decode `SimCC` output of a top-down model into image-space keypoints.
///
/// # Arguments
///
/// * `simcc_x` - Horizontal head, `(K, input_w * split_ratio)`.
/// * `simcc_y` - Vertical head, `(K, input_h * split_ratio)`.
/// * `crop` - The crop the model input was cut from.
/// * `input_size` - Model input as (width, height).
/// * `split_ratio` - Bins per input pixel.
#[must_use]
pub fn decode_simcc(
    simcc_x: ArrayView2<'_, f32>,
    simcc_y: ArrayView2<'_, f32>,
    crop: &TopDownCrop,
    input_size: (usize, usize),
    split_ratio: f32,
) -> WholeBody {
    let (locs, scores) = simcc_maximum(simcc_x, simcc_y, split_ratio);
    let (in_w, in_h) = (input_size.0 as f32, input_size.1 as f32);

    let points = locs
        .into_iter()
        .map(|[x, y]| {
            [
                x / in_w * crop.scale[0] + crop.center[0] - crop.scale[0] / 2.0,
                y / in_h * crop.scale[1] + crop.center[1] - crop.scale[1] / 2.0,
            ]
        })
        .collect();

    WholeBody { points, scores }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array4;

    fn identity_preprocess(orig_shape: (u32, u32)) -> PreprocessResult {
        PreprocessResult {
            tensor: Array4::zeros((1, 3, 1, 1)),
            orig_shape,
            scale: (1.0, 1.0),
            padding: (0.0, 0.0),
        }
    }

    /// `[1, 56, n]` pose output with the given people as (cx, cy, score).
    fn pose_output(num_preds: usize, people: &[(f32, f32, f32)]) -> Vec<f32> {
        let num_features = 56;
        let mut output = vec![0.0; num_preds * num_features];
        for (idx, &(cx, cy, score)) in people.iter().enumerate() {
            output[idx] = cx;
            output[idx + num_preds] = cy;
            output[idx + num_preds * 2] = 50.0;
            output[idx + num_preds * 3] = 50.0;
            output[idx + num_preds * 4] = score;
            for k in 0..17 {
                let offset = 5 + k * 3;
                output[idx + num_preds * offset] = cx;
                output[idx + num_preds * (offset + 1)] = cy;
                output[idx + num_preds * (offset + 2)] = 0.8;
            }
        }
        output
    }

    #[test]
    fn test_postprocess_pose_single_person() {
        let output = pose_output(100, &[(100.0, 100.0, 0.9)]);
        let results = postprocess_pose(
            &output,
            &[1, 56, 100],
            &identity_preprocess((640, 640)),
            &ExtractConfig::default(),
            (17, 3),
            Speed::default(),
        );

        assert_eq!(results.len(), 1);
        let kpts = &results.keypoints;
        assert_eq!(kpts.data.shape(), &[1, 17, 3]);
        assert!((kpts.data[[0, 0, 0]] - 100.0).abs() < 1e-6);
        assert!((kpts.data[[0, 0, 2]] - 0.8).abs() < 1e-6);
        assert!((results.boxes.xyxy()[[0, 0]] - 75.0).abs() < 1e-6);
    }

    #[test]
    fn test_postprocess_pose_below_threshold() {
        let output = pose_output(10, &[(100.0, 100.0, 0.2)]);
        let results = postprocess_pose(
            &output,
            &[1, 56, 10],
            &identity_preprocess((640, 640)),
            &ExtractConfig::default(),
            (17, 3),
            Speed::default(),
        );
        assert!(results.is_empty());
        assert_eq!(results.keypoints.num_keypoints(), 17);
    }

    #[test]
    fn test_postprocess_pose_nms_and_cap() {
        // Two overlapping people and one separate person.
        let output = pose_output(
            10,
            &[(100.0, 100.0, 0.9), (102.0, 101.0, 0.8), (400.0, 400.0, 0.7)],
        );
        let config = ExtractConfig::default();
        let results = postprocess_pose(
            &output,
            &[1, 56, 10],
            &identity_preprocess((640, 640)),
            &config,
            (17, 3),
            Speed::default(),
        );
        assert_eq!(results.len(), 2);

        let capped = postprocess_pose(
            &output,
            &[1, 56, 10],
            &identity_preprocess((640, 640)),
            &config.with_max_detections(1),
            (17, 3),
            Speed::default(),
        );
        assert_eq!(capped.len(), 1);
        assert!((capped.boxes.conf()[0] - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_postprocess_pose_malformed_shape() {
        let results = postprocess_pose(
            &[0.0; 10],
            &[1, 2, 3, 4],
            &identity_preprocess((640, 640)),
            &ExtractConfig::default(),
            (17, 3),
            Speed::default(),
        );
        assert!(results.is_empty());
    }

    #[test]
    fn test_calculate_iou() {
        let iou = calculate_iou(&[0.0, 0.0, 10.0, 10.0], &[5.0, 5.0, 15.0, 15.0]);
        assert!((iou - 0.142_857).abs() < 0.001); // 25 / (100 + 100 - 25)
    }

    #[test]
    fn test_nms_per_class() {
        let boxes = vec![
            ([0.0, 0.0, 10.0, 10.0], 0.9, 0),
            ([1.0, 1.0, 11.0, 11.0], 0.8, 1),
            ([100.0, 100.0, 110.0, 110.0], 0.95, 0),
        ];
        assert_eq!(nms_per_class(&boxes, 0.5).len(), 3);

        let same_class = vec![([0.0, 0.0, 10.0, 10.0], 0.9, 0), ([1.0, 1.0, 11.0, 11.0], 0.8, 0)];
        assert_eq!(nms_per_class(&same_class, 0.5), vec![0]);
    }

    #[test]
    fn test_simcc_maximum() {
        let simcc_x = ndarray::array![[0.1, 0.9, 0.2, 0.0], [0.0, 0.0, 0.0, 0.0]];
        let simcc_y = ndarray::array![[0.0, 0.0, 0.5, 0.1], [0.0, 0.0, 0.0, 0.0]];
        let (locs, scores) = simcc_maximum(simcc_x.view(), simcc_y.view(), 2.0);

        assert_eq!(locs[0], [0.5, 1.0]);
        assert!((scores[0] - 0.5).abs() < 1e-6);
        assert!(scores[1] <= 0.0);
        assert!(locs[1][0] < 0.0);
    }

    #[test]
    fn test_decode_simcc_maps_to_image() {
        // Model input 4x4 with split ratio 2: bins 0..8 per axis.
        let mut simcc_x = Array2::<f32>::zeros((1, 8));
        let mut simcc_y = Array2::<f32>::zeros((1, 8));
        simcc_x[[0, 4]] = 1.0; // x = 2.0 in model space, the horizontal center
        simcc_y[[0, 2]] = 1.0; // y = 1.0 in model space, a quarter of the way down

        let crop = TopDownCrop {
            tensor: Array4::zeros((1, 3, 4, 4)),
            center: [50.0, 60.0],
            scale: [100.0, 80.0],
        };
        let body = decode_simcc(simcc_x.view(), simcc_y.view(), &crop, (4, 4), 2.0);

        assert!((body.points[0][0] - 50.0).abs() < 1e-4);
        assert!((body.points[0][1] - 40.0).abs() < 1e-4);
        assert!((body.scores[0] - 1.0).abs() < 1e-6);
    }
}
