// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Result containers for pose inference output.
//!
//! [`PoseResults`] holds the raw output of the YOLO pose model (boxes and
//! keypoints in image pixels). [`Landmarks`] is the normalized, per-person view
//! handed to the renderer. [`WholeBody`] holds the 133 COCO-WholeBody points
//! decoded from the `DWPose` model.

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis, s};

/// Timing information for inference operations (in milliseconds).
#[derive(Debug, Clone, Default)]
pub struct Speed {
    /// Time spent on preprocessing.
    pub preprocess: Option<f64>,
    /// Time spent on model inference.
    pub inference: Option<f64>,
    /// Time spent on postprocessing.
    pub postprocess: Option<f64>,
}

impl Speed {
    /// Create a new Speed instance with all timings.
    #[must_use]
    pub const fn new(preprocess: f64, inference: f64, postprocess: f64) -> Self {
        Self {
            preprocess: Some(preprocess),
            inference: Some(inference),
            postprocess: Some(postprocess),
        }
    }

    /// Sum of preprocess, inference, and postprocess times in milliseconds.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.preprocess.unwrap_or(0.0)
            + self.inference.unwrap_or(0.0)
            + self.postprocess.unwrap_or(0.0)
    }
}

impl std::fmt::Display for Speed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess",
            self.preprocess.unwrap_or(0.0),
            self.inference.unwrap_or(0.0),
            self.postprocess.unwrap_or(0.0)
        )
    }
}

/// Person bounding boxes.
///
/// Stored as an (N, 6) array of `[x1, y1, x2, y2, conf, cls]` in image pixels.
#[derive(Debug, Clone)]
pub struct Boxes {
    /// Raw data array with shape (N, 6).
    pub data: Array2<f32>,
    /// Original image shape (height, width) for normalization.
    pub orig_shape: (u32, u32),
}

impl Boxes {
    /// Create a new Boxes instance.
    #[must_use]
    pub const fn new(data: Array2<f32>, orig_shape: (u32, u32)) -> Self {
        Self { data, orig_shape }
    }

    /// Number of boxes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.nrows()
    }

    /// Check if there are no boxes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.nrows() == 0
    }

    /// Boxes in xyxy format.
    #[must_use]
    pub fn xyxy(&self) -> ArrayView2<'_, f32> {
        self.data.slice(s![.., 0..4])
    }

    /// Confidence scores.
    #[must_use]
    pub fn conf(&self) -> ArrayView1<'_, f32> {
        self.data.slice(s![.., 4])
    }

    /// Class IDs.
    #[must_use]
    pub fn cls(&self) -> ArrayView1<'_, f32> {
        self.data.slice(s![.., 5])
    }

    /// Boxes in xyxy format normalized by image size.
    #[must_use]
    pub fn xyxyn(&self) -> Array2<f32> {
        let mut xyxyn = self.xyxy().to_owned();
        #[allow(clippy::cast_precision_loss)]
        let (h, w) = (self.orig_shape.0 as f32, self.orig_shape.1 as f32);

        for mut row in xyxyn.rows_mut() {
            row[0] /= w;
            row[1] /= h;
            row[2] /= w;
            row[3] /= h;
        }

        xyxyn
    }
}

/// Pose keypoints.
///
/// Stored as an (N, K, 3) array of `[x, y, visibility]` in image pixels.
#[derive(Debug, Clone)]
pub struct Keypoints {
    /// Raw keypoint data with shape (N, K, 3), or (N, K, 2) without visibility.
    pub data: Array3<f32>,
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
}

impl Keypoints {
    /// Create a new Keypoints instance.
    #[must_use]
    pub const fn new(data: Array3<f32>, orig_shape: (u32, u32)) -> Self {
        Self { data, orig_shape }
    }

    /// Number of people.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.shape()[0]
    }

    /// Check if there are no people.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keypoints per person.
    #[must_use]
    pub fn num_keypoints(&self) -> usize {
        self.data.shape()[1]
    }

    /// Pixel xy coordinates, shape (N, K, 2).
    #[must_use]
    pub fn xy(&self) -> Array3<f32> {
        self.data.slice(s![.., .., 0..2]).to_owned()
    }

    /// xy coordinates normalized by the image width and height.
    #[must_use]
    pub fn xyn(&self) -> Array3<f32> {
        let mut xyn = self.xy();
        #[allow(clippy::cast_precision_loss)]
        let (h, w) = (self.orig_shape.0 as f32, self.orig_shape.1 as f32);

        xyn.index_axis_mut(Axis(2), 0).mapv_inplace(|v| v / w);
        xyn.index_axis_mut(Axis(2), 1).mapv_inplace(|v| v / h);

        xyn
    }

    /// Visibility scores, shape (N, K), if present.
    #[must_use]
    pub fn conf(&self) -> Option<Array2<f32>> {
        (self.data.shape()[2] == 3).then(|| self.data.slice(s![.., .., 2]).to_owned())
    }

    /// Per-person normalized landmarks.
    ///
    /// Keypoints without a visibility channel get a visibility of 1.0.
    #[must_use]
    pub fn to_landmarks(&self) -> Landmarks {
        let xyn = self.xyn();
        let conf = self.conf();

        let people = (0..self.len())
            .map(|p| PersonLandmarks {
                points: (0..self.num_keypoints())
                    .map(|k| Landmark {
                        x: xyn[[p, k, 0]],
                        y: xyn[[p, k, 1]],
                        visibility: conf.as_ref().map_or(1.0, |c| c[[p, k]]),
                    })
                    .collect(),
            })
            .collect();

        Landmarks { people }
    }
}

/// Output of the YOLO pose model for one image.
#[derive(Debug, Clone)]
pub struct PoseResults {
    /// Person boxes.
    pub boxes: Boxes,
    /// Keypoints, one row per box.
    pub keypoints: Keypoints,
    /// Original image shape (height, width).
    pub orig_shape: (u32, u32),
    /// Inference timing.
    pub speed: Speed,
}

impl PoseResults {
    /// Empty result for an image of the given shape.
    #[must_use]
    pub fn empty(orig_shape: (u32, u32), num_keypoints: usize) -> Self {
        Self {
            boxes: Boxes::new(Array2::zeros((0, 6)), orig_shape),
            keypoints: Keypoints::new(Array3::zeros((0, num_keypoints, 3)), orig_shape),
            orig_shape,
            speed: Speed::default(),
        }
    }

    /// Number of detected people.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    /// Whether no person was detected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// One-line description, e.g. `2 persons, 12.3ms`.
    #[must_use]
    pub fn verbose(&self) -> String {
        match self.len() {
            0 => "(no detections)".to_string(),
            1 => format!("1 person, {:.1}ms", self.speed.inference.unwrap_or(0.0)),
            n => format!("{n} persons, {:.1}ms", self.speed.inference.unwrap_or(0.0)),
        }
    }
}

/// A single landmark, normalized to the image size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    /// Horizontal position in [0, 1].
    pub x: f32,
    /// Vertical position in [0, 1].
    pub y: f32,
    /// Visibility score in [0, 1].
    pub visibility: f32,
}

impl Landmark {
    /// Pixel position on a canvas of `width` x `height`.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn to_pixel(&self, width: usize, height: usize) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// The landmarks of one person, in topology order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonLandmarks {
    /// Landmarks indexed by keypoint id.
    pub points: Vec<Landmark>,
}

/// Landmarks for every person found in an image.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Landmarks {
    /// One entry per detected person.
    pub people: Vec<PersonLandmarks>,
}

impl Landmarks {
    /// Whether no person is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }
}

/// COCO-WholeBody keypoints of one person, in image pixels.
///
/// Index ranges: 0..17 body, 17..23 feet, 23..91 face, 91..112 left hand,
/// 112..133 right hand.
#[derive(Debug, Clone, PartialEq)]
pub struct WholeBody {
    /// `(x, y)` per keypoint.
    pub points: Vec<[f32; 2]>,
    /// Score per keypoint. Non-positive scores mark invisible points.
    pub scores: Vec<f32>,
}

impl WholeBody {
    /// Number of keypoints in the COCO-WholeBody layout.
    pub const NUM_KEYPOINTS: usize = 133;
    /// Body keypoints (COCO-17).
    pub const BODY: std::ops::Range<usize> = 0..17;
    /// Foot keypoints.
    pub const FEET: std::ops::Range<usize> = 17..23;
    /// Face keypoints.
    pub const FACE: std::ops::Range<usize> = 23..91;
    /// Left hand keypoints.
    pub const LEFT_HAND: std::ops::Range<usize> = 91..112;
    /// Right hand keypoints.
    pub const RIGHT_HAND: std::ops::Range<usize> = 112..133;

    /// Point `i` if its score exceeds `threshold`.
    #[must_use]
    pub fn visible(&self, i: usize, threshold: f32) -> Option<[f32; 2]> {
        match (self.points.get(i), self.scores.get(i)) {
            (Some(p), Some(&s)) if s > threshold => Some(*p),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_boxes_accessors() {
        let data = array![[0.0, 0.0, 320.0, 240.0, 0.95, 0.0]];
        let boxes = Boxes::new(data, (480, 640));

        assert_eq!(boxes.len(), 1);
        assert!((boxes.conf()[0] - 0.95).abs() < 1e-6);
        assert!((boxes.cls()[0] - 0.0).abs() < 1e-6);

        let xyxyn = boxes.xyxyn();
        assert!((xyxyn[[0, 2]] - 0.5).abs() < 1e-6); // 320/640
        assert!((xyxyn[[0, 3]] - 0.5).abs() < 1e-6); // 240/480
    }

    #[test]
    fn test_keypoints_to_landmarks() {
        let data = Array3::from_shape_vec(
            (1, 2, 3),
            vec![320.0, 120.0, 0.9, 64.0, 480.0, 0.2],
        )
        .unwrap();
        let kpts = Keypoints::new(data, (480, 640));

        let landmarks = kpts.to_landmarks();
        assert_eq!(landmarks.people.len(), 1);
        let points = &landmarks.people[0].points;
        assert!((points[0].x - 0.5).abs() < 1e-6);
        assert!((points[0].y - 0.25).abs() < 1e-6);
        assert!((points[1].x - 0.1).abs() < 1e-6);
        assert!((points[1].y - 1.0).abs() < 1e-6);
        assert!((points[1].visibility - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_landmark_to_pixel() {
        let lm = Landmark { x: 0.5, y: 0.25, visibility: 1.0 };
        assert_eq!(lm.to_pixel(200, 100), (100.0, 25.0));
    }

    #[test]
    fn test_empty_pose_results() {
        let results = PoseResults::empty((480, 640), 17);
        assert!(results.is_empty());
        assert_eq!(results.keypoints.num_keypoints(), 17);
        assert!(results.keypoints.to_landmarks().is_empty());
        assert_eq!(results.verbose(), "(no detections)");
    }

    #[test]
    fn test_wholebody_visible() {
        let body = WholeBody {
            points: vec![[1.0, 2.0], [3.0, 4.0]],
            scores: vec![0.8, 0.1],
        };
        assert_eq!(body.visible(0, 0.3), Some([1.0, 2.0]));
        assert_eq!(body.visible(1, 0.3), None);
        assert_eq!(body.visible(5, 0.3), None);
    }

    #[test]
    fn test_speed() {
        let speed = Speed::new(10.0, 20.0, 5.0);
        assert!((speed.total() - 35.0).abs() < 1e-6);
    }
}
