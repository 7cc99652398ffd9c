// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Skeleton renderers.
//!
//! [`draw_landmarks`] draws COCO-17 landmarks in the Ultralytics pose palette.
//! [`draw_openpose`] draws COCO-WholeBody keypoints in `OpenPose` style: body
//! limbs as tapered sticks, hand bones in a hue wheel, and face points.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut, draw_polygon_mut};
use imageproc::point::Point;

use crate::results::{Landmarks, WholeBody};
use crate::visualizer::color::Color;
use crate::visualizer::skeleton::{
    COCO_TO_OPENPOSE, HAND_EDGES, KPT_COLOR_INDICES, LIMB_COLOR_INDICES, OPENPOSE_DRAWN_LIMBS,
    OPENPOSE_JOINTS, OPENPOSE_LIMBS, SKELETON,
};

/// Visibility threshold for `OpenPose` rendering.
pub const OPENPOSE_THRESHOLD: f32 = 0.3;

/// Half width of an `OpenPose` body limb, in pixels.
const STICK_WIDTH: f32 = 4.0;

/// Intensity of body limbs relative to joint colors.
const LIMB_INTENSITY: f32 = 0.6;

/// Joint dot radius for `OpenPose` bodies and hands.
const JOINT_RADIUS: i32 = 4;

/// Face dot radius.
const FACE_RADIUS: i32 = 3;

/// Hand bone thickness.
const HAND_THICKNESS: i32 = 2;

/// Line thickness and dot radius for [`draw_landmarks`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkStyle {
    /// Landmarks below this visibility are not drawn, nor are limbs touching them.
    pub visibility_threshold: f32,
    /// Limb thickness in pixels. `None` scales with the image size.
    pub line_width: Option<u32>,
    /// Keypoint dot radius in pixels. `None` scales with the image size.
    pub radius: Option<u32>,
}

impl Default for LandmarkStyle {
    fn default() -> Self {
        Self {
            visibility_threshold: 0.5,
            line_width: None,
            radius: None,
        }
    }
}

impl LandmarkStyle {
    /// Style with the given visibility threshold and automatic sizes.
    #[must_use]
    pub fn with_threshold(visibility_threshold: f32) -> Self {
        Self {
            visibility_threshold,
            ..Self::default()
        }
    }

    /// Limb thickness and dot radius for a `width` x `height` canvas.
    #[must_use]
    pub fn sizes(&self, width: u32, height: u32) -> (i32, i32) {
        let auto = (((width + height) as f32 / 2.0 * 0.003).round() as i32).max(2);
        let line = self.line_width.map_or(auto, |w| w as i32).max(1);
        let radius = self.radius.map_or((auto * 2).max(5), |r| r as i32).max(1);
        (line, radius)
    }
}

/// Draw COCO-17 landmarks of every person onto `canvas`.
///
/// Coordinates are normalized to the canvas size. Landmarks outside the
/// canvas or below the visibility threshold are skipped, along with every limb
/// that touches one.
pub fn draw_landmarks(canvas: &mut RgbImage, landmarks: &Landmarks, style: &LandmarkStyle) {
    let (width, height) = canvas.dimensions();
    let (line, radius) = style.sizes(width, height);

    for person in &landmarks.people {
        let visible: Vec<Option<(f32, f32)>> = person
            .points
            .iter()
            .map(|lm| {
                let (x, y) = lm.to_pixel(width as usize, height as usize);
                let inside = x >= 0.0 && y >= 0.0 && x < width as f32 && y < height as f32;
                (lm.visibility >= style.visibility_threshold && inside).then_some((x, y))
            })
            .collect();
        let point = |i: usize| visible.get(i).copied().flatten();

        for (i, &[a, b]) in SKELETON.iter().enumerate() {
            if let (Some(p1), Some(p2)) = (point(a), point(b)) {
                let color = Color::from_pose_index(LIMB_COLOR_INDICES[i]);
                draw_thick_line(canvas, p1, p2, line, color.into());
            }
        }

        for (k, &color_idx) in KPT_COLOR_INDICES.iter().enumerate() {
            if let Some((x, y)) = point(k) {
                let color = Color::from_pose_index(color_idx);
                draw_filled_circle_mut(canvas, (x as i32, y as i32), radius, color.into());
            }
        }
    }
}

/// `OpenPose` body joints for a whole-body detection.
///
/// The neck is the midpoint of both shoulders and is only present when both are.
#[must_use]
pub fn openpose_joints(body: &WholeBody, threshold: f32) -> [Option<(f32, f32)>; OPENPOSE_JOINTS] {
    let coco = |i: usize| body.visible(i, threshold).map(|[x, y]| (x, y));

    let mut joints = [None; OPENPOSE_JOINTS];
    for (joint, source) in joints.iter_mut().zip(COCO_TO_OPENPOSE) {
        *joint = match source {
            Some(c) => coco(c),
            None => match (coco(5), coco(6)) {
                (Some(l), Some(r)) => Some(((l.0 + r.0) / 2.0, (l.1 + r.1) / 2.0)),
                _ => None,
            },
        };
    }
    joints
}

/// Draw a COCO-WholeBody detection onto `canvas` in `OpenPose` style.
///
/// Keypoints with a score at or below `threshold` are not drawn.
pub fn draw_openpose(canvas: &mut RgbImage, body: &WholeBody, threshold: f32) {
    let joints = openpose_joints(body, threshold);

    for (i, &[a, b]) in OPENPOSE_LIMBS.iter().take(OPENPOSE_DRAWN_LIMBS).enumerate() {
        if let (Some(p1), Some(p2)) = (joints[a], joints[b]) {
            let color = Color::from_openpose_index(i).scaled(LIMB_INTENSITY);
            draw_stick(canvas, p1, p2, STICK_WIDTH, color.into());
        }
    }
    for (j, joint) in joints.iter().enumerate() {
        if let Some((x, y)) = *joint {
            let color = Color::from_openpose_index(j);
            draw_filled_circle_mut(canvas, (x as i32, y as i32), JOINT_RADIUS, color.into());
        }
    }

    for hand in [WholeBody::LEFT_HAND, WholeBody::RIGHT_HAND] {
        let start = hand.start;
        let point = |k: usize| body.visible(start + k, threshold).map(|[x, y]| (x, y));

        for (e, &[a, b]) in HAND_EDGES.iter().enumerate() {
            if let (Some(p1), Some(p2)) = (point(a), point(b)) {
                let color = Color::from_hue(e as f32 / HAND_EDGES.len() as f32);
                draw_thick_line(canvas, p1, p2, HAND_THICKNESS, color.into());
            }
        }
        for k in 0..hand.len() {
            if let Some((x, y)) = point(k) {
                draw_filled_circle_mut(canvas, (x as i32, y as i32), JOINT_RADIUS, Color::BLUE.into());
            }
        }
    }

    for i in WholeBody::FACE {
        if let Some([x, y]) = body.visible(i, threshold) {
            draw_filled_circle_mut(canvas, (x as i32, y as i32), FACE_RADIUS, Color::WHITE.into());
        }
    }
}

/// Fill a polygon, skipping shapes that collapse to fewer than three points.
fn fill_polygon(canvas: &mut RgbImage, points: &[(f32, f32)], color: Rgb<u8>) {
    let mut poly: Vec<Point<i32>> = Vec::with_capacity(points.len());
    for &(x, y) in points {
        let p = Point::new(x.round() as i32, y.round() as i32);
        if poly.last() != Some(&p) {
            poly.push(p);
        }
    }
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() >= 3 {
        draw_polygon_mut(canvas, &poly, color);
    }
}

/// Draw a line of `thickness` pixels with round caps.
fn draw_thick_line(canvas: &mut RgbImage, p1: (f32, f32), p2: (f32, f32), thickness: i32, color: Rgb<u8>) {
    if thickness <= 1 {
        draw_line_segment_mut(canvas, p1, p2, color);
        return;
    }

    let half = thickness as f32 / 2.0;
    let (dx, dy) = (p2.0 - p1.0, p2.1 - p1.1);
    let length = dx.hypot(dy);
    if length >= 1.0 {
        let (nx, ny) = (-dy / length * half, dx / length * half);
        fill_polygon(
            canvas,
            &[
                (p1.0 + nx, p1.1 + ny),
                (p2.0 + nx, p2.1 + ny),
                (p2.0 - nx, p2.1 - ny),
                (p1.0 - nx, p1.1 - ny),
            ],
            color,
        );
    }

    let cap = (half.round() as i32).max(1);
    draw_filled_circle_mut(canvas, (p1.0 as i32, p1.1 as i32), cap, color);
    draw_filled_circle_mut(canvas, (p2.0 as i32, p2.1 as i32), cap, color);
}

/// Draw an `OpenPose` limb: a filled ellipse spanning both joints.
fn draw_stick(canvas: &mut RgbImage, p1: (f32, f32), p2: (f32, f32), half_width: f32, color: Rgb<u8>) {
    const SEGMENTS: usize = 36;

    let (mx, my) = ((p1.0 + p2.0) / 2.0, (p1.1 + p2.1) / 2.0);
    let (dx, dy) = (p2.0 - p1.0, p2.1 - p1.1);
    let length = dx.hypot(dy);
    if length < 1.0 {
        return;
    }
    let (sin_a, cos_a) = dy.atan2(dx).sin_cos();

    let points: Vec<(f32, f32)> = (0..SEGMENTS)
        .map(|s| {
            let theta = (s as f32 / SEGMENTS as f32) * std::f32::consts::TAU;
            let (ex, ey) = (length / 2.0 * theta.cos(), half_width * theta.sin());
            (mx + ex * cos_a - ey * sin_a, my + ex * sin_a + ey * cos_a)
        })
        .collect();

    fill_polygon(canvas, &points, color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::{Landmark, PersonLandmarks};

    fn person(points: &[(f32, f32, f32)]) -> PersonLandmarks {
        let mut all = vec![Landmark { x: 0.0, y: 0.0, visibility: 0.0 }; 17];
        for (i, &(x, y, visibility)) in points.iter().enumerate() {
            all[i] = Landmark { x, y, visibility };
        }
        PersonLandmarks { points: all }
    }

    fn lit_pixels(canvas: &RgbImage) -> usize {
        canvas.pixels().filter(|p| p.0 != [0, 0, 0]).count()
    }

    #[test]
    fn test_draw_landmarks_draws_visible_limbs() {
        let mut canvas = RgbImage::new(200, 200);
        // Nose and both eyes, all visible: limbs [1,2], [0,1], [0,2].
        let landmarks = Landmarks {
            people: vec![person(&[(0.5, 0.3, 0.9), (0.4, 0.2, 0.9), (0.6, 0.2, 0.9)])],
        };
        draw_landmarks(&mut canvas, &landmarks, &LandmarkStyle::default());

        assert!(lit_pixels(&canvas) > 0);
        // Midpoint of the eye-to-eye limb is green (face limbs use palette index 16).
        assert_eq!(canvas.get_pixel(100, 40).0, [0, 255, 0]);
    }

    #[test]
    fn test_draw_landmarks_skips_low_visibility() {
        let mut canvas = RgbImage::new(100, 100);
        let landmarks = Landmarks {
            people: vec![person(&[(0.5, 0.5, 0.2), (0.4, 0.4, 0.3)])],
        };
        draw_landmarks(&mut canvas, &landmarks, &LandmarkStyle::default());
        assert_eq!(lit_pixels(&canvas), 0);
    }

    #[test]
    fn test_style_sizes_scale_with_image() {
        let style = LandmarkStyle::default();
        let (small_line, small_radius) = style.sizes(320, 240);
        let (large_line, large_radius) = style.sizes(4000, 3000);
        assert!(large_line > small_line);
        assert!(large_radius > small_radius);

        let fixed = LandmarkStyle { line_width: Some(3), radius: Some(7), ..style };
        assert_eq!(fixed.sizes(4000, 3000), (3, 7));
    }

    fn wholebody_with(points: &[(usize, f32, f32)]) -> WholeBody {
        let mut body = WholeBody {
            points: vec![[0.0, 0.0]; WholeBody::NUM_KEYPOINTS],
            scores: vec![0.0; WholeBody::NUM_KEYPOINTS],
        };
        for &(i, x, y) in points {
            body.points[i] = [x, y];
            body.scores[i] = 0.9;
        }
        body
    }

    #[test]
    fn test_openpose_neck_synthesized() {
        let body = wholebody_with(&[(5, 60.0, 50.0), (6, 40.0, 50.0)]);
        let joints = openpose_joints(&body, OPENPOSE_THRESHOLD);
        assert_eq!(joints[1], Some((50.0, 50.0)));
        assert_eq!(joints[2], Some((40.0, 50.0))); // right shoulder
        assert_eq!(joints[5], Some((60.0, 50.0))); // left shoulder

        let one_shoulder = wholebody_with(&[(5, 60.0, 50.0)]);
        assert_eq!(openpose_joints(&one_shoulder, OPENPOSE_THRESHOLD)[1], None);
    }

    #[test]
    fn test_draw_openpose_body_hand_face() {
        let mut canvas = RgbImage::new(200, 200);
        let body = wholebody_with(&[
            (5, 120.0, 60.0),
            (6, 80.0, 60.0),
            (91, 30.0, 150.0),
            (92, 40.0, 160.0),
            (40, 100.0, 20.0),
        ]);
        draw_openpose(&mut canvas, &body, OPENPOSE_THRESHOLD);

        // Neck joint: OpenPose color 1.
        assert_eq!(canvas.get_pixel(100, 60).0, [255, 85, 0]);
        // Hand wrist dot is blue.
        assert_eq!(canvas.get_pixel(30, 150).0, [0, 0, 255]);
        // Face point is white.
        assert_eq!(canvas.get_pixel(100, 20).0, [255, 255, 255]);
        // Untouched corner stays black.
        assert_eq!(canvas.get_pixel(199, 199).0, [0, 0, 0]);
    }

    #[test]
    fn test_degenerate_limbs_do_not_panic() {
        let mut canvas = RgbImage::new(50, 50);
        draw_stick(&mut canvas, (10.0, 10.0), (10.2, 10.1), STICK_WIDTH, Rgb([255, 0, 0]));
        draw_thick_line(&mut canvas, (5.0, 5.0), (5.0, 5.0), 3, Rgb([255, 0, 0]));
        fill_polygon(&mut canvas, &[(1.0, 1.0), (1.1, 1.0), (1.0, 0.9)], Rgb([255, 0, 0]));
    }
}
