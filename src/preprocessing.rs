// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image preprocessing for the pose models.
//!
//! Two preparations are provided:
//!
//! - [`letterbox`]: aspect-preserving resize onto a gray canvas for YOLO pose,
//!   normalized to [0, 1].
//! - [`top_down_crop`]: the affine crop used by top-down whole-body models. The
//!   person box is padded, its aspect ratio fixed to the model input, and the
//!   pixels mean/std normalized.

#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::similar_names,
    clippy::suboptimal_flops
)]

use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer, images::Image};
use ndarray::{Array3, Array4};

use crate::error::{Result, SkeletonError};

/// Default letterbox padding color (gray).
pub const LETTERBOX_COLOR: [u8; 3] = [114, 114, 114];

/// Reciprocal of 255 for normalization.
const INV_255: f32 = 1.0 / 255.0;

/// Result of letterboxing an image, containing the tensor and transform info.
#[derive(Debug, Clone)]
pub struct PreprocessResult {
    /// Preprocessed image tensor in NCHW format, normalized to [0, 1].
    pub tensor: Array4<f32>,
    /// Original image dimensions (height, width).
    pub orig_shape: (u32, u32),
    /// Scale factors applied (`scale_y`, `scale_x`).
    pub scale: (f32, f32),
    /// Padding applied (`pad_top`, `pad_left`).
    pub padding: (f32, f32),
}

/// Letterbox an RGB HWC image for YOLO inference.
///
/// # Arguments
///
/// * `image` - RGB image as an HWC array.
/// * `target_size` - Target size as (height, width).
///
/// # Errors
///
/// Returns [`SkeletonError::ImageError`] if the image is empty or cannot be resized.
pub fn letterbox(image: &Array3<u8>, target_size: (usize, usize)) -> Result<PreprocessResult> {
    let (orig_h, orig_w, channels) = image.dim();
    if channels != 3 || orig_h == 0 || orig_w == 0 {
        return Err(SkeletonError::ImageError(format!(
            "cannot letterbox a {orig_h}x{orig_w}x{channels} image"
        )));
    }

    let (new_w, new_h, pad_left, pad_top, scale) =
        calculate_letterbox_params(orig_w as u32, orig_h as u32, target_size);

    let resized = resize_rgb(image, new_w.max(1), new_h.max(1))?;

    let (target_h, target_w) = target_size;
    let plane = target_h * target_w;
    let mut tensor = Array4::<f32>::zeros((1, 3, target_h, target_w));
    let data = tensor
        .as_slice_mut()
        .ok_or_else(|| SkeletonError::ImageError("letterbox tensor is not contiguous".to_string()))?;

    for c in 0..3 {
        data[c * plane..(c + 1) * plane].fill(f32::from(LETTERBOX_COLOR[c]) * INV_255);
    }

    let (new_w, new_h) = (new_w.max(1) as usize, new_h.max(1) as usize);
    let (pad_left, pad_top) = (pad_left as usize, pad_top as usize);
    for y in 0..new_h.min(target_h.saturating_sub(pad_top)) {
        let row = &resized[y * new_w * 3..(y + 1) * new_w * 3];
        let ty = y + pad_top;
        for x in 0..new_w.min(target_w.saturating_sub(pad_left)) {
            let idx = ty * target_w + x + pad_left;
            let px = &row[x * 3..x * 3 + 3];
            data[idx] = f32::from(px[0]) * INV_255;
            data[plane + idx] = f32::from(px[1]) * INV_255;
            data[2 * plane + idx] = f32::from(px[2]) * INV_255;
        }
    }

    Ok(PreprocessResult {
        tensor,
        orig_shape: (orig_h as u32, orig_w as u32),
        scale,
        padding: (pad_top as f32, pad_left as f32),
    })
}

/// Bilinear resize of an RGB HWC array, returning the packed RGB bytes.
fn resize_rgb(image: &Array3<u8>, dst_w: u32, dst_h: u32) -> Result<Vec<u8>> {
    let (src_h, src_w, _) = image.dim();
    let src_bytes = image.as_standard_layout().iter().copied().collect::<Vec<u8>>();

    if src_w as u32 == dst_w && src_h as u32 == dst_h {
        return Ok(src_bytes);
    }

    let src = Image::from_vec_u8(src_w as u32, src_h as u32, src_bytes, PixelType::U8x3)
        .map_err(|e| SkeletonError::ImageError(format!("Failed to create source image: {e}")))?;
    let mut dst = Image::new(dst_w, dst_h, PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear));
    Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .map_err(|e| SkeletonError::ImageError(format!("Failed to resize image: {e}")))?;

    Ok(dst.into_vec())
}

/// Calculate letterbox parameters for resizing.
///
/// Returns `(new_width, new_height, pad_left, pad_top, (scale_y, scale_x))`.
fn calculate_letterbox_params(
    orig_width: u32,
    orig_height: u32,
    target_size: (usize, usize),
) -> (u32, u32, u32, u32, (f32, f32)) {
    let (target_h, target_w) = (target_size.0 as f32, target_size.1 as f32);
    let (orig_h, orig_w) = (orig_height as f32, orig_width as f32);

    let scale = (target_h / orig_h).min(target_w / orig_w);

    let new_w = (orig_w * scale).round() as u32;
    let new_h = (orig_h * scale).round() as u32;

    let pad_w = (target_size.1 as u32).saturating_sub(new_w);
    let pad_h = (target_size.0 as u32).saturating_sub(new_h);

    let scale_x = new_w as f32 / orig_w;
    let scale_y = new_h as f32 / orig_h;

    (new_w, new_h, pad_w / 2, pad_h / 2, (scale_y, scale_x))
}

/// Map a point from letterboxed model space back to the original image.
#[must_use]
pub fn scale_point(x: f32, y: f32, scale: (f32, f32), padding: (f32, f32)) -> (f32, f32) {
    let (scale_y, scale_x) = scale;
    let (pad_top, pad_left) = padding;
    ((x - pad_left) / scale_x, (y - pad_top) / scale_y)
}

/// Scale box coordinates from model output space back to original image space.
#[must_use]
pub fn scale_coords(coords: &[f32; 4], scale: (f32, f32), padding: (f32, f32)) -> [f32; 4] {
    let (x1, y1) = scale_point(coords[0], coords[1], scale, padding);
    let (x2, y2) = scale_point(coords[2], coords[3], scale, padding);
    [x1, y1, x2, y2]
}

/// Clip box coordinates to image bounds. `shape` is (height, width).
#[must_use]
pub const fn clip_coords(coords: &[f32; 4], shape: (u32, u32)) -> [f32; 4] {
    let (h, w) = (shape.0 as f32, shape.1 as f32);
    [
        coords[0].clamp(0.0, w),
        coords[1].clamp(0.0, h),
        coords[2].clamp(0.0, w),
        coords[3].clamp(0.0, h),
    ]
}

/// Per-channel normalization applied after the top-down crop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    /// Channel means, in the buffer's channel order.
    pub mean: [f32; 3],
    /// Channel standard deviations, in the buffer's channel order.
    pub std: [f32; 3],
}

impl Normalization {
    /// ImageNet statistics on the 0..255 scale.
    pub const IMAGENET: Self = Self {
        mean: [123.675, 116.28, 103.53],
        std: [58.395, 57.12, 57.375],
    };
}

/// Result of a top-down crop: the model tensor and the box it was cut from.
#[derive(Debug, Clone)]
pub struct TopDownCrop {
    /// NCHW tensor of the model input size.
    pub tensor: Array4<f32>,
    /// Crop center in image coordinates (x, y).
    pub center: [f32; 2],
    /// Crop size in image coordinates (width, height), after padding and aspect fix.
    pub scale: [f32; 2],
}

/// Center and size of a padded `xyxy` box, as `(center, scale)`.
#[must_use]
pub fn box_to_center_scale(bbox: [f32; 4], padding: f32) -> ([f32; 2], [f32; 2]) {
    let center = [(bbox[0] + bbox[2]) * 0.5, (bbox[1] + bbox[3]) * 0.5];
    let scale = [(bbox[2] - bbox[0]) * padding, (bbox[3] - bbox[1]) * padding];
    (center, scale)
}

/// Grow `scale` so its aspect ratio (w / h) equals `aspect_ratio`.
#[must_use]
pub fn fix_aspect_ratio(scale: [f32; 2], aspect_ratio: f32) -> [f32; 2] {
    let [w, h] = scale;
    if w > h * aspect_ratio {
        [w, w / aspect_ratio]
    } else {
        [h * aspect_ratio, h]
    }
}

/// Crop `bbox` out of `image` for a top-down pose model.
///
/// The box is padded by `padding`, its aspect ratio is fixed to the model
/// input, and the region is sampled bilinearly into an `input_size` tensor.
/// Pixels outside the image are zero before normalization. Channel order is
/// kept as given.
///
/// # Arguments
///
/// * `image` - HWC image, in the channel order the model expects.
/// * `bbox` - Person box `[x1, y1, x2, y2]` in image coordinates.
/// * `input_size` - Model input as (width, height).
/// * `padding` - Box padding factor (1.25 for `RTMPose` style models).
/// * `norm` - Mean/std normalization.
///
/// # Errors
///
/// Returns [`SkeletonError::ImageError`] for an empty image or degenerate box.
pub fn top_down_crop(
    image: &Array3<u8>,
    bbox: [f32; 4],
    input_size: (usize, usize),
    padding: f32,
    norm: Normalization,
) -> Result<TopDownCrop> {
    let (img_h, img_w, channels) = image.dim();
    if channels != 3 || img_h == 0 || img_w == 0 {
        return Err(SkeletonError::ImageError(format!(
            "cannot crop a {img_h}x{img_w}x{channels} image"
        )));
    }

    let (in_w, in_h) = input_size;
    let (center, scale) = box_to_center_scale(bbox, padding);
    if scale[0] <= 0.0 || scale[1] <= 0.0 {
        return Err(SkeletonError::ImageError(format!("degenerate crop box {bbox:?}")));
    }
    let scale = fix_aspect_ratio(scale, in_w as f32 / in_h as f32);

    // Axis-aligned affine: dst (x, y) -> src (x0 + x * sx, y0 + y * sy).
    let sx = scale[0] / in_w as f32;
    let sy = scale[1] / in_h as f32;
    let x0 = center[0] - scale[0] * 0.5;
    let y0 = center[1] - scale[1] * 0.5;

    let mut tensor = Array4::<f32>::zeros((1, 3, in_h, in_w));
    for y in 0..in_h {
        let src_y = y0 + y as f32 * sy;
        for x in 0..in_w {
            let src_x = x0 + x as f32 * sx;
            let px = sample_bilinear(image, src_x, src_y);
            for c in 0..3 {
                tensor[[0, c, y, x]] = (px[c] - norm.mean[c]) / norm.std[c];
            }
        }
    }

    Ok(TopDownCrop {
        tensor,
        center,
        scale,
    })
}

/// Bilinear sample with a zero border.
fn sample_bilinear(image: &Array3<u8>, x: f32, y: f32) -> [f32; 3] {
    let (h, w, _) = image.dim();
    let (xf, yf) = (x.floor(), y.floor());
    let (dx, dy) = (x - xf, y - yf);
    let (xi, yi) = (xf as i64, yf as i64);

    let fetch = |px: i64, py: i64| -> [f32; 3] {
        if px < 0 || py < 0 || px >= w as i64 || py >= h as i64 {
            return [0.0; 3];
        }
        let (px, py) = (px as usize, py as usize);
        [
            f32::from(image[[py, px, 0]]),
            f32::from(image[[py, px, 1]]),
            f32::from(image[[py, px, 2]]),
        ]
    };

    let p00 = fetch(xi, yi);
    let p10 = fetch(xi + 1, yi);
    let p01 = fetch(xi, yi + 1);
    let p11 = fetch(xi + 1, yi + 1);

    let mut out = [0.0; 3];
    for c in 0..3 {
        let top = p00[c] * (1.0 - dx) + p10[c] * dx;
        let bottom = p01[c] * (1.0 - dx) + p11[c] * dx;
        out[c] = top * (1.0 - dy) + bottom * dy;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letterbox_params_square() {
        let (new_w, new_h, pad_left, pad_top, _scale) =
            calculate_letterbox_params(640, 640, (640, 640));

        assert_eq!(new_w, 640);
        assert_eq!(new_h, 640);
        assert_eq!(pad_left, 0);
        assert_eq!(pad_top, 0);
    }

    #[test]
    fn test_letterbox_params_wide() {
        let (new_w, new_h, pad_left, pad_top, scale) =
            calculate_letterbox_params(1280, 720, (640, 640));

        assert_eq!((new_w, new_h), (640, 360));
        assert_eq!((pad_left, pad_top), (0, 140));
        assert!((scale.0 - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_letterbox_tensor_padding() {
        let image = Array3::<u8>::from_elem((2, 4, 3), 255);
        let result = letterbox(&image, (8, 8)).unwrap();

        assert_eq!(result.tensor.shape(), &[1, 3, 8, 8]);
        assert_eq!(result.orig_shape, (2, 4));
        assert_eq!(result.padding, (2.0, 0.0));
        // Top rows are padding, middle rows hold the white image.
        assert!((result.tensor[[0, 0, 0, 0]] - 114.0 / 255.0).abs() < 1e-6);
        assert!((result.tensor[[0, 0, 4, 4]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scale_coords() {
        let coords = [100.0, 100.0, 200.0, 200.0];
        let scaled = scale_coords(&coords, (1.0, 1.0), (10.0, 10.0));

        assert!((scaled[0] - 90.0).abs() < 1e-6);
        assert!((scaled[1] - 90.0).abs() < 1e-6);
        assert!((scaled[2] - 190.0).abs() < 1e-6);
        assert!((scaled[3] - 190.0).abs() < 1e-6);
    }

    #[test]
    fn test_clip_coords() {
        let clipped = clip_coords(&[-10.0, -20.0, 700.0, 500.0], (480, 640));
        assert_eq!(clipped, [0.0, 0.0, 640.0, 480.0]);
    }

    #[test]
    fn test_center_scale_and_aspect() {
        let (center, scale) = box_to_center_scale([0.0, 0.0, 100.0, 200.0], 1.25);
        assert_eq!(center, [50.0, 100.0]);
        assert_eq!(scale, [125.0, 250.0]);

        // 288 / 384 = 0.75: a tall box keeps its height and widens.
        let fixed = fix_aspect_ratio(scale, 0.75);
        assert!((fixed[0] - 187.5).abs() < 1e-4);
        assert!((fixed[1] - 250.0).abs() < 1e-4);

        // A wide box keeps its width and grows taller.
        let fixed = fix_aspect_ratio([300.0, 100.0], 0.75);
        assert!((fixed[1] - 400.0).abs() < 1e-4);
    }

    #[test]
    fn test_top_down_crop_normalizes_and_zero_pads() {
        let image = Array3::<u8>::from_elem((40, 30, 3), 200);
        let crop = top_down_crop(
            &image,
            [0.0, 0.0, 30.0, 40.0],
            (12, 16),
            1.25,
            Normalization::IMAGENET,
        )
        .unwrap();

        assert_eq!(crop.tensor.shape(), &[1, 3, 16, 12]);
        assert_eq!(crop.center, [15.0, 20.0]);

        let norm = Normalization::IMAGENET;
        // Corner samples fall outside the image (zero pixels).
        let corner = crop.tensor[[0, 0, 0, 0]];
        assert!((corner - (0.0 - norm.mean[0]) / norm.std[0]).abs() < 1e-4);
        // The center samples the image itself.
        let middle = crop.tensor[[0, 1, 8, 6]];
        assert!((middle - (200.0 - norm.mean[1]) / norm.std[1]).abs() < 1e-3);
    }

    #[test]
    fn test_top_down_crop_rejects_degenerate_box() {
        let image = Array3::<u8>::zeros((10, 10, 3));
        let err = top_down_crop(&image, [5.0, 5.0, 5.0, 9.0], (4, 4), 1.25, Normalization::IMAGENET);
        assert!(err.is_err());
    }
}
