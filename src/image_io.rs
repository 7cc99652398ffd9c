// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Image loading, channel-order conversion and PNG persistence.
//!
//! Images travel through the pipeline as HWC `Array3<u8>` buffers. Whether the
//! channels are RGB or BGR is tracked explicitly with [`ChannelOrder`], since the
//! two backends expect different orders.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageFormat, ImageReader, RgbImage};
use ndarray::Array3;

use crate::error::{Result, SkeletonError};

/// Channel order of a 3-channel HWC buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
    /// Red, green, blue.
    #[default]
    Rgb,
    /// Blue, green, red (`OpenCV` convention).
    Bgr,
}

impl std::fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rgb => write!(f, "RGB"),
            Self::Bgr => write!(f, "BGR"),
        }
    }
}

/// Convert a buffer from one channel order to another.
///
/// Returns the input unchanged when the orders match.
#[must_use]
pub fn convert_order(image: Array3<u8>, from: ChannelOrder, to: ChannelOrder) -> Array3<u8> {
    if from == to || image.shape()[2] < 3 {
        return image;
    }
    let mut image = image;
    for mut pixel in image.lanes_mut(ndarray::Axis(2)) {
        pixel.swap(0, 2);
    }
    image
}

/// Load an image from disk, upright.
///
/// The EXIF orientation tag is applied, so a portrait phone shot stored as
/// rotated landscape data comes back in portrait. JPEG pixels are decoded with
/// `jpeg-decoder` first, which handles some progressive and restart-marker
/// files that the default decoder rejects. Everything else (and any JPEG the
/// fast path cannot handle) goes through the `image` decoder.
///
/// # Errors
///
/// Returns [`SkeletonError::ImageError`] if the file cannot be decoded.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let load_error = |e: image::ImageError| {
        SkeletonError::ImageError(format!("Failed to load image {}: {e}", path.display()))
    };

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    let is_jpeg = matches!(ext.as_deref(), Some("jpg" | "jpeg"));

    let mut decoder = ImageReader::open(path)
        .and_then(ImageReader::with_guessed_format)
        .map_err(image::ImageError::IoError)
        .and_then(ImageReader::into_decoder);
    let orientation = match &mut decoder {
        Ok(d) => d.orientation().unwrap_or(Orientation::NoTransforms),
        Err(_) => Orientation::NoTransforms,
    };

    let fast = if is_jpeg { decode_jpeg(path) } else { None };
    let mut image = match (fast, decoder) {
        (Some(img), _) => img,
        (None, Ok(d)) => DynamicImage::from_decoder(d).map_err(load_error)?,
        (None, Err(e)) => return Err(load_error(e)),
    };
    image.apply_orientation(orientation);
    Ok(image)
}

fn decode_jpeg(path: &Path) -> Option<DynamicImage> {
    let file = File::open(path).ok()?;
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(file));
    let pixels = decoder.decode().ok()?;
    let info = decoder.info()?;
    let (width, height) = (u32::from(info.width), u32::from(info.height));

    match info.pixel_format {
        jpeg_decoder::PixelFormat::RGB24 => {
            image::ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        jpeg_decoder::PixelFormat::L8 => {
            image::ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        _ => None,
    }
}

/// Convert a `DynamicImage` to an RGB HWC array.
///
/// # Errors
///
/// Returns [`SkeletonError::ImageError`] if the pixel buffer does not match the
/// image dimensions.
pub fn image_to_array(image: &DynamicImage) -> Result<Array3<u8>> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    Array3::from_shape_vec((height as usize, width as usize, 3), rgb.into_raw())
        .map_err(|e| SkeletonError::ImageError(format!("Failed to create array from image: {e}")))
}

/// Convert an HWC buffer in `order` into an `RgbImage`.
///
/// # Errors
///
/// Returns [`SkeletonError::ImageError`] if the buffer is not `H×W×3`.
pub fn array_to_rgb_image(data: &Array3<u8>, order: ChannelOrder) -> Result<RgbImage> {
    let (height, width, channels) = data.dim();
    if channels != 3 || height == 0 || width == 0 {
        return Err(SkeletonError::ImageError(format!(
            "expected a non-empty HxWx3 buffer, got {height}x{width}x{channels}"
        )));
    }

    let rgb = convert_order(data.as_standard_layout().into_owned(), order, ChannelOrder::Rgb);
    let (raw, _offset) = rgb.into_raw_vec_and_offset();
    RgbImage::from_raw(width as u32, height as u32, raw)
        .ok_or_else(|| SkeletonError::ImageError("Failed to create image buffer".to_string()))
}

/// Encode an HWC buffer as PNG at `path`, overwriting any existing file.
///
/// # Errors
///
/// Returns an error if the buffer is malformed or the file cannot be written.
pub fn save_png(data: &Array3<u8>, order: ChannelOrder, path: &Path) -> Result<()> {
    save_rgb_png(&array_to_rgb_image(data, order)?, path)
}

/// Encode an `RgbImage` as PNG at `path`.
///
/// # Errors
///
/// Returns [`SkeletonError::ImageError`] if the file cannot be written.
pub fn save_rgb_png(image: &RgbImage, path: &Path) -> Result<()> {
    image.save_with_format(path, ImageFormat::Png).map_err(|e| {
        SkeletonError::ImageError(format!("Failed to save {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Array3<u8> {
        // 1x2 image: red pixel, blue pixel (RGB).
        Array3::from_shape_vec((1, 2, 3), vec![255, 0, 0, 0, 0, 255]).unwrap()
    }

    #[test]
    fn test_convert_order_swaps_red_and_blue() {
        let bgr = convert_order(sample(), ChannelOrder::Rgb, ChannelOrder::Bgr);
        assert_eq!(bgr.as_slice().unwrap(), &[0, 0, 255, 255, 0, 0]);
        let same = convert_order(sample(), ChannelOrder::Bgr, ChannelOrder::Bgr);
        assert_eq!(same, sample());
    }

    #[test]
    fn test_array_to_rgb_image_from_bgr() {
        let bgr = convert_order(sample(), ChannelOrder::Rgb, ChannelOrder::Bgr);
        let img = array_to_rgb_image(&bgr, ChannelOrder::Bgr).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(1, 0).0, [0, 0, 255]);
    }

    #[test]
    fn test_array_to_rgb_image_rejects_wrong_channels() {
        let gray = Array3::<u8>::zeros((4, 4, 1));
        assert!(array_to_rgb_image(&gray, ChannelOrder::Rgb).is_err());
        let empty = Array3::<u8>::zeros((0, 4, 3));
        assert!(array_to_rgb_image(&empty, ChannelOrder::Rgb).is_err());
    }

    #[test]
    fn test_save_and_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skeleton.png");
        save_png(&sample(), ChannelOrder::Rgb, &path).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (2, 1));
        assert_eq!(image_to_array(&loaded).unwrap(), sample());
    }

    #[test]
    fn test_load_corrupt_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();
        assert!(matches!(load_image(&path), Err(SkeletonError::ImageError(_))));
    }

    /// Baseline JPEG of `width`x`height` with an EXIF APP1 segment carrying
    /// `orientation`, inserted right after SOI.
    fn jpeg_with_orientation(width: u32, height: u32, orientation: u8) -> Vec<u8> {
        let pixel = image::Rgb([90, 120, 200]);
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, pixel));
        let mut jpeg = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .unwrap();

        // Big-endian TIFF header, one IFD entry: Orientation (0x0112), SHORT, count 1.
        let mut tiff = b"MM\0\x2a\0\0\0\x08".to_vec();
        tiff.extend_from_slice(&[0x00, 0x01]);
        tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
        tiff.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);

        let mut payload = b"Exif\0\0".to_vec();
        payload.extend_from_slice(&tiff);
        let len = u16::try_from(payload.len() + 2).unwrap();

        let mut out = jpeg[..2].to_vec();
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(&payload);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn test_load_applies_exif_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portrait.jpg");
        std::fs::write(&path, jpeg_with_orientation(200, 100, 6)).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (100, 200));
        let array = image_to_array(&loaded).unwrap();
        assert_eq!(array.dim(), (200, 100, 3));
    }

    #[test]
    fn test_load_without_orientation_tag_keeps_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("landscape.jpg");
        std::fs::write(&path, jpeg_with_orientation(200, 100, 1)).unwrap();

        let loaded = load_image(&path).unwrap();
        assert_eq!((loaded.width(), loaded.height()), (200, 100));
    }
}
