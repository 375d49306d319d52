//! Side-by-side comparison preview shown to reviewers.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};

use crate::error::CoreError;

const THUMB: u32 = 200;
const GUTTER: u32 = 16;
const JPEG_QUALITY: u8 = 85;

/// Reference on the left, return on the right, each fitted into a
/// 200×200 cell on a white canvas.
pub fn render_preview(reference: &DynamicImage, returned: &DynamicImage) -> RgbImage {
    let width = THUMB * 2 + GUTTER * 3;
    let height = THUMB + GUTTER * 2;
    let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    for (slot, source) in [reference, returned].into_iter().enumerate() {
        let thumb = source.resize(THUMB, THUMB, FilterType::Triangle).to_rgb8();
        let cell_x = GUTTER + slot as u32 * (THUMB + GUTTER);
        let x = cell_x + (THUMB - thumb.width()) / 2;
        let y = GUTTER + (THUMB - thumb.height()) / 2;
        imageops::overlay(&mut canvas, &thumb, x as i64, y as i64);
    }

    canvas
}

/// Encode a preview as JPEG bytes.
pub fn encode_jpeg(preview: &RgbImage) -> Result<Vec<u8>, CoreError> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
        .encode_image(preview)
        .map_err(|e| CoreError::StorageFailure(format!("Failed to encode preview: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_has_fixed_canvas_and_white_border() {
        let red = DynamicImage::ImageRgb8(RgbImage::from_pixel(400, 100, Rgb([255, 0, 0])));
        let blue = DynamicImage::ImageRgb8(RgbImage::from_pixel(50, 50, Rgb([0, 0, 255])));

        let preview = render_preview(&red, &blue);
        assert_eq!(preview.dimensions(), (448, 232));
        assert_eq!(*preview.get_pixel(0, 0), Rgb([255, 255, 255]));
        // Centre of the left cell is the reference colour.
        assert_eq!(*preview.get_pixel(GUTTER + THUMB / 2, GUTTER + THUMB / 2), Rgb([255, 0, 0]));
    }

    #[test]
    fn jpeg_encoding_produces_soi_marker() {
        let preview = RgbImage::from_pixel(16, 16, Rgb([10, 20, 30]));
        let bytes = encode_jpeg(&preview).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }
}
