//! Resampling and luminance alignment applied before any metric runs.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, RgbImage};

/// Mean and standard deviation of a grayscale frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LuminanceStats {
    pub mean: f64,
    pub stddev: f64,
}

/// Resample to a `size`×`size` grayscale frame.
pub fn to_gray(image: &DynamicImage, size: u32) -> GrayImage {
    image.resize_exact(size, size, FilterType::Triangle).to_luma8()
}

/// Resample to a `size`×`size` RGB frame.
pub fn to_rgb(image: &DynamicImage, size: u32) -> RgbImage {
    image.resize_exact(size, size, FilterType::Triangle).to_rgb8()
}

pub fn luminance_stats(frame: &GrayImage) -> LuminanceStats {
    let pixels = frame.as_raw();
    if pixels.is_empty() {
        return LuminanceStats {
            mean: 128.0,
            stddev: 64.0,
        };
    }

    let count = pixels.len() as f64;
    let (sum, sum_sq) = pixels.iter().fold((0.0, 0.0), |(s, sq), &p| {
        let v = p as f64;
        (s + v, sq + v * v)
    });
    let mean = sum / count;
    let variance = (sum_sq / count - mean * mean).max(1.0);

    LuminanceStats {
        mean,
        stddev: variance.sqrt(),
    }
}

/// Shift and scale `frame` so its luminance distribution matches `target`.
///
/// The contrast gain is clamped to `0.5..=2.5` so a blank or badly
/// under-exposed return photo cannot be stretched into a plausible match.
pub fn align_luminance(frame: &mut GrayImage, target: LuminanceStats) {
    let current = luminance_stats(frame);
    let scale = (target.stddev / current.stddev.max(1.0)).clamp(0.5, 2.5);
    let offset = target.mean - current.mean * scale;

    for pixel in frame.pixels_mut() {
        let adjusted = (pixel[0] as f64 * scale + offset).round();
        pixel[0] = adjusted.clamp(0.0, 255.0) as u8;
    }
}

/// Tile-local histogram equalization with clipping, applied per channel.
///
/// Each `tile`×`tile` block gets its own contrast-limited mapping so a shadow
/// across one part of the photo does not skew the colour comparison of the
/// rest. `tile` is clamped to `8..=128` and `clip_limit` to `0.5..=8.0`.
pub fn equalize_adaptive(frame: &mut RgbImage, tile: u32, clip_limit: f64) {
    let tile = tile.clamp(8, 128);
    let clip_limit = clip_limit.clamp(0.5, 8.0);
    let (width, height) = frame.dimensions();

    for y_start in (0..height).step_by(tile as usize) {
        let y_end = (y_start + tile).min(height);
        for x_start in (0..width).step_by(tile as usize) {
            let x_end = (x_start + tile).min(width);

            let mut hist = [[0u32; 256]; 3];
            for y in y_start..y_end {
                for x in x_start..x_end {
                    let pixel = frame.get_pixel(x, y);
                    for (channel, counts) in hist.iter_mut().enumerate() {
                        counts[pixel[channel] as usize] += 1;
                    }
                }
            }

            let count = (x_end - x_start) * (y_end - y_start);
            let threshold = ((clip_limit * count as f64 / 256.0).round() as u32).max(1);
            let maps = hist.map(|counts| equalization_map(&clip_histogram(counts, threshold), count));

            for y in y_start..y_end {
                for x in x_start..x_end {
                    let pixel = frame.get_pixel_mut(x, y);
                    for (channel, map) in maps.iter().enumerate() {
                        pixel[channel] = map[pixel[channel] as usize];
                    }
                }
            }
        }
    }
}

/// Cap every bin at `threshold` and spread the excess evenly, remainder to
/// the darkest bins.
fn clip_histogram(mut hist: [u32; 256], threshold: u32) -> [u32; 256] {
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > threshold {
            excess += *bin - threshold;
            *bin = threshold;
        }
    }

    let increment = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += increment + u32::from(i < remainder);
    }
    hist
}

fn equalization_map(hist: &[u32; 256], count: u32) -> [u8; 256] {
    let scale = 255.0 / count.max(1) as f64;
    let mut map = [0u8; 256];
    let mut cdf = 0u32;
    for (value, &bin) in map.iter_mut().zip(hist) {
        cdf += bin;
        *value = (cdf as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }
    map
}

/// Mean luminance (Rec. 601 weights) of an RGB frame.
pub fn rgb_mean_luminance(frame: &RgbImage) -> f64 {
    let count = (frame.width() * frame.height()) as f64;
    if count == 0.0 {
        return 0.0;
    }
    let total: f64 = frame
        .pixels()
        .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
        .sum();
    total / count
}
