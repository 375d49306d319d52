//! Coarse colour-histogram anomaly detection.
//!
//! Each channel is quantised into four buckets (`value / 64`). A pixel is
//! anomalous when its bucket coordinates moved by two or more steps in total
//! between the reference and the return photo. Global brightness drift is
//! compensated first so a darker room does not read as staining.

use image::RgbImage;

use super::normalize::rgb_mean_luminance;

const BUCKET_WIDTH: u8 = 64;
const ANOMALY_SHIFT: u8 = 2;

/// Percentage (`0.0..=100.0`) of pixels whose colour bucket shifted.
pub fn color_anomaly_pct(reference: &RgbImage, returned: &RgbImage) -> f64 {
    if reference.dimensions() != returned.dimensions() {
        return 100.0;
    }
    let total = (reference.width() * reference.height()) as usize;
    if total == 0 {
        return 0.0;
    }

    let ref_mean = rgb_mean_luminance(reference);
    let ret_mean = rgb_mean_luminance(returned);
    let gain = if ret_mean > 1.0 {
        (ref_mean / ret_mean).clamp(0.5, 2.0)
    } else {
        1.0
    };

    let anomalous = reference
        .pixels()
        .zip(returned.pixels())
        .filter(|(a, b)| {
            let shift: u8 = (0..3)
                .map(|c| {
                    let adjusted = (b[c] as f64 * gain).round().clamp(0.0, 255.0) as u8;
                    bucket(a[c]).abs_diff(bucket(adjusted))
                })
                .sum();
            shift >= ANOMALY_SHIFT
        })
        .count();

    anomalous as f64 / total as f64 * 100.0
}

fn bucket(value: u8) -> u8 {
    value / BUCKET_WIDTH
}
