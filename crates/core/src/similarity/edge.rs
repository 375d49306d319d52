//! Edge-map and gradient-orientation comparisons.
//!
//! Both metrics run on the aligned grayscale frames and sample a sparse grid
//! once the frame grows beyond roughly 100×100 (edges) or 128×128
//! (orientation) pixels.

use std::f64::consts::TAU;

use image::GrayImage;

/// Largest Sobel magnitude for 8-bit input, `sqrt(2) × 4 × 255` rounded up.
const SOBEL_MAX: f64 = 1448.0;

/// Two edge strengths differ when they are further apart than this.
const EDGE_DELTA: f64 = 0.3;

const ORIENTATION_BINS: usize = 12;

/// Gradients weaker than this are treated as flat and not binned.
const MIN_GRADIENT: f64 = 4.0;

/// Fraction (`0.0..=1.0`) of edge-bearing sample points whose normalised
/// Sobel strength differs by more than [`EDGE_DELTA`].
///
/// Returns `1.0` for frames of different size and `0.0` when neither frame
/// has any edge at all.
pub fn edge_difference(a: &GrayImage, b: &GrayImage) -> f64 {
    if a.dimensions() != b.dimensions() {
        return 1.0;
    }
    let (width, height) = a.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let step = sample_step(width, height, 10_000);
    let mut edge_points = 0u64;
    let mut differing = 0u64;

    for y in (1..height - 1).step_by(step) {
        for x in (1..width - 1).step_by(step) {
            let e1 = sobel(a, x, y);
            let e2 = sobel(b, x, y);
            if e1 > 0.0 || e2 > 0.0 {
                edge_points += 1;
                if (e1 - e2).abs() > EDGE_DELTA {
                    differing += 1;
                }
            }
        }
    }

    if edge_points == 0 {
        return 0.0;
    }
    (differing as f64 / edge_points as f64).min(1.0)
}

/// Histogram intersection (`0.0..=1.0`) of magnitude-weighted gradient
/// orientations.
///
/// Two flat frames are a perfect match; one flat and one textured frame
/// share nothing.
pub fn gradient_orientation_similarity(a: &GrayImage, b: &GrayImage) -> f64 {
    if a.dimensions() != b.dimensions() {
        return 0.0;
    }
    let (width, height) = a.dimensions();
    if width < 3 || height < 3 {
        return 0.0;
    }

    let step = sample_step(width, height, 16_384);
    let mut hist_a = [0.0f64; ORIENTATION_BINS];
    let mut hist_b = [0.0f64; ORIENTATION_BINS];

    for y in (1..height - 1).step_by(step) {
        for x in (1..width - 1).step_by(step) {
            accumulate(&mut hist_a, a, x, y);
            accumulate(&mut hist_b, b, x, y);
        }
    }

    let sum_a: f64 = hist_a.iter().sum();
    let sum_b: f64 = hist_b.iter().sum();
    match (sum_a > 0.0, sum_b > 0.0) {
        (false, false) => 1.0,
        (true, true) => hist_a
            .iter()
            .zip(&hist_b)
            .map(|(p, q)| (p / sum_a).min(q / sum_b))
            .sum::<f64>()
            .clamp(0.0, 1.0),
        _ => 0.0,
    }
}

fn sample_step(width: u32, height: u32, area_per_sample: u64) -> usize {
    let area = width as f64 * height as f64;
    (area / area_per_sample as f64).sqrt().floor().max(1.0) as usize
}

/// Normalised Sobel magnitude at an interior pixel.
fn sobel(frame: &GrayImage, x: u32, y: u32) -> f64 {
    let p = |dx: i32, dy: i32| -> f64 {
        let px = (x as i32 + dx) as u32;
        let py = (y as i32 + dy) as u32;
        frame.get_pixel(px, py)[0] as f64
    };

    let gx = -p(-1, -1) + p(1, -1) - 2.0 * p(-1, 0) + 2.0 * p(1, 0) - p(-1, 1) + p(1, 1);
    let gy = -p(-1, -1) - 2.0 * p(0, -1) - p(1, -1) + p(-1, 1) + 2.0 * p(0, 1) + p(1, 1);

    ((gx * gx + gy * gy).sqrt() / SOBEL_MAX).min(1.0)
}

fn accumulate(hist: &mut [f64; ORIENTATION_BINS], frame: &GrayImage, x: u32, y: u32) {
    let gx = frame.get_pixel(x + 1, y)[0] as f64 - frame.get_pixel(x - 1, y)[0] as f64;
    let gy = frame.get_pixel(x, y + 1)[0] as f64 - frame.get_pixel(x, y - 1)[0] as f64;
    let magnitude = (gx * gx + gy * gy).sqrt();
    if magnitude <= MIN_GRADIENT {
        return;
    }

    let mut angle = gy.atan2(gx);
    if angle < 0.0 {
        angle += TAU;
    }
    let bin = ((angle / TAU * ORIENTATION_BINS as f64).floor() as usize).min(ORIENTATION_BINS - 1);
    hist[bin] += magnitude;
}
