//! Windowed structural similarity, aggregated into a coarse block grid so
//! the caller can tell *where* two frames disagree, not only by how much.

use image::GrayImage;
use serde::{Deserialize, Serialize};

const WINDOW: u32 = 8;
const STRIDE: u32 = 4;
const C1: f64 = (0.01 * 255.0) * (0.01 * 255.0);
const C2: f64 = (0.03 * 255.0) * (0.03 * 255.0);

/// Mean SSIM of the windows whose centre falls inside one grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlockScore {
    pub row: u32,
    pub col: u32,
    /// `0.0..=1.0`
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructuralReport {
    /// Mean over every window, `0.0..=1.0`.
    pub global: f64,
    /// Row-major, `grid × grid` entries.
    pub blocks: Vec<BlockScore>,
}

/// Compare two equally sized frames. Mismatched sizes score zero.
pub fn structural_similarity(a: &GrayImage, b: &GrayImage, grid: u32) -> StructuralReport {
    let grid = grid.max(1);
    let (width, height) = a.dimensions();

    if a.dimensions() != b.dimensions() || width < WINDOW || height < WINDOW {
        return StructuralReport {
            global: 0.0,
            blocks: (0..grid * grid)
                .map(|i| BlockScore {
                    row: i / grid,
                    col: i % grid,
                    score: 0.0,
                })
                .collect(),
        };
    }

    let cells = (grid * grid) as usize;
    let mut block_sum = vec![0.0_f64; cells];
    let mut block_count = vec![0_u32; cells];
    let mut total = 0.0;
    let mut count = 0_u32;

    let mut y = 0;
    while y + WINDOW <= height {
        let mut x = 0;
        while x + WINDOW <= width {
            let score = window_ssim(a, b, x, y);

            let cx = x + WINDOW / 2;
            let cy = y + WINDOW / 2;
            let col = (cx * grid / width).min(grid - 1);
            let row = (cy * grid / height).min(grid - 1);
            let idx = (row * grid + col) as usize;
            block_sum[idx] += score;
            block_count[idx] += 1;

            total += score;
            count += 1;
            x += STRIDE;
        }
        y += STRIDE;
    }

    let blocks = (0..cells)
        .map(|idx| BlockScore {
            row: idx as u32 / grid,
            col: idx as u32 % grid,
            score: if block_count[idx] > 0 {
                block_sum[idx] / block_count[idx] as f64
            } else {
                1.0
            },
        })
        .collect();

    StructuralReport {
        global: if count > 0 { total / count as f64 } else { 0.0 },
        blocks,
    }
}

fn window_ssim(a: &GrayImage, b: &GrayImage, x0: u32, y0: u32) -> f64 {
    let n = (WINDOW * WINDOW) as f64;
    let mut sum_a = 0.0;
    let mut sum_b = 0.0;
    for y in y0..y0 + WINDOW {
        for x in x0..x0 + WINDOW {
            sum_a += a.get_pixel(x, y)[0] as f64;
            sum_b += b.get_pixel(x, y)[0] as f64;
        }
    }
    let mu_a = sum_a / n;
    let mu_b = sum_b / n;

    let mut var_a = 0.0;
    let mut var_b = 0.0;
    let mut cov = 0.0;
    for y in y0..y0 + WINDOW {
        for x in x0..x0 + WINDOW {
            let da = a.get_pixel(x, y)[0] as f64 - mu_a;
            let db = b.get_pixel(x, y)[0] as f64 - mu_b;
            var_a += da * da;
            var_b += db * db;
            cov += da * db;
        }
    }
    var_a /= n - 1.0;
    var_b /= n - 1.0;
    cov /= n - 1.0;

    let numerator = (2.0 * mu_a * mu_b + C1) * (2.0 * cov + C2);
    let denominator = (mu_a * mu_a + mu_b * mu_b + C1) * (var_a + var_b + C2);

    (numerator / denominator).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn checker(size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            Luma([if (x / 8 + y / 8) % 2 == 0 { 40 } else { 210 }])
        })
    }

    #[test]
    fn identical_frames_score_one_everywhere() {
        let frame = checker(64);
        let report = structural_similarity(&frame, &frame, 4);
        assert!((report.global - 1.0).abs() < 1e-9);
        assert_eq!(report.blocks.len(), 16);
        assert!(report.blocks.iter().all(|b| (b.score - 1.0).abs() < 1e-9));
    }

    #[test]
    fn damage_is_localized_to_its_block() {
        let reference = checker(64);
        let mut damaged = reference.clone();
        // Blank out the lower-right 16x16 cell.
        for y in 48..64 {
            for x in 48..64 {
                damaged.put_pixel(x, y, Luma([128]));
            }
        }

        let report = structural_similarity(&reference, &damaged, 4);
        let worst = report
            .blocks
            .iter()
            .min_by(|a, b| a.score.total_cmp(&b.score))
            .copied()
            .unwrap();
        assert_eq!((worst.row, worst.col), (3, 3));

        let top_left = report.blocks[0];
        assert!((top_left.score - 1.0).abs() < 1e-9);
        assert!(report.global < 1.0);
    }

    #[test]
    fn mismatched_dimensions_score_zero() {
        let report = structural_similarity(&checker(64), &checker(32), 4);
        assert_eq!(report.global, 0.0);
        assert_eq!(report.blocks.len(), 16);
    }
}
