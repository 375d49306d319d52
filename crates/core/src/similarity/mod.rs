//! Hybrid image similarity engine.
//!
//! Given a reference (borrow-time) photo and a return photo, produces a
//! bounded similarity percentage, a per-metric breakdown, a confidence band,
//! localized issue strings and a size-aware severity. Pure and deterministic:
//! no I/O happens here except in [`compare_files`].

pub mod color;
pub mod edge;
pub mod hash;
pub mod issues;
pub mod normalize;
pub mod pixel;
pub mod preview;
pub mod ssim;

use std::path::Path;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::policy::{ConfidenceBand, ItemSize, Severity, ThresholdTable, Verdict};

pub use issues::{
    join_issues, normalize_issue, IssueThresholds, NO_VISIBLE_DAMAGE, SHAPE_DIFFERENCE,
    SUCCESS_MESSAGE, TEXTURE_VARIATION,
};
pub use ssim::BlockScore;

/// Version tag stored alongside every result so old rows can be told apart.
pub const ALGORITHM_VERSION: &str = "hybrid-v3";

pub const METHOD_HYBRID: &str = "hybrid";
pub const METHOD_PIXEL_FALLBACK: &str = "hybrid-pixel-fallback";

/// Relative contribution of each metric to the combined score.
///
/// The edge weight is attenuated by up to half when the gradient
/// orientations agree, so a rotated but intact item is not punished twice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricWeights {
    pub structural: f64,
    pub hash: f64,
    pub color: f64,
    pub edge: f64,
    pub gradient: f64,
    /// Zero by default: the pixel score only enters through the
    /// disagreement fallback.
    pub pixel: f64,
}

impl Default for MetricWeights {
    fn default() -> Self {
        Self {
            structural: 0.50,
            hash: 0.30,
            color: 0.05,
            edge: 0.05,
            gradient: 0.10,
            pixel: 0.0,
        }
    }
}

/// Tunables for one engine run.
#[derive(Debug, Clone)]
pub struct ComparisonConfig {
    /// Side length of the grayscale frame used for SSIM and pixel metrics.
    pub analysis_size: u32,
    /// dHash produces `hash_size²` bits.
    pub hash_size: u32,
    /// The SSIM map is summarised into `block_grid × block_grid` regions.
    pub block_grid: u32,
    /// Side length of the RGB frame used for the colour histogram.
    pub color_sample_size: u32,
    /// Tile side and clip limit for the adaptive equalization run on the
    /// colour frames.
    pub equalize_tile: u32,
    pub equalize_clip_limit: f64,
    pub weights: MetricWeights,
    /// Beyond this gap between SSIM and hash similarity the pixel score is
    /// blended in as a tie-breaker.
    pub disagreement_limit: f64,
    /// Below this hash similarity the object is treated as absent and the
    /// score is capped at `absent_object_cap` outright.
    pub absent_object_presence: f64,
    pub absent_object_cap: f64,
    /// Ceiling applied when the hash similarity is under
    /// `issues.object_presence` and the edge maps also disagree on more than
    /// `edge_mismatch_limit` of their edge points.
    pub missing_object_cap: f64,
    pub edge_mismatch_limit: f64,
    pub issues: IssueThresholds,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            analysis_size: 300,
            hash_size: 8,
            block_grid: 4,
            color_sample_size: 300,
            equalize_tile: 32,
            equalize_clip_limit: 2.0,
            weights: MetricWeights::default(),
            disagreement_limit: 35.0,
            absent_object_presence: 28.0,
            absent_object_cap: 30.0,
            missing_object_cap: 35.0,
            edge_mismatch_limit: 0.25,
            issues: IssueThresholds::default(),
        }
    }
}

/// Per-metric breakdown, each a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub hash_similarity: f64,
    pub structural_similarity: f64,
    pub color_anomaly_pct: f64,
    /// Share of edge points whose strength changed, `0.0..=100.0`.
    pub edge_difference_pct: f64,
    pub gradient_similarity: f64,
    pub pixel_difference_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Combined score, `0.0..=100.0`, rounded to two decimals.
    pub similarity: f64,
    pub sub_scores: SubScores,
    pub confidence: ConfidenceBand,
    pub issues: Vec<String>,
    pub severity: Severity,
    pub verdict: Verdict,
    pub method_used: String,
    pub item_size: ItemSize,
    pub blocks: Vec<BlockScore>,
    pub algorithm_version: String,
}

impl ComparisonResult {
    /// Issues as stored in `detected_issues`.
    pub fn detected_issues(&self) -> String {
        join_issues(&self.issues)
    }

    /// Lowest-scoring region, if any block fell below the issue threshold.
    pub fn worst_block(&self) -> Option<&BlockScore> {
        self.blocks.iter().min_by(|a, b| a.score.total_cmp(&b.score))
    }
}

/// Compare two decoded images.
pub fn compare(
    reference: &DynamicImage,
    returned: &DynamicImage,
    item_size: ItemSize,
    config: &ComparisonConfig,
    thresholds: &ThresholdTable,
) -> ComparisonResult {
    let ref_gray = normalize::to_gray(reference, config.analysis_size);
    let mut ret_gray = normalize::to_gray(returned, config.analysis_size);
    normalize::align_luminance(&mut ret_gray, normalize::luminance_stats(&ref_gray));

    let hash_similarity = hash::hash_similarity(
        &hash::difference_hash(&ref_gray, config.hash_size),
        &hash::difference_hash(&ret_gray, config.hash_size),
    );

    let structural = ssim::structural_similarity(&ref_gray, &ret_gray, config.block_grid);
    let structural_similarity = structural.global * 100.0;

    let mut ref_rgb = normalize::to_rgb(reference, config.color_sample_size);
    let mut ret_rgb = normalize::to_rgb(returned, config.color_sample_size);
    normalize::equalize_adaptive(&mut ref_rgb, config.equalize_tile, config.equalize_clip_limit);
    normalize::equalize_adaptive(&mut ret_rgb, config.equalize_tile, config.equalize_clip_limit);
    let color_anomaly_pct = color::color_anomaly_pct(&ref_rgb, &ret_rgb);

    let edge_difference = edge::edge_difference(&ref_gray, &ret_gray);
    let gradient_similarity = edge::gradient_orientation_similarity(&ref_gray, &ret_gray) * 100.0;

    let pixel_difference_score = pixel::pixel_similarity(&ref_gray, &ret_gray);

    let sub_scores = SubScores {
        hash_similarity: round2(hash_similarity),
        structural_similarity: round2(structural_similarity),
        color_anomaly_pct: round2(color_anomaly_pct),
        edge_difference_pct: round2(edge_difference * 100.0),
        gradient_similarity: round2(gradient_similarity),
        pixel_difference_score: round2(pixel_difference_score),
    };

    let (combined, method_used) = combine(&sub_scores, config);
    let similarity = presence_cap(combined, hash_similarity, edge_difference, config);
    let similarity = round2(similarity.clamp(0.0, 100.0));

    let (severity, verdict) = thresholds.classify(similarity, item_size);

    let findings = issues::detect_issues(
        &issues::IssueInputs {
            hash_similarity,
            structural_similarity,
            color_anomaly_pct,
            edge_difference,
            gradient_similarity,
            blocks: &structural.blocks,
            grid: config.block_grid,
        },
        &config.issues,
    );

    ComparisonResult {
        similarity,
        confidence: confidence_band(&sub_scores),
        sub_scores,
        issues: issues::frame_issues(findings, severity),
        severity,
        verdict,
        method_used: method_used.to_string(),
        item_size,
        blocks: structural.blocks,
        algorithm_version: ALGORITHM_VERSION.to_string(),
    }
}

/// Decode both files and compare them. Unreadable or undecodable files map
/// to [`CoreError::AnalysisFailed`].
pub fn compare_files(
    reference: &Path,
    returned: &Path,
    item_size: ItemSize,
    config: &ComparisonConfig,
    thresholds: &ThresholdTable,
) -> Result<ComparisonResult, CoreError> {
    let reference = load_image(reference)?;
    let returned = load_image(returned)?;
    Ok(compare(&reference, &returned, item_size, config, thresholds))
}

pub fn load_image(path: &Path) -> Result<DynamicImage, CoreError> {
    image::open(path)
        .map_err(|e| CoreError::AnalysisFailed(format!("Could not decode {}: {e}", path.display())))
}

fn combine(scores: &SubScores, config: &ComparisonConfig) -> (f64, &'static str) {
    let w = config.weights;
    let gradient_factor = (scores.gradient_similarity / 100.0).clamp(0.0, 1.0);
    let edge_weight = w.edge * (0.5 + 0.5 * (1.0 - gradient_factor));
    let total_weight = w.structural + w.hash + w.color + edge_weight + w.gradient + w.pixel;
    let color_score = 100.0 - scores.color_anomaly_pct;
    let edge_score = 100.0 - scores.edge_difference_pct;

    let weighted = if total_weight > 0.0 {
        (scores.structural_similarity * w.structural
            + scores.hash_similarity * w.hash
            + color_score * w.color
            + edge_score * edge_weight
            + scores.gradient_similarity * w.gradient
            + scores.pixel_difference_score * w.pixel)
            / total_weight
    } else {
        scores.pixel_difference_score
    };

    if (scores.structural_similarity - scores.hash_similarity).abs() > config.disagreement_limit {
        ((weighted + scores.pixel_difference_score) / 2.0, METHOD_PIXEL_FALLBACK)
    } else {
        (weighted, METHOD_HYBRID)
    }
}

/// Cap the combined score when the object looks absent or swapped.
fn presence_cap(
    combined: f64,
    hash_similarity: f64,
    edge_difference: f64,
    config: &ComparisonConfig,
) -> f64 {
    if hash_similarity < config.absent_object_presence {
        combined.min(config.absent_object_cap)
    } else if hash_similarity < config.issues.object_presence
        && edge_difference > config.edge_mismatch_limit
    {
        combined.min(config.missing_object_cap)
    } else {
        combined
    }
}

fn confidence_band(scores: &SubScores) -> ConfidenceBand {
    let values = [
        scores.structural_similarity,
        scores.hash_similarity,
        100.0 - scores.color_anomaly_pct,
        100.0 - scores.edge_difference_pct,
        scores.gradient_similarity,
        scores.pixel_difference_score,
    ];
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let spread = variance.sqrt();

    if spread <= 8.0 {
        ConfidenceBand::High
    } else if spread <= 18.0 {
        ConfidenceBand::Medium
    } else {
        ConfidenceBand::Low
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use image::{Rgb, RgbImage};

    /// A textured "object" on a light background.
    fn object(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            let in_body = x > width / 5 && x < width * 4 / 5 && y > height / 5 && y < height * 4 / 5;
            if in_body {
                let stripe = ((x / 6 + y / 9) % 2) as u8;
                Rgb([60 + stripe * 90, 80 + stripe * 60, 150 - stripe * 50])
            } else {
                Rgb([235, 235, 230])
            }
        })
    }

    fn run(reference: &RgbImage, returned: &RgbImage, size: ItemSize) -> ComparisonResult {
        compare(
            &DynamicImage::ImageRgb8(reference.clone()),
            &DynamicImage::ImageRgb8(returned.clone()),
            size,
            &ComparisonConfig::default(),
            &ThresholdTable::default(),
        )
    }

    #[test]
    fn identical_images_score_hundred_with_no_severity() {
        let image = object(320, 240);
        let result = run(&image, &image, ItemSize::Small);

        assert!(result.similarity >= 99.0, "got {}", result.similarity);
        assert_eq!(result.severity, Severity::None);
        assert_eq!(result.verdict, Verdict::Good);
        assert_eq!(result.confidence, ConfidenceBand::High);
        assert_eq!(result.method_used, METHOD_HYBRID);
        assert_eq!(result.issues, vec![SUCCESS_MESSAGE.to_string()]);
        assert!(result.detected_issues().to_lowercase().contains("no visible damage"));
    }

    #[test]
    fn unrelated_image_scores_low() {
        let reference = object(300, 300);
        let different = RgbImage::from_fn(300, 300, |x, y| {
            let v = ((x * 7 + y * 3) % 256) as u8;
            Rgb([v, 255 - v, (x % 256) as u8])
        });
        let result = run(&reference, &different, ItemSize::Medium);

        assert!(result.similarity < 82.0, "got {}", result.similarity);
        assert_eq!(result.severity, Severity::High);
        assert_eq!(result.verdict, Verdict::MismatchSuspected);
        assert!(result.issues.len() > 1);
    }

    #[test]
    fn similarity_is_bounded() {
        let white = RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]));
        let black = RgbImage::from_pixel(64, 64, Rgb([0, 0, 0]));
        let result = run(&white, &black, ItemSize::Small);
        assert!((0.0..=100.0).contains(&result.similarity));
    }

    #[test]
    fn same_pair_is_deterministic() {
        let a = object(200, 200);
        let mut b = a.clone();
        for y in 150..190 {
            for x in 150..190 {
                b.put_pixel(x, y, Rgb([20, 20, 20]));
            }
        }
        let first = run(&a, &b, ItemSize::Medium);
        let second = run(&a, &b, ItemSize::Medium);
        assert_eq!(first, second);
    }

    /// High-contrast checkerboard body on a white background, 300×300 so the
    /// analysis frame is not resampled.
    fn checkered_object() -> RgbImage {
        RgbImage::from_fn(300, 300, |x, y| {
            let in_body = (60..240).contains(&x) && (60..240).contains(&y);
            if in_body && (x / 20 + y / 20) % 2 == 0 {
                Rgb([15, 15, 20])
            } else if in_body {
                Rgb([235, 225, 110])
            } else {
                Rgb([250, 250, 250])
            }
        })
    }

    #[test]
    fn removed_object_reports_shape_difference() {
        let reference = checkered_object();
        let empty = RgbImage::from_pixel(300, 300, Rgb([250, 250, 250]));
        let result = run(&reference, &empty, ItemSize::Small);

        assert!(result.sub_scores.edge_difference_pct > 25.0, "{:?}", result.sub_scores);
        assert_eq!(result.sub_scores.gradient_similarity, 0.0);
        assert_eq!(result.severity, Severity::High);
        assert!(
            result.issues.iter().any(|i| i == SHAPE_DIFFERENCE),
            "{:?}",
            result.issues
        );
    }

    #[test]
    fn identical_images_have_matching_edges_and_orientations() {
        let image = checkered_object();
        let result = run(&image, &image, ItemSize::Small);
        assert_eq!(result.sub_scores.edge_difference_pct, 0.0);
        assert_eq!(result.sub_scores.gradient_similarity, 100.0);
    }

    #[test]
    fn weak_hash_alone_hits_the_hard_cap() {
        let config = ComparisonConfig::default();
        assert_eq!(presence_cap(90.0, 20.0, 0.0, &config), 30.0);
    }

    #[test]
    fn borderline_hash_needs_edge_disagreement_to_cap() {
        let config = ComparisonConfig::default();
        assert_eq!(presence_cap(90.0, 35.0, 0.10, &config), 90.0);
        assert_eq!(presence_cap(90.0, 35.0, 0.40, &config), 35.0);
        assert_eq!(presence_cap(90.0, 60.0, 0.90, &config), 90.0);
    }

    #[test]
    fn agreeing_orientations_soften_the_edge_penalty() {
        let config = ComparisonConfig::default();
        let scores = |gradient_similarity| SubScores {
            hash_similarity: 80.0,
            structural_similarity: 80.0,
            color_anomaly_pct: 0.0,
            edge_difference_pct: 60.0,
            gradient_similarity,
            pixel_difference_score: 80.0,
        };
        let (aligned, _) = combine(&scores(100.0), &config);
        let (scattered, _) = combine(&scores(0.0), &config);
        // Gradient contributes directly too, so compare against the same
        // gradient with the edge penalty removed.
        let (no_edge_penalty, _) = combine(
            &SubScores {
                edge_difference_pct: 0.0,
                ..scores(100.0)
            },
            &config,
        );
        assert!(aligned > scattered);
        assert!(no_edge_penalty - aligned < 2.0, "{no_edge_penalty} vs {aligned}");
    }

    #[test]
    fn missing_file_is_analysis_failure() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.png");
        let result = compare_files(
            &missing,
            &missing,
            ItemSize::Small,
            &ComparisonConfig::default(),
            &ThresholdTable::default(),
        );
        assert_matches!(result, Err(CoreError::AnalysisFailed(_)));
    }

    #[test]
    fn garbage_bytes_are_analysis_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert_matches!(load_image(&path), Err(CoreError::AnalysisFailed(_)));
    }

    #[test]
    fn files_on_disk_compare_like_in_memory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("item.png");
        object(120, 120).save(&path).unwrap();

        let result = compare_files(
            &path,
            &path,
            ItemSize::Medium,
            &ComparisonConfig::default(),
            &ThresholdTable::default(),
        )
        .unwrap();
        assert_eq!(result.severity, Severity::None);
    }
}
