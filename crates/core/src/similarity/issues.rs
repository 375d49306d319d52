//! Human-readable issue strings derived from the metric breakdown.

use crate::policy::Severity;

use super::ssim::BlockScore;

/// Filler emitted when no anomaly crosses its threshold.
pub const NO_VISIBLE_DAMAGE: &str = "No visible damage detected.";

/// Replaces the issue list when the score clears the `high` cutoff.
pub const SUCCESS_MESSAGE: &str = "Item returned in good condition, no visible damage detected.";

pub const OBJECT_NOT_RECOGNIZED: &str =
    "Object structure not recognized, the returned item may be missing or different.";

pub const COLOR_SHIFT: &str = "Color shift detected, possible staining or discoloration.";

pub const LOW_STRUCTURE: &str = "Overall shape differs noticeably from the borrow photo.";

pub const SHAPE_DIFFERENCE: &str = "Significant shape difference detected.";

pub const TEXTURE_VARIATION: &str = "Surface texture variation detected.";

const MINOR_DIFFERENCE: &str = "Minor visual difference detected, verify manually.";

const MISMATCH_SUSPECTED: &str = "Item mismatch or damage suspected, please check the return.";

/// Prefixed to the list when a rescored result disagrees with the score that
/// was on record before the job ran.
pub const SCORE_MISMATCH_WARNING: &str =
    "Score differs sharply from the earlier offline analysis, double-check this return.";

/// Thresholds used when turning metrics into issue strings.
#[derive(Debug, Clone, Copy)]
pub struct IssueThresholds {
    /// Block SSIM (`0..=1`) below which a region is called out.
    pub block_ssim: f64,
    /// Colour anomaly percentage above which staining is reported.
    pub color_anomaly_pct: f64,
    /// Hash similarity percentage below which the object is considered absent.
    pub object_presence: f64,
    /// Global SSIM percentage below which a shape warning is added when no
    /// single region stands out.
    pub global_structure: f64,
    /// Edge difference ratio (`0..=1`) above which, together with a gradient
    /// similarity below `shape_gradient`, the outline is reported as changed.
    pub shape_edge_difference: f64,
    pub shape_gradient: f64,
    /// With no region called out, a global SSIM below `texture_structure`
    /// while the hash still matches above `texture_hash` means the surface
    /// changed but the object did not.
    pub texture_structure: f64,
    pub texture_hash: f64,
}

impl Default for IssueThresholds {
    fn default() -> Self {
        Self {
            block_ssim: 0.55,
            color_anomaly_pct: 15.0,
            object_presence: 40.0,
            global_structure: 45.0,
            shape_edge_difference: 0.18,
            shape_gradient: 70.0,
            texture_structure: 70.0,
            texture_hash: 60.0,
        }
    }
}

/// Name of the image region a grid cell belongs to, e.g. `lower-right`.
pub fn region_name(row: u32, col: u32, grid: u32) -> &'static str {
    let grid = grid.max(1);
    let vertical = (row * 3 / grid).min(2);
    let horizontal = (col * 3 / grid).min(2);
    match (vertical, horizontal) {
        (0, 0) => "upper-left",
        (0, 1) => "upper-center",
        (0, _) => "upper-right",
        (1, 0) => "middle-left",
        (1, 1) => "central",
        (1, _) => "middle-right",
        (_, 0) => "lower-left",
        (_, 1) => "lower-center",
        _ => "lower-right",
    }
}

/// Metric summary the issue builder reads.
pub struct IssueInputs<'a> {
    pub hash_similarity: f64,
    pub structural_similarity: f64,
    pub color_anomaly_pct: f64,
    /// Ratio, `0.0..=1.0`.
    pub edge_difference: f64,
    /// Percentage.
    pub gradient_similarity: f64,
    pub blocks: &'a [BlockScore],
    pub grid: u32,
}

/// Raw anomaly findings, before severity framing.
pub fn detect_issues(inputs: &IssueInputs<'_>, thresholds: &IssueThresholds) -> Vec<String> {
    let mut issues = Vec::new();

    if inputs.hash_similarity < thresholds.object_presence {
        issues.push(OBJECT_NOT_RECOGNIZED.to_string());
    }

    let mut regions: Vec<&'static str> = Vec::new();
    for block in inputs.blocks {
        if block.score < thresholds.block_ssim {
            let name = region_name(block.row, block.col, inputs.grid);
            if !regions.contains(&name) {
                regions.push(name);
            }
        }
    }
    for name in &regions {
        issues.push(format!("Possible scratches or dents detected in {name} region"));
    }

    if inputs.edge_difference > thresholds.shape_edge_difference
        && inputs.gradient_similarity < thresholds.shape_gradient
    {
        issues.push(SHAPE_DIFFERENCE.to_string());
    }

    if inputs.color_anomaly_pct > thresholds.color_anomaly_pct {
        issues.push(COLOR_SHIFT.to_string());
    }

    if regions.is_empty() {
        if inputs.structural_similarity < thresholds.global_structure {
            issues.push(LOW_STRUCTURE.to_string());
        } else if inputs.structural_similarity < thresholds.texture_structure
            && inputs.hash_similarity > thresholds.texture_hash
        {
            issues.push(TEXTURE_VARIATION.to_string());
        }
    }

    if issues.is_empty() {
        issues.push(NO_VISIBLE_DAMAGE.to_string());
    }

    issues
}

/// Frame the findings according to the final severity.
///
/// A passing score replaces everything with [`SUCCESS_MESSAGE`]; otherwise a
/// lead sentence is prepended and the "nothing found" filler is dropped.
pub fn frame_issues(findings: Vec<String>, severity: Severity) -> Vec<String> {
    let lead = match severity {
        Severity::None => return vec![SUCCESS_MESSAGE.to_string()],
        Severity::Low | Severity::Medium => MINOR_DIFFERENCE,
        Severity::High => MISMATCH_SUSPECTED,
    };

    let mut framed = vec![lead.to_string()];
    framed.extend(
        findings
            .into_iter()
            .filter(|issue| issue != NO_VISIBLE_DAMAGE),
    );
    framed
}

/// Trim, collapse inner whitespace, capitalise and terminate with a period.
pub fn normalize_issue(raw: &str) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    let mut chars = collapsed.chars();
    let mut out: String = match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => return None,
    };
    if !out.ends_with(['.', '!', '?']) {
        out.push('.');
    }
    Some(out)
}

/// Normalise each issue, drop empties and duplicates, and join with newlines.
pub fn join_issues<S: AsRef<str>>(issues: &[S]) -> String {
    let mut seen: Vec<String> = Vec::new();
    for issue in issues {
        if let Some(clean) = normalize_issue(issue.as_ref()) {
            if !seen.contains(&clean) {
                seen.push(clean);
            }
        }
    }
    seen.join("\n")
}
