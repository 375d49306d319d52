use std::path::{Path, PathBuf};
use std::str::FromStr;

use kiosk_core::error::CoreError;
use kiosk_core::policy::ThresholdTable;
use kiosk_core::similarity::ComparisonConfig;

use crate::error::{PipelineError, PipelineResult};

/// Runtime configuration shared by the API and the worker.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory all stored photo paths are relative to.
    pub photo_root: PathBuf,
    /// Jobs claimed per sweep when no explicit limit is given.
    pub sweep_batch_size: usize,
    /// Jobs processed in parallel within one sweep.
    pub sweep_concurrency: usize,
    /// A `processing` job whose claim is older than this is reclaimable.
    pub stale_after_secs: i64,
    /// Claims beyond this count fail the job instead of analyzing it again.
    pub max_attempts: i32,
    pub enable_preview: bool,
    pub thresholds: ThresholdTable,
    pub comparison: ComparisonConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            photo_root: PathBuf::from("./storage"),
            sweep_batch_size: 10,
            sweep_concurrency: 2,
            stale_after_secs: 900,
            max_attempts: 3,
            enable_preview: true,
            thresholds: ThresholdTable::default(),
            comparison: ComparisonConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                      | Default           |
    /// |------------------------------|-------------------|
    /// | `PHOTO_ROOT`                 | `./storage`       |
    /// | `SWEEP_BATCH_SIZE`           | `10`              |
    /// | `SWEEP_CONCURRENCY`          | `2`               |
    /// | `JOB_STALE_AFTER_SECS`       | `900`             |
    /// | `JOB_MAX_ATTEMPTS`           | `3`               |
    /// | `ENABLE_COMPARISON_PREVIEW`  | `true`            |
    /// | `COMPARISON_THRESHOLDS_PATH` | built-in table    |
    pub fn from_env() -> PipelineResult<Self> {
        let defaults = Self::default();

        let photo_root = std::env::var("PHOTO_ROOT")
            .map(PathBuf::from)
            .unwrap_or(defaults.photo_root);

        let thresholds = match std::env::var("COMPARISON_THRESHOLDS_PATH") {
            Ok(path) if !path.trim().is_empty() => load_thresholds(Path::new(path.trim()))?,
            _ => defaults.thresholds,
        };

        Ok(Self {
            photo_root,
            sweep_batch_size: env_or("SWEEP_BATCH_SIZE", defaults.sweep_batch_size)?.max(1),
            sweep_concurrency: env_or("SWEEP_CONCURRENCY", defaults.sweep_concurrency)?.max(1),
            stale_after_secs: env_or("JOB_STALE_AFTER_SECS", defaults.stale_after_secs)?.max(1),
            max_attempts: env_or("JOB_MAX_ATTEMPTS", defaults.max_attempts)?.max(1),
            enable_preview: env_or("ENABLE_COMPARISON_PREVIEW", defaults.enable_preview)?,
            thresholds,
            comparison: defaults.comparison,
        })
    }
}

/// Read and validate a JSON threshold table.
pub fn load_thresholds(path: &Path) -> PipelineResult<ThresholdTable> {
    let raw = std::fs::read_to_string(path)?;
    let table: ThresholdTable = serde_json::from_str(&raw).map_err(|e| {
        CoreError::PreconditionFailed(format!(
            "Invalid threshold table {}: {e}",
            path.display()
        ))
    })?;
    table.validate()?;
    Ok(table)
}

fn env_or<T: FromStr>(key: &str, default: T) -> PipelineResult<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| {
            PipelineError::from(CoreError::PreconditionFailed(format!(
                "{key} has an invalid value: {raw}"
            )))
        }),
        _ => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn threshold_file_is_loaded_and_validated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");
        std::fs::write(
            &path,
            r#"{
                "small":  {"high": 96, "mid": 86, "reject_floor": 72},
                "medium": {"high": 93, "mid": 83, "reject_floor": 71},
                "large":  {"high": 90, "mid": 80, "reject_floor": 70}
            }"#,
        )
        .unwrap();

        let table = load_thresholds(&path).unwrap();
        assert_eq!(table.small.high, 96.0);
    }

    #[test]
    fn overlapping_threshold_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");
        std::fs::write(
            &path,
            r#"{
                "small":  {"high": 80, "mid": 85, "reject_floor": 70},
                "medium": {"high": 92, "mid": 82, "reject_floor": 70},
                "large":  {"high": 90, "mid": 80, "reject_floor": 70}
            }"#,
        )
        .unwrap();

        assert_matches!(
            load_thresholds(&path),
            Err(PipelineError::Core(CoreError::PreconditionFailed(_)))
        );
    }

    #[test]
    fn malformed_threshold_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("thresholds.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_thresholds(&path).is_err());
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.sweep_batch_size, 10);
        assert_eq!(config.stale_after_secs, 900);
        assert_eq!(config.max_attempts, 3);
        assert!(config.enable_preview);
    }
}
