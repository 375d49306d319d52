//! Path-addressed photo store rooted at `PHOTO_ROOT`.
//!
//! Stored paths are always relative. Anything that would escape the root is
//! rejected before touching the filesystem.

use std::path::{Component, Path, PathBuf};

use kiosk_core::error::CoreError;
use kiosk_core::photo::preview_relative_path;
use kiosk_core::types::DbId;

use crate::error::PipelineResult;

#[derive(Debug, Clone)]
pub struct PhotoStore {
    root: PathBuf,
}

impl PhotoStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a stored relative path to a location under the root.
    ///
    /// Backslashes are treated as separators and a leading `/` or `./` is
    /// read as root-relative, matching how kiosk uploads are recorded.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, CoreError> {
        let cleaned = normalize_relative(relative);
        if cleaned.is_empty() {
            return Err(CoreError::PreconditionFailed("Photo path is empty.".to_string()));
        }

        let candidate = Path::new(&cleaned);
        if candidate
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(CoreError::PreconditionFailed(format!(
                "Photo path '{relative}' is outside the photo root."
            )));
        }

        Ok(self.root.join(candidate))
    }

    /// Whether the path resolves and points at an existing file.
    pub async fn exists(&self, relative: &str) -> bool {
        match self.resolve(relative) {
            Ok(path) => tokio::fs::metadata(&path)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Write a generated comparison preview and return its relative path.
    pub async fn write_preview(&self, transaction_id: DbId, jpeg: &[u8]) -> PipelineResult<String> {
        let stamp = chrono::Utc::now().timestamp_millis();
        let relative = preview_relative_path(transaction_id, stamp);
        let path = self.resolve(&relative)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, jpeg).await?;

        Ok(relative)
    }
}

/// Canonical form of a stored relative path.
pub fn normalize_relative(raw: &str) -> String {
    let unified = raw.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    loop {
        if let Some(stripped) = rest.strip_prefix("./") {
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix('/') {
            rest = stripped;
        } else {
            break;
        }
    }
    rest.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn normalizes_separators_and_prefixes() {
        assert_eq!(normalize_relative(" ./uploads\\a.jpg "), "uploads/a.jpg");
        assert_eq!(normalize_relative("/uploads/b.jpg"), "uploads/b.jpg");
    }

    #[test]
    fn rejects_parent_traversal() {
        let store = PhotoStore::new("/srv/photos");
        assert_matches!(
            store.resolve("uploads/../../etc/passwd"),
            Err(CoreError::PreconditionFailed(_))
        );
        assert_matches!(store.resolve("  "), Err(CoreError::PreconditionFailed(_)));
    }

    #[test]
    fn resolves_under_root() {
        let store = PhotoStore::new("/srv/photos");
        assert_eq!(
            store.resolve("uploads/a.jpg").unwrap(),
            PathBuf::from("/srv/photos/uploads/a.jpg")
        );
    }

    #[tokio::test]
    async fn preview_is_written_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = PhotoStore::new(dir.path());

        let relative = store.write_preview(12, &[0xFF, 0xD8, 0xFF]).await.unwrap();
        assert!(relative.starts_with("uploads/transaction_photos/comparison_12_"));
        assert!(store.exists(&relative).await);
        assert!(!store.exists("uploads/missing.jpg").await);
    }
}
