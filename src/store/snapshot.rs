//! JSON snapshot files shared by the file-backed stores.
//!
//! A snapshot is rewritten in full: serialize, write to a sibling temp file,
//! restrict permissions, rename over the old file. Readers never see a
//! half-written snapshot.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};

/// A JSON file holding one serialized value.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot, or `T::default()` if the file does not exist yet.
    pub(crate) fn load<T: DeserializeOwned + Default>(&self) -> Result<T> {
        if !self.path.exists() {
            return Ok(T::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    /// Atomically replace the snapshot with `value`.
    pub(crate) async fn save<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let content = serde_json::to_vec_pretty(value).context("Failed to serialize snapshot")?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&tmp_path, perms)
                .await
                .context("Failed to set snapshot file permissions")?;
        }

        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        log::debug!("[Store] Saved snapshot to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_missing_file_loads_default() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let file = SnapshotFile::new(dir.path().join("absent.json"));
        let loaded: HashMap<String, String> = file.load().expect("load");
        assert!(loaded.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let file = SnapshotFile::new(dir.path().join("nested/data.json"));

        let mut value = HashMap::new();
        value.insert("a".to_string(), "1".to_string());
        file.save(&value).await.expect("save");

        let loaded: HashMap<String, String> = file.load().expect("load");
        assert_eq!(loaded, value);
        assert!(!dir.path().join("nested/data.json.tmp").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_snapshot_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().expect("tempdir");
        let file = SnapshotFile::new(dir.path().join("data.json"));
        file.save(&vec![1, 2, 3]).await.expect("save");

        let mode = std::fs::metadata(file.path()).expect("metadata").permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{not json").expect("write");
        let result: Result<HashMap<String, String>> = SnapshotFile::new(path).load();
        assert!(result.is_err());
    }
}
