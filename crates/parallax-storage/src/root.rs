//! Artifact root directory.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::{StorageError, StorageResult};

/// Owns the directory where generated artifacts live. All writes go through
/// a temp file followed by a rename so readers never observe partial bytes.
#[derive(Clone, Debug)]
pub struct ArtifactRoot {
    base_path: PathBuf,
}

impl ArtifactRoot {
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create artifact directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(ArtifactRoot { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Absolute path for an artifact file name produced by
    /// [`crate::artifact_file_name`]. File names are flat; no subdirectories.
    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.base_path.join(file_name)
    }

    /// Write bytes atomically and return the final path. Overwrites any
    /// previous content for the same name; safe to repeat on retry.
    pub async fn write_atomic(&self, file_name: &str, data: &Bytes) -> StorageResult<PathBuf> {
        let final_path = self.path_for(file_name);
        let tmp_path = self
            .base_path
            .join(format!(".{}.tmp-{}", file_name, Uuid::new_v4()));

        let mut file = fs::File::create(&tmp_path)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("create temp file: {}", e)))?;
        file.write_all(data)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("write temp file: {}", e)))?;
        file.sync_all()
            .await
            .map_err(|e| StorageError::WriteFailed(format!("sync temp file: {}", e)))?;
        drop(file);

        if let Err(e) = fs::rename(&tmp_path, &final_path).await {
            // Leave no temp litter behind on a failed rename.
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::WriteFailed(format!(
                "rename into place: {}",
                e
            )));
        }

        Ok(final_path)
    }

    pub async fn read(&self, path: &Path) -> StorageResult<Bytes> {
        match fs::read(path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(StorageError::IoError(e)),
        }
    }

    pub async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    /// Best-effort unlink; missing files are fine, other failures are logged
    /// by callers and never fatal.
    pub async fn remove(&self, path: &Path) -> StorageResult<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::IoError(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn root() -> (tempfile::TempDir, ArtifactRoot) {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = ArtifactRoot::new(dir.path().join("artifacts"))
            .await
            .expect("artifact root");
        (dir, root)
    }

    #[tokio::test]
    async fn write_read_roundtrip() {
        let (_dir, root) = root().await;
        let data = Bytes::from_static(b"depth-map-bytes");
        let path = root.write_atomic("a_depth.png", &data).await.unwrap();
        assert!(root.exists(&path).await);
        assert_eq!(root.read(&path).await.unwrap(), data);
    }

    #[tokio::test]
    async fn overwrite_replaces_content() {
        let (_dir, root) = root().await;
        let first = Bytes::from_static(b"first");
        let second = Bytes::from_static(b"second, longer content");
        let path = root.write_atomic("a_depth.png", &first).await.unwrap();
        let path2 = root.write_atomic("a_depth.png", &second).await.unwrap();
        assert_eq!(path, path2);
        assert_eq!(root.read(&path).await.unwrap(), second);
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let (_dir, root) = root().await;
        root.write_atomic("a_depth.png", &Bytes::from_static(b"x"))
            .await
            .unwrap();
        let mut entries = tokio::fs::read_dir(root.base_path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["a_depth.png".to_string()]);
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let (_dir, root) = root().await;
        let path = root
            .write_atomic("a_depth.png", &Bytes::from_static(b"x"))
            .await
            .unwrap();
        root.remove(&path).await.unwrap();
        assert!(!root.exists(&path).await);
        // Second remove of a missing file is not an error.
        root.remove(&path).await.unwrap();
    }

    #[tokio::test]
    async fn read_missing_is_not_found() {
        let (_dir, root) = root().await;
        let err = root
            .read(&root.path_for("missing.png"))
            .await
            .expect_err("should be missing");
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
