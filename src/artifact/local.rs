//! # Local Filesystem Artifact Store

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::errors::{ArtifactError, ArtifactResult};
use super::{validate_file_name, ArtifactRef, ArtifactStore};

const FILE_SCHEME: &str = "file://";

/// Stores archives as files under `root/<key_prefix>/`.
///
/// Artifact ids are store keys (`db_backups/<file>`); URLs are `file://`
/// URLs of the absolute path. `get` accepts either, but never reads
/// outside `root`.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    key_prefix: String,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, key_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            key_prefix: key_prefix.into().trim_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_for(&self, filename: &str) -> String {
        if self.key_prefix.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", self.key_prefix, filename)
        }
    }

    /// Map a store key to a path, rejecting anything but plain components
    fn key_path(&self, key: &str) -> ArtifactResult<PathBuf> {
        let relative = Path::new(key);
        let plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !plain {
            return Err(ArtifactError::OutsideStore(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Resolve a `file://` URL or a store key to a path inside the root
    async fn resolve(&self, reference: &str) -> ArtifactResult<PathBuf> {
        if let Some(path) = reference.strip_prefix(FILE_SCHEME) {
            let root = fs::canonicalize(&self.root)
                .await
                .map_err(|e| ArtifactError::from_io(reference, e))?;
            let path = fs::canonicalize(path)
                .await
                .map_err(|e| ArtifactError::from_io(reference, e))?;
            if !path.starts_with(&root) {
                return Err(ArtifactError::OutsideStore(reference.to_string()));
            }
            return Ok(path);
        }

        if reference.contains("://") {
            return Err(ArtifactError::UnsupportedReference(reference.to_string()));
        }

        self.key_path(reference)
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        _mime_type: &str,
    ) -> ArtifactResult<ArtifactRef> {
        validate_file_name(filename)?;
        let key = self.key_for(filename);
        let path = self.key_path(&key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ArtifactError::IoError(e.to_string()))?;
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    ArtifactError::AlreadyExists(key.clone())
                } else {
                    ArtifactError::IoError(e.to_string())
                }
            })?;
        file.write_all(&bytes)
            .await
            .map_err(|e| ArtifactError::IoError(e.to_string()))?;
        file.sync_all()
            .await
            .map_err(|e| ArtifactError::IoError(e.to_string()))?;

        let absolute = fs::canonicalize(&path)
            .await
            .map_err(|e| ArtifactError::IoError(e.to_string()))?;

        Ok(ArtifactRef {
            artifact_id: key,
            artifact_url: format!("{}{}", FILE_SCHEME, absolute.display()),
        })
    }

    async fn get(&self, reference: &str) -> ArtifactResult<Vec<u8>> {
        let path = self.resolve(reference).await?;
        fs::read(&path)
            .await
            .map_err(|e| ArtifactError::from_io(reference, e))
    }
}
