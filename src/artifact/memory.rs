//! # In-Memory Artifact Store

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::errors::{ArtifactError, ArtifactResult};
use super::{validate_file_name, ArtifactRef, ArtifactStore};

const MEMORY_SCHEME: &str = "memory://";

/// Keeps archives in memory; URLs are `memory://<key>`.
#[derive(Debug, Clone, Default)]
pub struct MemoryArtifactStore {
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `bytes` under `key` directly, returning its reference.
    pub fn insert(&self, key: &str, bytes: Vec<u8>) -> ArtifactRef {
        self.lock().insert(key.to_string(), bytes);
        ArtifactRef {
            artifact_id: key.to_string(),
            artifact_url: format!("{}{}", MEMORY_SCHEME, key),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A panicking holder cannot leave the map half-written.
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        _mime_type: &str,
    ) -> ArtifactResult<ArtifactRef> {
        validate_file_name(filename)?;
        let key = format!("db_backups/{}", filename);
        if self.lock().contains_key(&key) {
            return Err(ArtifactError::AlreadyExists(key));
        }
        Ok(self.insert(&key, bytes))
    }

    async fn get(&self, reference: &str) -> ArtifactResult<Vec<u8>> {
        let key = reference.strip_prefix(MEMORY_SCHEME).unwrap_or(reference);
        self.lock()
            .get(key)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(reference.to_string()))
    }
}
