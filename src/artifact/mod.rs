//! # Artifact Store
//!
//! Durable storage for snapshot archives, consumed through the narrow
//! [`ArtifactStore`] contract: `put` bytes under a file name and get them
//! back by id or URL. Both calls may fail and may be slow; callers treat
//! them like any other remote dependency.

mod errors;
mod local;
mod memory;

pub use errors::{ArtifactError, ArtifactResult};
pub use local::LocalArtifactStore;
pub use memory::MemoryArtifactStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Where a stored archive lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactRef {
    pub artifact_id: String,
    pub artifact_url: String,
}

impl ArtifactRef {
    /// Both id and URL are present
    pub fn is_complete(&self) -> bool {
        !self.artifact_id.trim().is_empty() && !self.artifact_url.trim().is_empty()
    }
}

/// Storage gateway for archives
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` as `filename`
    async fn put(&self, bytes: Vec<u8>, filename: &str, mime_type: &str)
        -> ArtifactResult<ArtifactRef>;

    /// Fetch an archive by URL or store key
    async fn get(&self, reference: &str) -> ArtifactResult<Vec<u8>>;
}

/// Reject names that are empty or carry path separators.
pub(crate) fn validate_file_name(filename: &str) -> ArtifactResult<()> {
    if filename.is_empty()
        || filename == "."
        || filename == ".."
        || filename.contains('/')
        || filename.contains('\\')
    {
        return Err(ArtifactError::InvalidName(filename.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_file_name() {
        assert!(validate_file_name("db_backup_1.tar.gz").is_ok());
        assert!(validate_file_name("").is_err());
        assert!(validate_file_name("../x").is_err());
        assert!(validate_file_name("..").is_err());
    }

    #[test]
    fn test_artifact_ref_serializes_camel_case() {
        let artifact = ArtifactRef {
            artifact_id: "db_backups/a.tar.gz".into(),
            artifact_url: "file:///srv/a.tar.gz".into(),
        };
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["artifactId"], "db_backups/a.tar.gz");
        assert!(artifact.is_complete());
    }
}
