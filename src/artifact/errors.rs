//! # Artifact Store Errors

use thiserror::Error;

/// Result type for artifact store operations
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Artifact store errors
#[derive(Debug, Clone, Error)]
pub enum ArtifactError {
    #[error("Artifact not found: {0}")]
    NotFound(String),

    #[error("Artifact already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid artifact name: {0}")]
    InvalidName(String),

    /// Reference with a scheme this store cannot serve
    #[error("Unsupported artifact reference: {0}")]
    UnsupportedReference(String),

    /// Reference resolving outside the store root
    #[error("Artifact reference outside the store: {0}")]
    OutsideStore(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl ArtifactError {
    pub(crate) fn from_io(reference: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ArtifactError::NotFound(reference.to_string())
        } else {
            ArtifactError::IoError(format!("{}: {}", reference, err))
        }
    }
}
