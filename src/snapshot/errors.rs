//! Snapshot codec errors

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type SnapshotResult<T> = Result<T, SnapshotError>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The dump to pack does not exist or is not a file
    #[error("dump file not found: {}", .0.display())]
    MissingDump(PathBuf),

    /// The archive could not be decoded
    #[error("archive is not a readable tar.gz: {0}")]
    Unreadable(#[source] io::Error),

    #[error("archive contains no .sql payload")]
    NoPayload,

    #[error("archive contains {} .sql payloads, expected one: {}", .0.len(), .0.join(", "))]
    MultiplePayloads(Vec<String>),
}

impl SnapshotError {
    pub(crate) fn io(context: impl Into<String>, source: io::Error) -> Self {
        SnapshotError::Io {
            context: context.into(),
            source,
        }
    }

    /// The archive itself is unusable, as opposed to a local I/O problem.
    pub fn is_invalid_artifact(&self) -> bool {
        matches!(
            self,
            SnapshotError::Unreadable(_)
                | SnapshotError::NoPayload
                | SnapshotError::MultiplePayloads(_)
        )
    }
}
