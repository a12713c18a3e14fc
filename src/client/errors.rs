//! Database client errors

use thiserror::Error;

use crate::command::CommandError;

/// Result type for database client operations
pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("{operation} could not run: {source}")]
    Command {
        operation: &'static str,
        #[source]
        source: CommandError,
    },

    #[error("{operation} failed: {message}")]
    Failed {
        operation: &'static str,
        message: String,
    },
}

impl ClientError {
    /// Tool output (or runner error) describing the failure
    pub fn message(&self) -> String {
        match self {
            ClientError::InvalidIdentifier(name) => format!("invalid identifier: {:?}", name),
            ClientError::Command { source, .. } => source.to_string(),
            ClientError::Failed { message, .. } => message.clone(),
        }
    }

    /// The script referenced a server setting the target engine does not
    /// know, typically a dump taken by a newer client version.
    pub fn is_config_parameter_mismatch(&self) -> bool {
        matches!(self, ClientError::Failed { message, .. }
            if message.contains("unrecognized configuration parameter"))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Command { source, .. } if source.is_timeout())
    }
}
