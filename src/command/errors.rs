//! Command execution errors

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Result type for command execution
pub type CommandResult<T> = Result<T, CommandError>;

/// Failure to obtain an exit status from an external command.
///
/// A command that runs to completion with a non-zero exit code is NOT an
/// error at this layer; callers inspect [`super::CommandOutput`].
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} timed out after {}s", timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl CommandError {
    /// Returns whether the command was killed by the timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, CommandError::TimedOut { .. })
    }
}
