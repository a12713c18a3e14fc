//! CLI-specific error types
//!
//! Every CLI error is fatal: it is printed with its code and the process
//! exits non-zero.

use std::io;

use thiserror::Error;

use crate::backup::BackupError;
use crate::config::ConfigError;
use crate::scheduler::SchedulerError;
use crate::vault::VaultError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Vault(#[from] VaultError),

    #[error("{0}")]
    Backup(#[from] BackupError),

    /// The restore did not leave the snapshot in place
    #[error("restore {status}: {message}")]
    Restore { status: &'static str, message: String },

    #[error("{0}")]
    Schedule(#[from] SchedulerError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "VAULT_CLI_CONFIG_ERROR",
            CliError::Vault(_) => "VAULT_CLI_LEDGER_ERROR",
            CliError::Backup(e) => e.code(),
            CliError::Restore { .. } => "VAULT_CLI_RESTORE_FAILED",
            CliError::Schedule(_) => "VAULT_CLI_SCHEDULE_ERROR",
            CliError::InvalidInput(_) => "VAULT_CLI_INVALID_INPUT",
            CliError::Io(_) | CliError::Json(_) => "VAULT_CLI_IO_ERROR",
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;
