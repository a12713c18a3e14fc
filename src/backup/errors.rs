//! Backup error types
//!
//! Error codes:
//! - VAULT_BACKUP_BUSY      another backup is pending, nothing was started
//! - VAULT_BACKUP_LEDGER    the ledger could not create the record
//! - VAULT_BACKUP_CAPTURE   the dump tool failed or wrote nothing
//! - VAULT_BACKUP_PACKAGE   the dump could not be compressed
//! - VAULT_BACKUP_UPLOAD    the artifact store returned no reference
//! - VAULT_BACKUP_FINISH    the archive is stored but the record could not
//!                          be marked successful (it was marked error)
//! - VAULT_BACKUP_STRANDED  the record could not be resolved at all and is
//!                          still pending
//!
//! Every error raised after the record exists carries its id.

use thiserror::Error;

use crate::ledger::LedgerError;
use crate::snapshot::SnapshotError;

pub type BackupResult<T> = Result<T, BackupError>;

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("backup already in progress (pending record {pending_id})")]
    Busy { pending_id: String },

    #[error("could not create backup record: {0}")]
    Ledger(#[source] LedgerError),

    #[error("backup {record_id}: capture failed: {message}")]
    Capture { record_id: String, message: String },

    #[error("backup {record_id}: packaging failed: {source}")]
    Package {
        record_id: String,
        #[source]
        source: SnapshotError,
    },

    #[error("backup {record_id}: upload failed: {message}")]
    Upload { record_id: String, message: String },

    #[error("backup {record_id}: archive stored but record not updated: {source}")]
    Finish {
        record_id: String,
        #[source]
        source: LedgerError,
    },

    #[error(
        "backup {record_id} failed ({cause}) and the record could not be marked as error \
         ({ledger_error}); it is still pending and blocks new backups until resolved"
    )]
    Stranded {
        record_id: String,
        cause: Box<BackupError>,
        ledger_error: String,
    },
}

impl BackupError {
    pub fn code(&self) -> &'static str {
        match self {
            BackupError::Busy { .. } => "VAULT_BACKUP_BUSY",
            BackupError::Ledger(_) => "VAULT_BACKUP_LEDGER",
            BackupError::Capture { .. } => "VAULT_BACKUP_CAPTURE",
            BackupError::Package { .. } => "VAULT_BACKUP_PACKAGE",
            BackupError::Upload { .. } => "VAULT_BACKUP_UPLOAD",
            BackupError::Finish { .. } => "VAULT_BACKUP_FINISH",
            BackupError::Stranded { .. } => "VAULT_BACKUP_STRANDED",
        }
    }

    /// Ledger record the failed backup belongs to, once it exists
    pub fn record_id(&self) -> Option<&str> {
        match self {
            BackupError::Busy { .. } | BackupError::Ledger(_) => None,
            BackupError::Capture { record_id, .. }
            | BackupError::Package { record_id, .. }
            | BackupError::Upload { record_id, .. }
            | BackupError::Finish { record_id, .. }
            | BackupError::Stranded { record_id, .. } => Some(record_id),
        }
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, BackupError::Busy { .. })
    }

    /// The ledger may be left inconsistent; an operator should look
    pub fn is_stranded(&self) -> bool {
        matches!(self, BackupError::Stranded { .. })
    }
}
