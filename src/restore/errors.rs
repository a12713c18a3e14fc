//! Restore error types
//!
//! Error codes:
//! - VAULT_RESTORE_MISSING_REFERENCE      no artifact reference given
//! - VAULT_RESTORE_SAFETY_BACKUP          pre-restore backup failed (or busy)
//! - VAULT_RESTORE_FETCH                  artifact could not be fetched
//! - VAULT_RESTORE_ARTIFACT_INVALID       archive unreadable, or not exactly one .sql
//! - VAULT_RESTORE_UNPACK                 local I/O failure while unpacking
//! - VAULT_RESTORE_WORKSPACE              temp directory could not be created
//! - VAULT_RESTORE_INVALID_NAME           derived database name is not a valid identifier
//! - VAULT_RESTORE_SAFETY_DUMP            safety dump of the live database failed
//! - VAULT_RESTORE_SCRATCH                scratch database could not be created
//! - VAULT_RESTORE_CORRUPT_SNAPSHOT       snapshot failed to apply to the scratch database
//! - VAULT_RESTORE_SWAP                   a rename of the swap failed
//! - VAULT_RESTORE_MANUAL_INTERVENTION    swap and rename-back both failed
//! - VAULT_RESTORE_ROLLBACK_FAILED        rollback from the safety dump failed

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::backup::BackupError;
use crate::snapshot::SnapshotError;

pub type RestoreResult<T> = Result<T, RestoreError>;

/// The two renames of the swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapStep {
    /// live -> preserved name
    RenameLive,
    /// scratch -> live name
    RenameScratch,
}

impl fmt::Display for SwapStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapStep::RenameLive => f.write_str("rename live database"),
            SwapStep::RenameScratch => f.write_str("rename scratch database"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("backup URL is required")]
    MissingReference,

    #[error("pre-restore safety backup failed: {0}")]
    SafetyBackup(#[source] BackupError),

    #[error("could not fetch artifact {reference}: {message}")]
    Fetch { reference: String, message: String },

    #[error("invalid artifact: {0}")]
    ArtifactInvalid(#[source] SnapshotError),

    #[error("could not unpack artifact: {0}")]
    Unpack(#[source] SnapshotError),

    #[error("could not create restore workspace: {0}")]
    Workspace(#[source] io::Error),

    #[error("derived database name {0:?} is not a valid identifier")]
    InvalidName(String),

    #[error("cannot proceed without rollback protection, safety dump of {database} failed: {message}")]
    SafetyDump { database: String, message: String },

    #[error("could not create scratch database {database}: {message}")]
    Scratch { database: String, message: String },

    #[error("snapshot is corrupted or incompatible, applying it to {database} failed: {message}")]
    CorruptSnapshot { database: String, message: String },

    #[error("{step} failed: {message}")]
    Swap { step: SwapStep, message: String },

    #[error(
        "CRITICAL: database rename failed and rename-back failed, manual intervention required. \
         Original data: {preserved_database}, restored data: {scratch_database}, \
         expected live name: {live_database} (swap error: {swap_error}; rename-back error: {rename_back_error})"
    )]
    CriticalManualIntervention {
        live_database: String,
        preserved_database: String,
        scratch_database: String,
        swap_error: String,
        rename_back_error: String,
    },

    #[error(
        "rollback failed at {step}: {message}; restore failed with: {cause}. \
         Recover manually from the safety dump at {}", .safety_dump.display()
    )]
    RollbackFailed {
        step: &'static str,
        message: String,
        safety_dump: PathBuf,
        cause: Box<RestoreError>,
    },
}

impl RestoreError {
    pub fn code(&self) -> &'static str {
        match self {
            RestoreError::MissingReference => "VAULT_RESTORE_MISSING_REFERENCE",
            RestoreError::SafetyBackup(_) => "VAULT_RESTORE_SAFETY_BACKUP",
            RestoreError::Fetch { .. } => "VAULT_RESTORE_FETCH",
            RestoreError::ArtifactInvalid(_) => "VAULT_RESTORE_ARTIFACT_INVALID",
            RestoreError::Unpack(_) => "VAULT_RESTORE_UNPACK",
            RestoreError::Workspace(_) => "VAULT_RESTORE_WORKSPACE",
            RestoreError::InvalidName(_) => "VAULT_RESTORE_INVALID_NAME",
            RestoreError::SafetyDump { .. } => "VAULT_RESTORE_SAFETY_DUMP",
            RestoreError::Scratch { .. } => "VAULT_RESTORE_SCRATCH",
            RestoreError::CorruptSnapshot { .. } => "VAULT_RESTORE_CORRUPT_SNAPSHOT",
            RestoreError::Swap { .. } => "VAULT_RESTORE_SWAP",
            RestoreError::CriticalManualIntervention { .. } => "VAULT_RESTORE_MANUAL_INTERVENTION",
            RestoreError::RollbackFailed { .. } => "VAULT_RESTORE_ROLLBACK_FAILED",
        }
    }

    /// Request problems the caller can fix: no reference, or a backup
    /// already running.
    pub fn is_rejection(&self) -> bool {
        match self {
            RestoreError::MissingReference => true,
            RestoreError::SafetyBackup(e) => e.is_busy(),
            _ => false,
        }
    }

    /// What an operator has to do by hand after an unrecoverable failure
    pub fn manual_recovery(&self) -> Option<String> {
        match self {
            RestoreError::RollbackFailed { safety_dump, .. } => Some(format!(
                "Use the backup file at: {}",
                safety_dump.display()
            )),
            RestoreError::CriticalManualIntervention {
                live_database,
                preserved_database,
                scratch_database,
                ..
            } => Some(format!(
                "Original data is in {}, restored data is in {}. Rename one of them to {}.",
                preserved_database, scratch_database, live_database
            )),
            _ => None,
        }
    }

    /// Path of the safety dump kept for manual recovery
    pub fn retained_dump(&self) -> Option<&PathBuf> {
        match self {
            RestoreError::RollbackFailed { safety_dump, .. } => Some(safety_dump),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_safety_backup_is_rejection() {
        let err = RestoreError::SafetyBackup(BackupError::Busy {
            pending_id: "r1".into(),
        });
        assert!(err.is_rejection());
        assert!(RestoreError::MissingReference.is_rejection());
        assert!(!RestoreError::Scratch {
            database: "shop_temp_1".into(),
            message: "permission denied".into(),
        }
        .is_rejection());
    }

    #[test]
    fn test_manual_intervention_names_both_databases() {
        let err = RestoreError::CriticalManualIntervention {
            live_database: "shop".into(),
            preserved_database: "shop_backup_1".into(),
            scratch_database: "shop_temp_1".into(),
            swap_error: "a".into(),
            rename_back_error: "b".into(),
        };
        let text = err.to_string();
        assert!(text.contains("shop_backup_1"));
        assert!(text.contains("shop_temp_1"));
        assert_eq!(err.code(), "VAULT_RESTORE_MANUAL_INTERVENTION");
    }

    #[test]
    fn test_rollback_failed_keeps_dump_path() {
        let err = RestoreError::RollbackFailed {
            step: "apply safety dump",
            message: "disk full".into(),
            safety_dump: PathBuf::from("/var/tmp/safety/original_db_backup.sql"),
            cause: Box::new(RestoreError::Swap {
                step: SwapStep::RenameLive,
                message: "database is being accessed".into(),
            }),
        };
        assert_eq!(
            err.retained_dump(),
            Some(&PathBuf::from("/var/tmp/safety/original_db_backup.sql"))
        );
        assert!(err.to_string().contains("original_db_backup.sql"));
    }
}
