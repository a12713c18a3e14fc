//! Structured restore results

use serde::Serialize;

use super::errors::RestoreError;

/// How a failed restore got back to the original data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RollbackMethod {
    /// The preserved database was renamed back to the live name
    RenameBack,
    /// The live database was recreated from the safety dump
    SafetyDump,
}

/// What a successful restore left behind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreReport {
    /// Live database, now holding the snapshot's data
    pub database: String,
    /// Previous live database, kept under its timestamped name
    pub preserved_database: String,
    /// Database used for DDL during the swap
    pub maintenance_database: String,
    /// Whether the ledger table was carried over into the new database
    pub ledger_restored: bool,
    /// Ledger id of the pre-restore backup, when one was taken
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safety_backup_id: Option<String>,
}

impl RestoreReport {
    /// Statement an operator runs once the restored data is confirmed good
    pub fn drop_hint(&self) -> String {
        format!("DROP DATABASE \"{}\";", self.preserved_database)
    }

    pub fn message(&self) -> String {
        format!(
            "Database {} has been safely restored. Backup database {} is preserved for safety.",
            self.database, self.preserved_database
        )
    }
}

/// Result of one restore invocation. Which variant comes back decides what
/// the operator has to do next.
#[derive(Debug)]
pub enum RestoreOutcome {
    /// The live database holds the snapshot's data
    Restored(RestoreReport),
    /// Failed before anything destructive; the live database is untouched
    FailedUnchanged { error: RestoreError },
    /// Failed after the swap began; the original data is back under the
    /// live name
    FailedRolledBack {
        error: RestoreError,
        method: RollbackMethod,
    },
    /// Neither the restore nor the recovery completed; see the error for
    /// the manual steps
    FailedUnrecoverable { error: RestoreError },
}

impl RestoreOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, RestoreOutcome::Restored(_))
    }

    pub fn report(&self) -> Option<&RestoreReport> {
        match self {
            RestoreOutcome::Restored(report) => Some(report),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&RestoreError> {
        match self {
            RestoreOutcome::Restored(_) => None,
            RestoreOutcome::FailedUnchanged { error }
            | RestoreOutcome::FailedRolledBack { error, .. }
            | RestoreOutcome::FailedUnrecoverable { error } => Some(error),
        }
    }

    /// Short machine-readable status
    pub fn status(&self) -> &'static str {
        match self {
            RestoreOutcome::Restored(_) => "restored",
            RestoreOutcome::FailedUnchanged { .. } => "unchanged",
            RestoreOutcome::FailedRolledBack { .. } => "rolled-back",
            RestoreOutcome::FailedUnrecoverable { .. } => "unrecoverable",
        }
    }

    pub fn message(&self) -> String {
        match self {
            RestoreOutcome::Restored(report) => report.message(),
            RestoreOutcome::FailedUnchanged { .. } => {
                "Restore failed before any change; the database is unchanged.".to_string()
            }
            RestoreOutcome::FailedRolledBack { .. } => {
                "Restore failed but database has been rolled back to original state successfully."
                    .to_string()
            }
            RestoreOutcome::FailedUnrecoverable { .. } => {
                "CRITICAL: Restore failed and could not be rolled back. Manual intervention required."
                    .to_string()
            }
        }
    }
}
