//! Ledger errors

use thiserror::Error;

use super::BackupStatus;

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("backup record not found: {0}")]
    NotFound(String),

    /// The update is not allowed from the record's current status
    #[error("record {id} is {from}, cannot apply {update}")]
    InvalidTransition {
        id: String,
        from: BackupStatus,
        update: &'static str,
    },

    #[error("ledger storage error: {0}")]
    Storage(String),

    #[error("ledger file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
