//! Concurrency guard
//!
//! At most one backup may be `pending` at a time. The guard asks the ledger
//! for pending records before creating a new one. Inside one process the
//! check and the create run under a single async mutex, so two concurrent
//! requests cannot both pass the check. Separate processes sharing a ledger
//! can still race; that only costs a duplicate backup, never data.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::ledger::{BackupRecord, Ledger, LedgerError, RecordFilter, RecordMetadata, SortOrder};

pub type GuardResult<T> = Result<T, GuardError>;

#[derive(Debug, Error)]
pub enum GuardError {
    #[error("a backup is already in progress (record {pending_id})")]
    Busy { pending_id: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub struct ConcurrencyGuard {
    ledger: Arc<dyn Ledger>,
    gate: Mutex<()>,
}

impl ConcurrencyGuard {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            gate: Mutex::new(()),
        }
    }

    /// Fail with `Busy` if any record is pending. Mutates nothing.
    pub async fn check(&self) -> GuardResult<()> {
        let pending = self
            .ledger
            .list(&RecordFilter::pending(), SortOrder::OldestFirst)
            .await?;
        match pending.into_iter().next() {
            Some(record) => Err(GuardError::Busy {
                pending_id: record.id,
            }),
            None => Ok(()),
        }
    }

    /// Check, then create a `pending` record while holding the gate.
    pub async fn begin(&self, metadata: RecordMetadata) -> GuardResult<BackupRecord> {
        let _gate = self.gate.lock().await;
        self.check().await?;
        Ok(self.ledger.create(metadata).await?)
    }
}
