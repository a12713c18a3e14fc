//! Backup ledger
//!
//! The persisted history of backup attempts. A record starts `pending` and
//! moves once, to `success` (with its artifact reference and sizes) or to
//! `error`. After that only its free-form metadata may be replaced, or the
//! whole record deleted.
//!
//! The ledger itself does not limit how many records are pending; that is
//! the job of [`crate::guard::ConcurrencyGuard`].
//!
//! Records live in a JSON file ([`FileLedger`]), in the `db_backups` table
//! of the live database ([`TableLedger`]), or in memory ([`MemoryLedger`]).

mod errors;
mod file;
mod memory;
mod record;
mod table;

pub use errors::{LedgerError, LedgerResult};
pub use file::FileLedger;
pub use memory::MemoryLedger;
pub use record::{BackupKind, BackupRecord, BackupStatus, RecordMetadata, RecordUpdate};
pub use table::TableLedger;

use async_trait::async_trait;

/// Record selection for [`Ledger::list`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub status: Option<BackupStatus>,
    pub kind: Option<BackupKind>,
}

impl RecordFilter {
    pub fn pending() -> Self {
        Self {
            status: Some(BackupStatus::Pending),
            kind: None,
        }
    }

    pub fn matches(&self, record: &BackupRecord) -> bool {
        self.status.map_or(true, |s| record.status == s)
            && self.kind.map_or(true, |k| record.metadata.kind == Some(k))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// CRUD store for backup records
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Insert a new `pending` record
    async fn create(&self, metadata: RecordMetadata) -> LedgerResult<BackupRecord>;

    async fn list(&self, filter: &RecordFilter, order: SortOrder) -> LedgerResult<Vec<BackupRecord>>;

    async fn get(&self, id: &str) -> LedgerResult<BackupRecord>;

    /// Apply `update` to the record, enforcing its state machine
    async fn update_by_id(&self, id: &str, update: RecordUpdate) -> LedgerResult<BackupRecord>;

    async fn delete_by_id(&self, id: &str) -> LedgerResult<()>;
}
