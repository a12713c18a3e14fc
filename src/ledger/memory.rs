//! In-memory ledger

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use super::errors::{LedgerError, LedgerResult};
use super::{BackupRecord, Ledger, RecordFilter, RecordMetadata, RecordUpdate, SortOrder};

/// Records in insertion order, shared by the ledger implementations.
#[derive(Debug, Default, Clone)]
pub(crate) struct RecordTable {
    records: Vec<BackupRecord>,
}

impl RecordTable {
    pub(crate) fn from_records(records: Vec<BackupRecord>) -> Self {
        Self { records }
    }

    pub(crate) fn records(&self) -> &[BackupRecord] {
        &self.records
    }

    pub(crate) fn insert(&mut self, record: BackupRecord) {
        self.records.push(record);
    }

    pub(crate) fn list(&self, filter: &RecordFilter, order: SortOrder) -> Vec<BackupRecord> {
        let mut matching: Vec<BackupRecord> = self
            .records
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();

        match order {
            SortOrder::OldestFirst => matching.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
            SortOrder::NewestFirst => {
                // Later insertions first among equal timestamps
                matching.reverse();
                matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
        }
        matching
    }

    pub(crate) fn get(&self, id: &str) -> LedgerResult<&BackupRecord> {
        self.records
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }

    /// Apply `update` to a copy; the caller commits it with [`Self::replace`].
    pub(crate) fn updated(&self, id: &str, update: RecordUpdate) -> LedgerResult<BackupRecord> {
        let mut record = self.get(id)?.clone();
        record.apply(update)?;
        Ok(record)
    }

    pub(crate) fn replace(&mut self, record: BackupRecord) {
        if let Some(slot) = self.records.iter_mut().find(|r| r.id == record.id) {
            *slot = record;
        }
    }

    pub(crate) fn remove(&mut self, id: &str) -> LedgerResult<BackupRecord> {
        let index = self
            .records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;
        Ok(self.records.remove(index))
    }
}

/// Ledger kept in process memory
#[derive(Debug, Default)]
pub struct MemoryLedger {
    table: Mutex<RecordTable>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, RecordTable> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn create(&self, metadata: RecordMetadata) -> LedgerResult<BackupRecord> {
        let record = BackupRecord::pending(metadata);
        self.lock().insert(record.clone());
        Ok(record)
    }

    async fn list(&self, filter: &RecordFilter, order: SortOrder) -> LedgerResult<Vec<BackupRecord>> {
        Ok(self.lock().list(filter, order))
    }

    async fn get(&self, id: &str) -> LedgerResult<BackupRecord> {
        self.lock().get(id).cloned()
    }

    async fn update_by_id(&self, id: &str, update: RecordUpdate) -> LedgerResult<BackupRecord> {
        let mut table = self.lock();
        let record = table.updated(id, update)?;
        table.replace(record.clone());
        Ok(record)
    }

    async fn delete_by_id(&self, id: &str) -> LedgerResult<()> {
        self.lock().remove(id).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{BackupKind, BackupStatus};

    #[tokio::test]
    async fn test_create_list_delete() {
        let ledger = MemoryLedger::new();
        let first = ledger.create(RecordMetadata::for_kind(BackupKind::Auto)).await.unwrap();
        let second = ledger.create(RecordMetadata::for_kind(BackupKind::Manual)).await.unwrap();

        let all = ledger.list(&RecordFilter::default(), SortOrder::NewestFirst).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);

        ledger.delete_by_id(&first.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(matches!(
            ledger.delete_by_id(&first.id).await,
            Err(LedgerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_filter_pending() {
        let ledger = MemoryLedger::new();
        let done = ledger.create(RecordMetadata::default()).await.unwrap();
        ledger
            .update_by_id(&done.id, RecordUpdate::Failed { message: "boom".into() })
            .await
            .unwrap();
        let open = ledger.create(RecordMetadata::default()).await.unwrap();

        let pending = ledger.list(&RecordFilter::pending(), SortOrder::NewestFirst).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, open.id);
        assert_eq!(pending[0].status, BackupStatus::Pending);
    }

    #[tokio::test]
    async fn test_rejected_update_is_not_committed() {
        let ledger = MemoryLedger::new();
        let record = ledger.create(RecordMetadata::default()).await.unwrap();
        ledger
            .update_by_id(&record.id, RecordUpdate::Failed { message: "first".into() })
            .await
            .unwrap();

        let err = ledger
            .update_by_id(&record.id, RecordUpdate::Failed { message: "second".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));

        let stored = ledger.get(&record.id).await.unwrap();
        assert_eq!(stored.metadata.error.as_deref(), Some("first"));
    }
}
