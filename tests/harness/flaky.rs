//! Ledger and artifact store wrappers with switchable failures

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dbvault::artifact::{ArtifactError, ArtifactRef, ArtifactResult, ArtifactStore, MemoryArtifactStore};
use dbvault::ledger::{
    BackupRecord, Ledger, LedgerError, LedgerResult, MemoryLedger, RecordFilter, RecordMetadata,
    RecordUpdate, SortOrder,
};

/// `MemoryLedger` whose updates can be made to fail
#[derive(Default)]
pub struct FlakyLedger {
    pub inner: MemoryLedger,
    fail_updates: AtomicBool,
}

impl FlakyLedger {
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Ledger for FlakyLedger {
    async fn create(&self, metadata: RecordMetadata) -> LedgerResult<BackupRecord> {
        self.inner.create(metadata).await
    }

    async fn list(&self, filter: &RecordFilter, order: SortOrder) -> LedgerResult<Vec<BackupRecord>> {
        self.inner.list(filter, order).await
    }

    async fn get(&self, id: &str) -> LedgerResult<BackupRecord> {
        self.inner.get(id).await
    }

    async fn update_by_id(&self, id: &str, update: RecordUpdate) -> LedgerResult<BackupRecord> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(LedgerError::Storage("ledger database unreachable".to_string()));
        }
        self.inner.update_by_id(id, update).await
    }

    async fn delete_by_id(&self, id: &str) -> LedgerResult<()> {
        self.inner.delete_by_id(id).await
    }
}

/// `MemoryArtifactStore` whose uploads can fail or come back without a
/// usable reference
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryArtifactStore,
    fail_puts: AtomicBool,
    incomplete_refs: AtomicBool,
}

impl FlakyStore {
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub fn return_incomplete_refs(&self, incomplete: bool) {
        self.incomplete_refs.store(incomplete, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactStore for FlakyStore {
    async fn put(&self, bytes: Vec<u8>, filename: &str, mime_type: &str) -> ArtifactResult<ArtifactRef> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ArtifactError::IoError("bucket unavailable".to_string()));
        }
        let artifact = self.inner.put(bytes, filename, mime_type).await?;
        if self.incomplete_refs.load(Ordering::SeqCst) {
            return Ok(ArtifactRef {
                artifact_id: artifact.artifact_id,
                artifact_url: String::new(),
            });
        }
        Ok(artifact)
    }

    async fn get(&self, reference: &str) -> ArtifactResult<Vec<u8>> {
        self.inner.get(reference).await
    }
}
