//! Composition root
//!
//! [`Vault`] wires a resolved [`VaultConfig`] into the runner, client,
//! ledger, artifact store and both orchestrators. The CLI and the HTTP
//! surface only ever talk to a `Vault`.

use std::sync::Arc;

use thiserror::Error;

use crate::artifact::{ArtifactStore, LocalArtifactStore};
use crate::backup::{BackupOrchestrator, BackupReceipt, BackupRequest, BackupResult};
use crate::client::DbClient;
use crate::command::{CommandRunner, ProcessRunner};
use crate::config::{ConfigError, LedgerBackend, VaultConfig};
use crate::guard::ConcurrencyGuard;
use crate::ledger::{
    BackupKind, BackupRecord, FileLedger, Ledger, LedgerError, MemoryLedger, RecordFilter,
    RecordMetadata, RecordUpdate, SortOrder, TableLedger,
};
use crate::restore::{RestoreOrchestrator, RestoreOutcome, RestoreRequest, RestoreTiming};
use crate::scheduler::{AutoBackupJob, BackupSchedule, SchedulerResult, TriggerStatus};

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub struct Vault {
    config: VaultConfig,
    ledger: Arc<dyn Ledger>,
    backups: Arc<BackupOrchestrator>,
    restores: RestoreOrchestrator,
    auto_job: Arc<AutoBackupJob>,
}

impl Vault {
    /// Production wiring: external client tools, the configured ledger and
    /// a local artifact store.
    pub fn from_config(config: VaultConfig) -> VaultResult<Self> {
        config.validate()?;

        let runner: Arc<dyn CommandRunner> = Arc::new(ProcessRunner::new());
        let ledger: Arc<dyn Ledger> = match (config.ledger.backend, &config.ledger.path) {
            (LedgerBackend::Table, _) => {
                let client =
                    DbClient::new(runner.clone(), config.database.clone(), config.commands.clone());
                Arc::new(TableLedger::new(client, config.database.ledger_table.clone())?)
            }
            (LedgerBackend::File, Some(path)) => Arc::new(FileLedger::open(path)?),
            (LedgerBackend::File, None) | (LedgerBackend::Memory, _) => Arc::new(MemoryLedger::new()),
        };
        let store: Arc<dyn ArtifactStore> = Arc::new(LocalArtifactStore::new(
            config.storage.root.clone(),
            config.storage.key_prefix.clone(),
        ));

        Ok(Self::with_parts(config, runner, ledger, store))
    }

    /// Wire explicit collaborators. The config is taken as already
    /// validated.
    pub fn with_parts(
        config: VaultConfig,
        runner: Arc<dyn CommandRunner>,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        let client = DbClient::new(runner, config.database.clone(), config.commands.clone());
        let guard = Arc::new(ConcurrencyGuard::new(ledger.clone()));

        let backups = Arc::new(BackupOrchestrator::new(
            client.clone(),
            ledger.clone(),
            store.clone(),
            guard,
            config.work_dir.clone(),
        ));
        let restores = RestoreOrchestrator::new(
            client,
            store,
            backups.clone(),
            RestoreTiming::from(&config.restore),
            config.work_dir.clone(),
        );
        let auto_job = Arc::new(AutoBackupJob::new(backups.clone(), &config));

        Self {
            config,
            ledger,
            backups,
            restores,
            auto_job,
        }
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Take a manual backup
    pub async fn backup(&self, note: Option<String>) -> BackupResult<BackupReceipt> {
        let mut request = BackupRequest::new(BackupKind::Manual);
        request.note = note;
        self.backups.run(request).await
    }

    /// Restore from `reference`, with a safety backup when the
    /// configuration asks for one.
    pub async fn restore(&self, reference: impl Into<String>) -> RestoreOutcome {
        self.restore_with(RestoreRequest {
            reference: reference.into(),
            safety_backup: self.config.pre_restore_backup(),
        })
        .await
    }

    pub async fn restore_with(&self, request: RestoreRequest) -> RestoreOutcome {
        self.restores.restore(request).await
    }

    /// All records, newest first
    pub async fn list_backups(&self) -> VaultResult<Vec<BackupRecord>> {
        Ok(self
            .ledger
            .list(&RecordFilter::default(), SortOrder::NewestFirst)
            .await?)
    }

    /// Remove a ledger record. The stored archive is left alone.
    pub async fn delete_backup(&self, id: &str) -> VaultResult<()> {
        Ok(self.ledger.delete_by_id(id).await?)
    }

    /// Replace a record's free-form metadata
    pub async fn update_metadata(&self, id: &str, metadata: RecordMetadata) -> VaultResult<BackupRecord> {
        Ok(self
            .ledger
            .update_by_id(id, RecordUpdate::ReplaceMetadata(metadata))
            .await?)
    }

    /// Whether automatic backups are switched on
    pub fn auto_backup_enabled(&self) -> bool {
        self.config.backup.auto
    }

    pub async fn trigger_auto_backup(&self) -> TriggerStatus {
        self.auto_job.trigger().await
    }

    pub fn auto_job(&self) -> Arc<AutoBackupJob> {
        self.auto_job.clone()
    }

    pub fn schedule(&self) -> SchedulerResult<BackupSchedule> {
        BackupSchedule::parse(&self.config.backup.schedule)
    }
}
