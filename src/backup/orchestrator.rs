//! Backup lifecycle: begin, capture, package, publish, finish

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use super::errors::{BackupError, BackupResult};
use crate::artifact::{ArtifactRef, ArtifactStore};
use crate::client::DbClient;
use crate::guard::{ConcurrencyGuard, GuardError};
use crate::ledger::{BackupKind, BackupRecord, Ledger, RecordMetadata, RecordUpdate};
use crate::observability::{log_event_with_fields, Event, OperationScope};
use crate::snapshot::{self, PackStats, SnapshotError, ARCHIVE_MIME_TYPE, DUMP_FILE_NAME};
use crate::workspace::Workspace;

/// What to back up and why
#[derive(Debug, Clone)]
pub struct BackupRequest {
    pub kind: BackupKind,
    pub note: Option<String>,
}

impl BackupRequest {
    pub fn new(kind: BackupKind) -> Self {
        Self { kind, note: None }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Result of a successful backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupReceipt {
    pub id: String,
    pub artifact_id: String,
    pub artifact_url: String,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

/// A backup between `begin` and `finish`: its pending record and the
/// directory its files live in.
#[derive(Debug)]
pub struct PendingBackup {
    record: BackupRecord,
    workspace: Workspace,
}

impl PendingBackup {
    pub fn record(&self) -> &BackupRecord {
        &self.record
    }

    pub fn record_id(&self) -> &str {
        &self.record.id
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }
}

/// A packed archive ready for upload
#[derive(Debug, Clone)]
pub struct PackedArchive {
    pub path: PathBuf,
    pub file_name: String,
    pub stats: PackStats,
}

/// Drives one backup from guard check to ledger update.
pub struct BackupOrchestrator {
    client: DbClient,
    ledger: Arc<dyn Ledger>,
    store: Arc<dyn ArtifactStore>,
    guard: Arc<ConcurrencyGuard>,
    work_dir: PathBuf,
}

impl BackupOrchestrator {
    pub fn new(
        client: DbClient,
        ledger: Arc<dyn Ledger>,
        store: Arc<dyn ArtifactStore>,
        guard: Arc<ConcurrencyGuard>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            ledger,
            store,
            guard,
            work_dir: work_dir.into(),
        }
    }

    /// Run the whole lifecycle. The record is always resolved to `success`
    /// or `error` unless the error is `Busy` (no record was created) or
    /// `Stranded` (the ledger refused the final update).
    pub async fn run(&self, request: BackupRequest) -> BackupResult<BackupReceipt> {
        let pending = self.begin(&request).await?;
        let scope = OperationScope::with_fields(
            "BACKUP",
            &[("record_id", pending.record_id()), ("kind", request.kind.as_str())],
        );

        let produced = self.produce(&pending).await;
        match self.finish(pending, produced).await {
            Ok(receipt) => {
                scope.complete_with_fields(&[
                    ("artifact_id", receipt.artifact_id.as_str()),
                    ("compressed_size", &receipt.compressed_size.to_string()),
                ]);
                Ok(receipt)
            }
            Err(err) => {
                scope.fail(&err.to_string());
                Err(err)
            }
        }
    }

    /// Consult the guard and create the `pending` record.
    pub async fn begin(&self, request: &BackupRequest) -> BackupResult<PendingBackup> {
        let mut metadata = RecordMetadata::for_kind(request.kind);
        metadata.note = request.note.clone();

        let record = self.guard.begin(metadata).await.map_err(|e| match e {
            GuardError::Busy { pending_id } => {
                log_event_with_fields(Event::BackupBusy, &[("pending_id", pending_id.as_str())]);
                BackupError::Busy { pending_id }
            }
            GuardError::Ledger(source) => BackupError::Ledger(source),
        })?;
        log_event_with_fields(
            Event::BackupRecordCreated,
            &[("record_id", record.id.as_str()), ("kind", request.kind.as_str())],
        );

        let workspace = match Workspace::create(&self.work_dir, "backup") {
            Ok(workspace) => workspace,
            Err(e) => {
                let cause = BackupError::Capture {
                    record_id: record.id.clone(),
                    message: format!("failed to create workspace: {}", e),
                };
                return Err(self.record_failure(&record.id, cause).await);
            }
        };

        Ok(PendingBackup { record, workspace })
    }

    /// Dump the live database into the workspace.
    pub async fn capture(&self, pending: &PendingBackup) -> BackupResult<PathBuf> {
        let database = self.client.database();
        let dump = pending.workspace.join(DUMP_FILE_NAME);
        let capture_error = |message: String| BackupError::Capture {
            record_id: pending.record_id().to_string(),
            message,
        };

        self.client
            .dump_database(&database.name, &dump, &database.excluded_table_data)
            .await
            .map_err(|e| capture_error(e.message()))?;

        let size = tokio::fs::metadata(&dump)
            .await
            .map_err(|_| capture_error(format!("dump tool wrote no file at {}", dump.display())))?
            .len();

        log_event_with_fields(
            Event::BackupCaptureComplete,
            &[("record_id", pending.record_id()), ("bytes", &size.to_string())],
        );
        Ok(dump)
    }

    /// Compress the dump into a timestamped archive.
    pub async fn package(&self, pending: &PendingBackup, dump: &Path) -> BackupResult<PackedArchive> {
        let file_name = snapshot::archive_file_name(Utc::now());
        let path = pending.workspace.join(&file_name);

        let (src, dst) = (dump.to_path_buf(), path.clone());
        let stats = tokio::task::spawn_blocking(move || snapshot::pack(&src, &dst))
            .await
            .map_err(|e| SnapshotError::io("packing task failed", std::io::Error::other(e)))
            .and_then(|result| result)
            .map_err(|source| BackupError::Package {
                record_id: pending.record_id().to_string(),
                source,
            })?;

        log_event_with_fields(
            Event::BackupPackageComplete,
            &[
                ("record_id", pending.record_id()),
                ("compressed_size", &stats.compressed_size.to_string()),
                ("uncompressed_size", &stats.uncompressed_size.to_string()),
            ],
        );
        Ok(PackedArchive {
            path,
            file_name,
            stats,
        })
    }

    /// Hand the archive to the artifact store.
    pub async fn publish(&self, pending: &PendingBackup, archive: &PackedArchive) -> BackupResult<ArtifactRef> {
        let upload_error = |message: String| BackupError::Upload {
            record_id: pending.record_id().to_string(),
            message,
        };

        let bytes = tokio::fs::read(&archive.path)
            .await
            .map_err(|e| upload_error(format!("failed to read archive: {}", e)))?;

        let artifact = self
            .store
            .put(bytes, &archive.file_name, ARCHIVE_MIME_TYPE)
            .await
            .map_err(|e| upload_error(e.to_string()))?;

        if !artifact.is_complete() {
            return Err(upload_error("artifact store returned no reference".to_string()));
        }

        log_event_with_fields(
            Event::BackupPublishComplete,
            &[
                ("record_id", pending.record_id()),
                ("artifact_id", artifact.artifact_id.as_str()),
            ],
        );
        Ok(artifact)
    }

    /// Resolve the record: `success` with artifact and sizes, or `error`.
    /// The workspace is removed either way.
    pub async fn finish(
        &self,
        pending: PendingBackup,
        produced: BackupResult<(ArtifactRef, PackStats)>,
    ) -> BackupResult<BackupReceipt> {
        let PendingBackup {
            record,
            mut workspace,
        } = pending;
        if let Err(e) = workspace.cleanup() {
            tracing::warn!(record_id = %record.id, error = %e, "failed to remove backup workspace");
        }

        let (artifact, stats) = match produced {
            Ok(done) => done,
            Err(cause) => return Err(self.record_failure(&record.id, cause).await),
        };

        let update = RecordUpdate::Succeeded {
            artifact: artifact.clone(),
            compressed_size: stats.compressed_size,
            uncompressed_size: stats.uncompressed_size,
        };
        match self.ledger.update_by_id(&record.id, update).await {
            Ok(_) => Ok(BackupReceipt {
                id: record.id,
                artifact_id: artifact.artifact_id,
                artifact_url: artifact.artifact_url,
                compressed_size: stats.compressed_size,
                uncompressed_size: stats.uncompressed_size,
            }),
            Err(source) => {
                let cause = BackupError::Finish {
                    record_id: record.id.clone(),
                    source,
                };
                Err(self.record_failure(&record.id, cause).await)
            }
        }
    }

    async fn produce(&self, pending: &PendingBackup) -> BackupResult<(ArtifactRef, PackStats)> {
        let dump = self.capture(pending).await?;
        let archive = self.package(pending, &dump).await?;
        let artifact = self.publish(pending, &archive).await?;
        Ok((artifact, archive.stats))
    }

    /// Mark the record `error`. Returns `cause`, or `Stranded` wrapping it
    /// when the ledger refuses the update.
    async fn record_failure(&self, record_id: &str, cause: BackupError) -> BackupError {
        let update = RecordUpdate::Failed {
            message: cause.to_string(),
        };
        match self.ledger.update_by_id(record_id, update).await {
            Ok(_) => {
                log_event_with_fields(
                    Event::BackupFailed,
                    &[
                        ("record_id", record_id),
                        ("code", cause.code()),
                        ("reason", &cause.to_string()),
                    ],
                );
                cause
            }
            Err(ledger_error) => {
                let ledger_error = ledger_error.to_string();
                log_event_with_fields(
                    Event::BackupStranded,
                    &[
                        ("record_id", record_id),
                        ("cause", &cause.to_string()),
                        ("ledger_error", &ledger_error),
                    ],
                );
                BackupError::Stranded {
                    record_id: record_id.to_string(),
                    cause: Box::new(cause),
                    ledger_error,
                }
            }
        }
    }
}
