//! The safe-swap restore protocol

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use super::errors::{RestoreError, RestoreResult, SwapStep};
use super::outcome::{RestoreOutcome, RestoreReport, RollbackMethod};
use crate::artifact::ArtifactStore;
use crate::backup::{BackupOrchestrator, BackupRequest};
use crate::client::{is_valid_identifier, ApplyMode, DbClient};
use crate::command::redact_reference;
use crate::config::{DatabaseConfig, RestoreConfig};
use crate::ledger::BackupKind;
use crate::observability::{log_event_with_fields, Event, OperationScope};
use crate::snapshot;
use crate::workspace::Workspace;

/// Written in place of the ledger table dump when the table could not be
/// dumped, so the ledger step runs the same way either way.
pub(crate) const LEDGER_PLACEHOLDER: &str = "-- no ledger table found\n";

/// One restore request
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    /// URL or store key of the archive
    pub reference: String,
    /// Take a pre-restore safety backup first
    pub safety_backup: bool,
}

/// Timing knobs of the protocol
#[derive(Debug, Clone, Copy)]
pub struct RestoreTiming {
    pub settle_delay: Duration,
    pub rollback_settle_delay: Duration,
}

impl From<&RestoreConfig> for RestoreTiming {
    fn from(config: &RestoreConfig) -> Self {
        Self {
            settle_delay: config.settle_delay(),
            rollback_settle_delay: config.rollback_settle_delay(),
        }
    }
}

/// Rollback state of one invocation. Discarded when the invocation ends.
#[derive(Debug, Default)]
pub struct RestoreAttempt {
    /// Full dump of the live database taken before anything destructive
    pub safety_dump: Option<PathBuf>,
    /// Scratch database, once created and until promoted
    pub scratch_db: Option<String>,
    /// Set once the safety dump exists
    pub rollback_armed: bool,
}

/// Database names one invocation works with
#[derive(Debug, Clone)]
pub(crate) struct SwapNames {
    pub live: String,
    pub scratch: String,
    pub preserved: String,
    pub maintenance: String,
}

impl SwapNames {
    fn derive(live: &str, maintenance: String, millis: i64) -> RestoreResult<Self> {
        let names = Self {
            live: live.to_string(),
            scratch: format!("{}_temp_{}", live, millis),
            preserved: format!("{}_backup_{}", live, millis),
            maintenance,
        };
        for name in [&names.live, &names.scratch, &names.preserved, &names.maintenance] {
            if !is_valid_identifier(name) {
                return Err(RestoreError::InvalidName(name.clone()));
            }
        }
        Ok(names)
    }
}

/// Replaces the live database with a snapshot without ever dropping the
/// original data first.
pub struct RestoreOrchestrator {
    pub(crate) client: DbClient,
    store: Arc<dyn ArtifactStore>,
    backups: Arc<BackupOrchestrator>,
    pub(crate) timing: RestoreTiming,
    work_dir: PathBuf,
}

impl RestoreOrchestrator {
    pub fn new(
        client: DbClient,
        store: Arc<dyn ArtifactStore>,
        backups: Arc<BackupOrchestrator>,
        timing: RestoreTiming,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            store,
            backups,
            timing,
            work_dir: work_dir.into(),
        }
    }

    /// Run the protocol. Never fails with `Err`: every failure is folded
    /// into the outcome variant describing the state it left behind.
    pub async fn restore(&self, request: RestoreRequest) -> RestoreOutcome {
        let database = self.client.database().name.clone();
        let reference = redact_reference(&request.reference);
        let scope = OperationScope::with_fields(
            "RESTORE",
            &[("database", database.as_str()), ("reference", reference.as_str())],
        );

        let outcome = self.execute(&request).await;
        match &outcome {
            RestoreOutcome::Restored(report) => {
                scope.complete_with_fields(&[
                    ("preserved_database", report.preserved_database.as_str()),
                    ("ledger_restored", if report.ledger_restored { "true" } else { "false" }),
                ]);
            }
            other => {
                let reason = other
                    .error()
                    .map(|e| format!("{} ({})", e, e.code()))
                    .unwrap_or_default();
                scope.fail(&reason);
            }
        }
        outcome
    }

    async fn execute(&self, request: &RestoreRequest) -> RestoreOutcome {
        if request.reference.trim().is_empty() {
            return RestoreOutcome::FailedUnchanged {
                error: RestoreError::MissingReference,
            };
        }

        // 1. safety backup
        let safety_backup_id = if request.safety_backup {
            match self
                .backups
                .run(BackupRequest::new(BackupKind::PreRestore).with_note(format!(
                    "before restoring {}",
                    redact_reference(&request.reference)
                )))
                .await
            {
                Ok(receipt) => {
                    log_event_with_fields(
                        Event::RestoreSafetyBackupComplete,
                        &[("record_id", receipt.id.as_str())],
                    );
                    Some(receipt.id)
                }
                Err(e) => return unchanged(RestoreError::SafetyBackup(e)),
            }
        } else {
            None
        };

        let mut work = match Workspace::create(&self.work_dir, "restore") {
            Ok(ws) => ws,
            Err(e) => return unchanged(RestoreError::Workspace(e)),
        };
        let mut safety = match Workspace::create(&self.work_dir, "restore-safety") {
            Ok(ws) => ws,
            Err(e) => return unchanged(RestoreError::Workspace(e)),
        };

        let mut attempt = RestoreAttempt::default();
        let outcome = self
            .run_protocol(request, &work, &safety, &mut attempt, safety_backup_id)
            .await;

        // 10. cleanup; the safety dump survives only a failed rollback
        if let RestoreOutcome::FailedUnrecoverable {
            error: RestoreError::RollbackFailed { .. },
        } = &outcome
        {
            let kept = safety.retain();
            tracing::error!(path = %kept.display(), "safety dump retained for manual recovery");
        }
        for ws in [&mut work, &mut safety] {
            if let Err(e) = ws.cleanup() {
                tracing::warn!(path = %ws.path().display(), error = %e, "failed to remove restore workspace");
            }
        }

        outcome
    }

    async fn run_protocol(
        &self,
        request: &RestoreRequest,
        work: &Workspace,
        safety: &Workspace,
        attempt: &mut RestoreAttempt,
        safety_backup_id: Option<String>,
    ) -> RestoreOutcome {
        let db = self.client.database().clone();

        // 2. materialize the artifact
        let payload = match self.materialize(&request.reference, work).await {
            Ok(path) => path,
            Err(e) => return unchanged(e),
        };

        // 3. maintenance target
        let maintenance = self.select_maintenance(&db).await;
        let names = match SwapNames::derive(&db.name, maintenance, Utc::now().timestamp_millis()) {
            Ok(names) => names,
            Err(e) => return unchanged(e),
        };

        // 4. safety dump; arms rollback
        let dump_path = safety.join("original_db_backup.sql");
        if let Err(e) = self.client.dump_database(&names.live, &dump_path, &[]).await {
            return unchanged(RestoreError::SafetyDump {
                database: names.live.clone(),
                message: e.message(),
            });
        }
        if !dump_path.is_file() {
            return unchanged(RestoreError::SafetyDump {
                database: names.live.clone(),
                message: "dump tool wrote no file".to_string(),
            });
        }
        attempt.safety_dump = Some(dump_path.clone());
        attempt.rollback_armed = true;
        log_event_with_fields(
            Event::RestoreSafetyDumpComplete,
            &[("database", names.live.as_str()), ("path", &dump_path.display().to_string())],
        );

        // 5. scratch database
        if let Err(e) = self.client.create_database(&names.maintenance, &names.scratch).await {
            return unchanged(RestoreError::Scratch {
                database: names.scratch.clone(),
                message: e.message(),
            });
        }
        attempt.scratch_db = Some(names.scratch.clone());
        log_event_with_fields(Event::RestoreScratchCreated, &[("database", names.scratch.as_str())]);

        // 6. validate the snapshot by applying it to the scratch database
        if let Err(e) = self.client.apply_script(&names.scratch, &payload, ApplyMode::Strict).await {
            self.drop_scratch(&names, attempt).await;
            return unchanged(RestoreError::CorruptSnapshot {
                database: names.scratch.clone(),
                message: e.message(),
            });
        }
        log_event_with_fields(Event::RestoreScratchApplied, &[("database", names.scratch.as_str())]);

        // 7. ledger table of the current live database, best-effort
        let ledger_dump = work.join("ledger_records.sql");
        let ledger_dumped = self.dump_ledger_table(&names, &db.ledger_table, &ledger_dump).await;

        // 8. swap
        let terminated = self
            .client
            .terminate_connections(&names.maintenance, &names.live)
            .await;
        if let Err(e) = terminated {
            tracing::warn!(database = %names.live, error = %e, "connection termination reported an error");
        }
        tokio::time::sleep(self.timing.settle_delay).await;

        if let Err(e) = self
            .client
            .rename_database(&names.maintenance, &names.live, &names.preserved)
            .await
        {
            let error = RestoreError::Swap {
                step: SwapStep::RenameLive,
                message: e.message(),
            };
            return self.roll_back(error, &names, attempt).await;
        }

        if let Err(e) = self
            .client
            .rename_database(&names.maintenance, &names.scratch, &names.live)
            .await
        {
            return self.rename_back(e.message(), &names, attempt).await;
        }
        attempt.scratch_db = None;
        log_event_with_fields(
            Event::RestoreSwapComplete,
            &[("database", names.live.as_str()), ("preserved_database", names.preserved.as_str())],
        );

        // 9. carry the ledger table over
        let ledger_restored =
            self.restore_ledger_table(&names, &db.ledger_table, &ledger_dump).await && ledger_dumped;

        let report = RestoreReport {
            database: names.live.clone(),
            preserved_database: names.preserved.clone(),
            maintenance_database: names.maintenance.clone(),
            ledger_restored,
            safety_backup_id,
        };
        log_event_with_fields(
            Event::RestorePreservedDatabase,
            &[
                ("preserved_database", report.preserved_database.as_str()),
                ("drop_hint", &report.drop_hint()),
            ],
        );
        RestoreOutcome::Restored(report)
    }

    /// Fetch, store and unpack the archive; return its single `.sql` payload.
    async fn materialize(&self, reference: &str, work: &Workspace) -> RestoreResult<PathBuf> {
        let bytes = self
            .store
            .get(reference)
            .await
            .map_err(|e| {
                let shown = redact_reference(reference);
                RestoreError::Fetch {
                    message: e.to_string().replace(reference, &shown),
                    reference: shown,
                }
            })?;

        let archive = work.join("artifact.tar.gz");
        tokio::fs::write(&archive, &bytes)
            .await
            .map_err(RestoreError::Workspace)?;

        let dest = work.join("extracted");
        let payload = tokio::task::spawn_blocking(move || snapshot::unpack(&archive, &dest))
            .await
            .map_err(|e| RestoreError::Workspace(std::io::Error::other(e)))?
            .map_err(|e| {
                if e.is_invalid_artifact() {
                    RestoreError::ArtifactInvalid(e)
                } else {
                    RestoreError::Unpack(e)
                }
            })?;

        log_event_with_fields(
            Event::RestoreArtifactReady,
            &[("payload", &payload.display().to_string())],
        );
        Ok(payload)
    }

    /// Prefer the dedicated maintenance database, creating it through the
    /// fallback database when missing. Any failure selects the fallback.
    async fn select_maintenance(&self, db: &DatabaseConfig) -> String {
        let provisioned = async {
            if !self
                .client
                .database_exists(&db.fallback_database, &db.maintenance_database)
                .await?
            {
                self.client
                    .create_database(&db.fallback_database, &db.maintenance_database)
                    .await?;
                tracing::info!(database = %db.maintenance_database, "created maintenance database");
            }
            self.client.ping(&db.maintenance_database).await
        }
        .await;

        match provisioned {
            Ok(()) => db.maintenance_database.clone(),
            Err(e) => {
                log_event_with_fields(
                    Event::RestoreMaintenanceFallback,
                    &[
                        ("maintenance_database", db.maintenance_database.as_str()),
                        ("fallback_database", db.fallback_database.as_str()),
                        ("reason", &e.message()),
                    ],
                );
                db.fallback_database.clone()
            }
        }
    }

    /// Dump the ledger table from the live database. On failure write the
    /// placeholder instead and return false.
    async fn dump_ledger_table(&self, names: &SwapNames, table: &str, path: &Path) -> bool {
        match self.client.dump_table(&names.live, table, path).await {
            Ok(()) if path.is_file() => true,
            result => {
                let reason = match result {
                    Err(e) => e.message(),
                    Ok(()) => "dump tool wrote no file".to_string(),
                };
                log_event_with_fields(
                    Event::RestoreLedgerDumpSkipped,
                    &[("table", table), ("reason", &reason)],
                );
                if let Err(e) = tokio::fs::write(path, LEDGER_PLACEHOLDER).await {
                    tracing::warn!(error = %e, "failed to write ledger placeholder");
                }
                false
            }
        }
    }

    /// Replace the ledger table in the new live database with the dump.
    /// Retries once without stopping on errors when the dump references a
    /// setting the server does not know. Never fails the restore.
    async fn restore_ledger_table(&self, names: &SwapNames, table: &str, dump: &Path) -> bool {
        if let Err(e) = self.client.drop_table(&names.live, table).await {
            tracing::warn!(table, error = %e, "could not drop ledger table in restored database");
        }

        let strict = self
            .client
            .apply_script(&names.live, dump, ApplyMode::Strict)
            .await;
        let result = match strict {
            Err(e) if e.is_config_parameter_mismatch() => {
                tracing::warn!(table, error = %e, "retrying ledger restore without stopping on errors");
                self.client
                    .apply_script(&names.live, dump, ApplyMode::Relaxed)
                    .await
            }
            other => other,
        };

        match result {
            Ok(_) => {
                log_event_with_fields(Event::RestoreLedgerRestored, &[("table", table)]);
                true
            }
            Err(e) => {
                log_event_with_fields(
                    Event::RestoreLedgerSkipped,
                    &[("table", table), ("reason", &e.message())],
                );
                false
            }
        }
    }

    /// Best-effort drop of the scratch database
    pub(crate) async fn drop_scratch(&self, names: &SwapNames, attempt: &mut RestoreAttempt) {
        let Some(scratch) = attempt.scratch_db.take() else {
            return;
        };
        if let Err(e) = self.client.drop_database(&names.maintenance, &scratch).await {
            tracing::warn!(database = %scratch, error = %e, "could not drop scratch database");
        }
    }
}

fn unchanged(error: RestoreError) -> RestoreOutcome {
    log_event_with_fields(
        Event::RestoreAborted,
        &[("code", error.code()), ("reason", &error.to_string())],
    );
    RestoreOutcome::FailedUnchanged { error }
}

pub(crate) fn rolled_back(error: RestoreError, method: RollbackMethod) -> RestoreOutcome {
    RestoreOutcome::FailedRolledBack { error, method }
}
