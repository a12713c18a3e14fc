//! The automatic backup job

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;

use super::cron::BackupSchedule;
use crate::backup::{BackupError, BackupOrchestrator, BackupRequest};
use crate::config::{Environment, VaultConfig};
use crate::ledger::BackupKind;
use crate::observability::{log_event, log_event_with_fields, Event};

/// What one trigger did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerStatus {
    Disabled,
    SkippedInDevelopment,
    Busy,
    Completed { record_id: String },
    Failed { message: String },
}

impl fmt::Display for TriggerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerStatus::Disabled => f.write_str("Skipping backup: automatic backups are disabled"),
            TriggerStatus::SkippedInDevelopment => f.write_str("Skipping backup on development"),
            TriggerStatus::Busy => f.write_str("Backup is already in progress."),
            TriggerStatus::Completed { record_id } => {
                write!(f, "Backup completed successfully ({})", record_id)
            }
            TriggerStatus::Failed { message } => write!(f, "Backup failed: {}", message),
        }
    }
}

/// Periodic backup entry point. `trigger` reports through its status and
/// never fails, so a scheduler loop cannot be brought down by a backup.
pub struct AutoBackupJob {
    backups: Arc<BackupOrchestrator>,
    auto: bool,
    environment: Environment,
}

impl AutoBackupJob {
    pub fn new(backups: Arc<BackupOrchestrator>, config: &VaultConfig) -> Self {
        Self {
            backups,
            auto: config.backup.auto,
            environment: config.environment,
        }
    }

    /// Automatic backups are switched on and this is not development
    pub fn is_enabled(&self) -> bool {
        self.auto && self.environment != Environment::Development
    }

    pub async fn trigger(&self) -> TriggerStatus {
        if !self.auto {
            return self.skipped(TriggerStatus::Disabled);
        }
        if self.environment == Environment::Development {
            return self.skipped(TriggerStatus::SkippedInDevelopment);
        }

        match self.backups.run(BackupRequest::new(BackupKind::Auto)).await {
            Ok(receipt) => TriggerStatus::Completed {
                record_id: receipt.id,
            },
            Err(BackupError::Busy { .. }) => TriggerStatus::Busy,
            Err(e) => TriggerStatus::Failed {
                message: e.to_string(),
            },
        }
    }

    fn skipped(&self, status: TriggerStatus) -> TriggerStatus {
        log_event_with_fields(Event::BackupSkipped, &[("reason", &status.to_string())]);
        status
    }
}

/// Trigger `job` at every occurrence of `schedule` until `shutdown`
/// resolves. A running backup is finished before the loop exits.
pub async fn run_schedule<F>(job: Arc<AutoBackupJob>, schedule: BackupSchedule, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    log_event_with_fields(Event::SchedulerStart, &[("schedule", schedule.expression())]);

    loop {
        let now = Utc::now();
        let next = match schedule.next_after(now) {
            Ok(next) => next,
            Err(e) => {
                tracing::error!(error = %e, "stopping scheduler");
                break;
            }
        };
        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!(next_run = %next, "next automatic backup scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                let status = job.trigger().await;
                tracing::info!(status = %status, "automatic backup trigger");
            }
            _ = &mut shutdown => break,
        }
    }

    log_event(Event::SchedulerStop);
}
