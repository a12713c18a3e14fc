//! Observable events
//!
//! Every step of a backup or restore that an operator may need to find in
//! the logs has a fixed event name. Events are explicit and typed.

use std::fmt;

use tracing::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    ConfigLoaded,
    ServerStart,
    ServerStop,
    SchedulerStart,
    SchedulerStop,

    // Backup
    BackupBusy,
    BackupRecordCreated,
    BackupCaptureComplete,
    BackupPackageComplete,
    BackupPublishComplete,
    BackupComplete,
    BackupFailed,
    /// Recording the failure in the ledger failed too
    BackupStranded,
    /// Automatic backup not taken (disabled or development)
    BackupSkipped,

    // Restore
    RestoreSafetyBackupComplete,
    RestoreArtifactReady,
    RestoreMaintenanceFallback,
    /// Safety dump written, rollback armed
    RestoreSafetyDumpComplete,
    RestoreScratchCreated,
    RestoreScratchApplied,
    RestoreLedgerDumpSkipped,
    RestoreSwapComplete,
    RestoreRenameBackComplete,
    RestoreLedgerRestored,
    RestoreLedgerSkipped,
    RestoreAborted,
    RestoreRollbackBegin,
    RestoreRollbackComplete,
    RestoreRollbackFailed,
    RestoreManualIntervention,
    /// Post-restore note naming the preserved database
    RestorePreservedDatabase,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::ServerStart => "SERVER_START",
            Event::ServerStop => "SERVER_STOP",
            Event::SchedulerStart => "SCHEDULER_START",
            Event::SchedulerStop => "SCHEDULER_STOP",

            Event::BackupBusy => "BACKUP_BUSY",
            Event::BackupRecordCreated => "BACKUP_RECORD_CREATED",
            Event::BackupCaptureComplete => "BACKUP_CAPTURE_COMPLETE",
            Event::BackupPackageComplete => "BACKUP_PACKAGE_COMPLETE",
            Event::BackupPublishComplete => "BACKUP_PUBLISH_COMPLETE",
            Event::BackupComplete => "BACKUP_COMPLETE",
            Event::BackupFailed => "BACKUP_FAILED",
            Event::BackupStranded => "BACKUP_STRANDED",
            Event::BackupSkipped => "BACKUP_SKIPPED",

            Event::RestoreSafetyBackupComplete => "RESTORE_SAFETY_BACKUP_COMPLETE",
            Event::RestoreArtifactReady => "RESTORE_ARTIFACT_READY",
            Event::RestoreMaintenanceFallback => "RESTORE_MAINTENANCE_FALLBACK",
            Event::RestoreSafetyDumpComplete => "RESTORE_SAFETY_DUMP_COMPLETE",
            Event::RestoreScratchCreated => "RESTORE_SCRATCH_CREATED",
            Event::RestoreScratchApplied => "RESTORE_SCRATCH_APPLIED",
            Event::RestoreLedgerDumpSkipped => "RESTORE_LEDGER_DUMP_SKIPPED",
            Event::RestoreSwapComplete => "RESTORE_SWAP_COMPLETE",
            Event::RestoreRenameBackComplete => "RESTORE_RENAME_BACK_COMPLETE",
            Event::RestoreLedgerRestored => "RESTORE_LEDGER_RESTORED",
            Event::RestoreLedgerSkipped => "RESTORE_LEDGER_SKIPPED",
            Event::RestoreAborted => "RESTORE_ABORTED",
            Event::RestoreRollbackBegin => "RESTORE_ROLLBACK_BEGIN",
            Event::RestoreRollbackComplete => "RESTORE_ROLLBACK_COMPLETE",
            Event::RestoreRollbackFailed => "RESTORE_ROLLBACK_FAILED",
            Event::RestoreManualIntervention => "RESTORE_MANUAL_INTERVENTION",
            Event::RestorePreservedDatabase => "RESTORE_PRESERVED_DATABASE",
        }
    }

    /// Level the event is logged at
    pub fn level(&self) -> Level {
        match self {
            Event::RestoreRollbackFailed
            | Event::RestoreManualIntervention
            | Event::BackupStranded => Level::ERROR,

            Event::BackupFailed
            | Event::BackupBusy
            | Event::RestoreAborted
            | Event::RestoreMaintenanceFallback
            | Event::RestoreLedgerDumpSkipped
            | Event::RestoreLedgerSkipped
            | Event::RestoreRollbackBegin
            | Event::RestoreRenameBackComplete => Level::WARN,

            _ => Level::INFO,
        }
    }

    /// Operator action is required
    pub fn needs_operator(&self) -> bool {
        matches!(
            self,
            Event::RestoreRollbackFailed | Event::RestoreManualIntervention | Event::BackupStranded
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalation_levels() {
        assert_eq!(Event::RestoreManualIntervention.level(), Level::ERROR);
        assert!(Event::RestoreRollbackFailed.needs_operator());
        assert_eq!(Event::BackupComplete.level(), Level::INFO);
        assert!(!Event::RestoreSwapComplete.needs_operator());
    }

    #[test]
    fn test_names() {
        assert_eq!(Event::RestoreSwapComplete.to_string(), "RESTORE_SWAP_COMPLETE");
        assert_eq!(Event::BackupStranded.as_str(), "BACKUP_STRANDED");
    }
}
