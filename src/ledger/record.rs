//! Backup record model and its state machine

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::errors::{LedgerError, LedgerResult};
use crate::artifact::ArtifactRef;

/// Lifecycle status. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Pending,
    Success,
    Error,
}

impl BackupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupStatus::Pending => "pending",
            BackupStatus::Success => "success",
            BackupStatus::Error => "error",
        }
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What triggered a backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackupKind {
    Manual,
    Auto,
    PreRestore,
}

impl BackupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupKind::Manual => "manual",
            BackupKind::Auto => "auto",
            BackupKind::PreRestore => "pre-restore",
        }
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open metadata map. Known keys are typed; anything else an operator
/// stores is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<BackupKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compressed_size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uncompressed_size: Option<u64>,

    /// Failure description for records that ended in `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RecordMetadata {
    pub fn for_kind(kind: BackupKind) -> Self {
        Self {
            kind: Some(kind),
            ..Default::default()
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// A change applied to a record through the ledger
#[derive(Debug, Clone, PartialEq)]
pub enum RecordUpdate {
    /// `pending -> success`; the only place the artifact is written
    Succeeded {
        artifact: ArtifactRef,
        compressed_size: u64,
        uncompressed_size: u64,
    },
    /// `pending -> error`
    Failed { message: String },
    /// Replace the free-form metadata; allowed in any state
    ReplaceMetadata(RecordMetadata),
}

impl RecordUpdate {
    fn name(&self) -> &'static str {
        match self {
            RecordUpdate::Succeeded { .. } => "success",
            RecordUpdate::Failed { .. } => "error",
            RecordUpdate::ReplaceMetadata(_) => "metadata replacement",
        }
    }
}

/// One backup attempt as tracked by the ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    pub id: String,
    pub status: BackupStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ArtifactRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: RecordMetadata,
}

impl BackupRecord {
    /// A fresh `pending` record with a new id
    pub fn pending(metadata: RecordMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            status: BackupStatus::Pending,
            artifact: None,
            created_at: now,
            updated_at: now,
            metadata,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == BackupStatus::Pending
    }

    /// Apply `update`, enforcing `pending -> success | error`.
    ///
    /// The record is left untouched when the update is rejected.
    pub fn apply(&mut self, update: RecordUpdate) -> LedgerResult<()> {
        match update {
            RecordUpdate::ReplaceMetadata(metadata) => {
                self.metadata = metadata;
            }
            other if !self.is_pending() => {
                return Err(LedgerError::InvalidTransition {
                    id: self.id.clone(),
                    from: self.status,
                    update: other.name(),
                });
            }
            RecordUpdate::Succeeded {
                artifact,
                compressed_size,
                uncompressed_size,
            } => {
                self.status = BackupStatus::Success;
                self.artifact = Some(artifact);
                self.metadata.compressed_size = Some(compressed_size);
                self.metadata.uncompressed_size = Some(uncompressed_size);
            }
            RecordUpdate::Failed { message } => {
                self.status = BackupStatus::Error;
                self.metadata.error = Some(message);
            }
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}
