//! Backup and restore routes
//!
//! Status mapping:
//! - busy guard or missing restore URL: 400
//! - unknown record id: 404
//! - every other failure: 500, with the rollback outcome for restores

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::backup::BackupError;
use crate::ledger::{BackupRecord, LedgerError, RecordMetadata};
use crate::restore::{RestoreError, RestoreOutcome};
use crate::vault::{Vault, VaultError};

const BUSY_MESSAGE: &str = "Backup is already in progress. Please wait.";

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Default, Deserialize)]
pub struct CreateBackupRequest {
    pub note: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBackupResponse {
    pub id: String,
    pub artifact_id: String,
    pub artifact_url: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct BackupsListResponse {
    pub backups: Vec<BackupRecord>,
}

#[derive(Debug, Deserialize)]
pub struct RestoreBody {
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResponse {
    pub message: String,
    pub backup_database: String,
    pub drop_hint: String,
    pub ledger_restored: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreFailureResponse {
    pub message: String,
    pub error: String,
    pub code: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_recovery: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMetadataRequest {
    pub id: Option<String>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct AutoStatusResponse {
    pub status: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(status: StatusCode, error: impl Into<String>, code: Option<&str>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.map(str::to_string),
        }),
    )
}

fn ledger_error_response(err: VaultError) -> ApiError {
    match err {
        VaultError::Ledger(LedgerError::NotFound(id)) => error_response(
            StatusCode::NOT_FOUND,
            format!("backup record not found: {}", id),
            None,
        ),
        other => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unexpected error: {}", other),
            None,
        ),
    }
}

// ==================
// Routes
// ==================

pub fn backup_routes(vault: Arc<Vault>) -> Router {
    Router::new()
        .route("/db-backup", get(list_backups_handler).post(create_backup_handler))
        .route("/db-backup/:id", delete(delete_backup_handler))
        .route("/db-restore", post(restore_handler))
        .route("/update-metadata", post(update_metadata_handler))
        .route("/auto-status", get(auto_status_handler))
        .with_state(vault)
}

// ==================
// Backup Handlers
// ==================

async fn list_backups_handler(
    State(vault): State<Arc<Vault>>,
) -> Result<Json<BackupsListResponse>, ApiError> {
    let backups = vault.list_backups().await.map_err(ledger_error_response)?;
    Ok(Json(BackupsListResponse { backups }))
}

async fn create_backup_handler(
    State(vault): State<Arc<Vault>>,
    body: Option<Json<CreateBackupRequest>>,
) -> Result<Json<CreateBackupResponse>, ApiError> {
    let note = body.and_then(|Json(request)| request.note);

    match vault.backup(note).await {
        Ok(receipt) => Ok(Json(CreateBackupResponse {
            id: receipt.id,
            artifact_id: receipt.artifact_id,
            artifact_url: receipt.artifact_url,
            message: "Backup completed successfully".to_string(),
        })),
        Err(err @ BackupError::Busy { .. }) => Err(error_response(
            StatusCode::BAD_REQUEST,
            BUSY_MESSAGE,
            Some(err.code()),
        )),
        Err(err) => Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Backup failed: {}", err),
            Some(err.code()),
        )),
    }
}

async fn delete_backup_handler(
    State(vault): State<Arc<Vault>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    vault.delete_backup(&id).await.map_err(ledger_error_response)?;
    Ok(Json(MessageResponse {
        message: format!("Backup {} deleted", id),
    }))
}

// ==================
// Restore Handler
// ==================

async fn restore_handler(
    State(vault): State<Arc<Vault>>,
    Json(body): Json<RestoreBody>,
) -> Result<Json<RestoreResponse>, (StatusCode, Json<RestoreFailureResponse>)> {
    let reference = body.url.unwrap_or_default();
    let outcome = vault.restore(reference).await;

    match &outcome {
        RestoreOutcome::Restored(report) => Ok(Json(RestoreResponse {
            message: report.message(),
            backup_database: report.preserved_database.clone(),
            drop_hint: report.drop_hint(),
            ledger_restored: report.ledger_restored,
        })),
        RestoreOutcome::FailedUnchanged { error } if error.is_rejection() => {
            let message = match error {
                RestoreError::MissingReference => "Backup URL is required",
                _ => BUSY_MESSAGE,
            };
            Err((
                StatusCode::BAD_REQUEST,
                Json(failure_body(&outcome, error, message.to_string())),
            ))
        }
        RestoreOutcome::FailedUnchanged { error }
        | RestoreOutcome::FailedRolledBack { error, .. }
        | RestoreOutcome::FailedUnrecoverable { error } => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(failure_body(&outcome, error, outcome.message())),
        )),
    }
}

fn failure_body(outcome: &RestoreOutcome, error: &RestoreError, summary: String) -> RestoreFailureResponse {
    let (primary, rollback_error) = match error {
        RestoreError::RollbackFailed { step, message, cause, .. } => {
            (cause.to_string(), Some(format!("{}: {}", step, message)))
        }
        RestoreError::CriticalManualIntervention {
            swap_error,
            rename_back_error,
            ..
        } => (swap_error.clone(), Some(rename_back_error.clone())),
        other => (other.to_string(), None),
    };

    let rollback = match outcome {
        RestoreOutcome::FailedRolledBack { .. } => Some("successful".to_string()),
        RestoreOutcome::FailedUnrecoverable { .. } => Some("failed".to_string()),
        _ => None,
    };

    RestoreFailureResponse {
        message: summary,
        error: primary,
        code: error.code().to_string(),
        status: outcome.status().to_string(),
        rollback,
        rollback_error,
        manual_recovery: error.manual_recovery(),
    }
}

// ==================
// Metadata and Status Handlers
// ==================

async fn update_metadata_handler(
    State(vault): State<Arc<Vault>>,
    Json(request): Json<UpdateMetadataRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let (id, metadata) = match (request.id, request.metadata) {
        (Some(id), Some(metadata)) if !id.is_empty() && metadata.is_object() => (id, metadata),
        _ => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "'id' and full 'metadata' object are required.",
                None,
            ))
        }
    };

    let metadata: RecordMetadata = serde_json::from_value(metadata).map_err(|e| {
        error_response(StatusCode::BAD_REQUEST, format!("invalid metadata: {}", e), None)
    })?;

    vault
        .update_metadata(&id, metadata)
        .await
        .map_err(ledger_error_response)?;

    Ok(Json(MessageResponse {
        message: "Metadata updated successfully.".to_string(),
    }))
}

async fn auto_status_handler(State(vault): State<Arc<Vault>>) -> Json<AutoStatusResponse> {
    Json(AutoStatusResponse {
        status: vault.auto_backup_enabled(),
    })
}
