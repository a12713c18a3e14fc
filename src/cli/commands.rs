//! CLI command implementations

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use crate::config::VaultConfig;
use crate::http_server::HttpServer;
use crate::ledger::RecordMetadata;
use crate::observability::{init_logging, log_event_with_fields, Event, LogFormat};
use crate::restore::{RestoreOutcome, RestoreRequest};
use crate::vault::Vault;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Parse arguments, set up logging, load configuration and run one command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    init_logging(if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    });

    let config = VaultConfig::load(cli.config.as_deref())?;
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("database", config.database.name.as_str()),
            ("environment", config.environment.as_str()),
        ],
    );

    run_command(config, cli.command)
}

/// Run `cmd` against `config` on a fresh tokio runtime
pub fn run_command(config: VaultConfig, cmd: Command) -> CliResult<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(execute(config, cmd))
}

async fn execute(mut config: VaultConfig, cmd: Command) -> CliResult<()> {
    if let Command::Serve { port: Some(port) } = &cmd {
        config.http.port = *port;
    }

    let vault = Arc::new(Vault::from_config(config)?);
    match cmd {
        Command::Backup { note } => backup(&vault, note).await,
        Command::Restore {
            reference,
            safety_backup,
        } => restore(&vault, reference, safety_backup).await,
        Command::List => write_response(&vault.list_backups().await?),
        Command::Delete { id } => {
            vault.delete_backup(&id).await?;
            write_response(&json!({ "deleted": id }))
        }
        Command::SetMetadata { id, metadata } => set_metadata(&vault, &id, &metadata).await,
        Command::AutoStatus => write_response(&json!({ "status": vault.auto_backup_enabled() })),
        Command::Schedule { next, trigger } => schedule(&vault, next, trigger).await,
        Command::Serve { .. } => {
            HttpServer::new(vault).start(shutdown_signal()).await?;
            Ok(())
        }
    }
}

async fn backup(vault: &Vault, note: Option<String>) -> CliResult<()> {
    let receipt = vault.backup(note).await?;
    write_response(&receipt)
}

async fn restore(vault: &Vault, reference: String, safety_backup: Option<bool>) -> CliResult<()> {
    let request = RestoreRequest {
        reference,
        safety_backup: safety_backup.unwrap_or_else(|| vault.config().pre_restore_backup()),
    };

    let outcome = vault.restore_with(request).await;
    match &outcome {
        RestoreOutcome::Restored(report) => write_response(&json!({
            "message": report.message(),
            "report": report,
            "dropHint": report.drop_hint(),
        })),
        RestoreOutcome::FailedUnchanged { error }
        | RestoreOutcome::FailedRolledBack { error, .. }
        | RestoreOutcome::FailedUnrecoverable { error } => {
            let mut message = format!("{} {}", outcome.message(), error);
            if let Some(recovery) = error.manual_recovery() {
                message.push_str(". ");
                message.push_str(&recovery);
            }
            Err(CliError::Restore {
                status: outcome.status(),
                message,
            })
        }
    }
}

async fn set_metadata(vault: &Vault, id: &str, metadata: &str) -> CliResult<()> {
    let value: Value = serde_json::from_str(metadata)?;
    if !value.is_object() {
        return Err(CliError::InvalidInput("metadata must be a JSON object".to_string()));
    }
    let metadata: RecordMetadata = serde_json::from_value(value)?;
    let record = vault.update_metadata(id, metadata).await?;
    write_response(&record)
}

async fn schedule(vault: &Vault, next: usize, trigger: bool) -> CliResult<()> {
    let schedule = vault.schedule()?;

    let mut upcoming = Vec::with_capacity(next);
    let mut after = Utc::now();
    for _ in 0..next {
        after = schedule.next_after(after)?;
        upcoming.push(after.to_rfc3339());
    }

    let triggered = if trigger {
        Some(vault.trigger_auto_backup().await.to_string())
    } else {
        None
    };

    write_response(&json!({
        "expression": schedule.expression(),
        "enabled": vault.auto_job().is_enabled(),
        "upcoming": upcoming,
        "trigger": triggered,
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
