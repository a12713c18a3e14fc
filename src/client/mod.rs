//! Database client
//!
//! Thin typed layer over the engine's client tools. Every method builds a
//! [`CommandSpec`] for `pg_dump` or `psql`, runs it through the injected
//! [`CommandRunner`] and turns a non-zero exit into a [`ClientError`]
//! carrying the tool's error output.
//!
//! Names that end up inside SQL text are validated first; see
//! [`is_valid_identifier`].

mod errors;
mod identifier;

pub use errors::{ClientError, ClientResult};
pub use identifier::{
    is_valid_identifier, is_valid_table_name, validate_identifier, validate_table_name,
    MAX_IDENTIFIER_LEN,
};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use identifier::{quote_ident, quote_literal};
pub(crate) use identifier::{escape_literal, quote_table_name};

use crate::command::{CommandOutput, CommandRunner, CommandSpec};
use crate::config::{CommandConfig, DatabaseConfig};

/// How a SQL script is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Stop at the first error (`ON_ERROR_STOP=1`)
    Strict,
    /// Keep going past errors (`ON_ERROR_STOP=off`)
    Relaxed,
}

impl ApplyMode {
    fn on_error_stop(self) -> &'static str {
        match self {
            ApplyMode::Strict => "ON_ERROR_STOP=1",
            ApplyMode::Relaxed => "ON_ERROR_STOP=off",
        }
    }
}

/// Client for one database server.
#[derive(Clone)]
pub struct DbClient {
    runner: Arc<dyn CommandRunner>,
    database: DatabaseConfig,
    commands: CommandConfig,
}

impl DbClient {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        database: DatabaseConfig,
        commands: CommandConfig,
    ) -> Self {
        Self {
            runner,
            database,
            commands,
        }
    }

    pub fn database(&self) -> &DatabaseConfig {
        &self.database
    }

    /// Full dump of `database` into `output`. Rows of the tables listed in
    /// `exclude_table_data` are left out; their definitions are kept.
    pub async fn dump_database(
        &self,
        database: &str,
        output: &Path,
        exclude_table_data: &[String],
    ) -> ClientResult<()> {
        validate_identifier(database)?;
        let mut spec = CommandSpec::new(&self.commands.pg_dump)
            .arg("-d")
            .arg(self.database.url_for(database))
            .arg("-f")
            .arg(output.display().to_string());
        for table in exclude_table_data {
            validate_table_name(table)?;
            spec = spec.arg(format!("--exclude-table-data={}", table));
        }

        self.run_checked("dump database", &spec, self.commands.dump_timeout())
            .await?;
        Ok(())
    }

    /// Dump a single table (definition and rows) into `output`.
    pub async fn dump_table(&self, database: &str, table: &str, output: &Path) -> ClientResult<()> {
        validate_identifier(database)?;
        validate_table_name(table)?;
        let spec = CommandSpec::new(&self.commands.pg_dump)
            .arg("-d")
            .arg(self.database.url_for(database))
            .arg("-t")
            .arg(table)
            .arg("-f")
            .arg(output.display().to_string());

        self.run_checked("dump table", &spec, self.commands.dump_timeout())
            .await?;
        Ok(())
    }

    /// Run a SQL script file against `database`.
    pub async fn apply_script(
        &self,
        database: &str,
        script: &Path,
        mode: ApplyMode,
    ) -> ClientResult<CommandOutput> {
        validate_identifier(database)?;
        let spec = CommandSpec::new(&self.commands.psql)
            .arg(self.database.url_for(database))
            .args(["-X", "-q", "-v", mode.on_error_stop(), "-f"])
            .arg(script.display().to_string());

        self.run_checked("apply script", &spec, self.commands.dump_timeout())
            .await
    }

    /// Run one SQL statement against `database`, returning unaligned,
    /// tuples-only output.
    pub async fn execute(&self, database: &str, sql: &str) -> ClientResult<String> {
        validate_identifier(database)?;
        let spec = CommandSpec::new(&self.commands.psql)
            .arg(self.database.url_for(database))
            .args(["-X", "-q", "-v", "ON_ERROR_STOP=1", "-t", "-A", "-c", sql]);

        let output = self
            .run_checked("execute", &spec, self.commands.admin_timeout())
            .await?;
        Ok(output.stdout)
    }

    /// Check that `database` accepts connections.
    pub async fn ping(&self, database: &str) -> ClientResult<()> {
        self.execute(database, "SELECT 1;").await.map(|_| ())
    }

    pub async fn database_exists(&self, admin_db: &str, name: &str) -> ClientResult<bool> {
        validate_identifier(name)?;
        let sql = format!(
            "SELECT 1 FROM pg_database WHERE datname = {};",
            quote_literal(name)
        );
        let stdout = self.execute(admin_db, &sql).await?;
        Ok(stdout.lines().any(|line| line.trim() == "1"))
    }

    pub async fn create_database(&self, admin_db: &str, name: &str) -> ClientResult<()> {
        validate_identifier(name)?;
        let sql = format!("CREATE DATABASE {};", quote_ident(name));
        self.execute(admin_db, &sql).await.map(|_| ())
    }

    /// Drop `name`; a missing database is not an error.
    pub async fn drop_database(&self, admin_db: &str, name: &str) -> ClientResult<()> {
        validate_identifier(name)?;
        let sql = format!("DROP DATABASE IF EXISTS {};", quote_ident(name));
        self.execute(admin_db, &sql).await.map(|_| ())
    }

    pub async fn rename_database(&self, admin_db: &str, from: &str, to: &str) -> ClientResult<()> {
        validate_identifier(from)?;
        validate_identifier(to)?;
        let sql = format!(
            "ALTER DATABASE {} RENAME TO {};",
            quote_ident(from),
            quote_ident(to)
        );
        self.execute(admin_db, &sql).await.map(|_| ())
    }

    /// Terminate every other session connected to `name`. Returns how many
    /// sessions were signalled.
    pub async fn terminate_connections(&self, admin_db: &str, name: &str) -> ClientResult<usize> {
        validate_identifier(name)?;
        let sql = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity \
             WHERE datname = {} AND pid <> pg_backend_pid();",
            quote_literal(name)
        );
        let stdout = self.execute(admin_db, &sql).await?;
        Ok(stdout.lines().filter(|line| line.trim() == "t").count())
    }

    /// Drop a table (and dependents) if it exists.
    pub async fn drop_table(&self, database: &str, table: &str) -> ClientResult<()> {
        validate_table_name(table)?;
        let sql = format!("DROP TABLE IF EXISTS {} CASCADE;", quote_table_name(table));
        self.execute(database, &sql).await.map(|_| ())
    }

    async fn run_checked(
        &self,
        operation: &'static str,
        spec: &CommandSpec,
        timeout: Duration,
    ) -> ClientResult<CommandOutput> {
        tracing::debug!(operation, command = %spec.redacted(), "running database command");

        let output = self
            .runner
            .run(spec, timeout)
            .await
            .map_err(|source| ClientError::Command { operation, source })?;

        if output.success() {
            Ok(output)
        } else {
            Err(ClientError::Failed {
                operation,
                message: crate::command::redact_credentials(&output.failure_message()),
            })
        }
    }
}
