//! Ledger kept in a table of the live database
//!
//! Rows live in `database.ledger_table` (default `db_backups`):
//!
//! ```text
//! id text PRIMARY KEY | status text | artifact jsonb | created_at timestamptz
//! updated_at timestamptz | metadata jsonb
//! ```
//!
//! Because the rows sit in the database being backed up, backups leave
//! their data out and a restore carries the current rows over into the
//! restored database.
//!
//! Every statement runs through [`DbClient::execute`]. A record travels as
//! one JSON literal that the statement unpacks server-side, so no value is
//! spliced into SQL except through quoted literals.

use async_trait::async_trait;
use serde::Serialize;

use super::errors::{LedgerError, LedgerResult};
use super::memory::RecordTable;
use super::{BackupRecord, BackupStatus, Ledger, RecordFilter, RecordMetadata, RecordUpdate, SortOrder};
use crate::client::{escape_literal, quote_table_name, validate_table_name, ClientError, DbClient};

/// Backup records in a table of the live database
#[derive(Clone)]
pub struct TableLedger {
    client: DbClient,
    table: String,
}

impl TableLedger {
    /// Ledger in `table` of the client's live database
    pub fn new(client: DbClient, table: impl Into<String>) -> LedgerResult<Self> {
        let table = table.into();
        validate_table_name(&table).map_err(storage)?;
        Ok(Self { client, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn execute(&self, sql: &str) -> LedgerResult<String> {
        let database = self.client.database().name.clone();
        self.client.execute(&database, sql).await.map_err(storage)
    }

    async fn ensure_table(&self) -> LedgerResult<()> {
        self.execute(&create_table_sql(&self.table)).await.map(|_| ())
    }

    async fn load(&self) -> LedgerResult<RecordTable> {
        self.ensure_table().await?;
        let stdout = self.execute(&select_sql(&self.table)).await?;
        let stdout = stdout.trim();
        let records: Vec<BackupRecord> = if stdout.is_empty() {
            Vec::new()
        } else {
            serde_json::from_str(stdout)?
        };
        Ok(RecordTable::from_records(records))
    }
}

#[async_trait]
impl Ledger for TableLedger {
    async fn create(&self, metadata: RecordMetadata) -> LedgerResult<BackupRecord> {
        let record = BackupRecord::pending(metadata);
        self.ensure_table().await?;
        self.execute(&insert_sql(&self.table, &record)?).await?;
        Ok(record)
    }

    async fn list(&self, filter: &RecordFilter, order: SortOrder) -> LedgerResult<Vec<BackupRecord>> {
        Ok(self.load().await?.list(filter, order))
    }

    async fn get(&self, id: &str) -> LedgerResult<BackupRecord> {
        self.load().await?.get(id).cloned()
    }

    /// The row is only rewritten while it still has the status the update
    /// was checked against.
    async fn update_by_id(&self, id: &str, update: RecordUpdate) -> LedgerResult<BackupRecord> {
        let current = self.get(id).await?;
        let mut record = current.clone();
        record.apply(update)?;

        let stdout = self
            .execute(&update_sql(&self.table, &record, current.status)?)
            .await?;
        if stdout.trim().is_empty() {
            // Gone or moved on since it was read
            self.get(id).await?;
            return Err(LedgerError::Storage(format!(
                "record {} changed while being updated",
                id
            )));
        }
        Ok(record)
    }

    async fn delete_by_id(&self, id: &str) -> LedgerResult<()> {
        self.ensure_table().await?;
        let stdout = self.execute(&delete_sql(&self.table, id)).await?;
        if stdout.trim().is_empty() {
            return Err(LedgerError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn storage(e: ClientError) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

fn json_literal<T: Serialize>(value: &T) -> LedgerResult<String> {
    Ok(format!("{}::jsonb", escape_literal(&serde_json::to_string(value)?)))
}

pub(crate) fn create_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (id text PRIMARY KEY, status text NOT NULL, \
         artifact jsonb, created_at timestamptz NOT NULL, updated_at timestamptz NOT NULL, \
         metadata jsonb NOT NULL DEFAULT '{{}}'::jsonb);",
        quote_table_name(table)
    )
}

/// All rows as one JSON array of records
pub(crate) fn select_sql(table: &str) -> String {
    format!(
        "SELECT COALESCE(json_agg(json_build_object('id', id, 'status', status, \
         'artifact', artifact, 'createdAt', created_at, 'updatedAt', updated_at, \
         'metadata', metadata) ORDER BY created_at), '[]'::json) FROM {};",
        quote_table_name(table)
    )
}

pub(crate) fn insert_sql(table: &str, record: &BackupRecord) -> LedgerResult<String> {
    Ok(format!(
        "INSERT INTO {} (id, status, artifact, created_at, updated_at, metadata) \
         SELECT r->>'id', r->>'status', r->'artifact', (r->>'createdAt')::timestamptz, \
         (r->>'updatedAt')::timestamptz, COALESCE(r->'metadata', '{{}}'::jsonb) \
         FROM (SELECT {} AS r) AS src;",
        quote_table_name(table),
        json_literal(record)?
    ))
}

pub(crate) fn update_sql(
    table: &str,
    record: &BackupRecord,
    expected: BackupStatus,
) -> LedgerResult<String> {
    Ok(format!(
        "UPDATE {} SET status = r->>'status', artifact = r->'artifact', \
         updated_at = (r->>'updatedAt')::timestamptz, metadata = COALESCE(r->'metadata', '{{}}'::jsonb) \
         FROM (SELECT {} AS r) AS src WHERE id = r->>'id' AND status = {} RETURNING id;",
        quote_table_name(table),
        json_literal(record)?,
        escape_literal(expected.as_str())
    ))
}

pub(crate) fn delete_sql(table: &str, id: &str) -> String {
    format!(
        "DELETE FROM {} WHERE id = {} RETURNING id;",
        quote_table_name(table),
        escape_literal(id)
    )
}
