//! In-process fake PostgreSQL cluster
//!
//! Implements `CommandRunner` by interpreting the `pg_dump` and `psql`
//! invocations the client issues. A database is a map of table name to a
//! single content string; a dump is one `TABLE <name>\t<content>` line per
//! table, which `psql -f` applies back.
//!
//! Script lines the fake understands:
//! - `TABLE <name>\t<content>`: create or replace a table
//! - `SET <param> = <value>;`: accepted unless the parameter starts with
//!   `unsupported`, which fails like an unknown configuration parameter
//! - `CORRUPT`: a syntax error
//!
//! Like the real server, it refuses to drop or rename the database the
//! statement is connected to, and refuses connections to missing databases.
//!
//! The ledger table statements `TableLedger` issues are interpreted too; the
//! table's content is then a JSON array of records.

use std::collections::BTreeMap;
use std::fs;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use dbvault::command::{CommandOutput, CommandResult, CommandRunner, CommandSpec};

pub type Tables = BTreeMap<String, String>;

type Predicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

struct Failure {
    matches: Predicate,
    message: String,
    /// `None` fails every matching command
    remaining: Option<usize>,
}

#[derive(Default)]
struct State {
    databases: BTreeMap<String, Tables>,
}

#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
    failures: Mutex<Vec<Failure>>,
    log: Mutex<Vec<String>>,
    delay: Mutex<Duration>,
    preamble: Mutex<String>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl FakeCluster {
    /// A cluster with the administrative `postgres` database only
    pub fn new() -> Arc<Self> {
        let cluster = Self::default();
        lock(&cluster.state)
            .databases
            .insert("postgres".to_string(), Tables::new());
        Arc::new(cluster)
    }

    pub fn with_database(self: Arc<Self>, name: &str, tables: &[(&str, &str)]) -> Arc<Self> {
        self.put_database(name, tables);
        self
    }

    pub fn put_database(&self, name: &str, tables: &[(&str, &str)]) {
        let tables = tables
            .iter()
            .map(|(t, c)| (t.to_string(), c.to_string()))
            .collect();
        lock(&self.state).databases.insert(name.to_string(), tables);
    }

    pub fn database(&self, name: &str) -> Option<Tables> {
        lock(&self.state).databases.get(name).cloned()
    }

    pub fn table(&self, database: &str, table: &str) -> Option<String> {
        lock(&self.state)
            .databases
            .get(database)
            .and_then(|tables| tables.get(table).cloned())
    }

    pub fn set_table(&self, database: &str, table: &str, content: &str) {
        if let Some(tables) = lock(&self.state).databases.get_mut(database) {
            tables.insert(table.to_string(), content.to_string());
        }
    }

    pub fn database_names(&self) -> Vec<String> {
        lock(&self.state).databases.keys().cloned().collect()
    }

    /// Databases whose name starts with `prefix`
    pub fn databases_starting_with(&self, prefix: &str) -> Vec<String> {
        self.database_names()
            .into_iter()
            .filter(|name| name.starts_with(prefix))
            .collect()
    }

    /// Fail every command whose command line satisfies `matches`
    pub fn fail_when<F>(&self, matches: F, message: &str)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.push_failure(Box::new(matches), message, None);
    }

    /// Fail only the first command whose command line satisfies `matches`
    pub fn fail_once_when<F>(&self, matches: F, message: &str)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.push_failure(Box::new(matches), message, Some(1));
    }

    /// Delay every command, to make concurrent operations overlap
    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.delay) = delay;
    }

    /// Lines written at the top of every dump, like the `SET` statements a
    /// newer `pg_dump` emits
    pub fn set_dump_preamble(&self, preamble: &str) {
        *lock(&self.preamble) = preamble.to_string();
    }

    /// Every command line run so far, in order
    pub fn commands(&self) -> Vec<String> {
        lock(&self.log).clone()
    }

    pub fn commands_containing(&self, needle: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|line| line.contains(needle))
            .collect()
    }

    fn push_failure(&self, matches: Predicate, message: &str, remaining: Option<usize>) {
        lock(&self.failures).push(Failure {
            matches,
            message: message.to_string(),
            remaining,
        });
    }

    fn injected_failure(&self, line: &str) -> Option<String> {
        let mut failures = lock(&self.failures);
        for failure in failures.iter_mut() {
            if !(failure.matches)(line) {
                continue;
            }
            match failure.remaining {
                Some(0) => continue,
                Some(ref mut n) => *n -= 1,
                None => {}
            }
            return Some(failure.message.clone());
        }
        None
    }

    fn execute(&self, spec: &CommandSpec) -> CommandOutput {
        let preamble = lock(&self.preamble).clone();
        let mut state = lock(&self.state);
        match spec.program.as_str() {
            "pg_dump" => pg_dump(&state, &spec.args, &preamble),
            "psql" => psql(&mut state, &spec.args),
            other => CommandOutput::failed(127, format!("{}: command not found", other)),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeCluster {
    async fn run(&self, spec: &CommandSpec, _timeout: Duration) -> CommandResult<CommandOutput> {
        let line = spec.to_string();
        lock(&self.log).push(line.clone());

        let delay = *lock(&self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.injected_failure(&line) {
            return Ok(CommandOutput::failed(1, message));
        }
        Ok(self.execute(spec))
    }
}

// =============================================================================
// pg_dump
// =============================================================================

fn pg_dump(state: &State, args: &[String], preamble: &str) -> CommandOutput {
    let mut url = None;
    let mut table = None;
    let mut output = None;
    let mut excluded = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-d" => url = iter.next(),
            "-t" => table = iter.next(),
            "-f" => output = iter.next(),
            other => {
                if let Some(t) = other.strip_prefix("--exclude-table-data=") {
                    excluded.push(t.to_string());
                }
            }
        }
    }

    let (Some(url), Some(output)) = (url, output) else {
        return CommandOutput::failed(1, "pg_dump: missing -d or -f");
    };
    let name = database_from_url(url);
    let Some(tables) = state.databases.get(&name) else {
        return missing_database(&name);
    };

    let mut dump = format!("-- fake dump of {}\n{}", name, preamble);
    match table {
        Some(table) => match tables.get(table.as_str()) {
            Some(content) => dump.push_str(&format!("TABLE {}\t{}\n", table, content)),
            None => {
                return CommandOutput::failed(
                    1,
                    "pg_dump: error: no matching tables were found",
                )
            }
        },
        None => {
            for (table, content) in tables {
                let content = if excluded.contains(table) { "" } else { content.as_str() };
                dump.push_str(&format!("TABLE {}\t{}\n", table, content));
            }
        }
    }

    match fs::write(output, dump) {
        Ok(()) => CommandOutput::ok(""),
        Err(e) => CommandOutput::failed(1, format!("pg_dump: could not open output file: {}", e)),
    }
}

// =============================================================================
// psql
// =============================================================================

fn psql(state: &mut State, args: &[String]) -> CommandOutput {
    let Some(url) = args.first() else {
        return CommandOutput::failed(2, "psql: missing connection string");
    };
    let connected = database_from_url(url);
    if !state.databases.contains_key(&connected) {
        return missing_database(&connected);
    }

    let stop_on_error = args.iter().any(|a| a == "ON_ERROR_STOP=1");
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-f" => {
                return match iter.next() {
                    Some(path) => apply_file(state, &connected, path, stop_on_error),
                    None => CommandOutput::failed(2, "psql: -f needs a file"),
                }
            }
            "-c" => {
                return match iter.next() {
                    Some(sql) => statement(state, &connected, sql),
                    None => CommandOutput::failed(2, "psql: -c needs a statement"),
                }
            }
            _ => {}
        }
    }
    CommandOutput::failed(2, "psql: nothing to run")
}

fn apply_file(state: &mut State, database: &str, path: &str, stop_on_error: bool) -> CommandOutput {
    let script = match fs::read_to_string(path) {
        Ok(script) => script,
        Err(e) => return CommandOutput::failed(1, format!("psql: error: {}: {}", path, e)),
    };

    let mut errors = Vec::new();
    for line in script.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("--") {
            continue;
        }

        let result = if let Some(rest) = line.strip_prefix("TABLE ") {
            match rest.split_once('\t') {
                Some((table, content)) => {
                    if let Some(tables) = state.databases.get_mut(database) {
                        tables.insert(table.to_string(), content.to_string());
                    }
                    Ok(())
                }
                None => Err("ERROR:  malformed table line".to_string()),
            }
        } else if let Some(rest) = trimmed.strip_prefix("SET ") {
            let param = rest.split(|c: char| c == ' ' || c == '=').next().unwrap_or("");
            if param.starts_with("unsupported") {
                Err(format!(
                    "ERROR:  unrecognized configuration parameter \"{}\"",
                    param
                ))
            } else {
                Ok(())
            }
        } else {
            let token = trimmed.split_whitespace().next().unwrap_or("");
            Err(format!("ERROR:  syntax error at or near \"{}\"", token))
        };

        if let Err(message) = result {
            if stop_on_error {
                return CommandOutput::failed(3, format!("psql:{}: {}", path, message));
            }
            errors.push(message);
        }
    }

    CommandOutput {
        stdout: String::new(),
        stderr: errors.join("\n"),
        exit_code: Some(0),
    }
}

fn statement(state: &mut State, connected: &str, sql: &str) -> CommandOutput {
    let sql = sql.trim();

    if sql == "SELECT 1;" {
        return CommandOutput::ok("1\n");
    }

    if let Some(rest) = sql.strip_prefix("SELECT 1 FROM pg_database WHERE datname = ") {
        let name = unquote_literal(rest.trim_end_matches(';'));
        let exists = state.databases.contains_key(&name);
        return CommandOutput::ok(if exists { "1\n" } else { "" });
    }

    if sql.starts_with("SELECT pg_terminate_backend(pid)") {
        return CommandOutput::ok("");
    }

    if let Some(rest) = sql.strip_prefix("CREATE DATABASE ") {
        let name = unquote_ident(rest.trim_end_matches(';'));
        if state.databases.contains_key(&name) {
            return CommandOutput::failed(
                1,
                format!("ERROR:  database \"{}\" already exists", name),
            );
        }
        state.databases.insert(name, Tables::new());
        return CommandOutput::ok("");
    }

    if let Some(rest) = sql.strip_prefix("DROP DATABASE IF EXISTS ") {
        let name = unquote_ident(rest.trim_end_matches(';'));
        if name == connected {
            return CommandOutput::failed(1, "ERROR:  cannot drop the currently open database");
        }
        state.databases.remove(&name);
        return CommandOutput::ok("");
    }

    if let Some(rest) = sql.strip_prefix("ALTER DATABASE ") {
        let Some((from, to)) = rest.trim_end_matches(';').split_once(" RENAME TO ") else {
            return CommandOutput::failed(1, "ERROR:  syntax error");
        };
        let (from, to) = (unquote_ident(from), unquote_ident(to));
        if from == connected {
            return CommandOutput::failed(
                1,
                "ERROR:  current database cannot be renamed",
            );
        }
        if state.databases.contains_key(&to) {
            return CommandOutput::failed(1, format!("ERROR:  database \"{}\" already exists", to));
        }
        return match state.databases.remove(&from) {
            Some(tables) => {
                state.databases.insert(to, tables);
                CommandOutput::ok("")
            }
            None => CommandOutput::failed(1, format!("ERROR:  database \"{}\" does not exist", from)),
        };
    }

    if let Some(rest) = sql.strip_prefix("DROP TABLE IF EXISTS ") {
        let table = rest
            .trim_end_matches(';')
            .trim_end_matches(" CASCADE")
            .split('.')
            .map(unquote_ident)
            .collect::<Vec<_>>()
            .join(".");
        if let Some(tables) = state.databases.get_mut(connected) {
            tables.remove(&table);
        }
        return CommandOutput::ok("");
    }

    if let Some(output) = ledger_statement(state, connected, sql) {
        return output;
    }

    CommandOutput::failed(1, format!("ERROR:  fake cluster cannot run: {}", sql))
}

// =============================================================================
// Ledger table
// =============================================================================

fn ledger_statement(state: &mut State, connected: &str, sql: &str) -> Option<CommandOutput> {
    let tables = state.databases.get_mut(connected)?;

    if let Some(rest) = sql.strip_prefix("CREATE TABLE IF NOT EXISTS ") {
        let table = table_name(rest.split(" (").next().unwrap_or(rest));
        tables.entry(table).or_default();
        return Some(CommandOutput::ok(""));
    }

    let (table, verb) = if let Some(rest) = sql.strip_prefix("INSERT INTO ") {
        (rest.split(" (").next()?, "insert")
    } else if let Some(rest) = sql.strip_prefix("UPDATE ") {
        (rest.split(" SET ").next()?, "update")
    } else if let Some(rest) = sql.strip_prefix("DELETE FROM ") {
        (rest.split(" WHERE ").next()?, "delete")
    } else if sql.starts_with("SELECT COALESCE(json_agg(") {
        (sql.rsplit(" FROM ").next()?.trim_end_matches(';'), "select")
    } else {
        return None;
    };
    let table = table_name(table);

    let Some(content) = tables.get(&table) else {
        return Some(CommandOutput::failed(
            1,
            format!("ERROR:  relation \"{}\" does not exist", table),
        ));
    };
    let mut rows: Vec<Value> = if content.is_empty() {
        Vec::new()
    } else {
        match serde_json::from_str(content) {
            Ok(rows) => rows,
            Err(e) => return Some(CommandOutput::failed(1, format!("ERROR:  bad ledger rows: {}", e))),
        }
    };

    let mut stdout = String::new();
    match verb {
        "select" => {
            rows.sort_by(|a, b| a["createdAt"].as_str().cmp(&b["createdAt"].as_str()));
            return Some(CommandOutput::ok(format!("{}\n", Value::Array(rows))));
        }
        "insert" => {
            let row = json_argument(sql)?;
            if rows.iter().any(|r| r["id"] == row["id"]) {
                return Some(CommandOutput::failed(
                    1,
                    "ERROR:  duplicate key value violates unique constraint",
                ));
            }
            rows.push(row);
        }
        "update" => {
            let row = json_argument(sql)?;
            let expected = sql
                .rsplit(" AND status = ")
                .next()?
                .trim_end_matches(" RETURNING id;");
            let expected = unquote_literal(expected);
            if let Some(existing) = rows
                .iter_mut()
                .find(|r| r["id"] == row["id"] && r["status"].as_str() == Some(expected.as_str()))
            {
                for field in ["status", "artifact", "updatedAt", "metadata"] {
                    existing[field] = row.get(field).cloned().unwrap_or(Value::Null);
                }
                stdout = format!("{}\n", row["id"].as_str().unwrap_or_default());
            }
        }
        _ => {
            let id = sql
                .split(" WHERE id = ")
                .nth(1)?
                .trim_end_matches(" RETURNING id;");
            let id = unquote_literal(id);
            let before = rows.len();
            rows.retain(|r| r["id"].as_str() != Some(id.as_str()));
            if rows.len() != before {
                stdout = format!("{}\n", id);
            }
        }
    }

    tables.insert(table, Value::Array(rows).to_string());
    Some(CommandOutput::ok(stdout))
}

/// The record passed as `(SELECT '<json>'::jsonb AS r)`
fn json_argument(sql: &str) -> Option<Value> {
    let start = sql.find("(SELECT '")? + "(SELECT ".len();
    let end = sql.rfind("::jsonb AS r)")?;
    serde_json::from_str(&unquote_literal(&sql[start..end])).ok()
}

fn table_name(raw: &str) -> String {
    raw.trim()
        .split('.')
        .map(unquote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

// =============================================================================
// Helpers
// =============================================================================

fn database_from_url(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    without_query
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn missing_database(name: &str) -> CommandOutput {
    CommandOutput::failed(
        2,
        format!(
            "psql: error: connection to server failed: FATAL:  database \"{}\" does not exist",
            name
        ),
    )
}

fn unquote_ident(raw: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .map(|s| s.replace("\"\"", "\""))
        .unwrap_or_else(|| raw.to_string())
}

fn unquote_literal(raw: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .map(|s| s.replace("''", "'"))
        .unwrap_or_else(|| raw.to_string())
}
