//! JSON output for CLI commands
//!
//! Results go to stdout as one JSON object per line; logs go to stderr.

use std::io::{self, Write};

use serde::Serialize;

use super::errors::{CliError, CliResult};

/// Write `{"status":"ok","data":...}` to stdout
pub fn write_response<T: Serialize>(data: &T) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data,
    });
    write_line(&response)
}

/// Write `{"status":"error","code":...,"message":...}` to stdout
pub fn write_error(err: &CliError) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": err.code(),
        "message": err.to_string(),
    });
    write_line(&response)
}

fn write_line(value: &serde_json::Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
