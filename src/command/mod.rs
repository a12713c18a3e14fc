//! External command execution
//!
//! Every interaction with the database engine goes through a
//! [`CommandRunner`]: the client tools (`pg_dump`, `psql`) are run as
//! external processes and their output is returned as plain data. The
//! orchestrators never spawn processes directly, so they can be driven by a
//! fake runner in tests.
//!
//! A runner reports a command that could not be run (spawn failure, timeout)
//! as a [`CommandError`]. A command that ran and exited non-zero is a normal
//! [`CommandOutput`]; deciding whether that is a failure belongs to the
//! caller.

mod errors;
mod process;

pub use errors::{CommandError, CommandResult};
pub use process::ProcessRunner;

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

/// A program invocation: executable plus arguments, no shell involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// The command line with connection passwords masked, for logging.
    pub fn redacted(&self) -> String {
        redact_credentials(&self.to_string())
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Successful output with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    /// Failed output with the given exit code and stderr
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code: Some(exit_code),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Best description of why the command failed.
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.exit_code {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Capability to run an external command with a bounded timeout.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> CommandResult<CommandOutput>;
}

/// Mask the password part of any `scheme://user:password@` in `text`.
pub fn redact_credentials(text: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"(?P<prefix>[A-Za-z][A-Za-z0-9+.\-]*://[^:/@\s]+):[^@/\s]+@")
            .expect("credential pattern is valid")
    });
    pattern.replace_all(text, "$prefix:***@").into_owned()
}

/// An artifact reference fit for logs and notes: no query string or
/// fragment (pre-signed URLs carry their token there) and no password.
pub fn redact_reference(reference: &str) -> String {
    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    redact_credentials(&reference[..end])
}
