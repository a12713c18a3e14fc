//! Runner backed by real child processes

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::errors::{CommandError, CommandResult};
use super::{CommandOutput, CommandRunner, CommandSpec};

/// Runs commands as child processes with a hard timeout.
///
/// The child is killed when the timeout expires; stdin is closed so a tool
/// waiting for a password prompt fails instead of hanging.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: &CommandSpec, timeout: Duration) -> CommandResult<CommandOutput> {
        let child = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| CommandError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code(),
            }),
            Ok(Err(source)) => Err(CommandError::Io {
                program: spec.program.clone(),
                source,
            }),
            Err(_) => Err(CommandError::TimedOut {
                program: spec.program.clone(),
                timeout,
            }),
        }
    }
}
