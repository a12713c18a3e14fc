//! Command-line interface
//!
//! Every command resolves the configuration once, builds a [`crate::Vault`]
//! and runs one operation on a tokio runtime. `serve` keeps running until
//! interrupted.

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{run, run_command};
pub use errors::{CliError, CliResult};
pub use io::{write_error, write_response};
