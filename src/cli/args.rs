//! CLI argument definitions using clap
//!
//! Commands:
//! - dbvault backup [--note <text>]
//! - dbvault restore <reference> [--safety-backup <bool>]
//! - dbvault list
//! - dbvault delete <id>
//! - dbvault set-metadata <id> <json>
//! - dbvault auto-status
//! - dbvault schedule [--next <n>] [--trigger]
//! - dbvault serve [--port <port>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dbvault - safe backup and restore for a live PostgreSQL database
#[derive(Parser, Debug)]
#[command(name = "dbvault")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Take a manual backup of the live database
    Backup {
        /// Free-text note stored with the record
        #[arg(long)]
        note: Option<String>,
    },

    /// Replace the live database with a stored snapshot
    Restore {
        /// Artifact URL or store key
        reference: String,

        /// Take a pre-restore backup first (defaults to on in production)
        #[arg(long)]
        safety_backup: Option<bool>,
    },

    /// List backup records, newest first
    List,

    /// Delete a backup record
    Delete {
        id: String,
    },

    /// Replace a record's free-form metadata
    SetMetadata {
        id: String,

        /// Metadata as a JSON object
        metadata: String,
    },

    /// Show whether automatic backups are enabled
    AutoStatus,

    /// Show the automatic backup schedule
    Schedule {
        /// Number of upcoming runs to print
        #[arg(long, default_value_t = 3)]
        next: usize,

        /// Run the automatic backup job once, now
        #[arg(long)]
        trigger: bool,
    },

    /// Serve the HTTP API and run the backup schedule
    Serve {
        /// Port to listen on (overrides the config)
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
