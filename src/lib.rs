//! dbvault - safe backup and restore for a live PostgreSQL database
//!
//! Backups dump the live database, compress the dump into a single archive,
//! hand it to an artifact store and record the attempt in a ledger.
//!
//! Restores never drop the live database. The incoming snapshot is applied
//! to a scratch database first, then swapped in by renaming; the previous
//! database is kept under a timestamped name and a full safety dump backs
//! every destructive step.

pub mod artifact;
pub mod backup;
pub mod cli;
pub mod client;
pub mod command;
pub mod config;
pub mod guard;
pub mod http_server;
pub mod ledger;
pub mod observability;
pub mod restore;
pub mod scheduler;
pub mod snapshot;
pub mod vault;
pub mod workspace;

pub use vault::Vault;
