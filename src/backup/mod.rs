//! Backup orchestration
//!
//! A backup dumps the live database, packs the dump into a single
//! `tar.gz` archive, stores the archive and records the attempt in the
//! ledger.
//!
//! # Lifecycle
//!
//! ```text
//! begin    guard check, create `pending` record
//! capture  pg_dump into the workspace (high-churn table data excluded)
//! package  compress into db_backup_<ts>.tar.gz, record both sizes
//! publish  ArtifactStore::put
//! finish   pending -> success (artifact + sizes) | pending -> error
//! ```
//!
//! A failure after `begin` still runs `finish(error)`. A `pending` record
//! left behind would block every later backup, so if even that update
//! fails the caller gets [`BackupError::Stranded`] instead of the
//! original error.
//!
//! The local dump and archive never outlive the call.

mod errors;
mod orchestrator;

pub use errors::{BackupError, BackupResult};
pub use orchestrator::{BackupOrchestrator, BackupReceipt, BackupRequest, PackedArchive, PendingBackup};
