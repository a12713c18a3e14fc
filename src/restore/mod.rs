//! Restore orchestration
//!
//! Replaces the live database's contents with a snapshot while keeping the
//! original data recoverable at every step. Dropping or renaming a whole
//! database is not transactional, so safety comes from ordering:
//!
//! ```text
//!  1. safety backup (optional, through the backup orchestrator)
//!  2. fetch + unpack the archive, exactly one .sql payload
//!  3. pick the maintenance database (dedicated, else fallback)
//!  4. full safety dump of the live database        <- rollback armed
//!  5. create <db>_temp_<millis>
//!  6. apply the snapshot to the scratch database   (fails: corrupt snapshot)
//!  7. dump the ledger table (placeholder on failure)
//!  8. terminate connections, settle,
//!     rename <db> -> <db>_backup_<millis>,          (fails: full rollback)
//!     rename scratch -> <db>                        (fails: rename back)
//!  9. replace the ledger table in the new database (best-effort)
//! 10. remove temp files
//! ```
//!
//! Failures up to step 7 leave the live database untouched. The preserved
//! `<db>_backup_<millis>` database is never dropped here; removing it is a
//! separate operator decision.
//!
//! The safety dump is deleted with the rest of the temp files, except when
//! a rollback from it fails: then it is left on disk and its path is part
//! of the error.

mod errors;
mod orchestrator;
mod outcome;
mod rollback;

pub use errors::{RestoreError, RestoreResult, SwapStep};
pub use orchestrator::{RestoreAttempt, RestoreOrchestrator, RestoreRequest, RestoreTiming};
pub use outcome::{RestoreOutcome, RestoreReport, RollbackMethod};
