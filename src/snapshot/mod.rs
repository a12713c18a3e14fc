//! Snapshot codec
//!
//! A snapshot is a gzip-compressed tar archive holding one SQL dump
//! (`db_backup.sql`). Packing records both sizes for the ledger; unpacking
//! accepts any layout as long as exactly one `.sql` file is inside.
//!
//! The codec knows nothing about restore safety. It only turns a dump into
//! an archive and back.

mod codec;
mod errors;

pub use codec::{find_single_payload, pack, unpack, PackStats};
pub use errors::{SnapshotError, SnapshotResult};

use chrono::{DateTime, Utc};

/// Extension identifying the dump payload inside an archive
pub const DUMP_EXTENSION: &str = "sql";

/// File name the database dump is written to before packing
pub const DUMP_FILE_NAME: &str = "db_backup.sql";

/// MIME type handed to the artifact store
pub const ARCHIVE_MIME_TYPE: &str = "application/gzip";

/// Archive name for a snapshot taken at `at`,
/// e.g. `db_backup_2025_03_01T01_00_00_000Z.tar.gz`.
pub fn archive_file_name(at: DateTime<Utc>) -> String {
    format!("db_backup_{}.tar.gz", at.format("%Y_%m_%dT%H_%M_%S_%3fZ"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_archive_file_name() {
        let at = Utc.with_ymd_and_hms(2025, 3, 1, 1, 0, 0).unwrap();
        assert_eq!(archive_file_name(at), "db_backup_2025_03_01T01_00_00_000Z.tar.gz");
    }
}
