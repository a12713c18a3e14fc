//! tar.gz packing and unpacking

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Archive, Builder};

use super::errors::{SnapshotError, SnapshotResult};
use super::DUMP_EXTENSION;

/// Sizes recorded in the ledger for a packed snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackStats {
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

/// Compress `dump` into a gzip tar archive at `archive_path`.
///
/// The archive holds exactly one entry, named after the dump file.
pub fn pack(dump: &Path, archive_path: &Path) -> SnapshotResult<PackStats> {
    let uncompressed_size = match fs::metadata(dump) {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => return Err(SnapshotError::MissingDump(dump.to_path_buf())),
    };
    let entry_name = dump
        .file_name()
        .ok_or_else(|| SnapshotError::MissingDump(dump.to_path_buf()))?;

    let file = File::create(archive_path).map_err(|e| {
        SnapshotError::io(
            format!("failed to create archive {}", archive_path.display()),
            e,
        )
    })?;

    let encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    let mut builder = Builder::new(encoder);
    builder
        .append_path_with_name(dump, entry_name)
        .map_err(|e| SnapshotError::io(format!("failed to add {} to archive", dump.display()), e))?;

    let encoder = builder
        .into_inner()
        .map_err(|e| SnapshotError::io("failed to finish archive", e))?;
    let mut writer = encoder
        .finish()
        .map_err(|e| SnapshotError::io("failed to finish compression", e))?;
    writer
        .flush()
        .map_err(|e| SnapshotError::io("failed to flush archive", e))?;
    let file = writer
        .into_inner()
        .map_err(|e| SnapshotError::io("failed to flush archive", e.into_error()))?;
    file.sync_all().map_err(|e| {
        SnapshotError::io(format!("failed to fsync {}", archive_path.display()), e)
    })?;

    let compressed_size = fs::metadata(archive_path)
        .map_err(|e| SnapshotError::io(format!("failed to stat {}", archive_path.display()), e))?
        .len();

    Ok(PackStats {
        compressed_size,
        uncompressed_size,
    })
}

/// Unpack `archive_path` into `dest_dir` and return the single `.sql`
/// payload found anywhere inside it.
pub fn unpack(archive_path: &Path, dest_dir: &Path) -> SnapshotResult<PathBuf> {
    let file = File::open(archive_path).map_err(|e| {
        SnapshotError::io(format!("failed to open archive {}", archive_path.display()), e)
    })?;

    fs::create_dir_all(dest_dir).map_err(|e| {
        SnapshotError::io(format!("failed to create {}", dest_dir.display()), e)
    })?;

    let mut archive = Archive::new(GzDecoder::new(BufReader::new(file)));
    archive.unpack(dest_dir).map_err(SnapshotError::Unreadable)?;

    find_single_payload(dest_dir)
}

/// Locate exactly one `.sql` file under `dir`.
pub fn find_single_payload(dir: &Path) -> SnapshotResult<PathBuf> {
    let mut found = Vec::new();
    collect_payloads(dir, &mut found)?;
    found.sort();

    match found.len() {
        0 => Err(SnapshotError::NoPayload),
        1 => Ok(found.remove(0)),
        _ => Err(SnapshotError::MultiplePayloads(
            found
                .iter()
                .map(|p| {
                    p.strip_prefix(dir)
                        .unwrap_or(p)
                        .display()
                        .to_string()
                })
                .collect(),
        )),
    }
}

fn collect_payloads(dir: &Path, found: &mut Vec<PathBuf>) -> SnapshotResult<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| SnapshotError::io(format!("failed to read {}", dir.display()), e))?;

    for entry in entries {
        let entry =
            entry.map_err(|e| SnapshotError::io(format!("failed to read {}", dir.display()), e))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|e| SnapshotError::io(format!("failed to stat {}", path.display()), e))?;

        if file_type.is_dir() {
            collect_payloads(&path, found)?;
        } else if file_type.is_file()
            && path.extension().and_then(|e| e.to_str()) == Some(DUMP_EXTENSION)
        {
            found.push(path);
        }
    }
    Ok(())
}
