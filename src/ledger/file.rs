//! Ledger persisted as a JSON file

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::errors::{LedgerError, LedgerResult};
use super::memory::RecordTable;
use super::{BackupRecord, Ledger, RecordFilter, RecordMetadata, RecordUpdate, SortOrder};

const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(15);
const LOCK_POLL: Duration = Duration::from_millis(25);

/// Ledger stored as one JSON array on disk.
///
/// The file is the only state: every operation takes the `<path>.lock`
/// file, reads the ledger, and for mutations writes it back through a temp
/// file, fsync and rename before releasing the lock. Handles in other
/// processes therefore see each other's records, and a crash leaves either
/// the old or the new ledger, never a torn one.
#[derive(Debug, Clone)]
pub struct FileLedger {
    path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl FileLedger {
    /// Open the ledger at `path`; a missing file is an empty ledger. An
    /// unreadable or corrupt file is reported here rather than on first use.
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut lock_name = path.as_os_str().to_os_string();
        lock_name.push(".lock");

        let ledger = Self {
            lock_path: PathBuf::from(lock_name),
            path,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        };
        load(&ledger.path)?;
        Ok(ledger)
    }

    /// How long an operation waits for another holder of the lock file
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` on a fresh read of the file, under the lock, off the async
    /// runtime.
    async fn read<T, F>(&self, op: F) -> LedgerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&RecordTable) -> LedgerResult<T> + Send + 'static,
    {
        let ledger = self.clone();
        run_blocking(move || {
            let _lock = LedgerLock::acquire(&ledger.lock_path, ledger.lock_timeout)?;
            let table = load(&ledger.path)?;
            op(&table)
        })
        .await
    }

    /// Like [`Self::read`], then persist the table `op` changed. Nothing is
    /// written when `op` fails.
    async fn mutate<T, F>(&self, op: F) -> LedgerResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut RecordTable) -> LedgerResult<T> + Send + 'static,
    {
        let ledger = self.clone();
        run_blocking(move || {
            let _lock = LedgerLock::acquire(&ledger.lock_path, ledger.lock_timeout)?;
            let mut table = load(&ledger.path)?;
            let out = op(&mut table)?;
            persist(&ledger.path, table.records())?;
            Ok(out)
        })
        .await
    }
}

#[async_trait]
impl Ledger for FileLedger {
    async fn create(&self, metadata: RecordMetadata) -> LedgerResult<BackupRecord> {
        let record = BackupRecord::pending(metadata);
        let created = record.clone();
        self.mutate(move |table| {
            table.insert(record);
            Ok(())
        })
        .await?;
        Ok(created)
    }

    async fn list(&self, filter: &RecordFilter, order: SortOrder) -> LedgerResult<Vec<BackupRecord>> {
        let filter = filter.clone();
        self.read(move |table| Ok(table.list(&filter, order))).await
    }

    async fn get(&self, id: &str) -> LedgerResult<BackupRecord> {
        let id = id.to_string();
        self.read(move |table| table.get(&id).cloned()).await
    }

    async fn update_by_id(&self, id: &str, update: RecordUpdate) -> LedgerResult<BackupRecord> {
        let id = id.to_string();
        self.mutate(move |table| {
            let record = table.updated(&id, update)?;
            table.replace(record.clone());
            Ok(record)
        })
        .await
    }

    async fn delete_by_id(&self, id: &str) -> LedgerResult<()> {
        let id = id.to_string();
        self.mutate(move |table| table.remove(&id).map(|_| ())).await
    }
}

async fn run_blocking<T, F>(op: F) -> LedgerResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> LedgerResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| LedgerError::Storage(format!("ledger task failed: {}", e)))?
}

fn load(path: &Path) -> LedgerResult<RecordTable> {
    let records = match fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Vec::new(),
        Ok(content) => serde_json::from_str(&content)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(e) => {
            return Err(LedgerError::Storage(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )))
        }
    };
    Ok(RecordTable::from_records(records))
}

fn persist(path: &Path, records: &[BackupRecord]) -> LedgerResult<()> {
    let json = serde_json::to_vec_pretty(records)?;
    let storage =
        |e: io::Error| LedgerError::Storage(format!("failed to write {}: {}", path.display(), e));

    let tmp = path.with_extension("json.tmp");
    let mut file = File::create(&tmp).map_err(storage)?;
    file.write_all(&json).map_err(storage)?;
    file.sync_all().map_err(storage)?;
    fs::rename(&tmp, path).map_err(storage)?;
    Ok(())
}

/// Exclusive hold on the ledger, as a `create_new` lock file removed on drop
struct LedgerLock {
    path: PathBuf,
}

impl LedgerLock {
    fn acquire(path: &Path, timeout: Duration) -> LedgerResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LedgerError::Storage(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }

        let deadline = Instant::now() + timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(_) => {
                    return Ok(Self {
                        path: path.to_path_buf(),
                    })
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(LedgerError::Storage(format!(
                            "timed out waiting for ledger lock {}; remove it if no dbvault process is running",
                            path.display()
                        )));
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(e) => {
                    return Err(LedgerError::Storage(format!(
                        "failed to take ledger lock {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
    }
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}
