//! Scoped temporary working directories
//!
//! Every backup and restore works inside its own directory under the
//! configured work root. The directory is removed when the [`Workspace`] is
//! dropped, whatever the outcome, unless it was explicitly retained for
//! manual recovery.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    retained: bool,
}

impl Workspace {
    /// Create `<root>/<prefix>-<uuid>`.
    pub fn create(root: &Path, prefix: &str) -> io::Result<Self> {
        let path = root.join(format!("{}-{}", prefix, Uuid::new_v4().simple()));
        fs::create_dir_all(&path)?;
        Ok(Self {
            path,
            retained: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.path.join(name)
    }

    /// Remove the directory. Calling it again, or after the directory is
    /// already gone, is a no-op. A retained workspace is never removed.
    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.retained {
            return Ok(());
        }
        match fs::remove_dir_all(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Keep the directory on disk past this workspace's lifetime.
    pub fn retain(&mut self) -> PathBuf {
        self.retained = true;
        self.path.clone()
    }

    pub fn is_retained(&self) -> bool {
        self.retained
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to remove workspace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_removed_on_drop() {
        let root = TempDir::new().unwrap();
        let path = {
            let ws = Workspace::create(root.path(), "backup").unwrap();
            fs::write(ws.join("db_backup.sql"), "SELECT 1;").unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let root = TempDir::new().unwrap();
        let mut ws = Workspace::create(root.path(), "restore").unwrap();
        fs::write(ws.join("a.sql"), "x").unwrap();

        ws.cleanup().unwrap();
        assert!(!ws.path().exists());
        ws.cleanup().unwrap();
    }

    #[test]
    fn test_retained_survives_drop() {
        let root = TempDir::new().unwrap();
        let kept = {
            let mut ws = Workspace::create(root.path(), "safety").unwrap();
            fs::write(ws.join("safety.sql"), "x").unwrap();
            ws.retain()
        };
        assert!(kept.join("safety.sql").exists());
    }

    #[test]
    fn test_names_are_unique() {
        let root = TempDir::new().unwrap();
        let a = Workspace::create(root.path(), "restore").unwrap();
        let b = Workspace::create(root.path(), "restore").unwrap();
        assert_ne!(a.path(), b.path());
    }
}
