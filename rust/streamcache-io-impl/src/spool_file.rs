use std::{
    path::{Path, PathBuf},
    sync::atomic::{AtomicBool, Ordering},
};

use log::{debug, warn};
use streamcache_common::{Error, Result};

/// Shared handle to the path of a spool file.
///
/// The coordinator that created the file, the views reading it, and the
/// completion callback of the owning unit of work all hold the same
/// `Arc<SpoolFile>`. Deletion is idempotent: only the first successful
/// [`delete`](SpoolFile::delete) removes the file.
///
/// A spool file created without a unit of work (manual lifecycle) is also
/// deleted when the last handle is dropped.
#[derive(Debug)]
pub struct SpoolFile {
    path: PathBuf,
    deleted: AtomicBool,
    delete_on_drop: bool,
}

impl SpoolFile {
    pub fn new(path: PathBuf, delete_on_drop: bool) -> SpoolFile {
        SpoolFile {
            path,
            deleted: AtomicBool::new(false),
            delete_on_drop,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }

    pub fn exists(&self) -> bool {
        !self.is_deleted() && self.path.is_file()
    }

    /// Removes the file from disk.
    ///
    /// Returns `Ok(true)` if this call removed it, and `Ok(false)` if it was
    /// already deleted or is missing.
    pub fn delete(&self) -> Result<bool> {
        if self.deleted.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("deleted spool file '{}'", self.path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => {
                self.deleted.store(false, Ordering::Release);
                Err(Error::io(format!("delete {}", self.path.display()), e))
            }
        }
    }
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        if self.delete_on_drop {
            if let Err(e) = self.delete() {
                warn!("failed to delete spool file on drop: {e}");
            }
        }
    }
}
