//! Run-level mutual exclusion.
//!
//! An exclusive advisory lock on `<known_file>.lock`, held from fetch through
//! persist. A second run started while one is in progress fails fast.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("another run holds the lock at {0}")]
    Held(PathBuf),

    #[error("failed to lock {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Held lock; released on drop
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Lock path for a known-set file
    pub fn path_for(known_file: &Path) -> PathBuf {
        let mut name = known_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "known_ids.json".into());
        name.push(".lock");
        known_file.with_file_name(name)
    }

    /// Try to take the lock without blocking
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LockError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path)
            .map_err(|source| LockError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        file.try_lock_exclusive()
            .map_err(|e| lock_error(path, e))?;

        debug!(path = %path.display(), "Acquired run lock");
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Contention means another run; anything else is a plain I/O failure
fn lock_error(path: &Path, source: io::Error) -> LockError {
    let contended = fs2::lock_contended_error();
    if source.raw_os_error().is_some() && source.raw_os_error() == contended.raw_os_error() {
        LockError::Held(path.to_path_buf())
    } else {
        LockError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path() {
        assert_eq!(
            RunLock::path_for(Path::new("data/known_ids.json")),
            PathBuf::from("data/known_ids.json.lock")
        );
    }

    #[test]
    fn test_second_lock_is_refused() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("known_ids.json.lock");

        let held = RunLock::acquire(&path).unwrap();
        assert_eq!(held.path(), path);
        assert!(matches!(RunLock::acquire(&path), Err(LockError::Held(_))));

        drop(held);
        assert!(RunLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_only_contention_is_held() {
        let path = Path::new("known_ids.json.lock");

        let held = lock_error(path, fs2::lock_contended_error());
        assert!(matches!(held, LockError::Held(_)));

        let denied = lock_error(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(denied, LockError::Io { .. }));
    }
}
