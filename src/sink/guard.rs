// src/sink/guard.rs

//! Cross-process exclusive access to the plotter.
//!
//! Uses `flock(LOCK_EX | LOCK_NB)` on a lock file. `flock` locks belong to
//! the open file description, so a second acquisition from the same process
//! is refused exactly like one from another process.

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::{DrawbotError, Result};

/// Held advisory lock. Released by [`ExclusiveAccessGuard::release`] or on
/// drop.
#[derive(Debug)]
pub struct ExclusiveAccessGuard {
    file: Option<File>,
    path: PathBuf,
}

impl ExclusiveAccessGuard {
    /// Try to take the lock without blocking.
    ///
    /// Fails with [`DrawbotError::ResourceBusy`] if someone else holds it.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if ret != 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::WouldBlock {
                warn!(lock = %path.display(), "another process is holding the drawbot lock");
                return Err(DrawbotError::ResourceBusy {
                    lock_path: path.to_path_buf(),
                });
            }
            return Err(DrawbotError::IoError(err));
        }

        debug!(lock = %path.display(), "acquired drawbot lock");
        Ok(Self {
            file: Some(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Release the lock. Idempotent.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_UN) };
            if ret != 0 {
                // Closing the descriptor below drops the lock anyway.
                warn!(
                    lock = %self.path.display(),
                    error = %std::io::Error::last_os_error(),
                    "explicit unlock failed"
                );
            }
            debug!(lock = %self.path.display(), "released drawbot lock");
        }
    }
}

impl Drop for ExclusiveAccessGuard {
    fn drop(&mut self) {
        self.release();
    }
}
