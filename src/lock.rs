//! Cross-process advisory lock for mutating commands.
//!
//! The in-process transition lock cannot see a second `dbkeeper` process
//! driving the same container, so `up`, `down` and `restart` additionally hold
//! an exclusive `fs2` lock named after the container. Locks live under
//! `~/.dbkeeper/locks/`, which makes two checkouts that resolve to the same
//! container name contend for one lock. The lock is released when the
//! [`ContainerLock`] is dropped.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Directory, relative to the working directory, holding runtime files.
pub const STATE_DIR: &str = ".dbkeeper";

#[derive(Debug)]
pub struct ContainerLock {
    path: PathBuf,
    _file: File,
}

impl ContainerLock {
    /// Per-user lock directory, or `<fallback>/.dbkeeper/locks` without a home.
    pub fn default_dir(fallback: &Path) -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| fallback.to_path_buf())
            .join(STATE_DIR)
            .join("locks")
    }

    pub fn path_for(lock_dir: &Path, container: &str) -> PathBuf {
        lock_dir.join(format!("{}.lock", container))
    }

    /// Take the lock for `container` in `lock_dir` without waiting.
    ///
    /// # Errors
    ///
    /// [`Error::Locked`] if another process holds it, [`Error::Io`] if the
    /// lock file cannot be created.
    pub fn acquire(lock_dir: &Path, container: &str) -> Result<Self> {
        let path = Self::path_for(lock_dir, container);
        std::fs::create_dir_all(lock_dir)?;

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                // Owner PID for diagnostics
                file.set_len(0)?;
                writeln!(file, "{}", std::process::id())?;
                tracing::debug!("Acquired advisory lock on {}", path.display());
                Ok(Self { path, _file: file })
            }
            Err(e) => {
                let owner = std::fs::read_to_string(&path).unwrap_or_default();
                tracing::debug!(
                    "Lock acquisition failed: {} (held by pid {})",
                    e,
                    owner.trim()
                );
                Err(Error::Locked(path))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
