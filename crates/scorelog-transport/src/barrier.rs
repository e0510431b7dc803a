use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::error::{Result, TransportError};

/// Cross-process mutual exclusion shared by sibling worker processes.
///
/// Backed by an exclusive advisory `flock(2)` on a named lock file. Every
/// process (or every `open` within one process) gets its own open file
/// description, so holders exclude each other regardless of where they run.
/// The lock is held only while a [`BarrierGuard`] is alive.
#[derive(Debug)]
pub struct StartupBarrier {
    file: File,
    path: PathBuf,
}

/// Holds the barrier; dropping it releases the lock.
#[derive(Debug)]
pub struct BarrierGuard<'a> {
    barrier: &'a StartupBarrier,
}

impl StartupBarrier {
    /// Permission mode for newly created lock files.
    pub const DEFAULT_LOCK_MODE: u32 = 0o600;

    /// Open (creating if needed) the lock file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .mode(Self::DEFAULT_LOCK_MODE)
            .custom_flags(libc::O_CLOEXEC)
            .open(&path)
            .map_err(|source| TransportError::Barrier {
                path: path.clone(),
                source,
            })?;
        debug!(?path, "opened startup barrier");
        Ok(Self { file, path })
    }

    /// Block until the barrier is acquired.
    pub fn lock(&self) -> Result<BarrierGuard<'_>> {
        loop {
            match self.flock(libc::LOCK_EX) {
                Ok(()) => {
                    trace!(path = ?self.path, "startup barrier acquired");
                    return Ok(BarrierGuard { barrier: self });
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(TransportError::Barrier {
                        path: self.path.clone(),
                        source,
                    })
                }
            }
        }
    }

    /// Acquire the barrier if nobody else holds it.
    pub fn try_lock(&self) -> Result<Option<BarrierGuard<'_>>> {
        match self.flock(libc::LOCK_EX | libc::LOCK_NB) {
            Ok(()) => Ok(Some(BarrierGuard { barrier: self })),
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(source) => Err(TransportError::Barrier {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flock(&self, op: libc::c_int) -> io::Result<()> {
        // SAFETY: the descriptor belongs to `self.file`, which is open for the
        // lifetime of `self`.
        let rc = unsafe { libc::flock(self.file.as_raw_fd(), op) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

impl Drop for BarrierGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.barrier.flock(libc::LOCK_UN) {
            debug!(path = ?self.barrier.path, error = %err, "failed to release startup barrier");
        } else {
            trace!(path = ?self.barrier.path, "startup barrier released");
        }
    }
}
