//! Per-record locking
//!
//! A [`JobLock`] serializes read-modify-write cycles on one job. Within a
//! process that is a `tokio::sync::Mutex` per job id; the file-backed
//! registry additionally holds an exclusive `flock` on `{job_id}.lock` so
//! separate processes sharing a data directory also exclude each other.
//!
//! The kernel releases the `flock` when the descriptor closes, including
//! when the holder crashes, so a lock is never broken by age. Lock files
//! are left in place: unlinking one would let a waiter still polling the
//! old inode and a newcomer on a fresh file both succeed.

use dashmap::DashMap;
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;
use tracing::debug;

use crate::utils::error::{BatchError, Result};

const LOCK_POLL_START: Duration = Duration::from_millis(10);
const LOCK_POLL_MAX: Duration = Duration::from_millis(500);

/// Exclusive guard over one job record, released on drop
#[derive(Debug)]
pub struct JobLock {
    job_id: String,
    // Closing the descriptor releases the flock
    _lock_file: Option<File>,
    _guard: OwnedMutexGuard<()>,
}

impl JobLock {
    pub(crate) fn new(job_id: &str, guard: OwnedMutexGuard<()>, lock_file: Option<File>) -> Self {
        Self {
            job_id: job_id.to_string(),
            _lock_file: lock_file,
            _guard: guard,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

/// In-process mutex per job id
#[derive(Debug, Default)]
pub struct RecordLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, job_id: &str) -> OwnedMutexGuard<()> {
        let mutex = self.locks.entry(job_id.to_string()).or_default().clone();
        mutex.lock_owned().await
    }

    /// Drop the mutex of a deleted record
    pub fn forget(&self, job_id: &str) {
        self.locks.remove(job_id);
    }
}

/// Open `path` and take an exclusive `flock` on it, polling with backoff
///
/// Gives up with a registry error once `wait` has elapsed. The returned
/// file must be kept open for as long as the lock is needed.
pub(crate) async fn acquire_lock_file(path: &Path, wait: Duration) -> Result<File> {
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)
        .await
        .map_err(|e| {
            BatchError::Registry(format!("Failed to open lock {}: {}", path.display(), e))
        })?
        .into_std()
        .await;

    let started = Instant::now();
    let mut delay = LOCK_POLL_START;
    loop {
        match try_flock_exclusive(&file) {
            Ok(true) => {
                debug!(path = %path.display(), "Acquired lock file");
                return Ok(file);
            }
            Ok(false) => {}
            Err(e) => {
                return Err(BatchError::Registry(format!(
                    "Failed to lock {}: {}",
                    path.display(),
                    e
                )));
            }
        }
        if started.elapsed() >= wait {
            return Err(BatchError::Registry(format!(
                "Timed out after {:?} waiting for lock {}",
                wait,
                path.display()
            )));
        }
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(LOCK_POLL_MAX);
    }
}

/// Non-blocking exclusive `flock`; `Ok(false)` while another descriptor holds it
fn try_flock_exclusive(file: &File) -> io::Result<bool> {
    #[cfg(unix)]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: `fd` is a valid descriptor owned by `file` for this call.
        let result = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if result == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::WouldBlock || err.raw_os_error() == Some(libc::EWOULDBLOCK)
        {
            return Ok(false);
        }
        Err(err)
    }
    #[cfg(not(unix))]
    {
        let _ = file;
        Ok(true)
    }
}
