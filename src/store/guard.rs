//! Store-wide mutation lock for the file-backed store.
//!
//! Claim creation is already exclusive through the filesystem. Removal and
//! rewrites of existing lock files (release, force-release, heartbeat,
//! expiry) read-then-act, so they run under this lock.

use crate::error::{DeskError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime};

/// How many times to retry acquiring a busy mutation lock.
const ACQUIRE_ATTEMPTS: u32 = 200;

/// Pause between acquisition attempts.
const ACQUIRE_BACKOFF: Duration = Duration::from_millis(10);

/// A mutation lock older than this was left behind by a crashed process.
const ABANDONED_AFTER: Duration = Duration::from_secs(30);

/// RAII guard for the mutation lock file.
///
/// When dropped, the lock file is deleted. If deletion fails, a warning is
/// logged and no panic occurs.
#[derive(Debug)]
pub(super) struct MutationGuard {
    path: PathBuf,
}

impl MutationGuard {
    /// Acquire the mutation lock at `path`, waiting briefly if it is busy.
    pub(super) fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                DeskError::StoreError(format!(
                    "failed to create locks directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        for _ in 0..ACQUIRE_ATTEMPTS {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // The PID is informational only.
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if is_abandoned(path) {
                        tracing::warn!(
                            "removing abandoned store mutation lock '{}'",
                            path.display()
                        );
                        let _ = fs::remove_file(path);
                        continue;
                    }
                    thread::sleep(ACQUIRE_BACKOFF);
                }
                Err(e) => {
                    return Err(DeskError::StoreError(format!(
                        "failed to acquire store lock '{}': {}",
                        path.display(),
                        e
                    )));
                }
            }
        }

        Err(DeskError::StoreError(format!(
            "lock store is busy: '{}' is held by another process",
            path.display()
        )))
    }
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(
                "failed to release store lock '{}': {}",
                self.path.display(),
                e
            );
        }
    }
}

fn is_abandoned(path: &Path) -> bool {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .is_some_and(|age| age > ABANDONED_AFTER)
}
