//! File-backed lock store.
//!
//! Each active claim is one JSON file at `{locks_dir}/{type}/{id}.lock`.
//! A claim is published by writing the record to a private temp file and
//! hard-linking it into place: the link fails if the lock file already
//! exists, so exactly one writer wins and readers never see a half-written
//! record.

use super::guard::MutationGuard;
use super::{ClaimRecord, Held, LockStore, Release, TryClaim};
use crate::error::{DeskError, Result};
use crate::fs::atomic_write_file;
use crate::resource::{RESOURCE_TYPES, ResourceKey, ResourceType};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Name of the store-wide mutation lock file.
const MUTATION_LOCK: &str = "store.lock";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Lock store persisted as lock files under a directory.
#[derive(Debug, Clone)]
pub struct FileLockStore {
    locks_dir: PathBuf,
}

impl FileLockStore {
    pub fn new<P: AsRef<Path>>(locks_dir: P) -> Self {
        Self {
            locks_dir: locks_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the lock file for `key`.
    pub fn lock_path(&self, key: &ResourceKey) -> PathBuf {
        self.type_dir(key.resource_type)
            .join(format!("{}.lock", key.resource_id))
    }

    fn type_dir(&self, resource_type: ResourceType) -> PathBuf {
        self.locks_dir.join(resource_type.as_str())
    }

    fn mutation_lock(&self) -> Result<MutationGuard> {
        MutationGuard::acquire(&self.locks_dir.join(MUTATION_LOCK))
    }

    fn read_path(path: &Path) -> Result<Option<ClaimRecord>> {
        if !path.exists() {
            return Ok(None);
        }
        match ClaimRecord::from_file(path) {
            Ok(record) => Ok(Some(record)),
            // Removed between the existence check and the read.
            Err(_) if !path.exists() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn remove_path(path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|e| {
            DeskError::StoreError(format!(
                "failed to remove lock file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// Write `content` to a uniquely named temp file next to `target`.
    fn write_temp(target: &Path, content: &str) -> Result<PathBuf> {
        let parent = target.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(parent).map_err(|e| {
            DeskError::StoreError(format!(
                "failed to create locks directory '{}': {}",
                parent.display(),
                e
            ))
        })?;

        let temp_path = parent.join(format!(
            ".claim.{}.{}.tmp",
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        let mut file = File::create(&temp_path).map_err(|e| {
            DeskError::StoreError(format!(
                "failed to create temporary lock file '{}': {}",
                temp_path.display(),
                e
            ))
        })?;

        file.write_all(content.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|e| {
                let _ = fs::remove_file(&temp_path);
                DeskError::StoreError(format!("failed to write claim record: {}", e))
            })?;

        Ok(temp_path)
    }

    fn lock_files(&self, resource_type: ResourceType) -> Result<Vec<(ResourceKey, PathBuf)>> {
        let dir = self.type_dir(resource_type);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|e| {
            DeskError::StoreError(format!(
                "failed to read locks directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                DeskError::StoreError(format!("failed to read locks directory entry: {}", e))
            })?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some("lock") {
                continue;
            }

            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            // Skip files that could not have been written by this store.
            let Ok(key) = ResourceKey::new(resource_type, id) else {
                continue;
            };
            files.push((key, path));
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}

impl LockStore for FileLockStore {
    fn try_claim(&self, key: &ResourceKey, claim: ClaimRecord) -> Result<TryClaim> {
        let lock_path = self.lock_path(key);
        let temp_path = Self::write_temp(&lock_path, &claim.to_json()?)?;

        let linked = fs::hard_link(&temp_path, &lock_path);
        let _ = fs::remove_file(&temp_path);

        match linked {
            Ok(()) => Ok(TryClaim::Acquired(claim)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                match Self::read_path(&lock_path)? {
                    Some(holder) => Ok(TryClaim::Conflict(holder)),
                    // The holder released in between; report the race as lost
                    // rather than retrying behind the caller's back.
                    None => Err(DeskError::Conflict(format!(
                        "{} changed hands while claiming; refresh and try again",
                        key
                    ))),
                }
            }
            Err(e) => Err(DeskError::StoreError(format!(
                "failed to create lock file '{}': {}",
                lock_path.display(),
                e
            ))),
        }
    }

    fn release(&self, key: &ResourceKey, operator_id: &str) -> Result<Release> {
        let _guard = self.mutation_lock()?;
        let lock_path = self.lock_path(key);

        match Self::read_path(&lock_path)? {
            Some(record) if record.is_held_by(operator_id) => {
                Self::remove_path(&lock_path)?;
                Ok(Release::Released(record))
            }
            other => Ok(Release::NotHolder(other)),
        }
    }

    fn force_release(&self, key: &ResourceKey) -> Result<Option<ClaimRecord>> {
        let _guard = self.mutation_lock()?;
        let lock_path = self.lock_path(key);

        let previous = Self::read_path(&lock_path).unwrap_or_else(|e| {
            // A corrupt lock file still blocks the resource; clear it anyway.
            tracing::warn!("clearing unreadable lock for {}: {}", key, e);
            None
        });

        if lock_path.exists() {
            Self::remove_path(&lock_path)?;
        }
        Ok(previous)
    }

    fn while_held(
        &self,
        key: &ResourceKey,
        operator_id: &str,
        release_after: bool,
        action: &mut dyn FnMut() -> Result<()>,
    ) -> Result<Held> {
        // A held lock file cannot be replaced by try_claim, and every removal
        // waits on the mutation lock, so the holder is pinned until it drops.
        let _guard = self.mutation_lock()?;
        let lock_path = self.lock_path(key);

        let record = match Self::read_path(&lock_path)? {
            Some(record) if record.is_held_by(operator_id) => record,
            other => return Ok(Held::NotHolder(other)),
        };

        action()?;
        if release_after {
            Self::remove_path(&lock_path)?;
        }
        Ok(Held::Ran(record))
    }

    fn read(&self, key: &ResourceKey) -> Result<Option<ClaimRecord>> {
        Self::read_path(&self.lock_path(key))
    }

    fn list(&self, resource_type: Option<ResourceType>) -> Result<Vec<(ResourceKey, ClaimRecord)>> {
        let types: Vec<ResourceType> = match resource_type {
            Some(t) => vec![t],
            None => RESOURCE_TYPES.to_vec(),
        };

        let mut claims = Vec::new();
        for t in types {
            for (key, path) in self.lock_files(t)? {
                match Self::read_path(&path) {
                    Ok(Some(record)) => claims.push((key, record)),
                    Ok(None) => {}
                    Err(e) => tracing::warn!("skipping unreadable lock file: {}", e),
                }
            }
        }
        Ok(claims)
    }

    fn heartbeat(&self, operator_id: &str, now: DateTime<Utc>) -> Result<usize> {
        let _guard = self.mutation_lock()?;

        let mut renewed = 0;
        for (key, mut record) in self.list(None)? {
            if !record.is_held_by(operator_id) {
                continue;
            }
            record.heartbeat_at = now;
            atomic_write_file(self.lock_path(&key), &record.to_json()?)?;
            renewed += 1;
        }
        Ok(renewed)
    }

    fn expire(
        &self,
        key: &ResourceKey,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<ClaimRecord>> {
        let _guard = self.mutation_lock()?;
        let lock_path = self.lock_path(key);

        match Self::read_path(&lock_path)? {
            Some(record) if record.heartbeat_before(stale_before) => {
                Self::remove_path(&lock_path)?;
                Ok(Some(record))
            }
            _ => Ok(None),
        }
    }
}
