//! Resource repositories: where the business records of each queue live.
//!
//! The claim protocol never writes business fields itself; it only reads
//! records for listing and asks the repository to store a new status on the
//! mutate path.

use super::types::{ResourceKey, ResourceRecord, ResourceStatus, ResourceType};
use crate::error::{DeskError, Result};
use crate::fs::{atomic_create_file, atomic_write_file};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Storage for resource business records.
pub trait ResourceRepository: Send + Sync {
    /// All records of one type, ordered by ID.
    fn list(&self, resource_type: ResourceType) -> Result<Vec<ResourceRecord>>;

    /// A single record, if present.
    fn get(&self, key: &ResourceKey) -> Result<Option<ResourceRecord>>;

    /// Add a new record. Fails if the key already exists.
    fn insert(&self, record: ResourceRecord) -> Result<()>;

    /// Store a new status and return the updated record.
    fn set_status(
        &self,
        key: &ResourceKey,
        status: ResourceStatus,
        now: DateTime<Utc>,
    ) -> Result<ResourceRecord>;
}

/// In-process repository.
#[derive(Debug, Default)]
pub struct MemoryResourceRepository {
    records: Mutex<BTreeMap<ResourceKey, ResourceRecord>>,
}

impl MemoryResourceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> std::sync::MutexGuard<'_, BTreeMap<ResourceKey, ResourceRecord>> {
        self.records.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

impl ResourceRepository for MemoryResourceRepository {
    fn list(&self, resource_type: ResourceType) -> Result<Vec<ResourceRecord>> {
        Ok(self
            .records()
            .values()
            .filter(|r| r.resource_type == resource_type)
            .cloned()
            .collect())
    }

    fn get(&self, key: &ResourceKey) -> Result<Option<ResourceRecord>> {
        Ok(self.records().get(key).cloned())
    }

    fn insert(&self, record: ResourceRecord) -> Result<()> {
        let key = record.key();
        let mut records = self.records();
        if records.contains_key(&key) {
            return Err(already_exists(&key));
        }
        records.insert(key, record);
        Ok(())
    }

    fn set_status(
        &self,
        key: &ResourceKey,
        status: ResourceStatus,
        now: DateTime<Utc>,
    ) -> Result<ResourceRecord> {
        let mut records = self.records();
        let record = records
            .get_mut(key)
            .ok_or_else(|| DeskError::NotFound(key.to_string()))?;
        record.status = status;
        record.updated_at = Some(now);
        Ok(record.clone())
    }
}

/// Repository backed by one YAML file per resource:
/// `{resources_dir}/{type}/{id}.yaml`.
#[derive(Debug, Clone)]
pub struct FileResourceRepository {
    resources_dir: PathBuf,
}

impl FileResourceRepository {
    pub fn new<P: AsRef<Path>>(resources_dir: P) -> Self {
        Self {
            resources_dir: resources_dir.as_ref().to_path_buf(),
        }
    }

    fn type_dir(&self, resource_type: ResourceType) -> PathBuf {
        self.resources_dir.join(resource_type.as_str())
    }

    fn record_path(&self, key: &ResourceKey) -> PathBuf {
        self.type_dir(key.resource_type)
            .join(format!("{}.yaml", key.resource_id))
    }

    fn load(path: &Path) -> Result<ResourceRecord> {
        let content = fs::read_to_string(path).map_err(|e| {
            DeskError::UserError(format!(
                "failed to read resource file '{}': {}",
                path.display(),
                e
            ))
        })?;

        serde_yaml::from_str(&content).map_err(|e| {
            DeskError::UserError(format!(
                "failed to parse resource file '{}': {}",
                path.display(),
                e
            ))
        })
    }

    fn to_yaml(record: &ResourceRecord) -> Result<String> {
        serde_yaml::to_string(record).map_err(|e| {
            DeskError::UserError(format!("failed to serialize resource record: {}", e))
        })
    }

    fn save(&self, record: &ResourceRecord) -> Result<()> {
        atomic_write_file(self.record_path(&record.key()), &Self::to_yaml(record)?)
    }
}

impl ResourceRepository for FileResourceRepository {
    fn list(&self, resource_type: ResourceType) -> Result<Vec<ResourceRecord>> {
        let dir = self.type_dir(resource_type);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&dir).map_err(|e| {
            DeskError::UserError(format!(
                "failed to read resource directory '{}': {}",
                dir.display(),
                e
            ))
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                DeskError::UserError(format!("failed to read directory entry: {}", e))
            })?;
            let path = entry.path();

            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }

            match Self::load(&path) {
                Ok(record) => records.push(record),
                Err(e) => tracing::warn!("skipping unreadable resource file: {}", e),
            }
        }

        records.sort_by(|a, b| a.resource_id.cmp(&b.resource_id));
        Ok(records)
    }

    fn get(&self, key: &ResourceKey) -> Result<Option<ResourceRecord>> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    fn insert(&self, record: ResourceRecord) -> Result<()> {
        let key = record.key();
        if atomic_create_file(self.record_path(&key), &Self::to_yaml(&record)?)? {
            Ok(())
        } else {
            Err(already_exists(&key))
        }
    }

    fn set_status(
        &self,
        key: &ResourceKey,
        status: ResourceStatus,
        now: DateTime<Utc>,
    ) -> Result<ResourceRecord> {
        let mut record = self
            .get(key)?
            .ok_or_else(|| DeskError::NotFound(key.to_string()))?;
        record.status = status;
        record.updated_at = Some(now);
        self.save(&record)?;
        Ok(record)
    }
}

fn already_exists(key: &ResourceKey) -> DeskError {
    DeskError::UserError(format!("resource '{}' already exists", key))
}
