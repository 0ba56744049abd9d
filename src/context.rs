//! Desk context resolution for claimdesk.
//!
//! A desk is the `.claimdesk/` directory holding the config, the resource
//! queues, the lock files, and the audit log. Commands locate it from an
//! explicit root, from `CLAIMDESK_ROOT`, or by walking up from the current
//! directory, so they can be invoked from anywhere below the project root.

use crate::error::{DeskError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Name of the desk directory under the project root.
pub const DESK_DIR: &str = ".claimdesk";

/// Environment variable naming the project root explicitly.
pub const ROOT_ENV: &str = "CLAIMDESK_ROOT";

/// Resolved paths for a desk. All paths are absolute.
#[derive(Debug, Clone)]
pub struct DeskContext {
    /// Project root containing the desk directory.
    pub root: PathBuf,

    /// The desk directory (`{root}/.claimdesk/`).
    pub desk_dir: PathBuf,

    /// Lock files, one subdirectory per resource type.
    pub locks_dir: PathBuf,

    /// Resource records, one subdirectory per resource type.
    pub resources_dir: PathBuf,
}

impl DeskContext {
    /// Resolve the desk context.
    ///
    /// Precedence: `explicit_root`, then `CLAIMDESK_ROOT`, then the nearest
    /// ancestor of the current directory containing `.claimdesk/`. When no
    /// desk exists yet, the current directory is used (so `init` can create
    /// one there).
    pub fn resolve(explicit_root: Option<&Path>) -> Result<Self> {
        if let Some(root) = explicit_root {
            return Ok(Self::at(absolute(root)?));
        }

        if let Ok(root) = env::var(ROOT_ENV)
            && !root.trim().is_empty()
        {
            return Ok(Self::at(absolute(Path::new(&root))?));
        }

        let cwd = env::current_dir().map_err(|e| {
            DeskError::UserError(format!("failed to get current working directory: {}", e))
        })?;

        Ok(Self::resolve_from(&cwd))
    }

    /// Resolve by walking up from `start` to the nearest directory with a desk.
    pub fn resolve_from<P: AsRef<Path>>(start: P) -> Self {
        let start = start.as_ref();
        let root = start
            .ancestors()
            .find(|dir| dir.join(DESK_DIR).is_dir())
            .unwrap_or(start);
        Self::at(root.to_path_buf())
    }

    /// Context for a desk directly under `root`.
    pub fn at(root: PathBuf) -> Self {
        let desk_dir = root.join(DESK_DIR);
        Self {
            locks_dir: desk_dir.join("locks"),
            resources_dir: desk_dir.join("resources"),
            desk_dir,
            root,
        }
    }

    /// Check if the desk directory exists.
    pub fn desk_exists(&self) -> bool {
        self.desk_dir.is_dir()
    }

    /// Ensure the desk is initialized, returning a helpful error if not.
    pub fn ensure_initialized(&self) -> Result<()> {
        if !self.desk_exists() {
            return Err(DeskError::UserError(format!(
                "claimdesk not initialized.\n\
                 Expected desk directory at: {}\n\n\
                 Run `claimdesk init` to create one, or pass --root.",
                self.desk_dir.display()
            )));
        }
        Ok(())
    }

    /// Path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.desk_dir.join("config.yaml")
    }

    /// Path to the events directory.
    pub fn events_dir(&self) -> PathBuf {
        self.desk_dir.join("events")
    }

    /// Path to the audit log.
    pub fn events_file(&self) -> PathBuf {
        self.events_dir().join("events.ndjson")
    }
}

/// Resolve the context and require an initialized desk.
pub fn require_initialized_desk(explicit_root: Option<&Path>) -> Result<DeskContext> {
    let ctx = DeskContext::resolve(explicit_root)?;
    ctx.ensure_initialized()?;
    Ok(ctx)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir().map_err(|e| {
        DeskError::UserError(format!("failed to get current working directory: {}", e))
    })?;
    Ok(cwd.join(path))
}
