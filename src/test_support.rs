use crate::cli::GlobalArgs;
use crate::commands::init::cmd_init;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex, MutexGuard};
use tempfile::TempDir;

static CWD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub(crate) struct DirGuard {
    original: PathBuf,
    _lock: MutexGuard<'static, ()>,
}

impl DirGuard {
    pub(crate) fn new(new_dir: &Path) -> Self {
        // Changing the process current working directory is global and not thread-safe.
        // Lock it so tests don't race even if a #[serial] annotation is missed.
        let lock = CWD_LOCK.lock().unwrap_or_else(|poison| poison.into_inner());
        let original = std::env::current_dir().unwrap();
        std::env::set_current_dir(new_dir).unwrap();
        Self {
            original,
            _lock: lock,
        }
    }
}

impl Drop for DirGuard {
    fn drop(&mut self) {
        let _ = std::env::set_current_dir(&self.original);
    }
}

/// Global args pointing at `root`, acting as `operator`.
pub(crate) fn as_operator(root: &Path, operator: &str) -> GlobalArgs {
    GlobalArgs {
        root: Some(root.to_path_buf()),
        operator: Some(operator.to_string()),
    }
}

/// A temporary project with an initialized desk.
pub(crate) fn create_test_desk() -> TempDir {
    create_desk_with_config(None)
}

/// A temporary desk whose config names `privileged` as privileged operators.
pub(crate) fn create_test_desk_with_privileged(privileged: &[&str]) -> TempDir {
    let yaml = format!("privileged_operators: [{}]\n", privileged.join(", "));
    create_desk_with_config(Some(&yaml))
}

fn create_desk_with_config(config_yaml: Option<&str>) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    cmd_init(&as_operator(temp_dir.path(), "setup")).unwrap();

    if let Some(yaml) = config_yaml {
        let config_path = temp_dir.path().join(".claimdesk").join("config.yaml");
        std::fs::write(config_path, yaml).unwrap();
    }

    temp_dir
}
