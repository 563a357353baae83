use crate::config::AppConfig;
use std::path::{Path, PathBuf};

/// Global storage root (absolute), from `AppConfig::storage_root`.
/// If relative in env, resolve against current_dir().
pub fn storage_root() -> PathBuf {
    let p = PathBuf::from(AppConfig::global().storage_root.clone());
    if p.is_absolute() {
        p
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(p)
    }
}

/// Directory layout below a storage root. Paths are built, never created.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    root: PathBuf,
}

impl StorageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Layout rooted at [`storage_root`].
    pub fn from_config() -> Self {
        Self::new(storage_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // {root}/project_{id}
    pub fn project_dir(&self, project_id: i64) -> PathBuf {
        self.root.join(format!("project_{project_id}"))
    }

    // {root}/project_{id}/project_files
    pub fn project_files_dir(&self, project_id: i64) -> PathBuf {
        self.project_dir(project_id).join("project_files")
    }

    // {root}/project_{id}/submissions/group_{gid}/submission_{sid}
    pub fn submission_dir(&self, project_id: i64, group_id: i64, submission_id: i64) -> PathBuf {
        self.project_dir(project_id)
            .join("submissions")
            .join(format!("group_{group_id}"))
            .join(format!("submission_{submission_id}"))
    }
}
