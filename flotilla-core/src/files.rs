//! On-disk storage for stack bundle files.
//!
//! Each stack owns a project folder under the data directory holding its
//! compose file and/or generated manifest. The store only ever writes
//! whole files and removes whole project folders.

use crate::error::{FlotillaError, Result};
use crate::paths;
use std::path::{Path, PathBuf};
use tracing::{instrument, warn};

/// File store rooted at the stacks directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    base_dir: PathBuf,
}

impl FileStore {
    /// Create a file store rooted at the default stacks directory.
    pub fn new() -> Self {
        Self { base_dir: paths::stacks_dir() }
    }

    /// Create a file store rooted at a specific directory.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    /// Path of the project folder for a stack.
    pub fn project_path(&self, stack_folder: &str) -> PathBuf {
        self.base_dir.join(stack_folder)
    }

    /// Write a stack file into the stack's project folder, creating the
    /// folder as needed. Returns the project folder path.
    #[instrument(skip(self, content), fields(stack_folder = %stack_folder, file_name = %file_name))]
    pub async fn store_stack_file(
        &self,
        stack_folder: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<PathBuf> {
        let project_path = self.project_path(stack_folder);
        tokio::fs::create_dir_all(&project_path)
            .await
            .map_err(|e| FlotillaError::IoError { path: project_path.clone(), source: e })?;

        let file_path = project_path.join(file_name);
        tokio::fs::write(&file_path, content)
            .await
            .map_err(|e| FlotillaError::IoError { path: file_path, source: e })?;

        Ok(project_path)
    }

    /// Remove a project folder. Best-effort: failures are logged and
    /// swallowed, a missing folder is not an error.
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub async fn remove_directory(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        if path.as_os_str().is_empty() || !path.exists() {
            return;
        }

        if let Err(e) = tokio::fs::remove_dir_all(path).await {
            warn!("Unable to clear old stack files at {:?}: {}", path, e);
        }
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::new()
    }
}
