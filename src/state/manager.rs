//! State persistence for release runs.
//!
//! State files are written atomically: the JSON goes to a temporary file that
//! is synced and then renamed over the previous state.

use crate::error::{Result, StateError};
use crate::state::ReleaseState;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// State manager for one state file
#[derive(Debug, Clone)]
pub struct StateManager {
    state_file_path: PathBuf,
}

/// Result of state loading operation
#[derive(Debug)]
pub struct LoadStateResult {
    /// Loaded release state
    pub state: ReleaseState,
    /// Problems noticed while loading
    pub warnings: Vec<String>,
}

impl StateManager {
    /// Manage the state file at `state_file_path`
    pub fn new<P: AsRef<Path>>(state_file_path: P) -> Self {
        Self {
            state_file_path: state_file_path.as_ref().to_path_buf(),
        }
    }

    /// State file for `repo_path` inside `state_dir`.
    ///
    /// The file name combines the repository directory name with a short hash
    /// of its full path, so two checkouts never share state.
    pub fn for_repository(state_dir: &Path, repo_path: &Path) -> Self {
        let canonical = repo_path
            .canonicalize()
            .unwrap_or_else(|_| repo_path.to_path_buf());
        let digest = hex::encode(Sha256::digest(canonical.to_string_lossy().as_bytes()));
        let stem = canonical
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repository".to_string());

        Self::new(state_dir.join(format!("{}-{}.json", stem, &digest[..12])))
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.state_file_path
    }

    /// Check if state file exists
    pub fn state_exists(&self) -> bool {
        self.state_file_path.exists()
    }

    /// Save release state, bumping its save version
    pub async fn save_state(&self, state: &mut ReleaseState) -> Result<()> {
        state.validate()?;
        state.save_version += 1;

        let serialized =
            serde_json::to_string_pretty(state).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to serialize state: {}", e),
            })?;

        if let Some(parent) = self.state_file_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StateError::SaveFailed {
                    reason: format!("Failed to create {}: {}", parent.display(), e),
                })?;
        }

        let temp_file_path = self.state_file_path.with_extension("tmp");
        let failed = |what: &str, e: std::io::Error| StateError::SaveFailed {
            reason: format!("Failed to {} {}: {}", what, temp_file_path.display(), e),
        };

        let mut file = tokio::fs::File::create(&temp_file_path)
            .await
            .map_err(|e| failed("create", e))?;
        file.write_all(serialized.as_bytes())
            .await
            .map_err(|e| failed("write", e))?;
        file.sync_all().await.map_err(|e| failed("sync", e))?;
        drop(file);

        tokio::fs::rename(&temp_file_path, &self.state_file_path)
            .await
            .map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to rename temp file: {}", e),
            })?;

        log::debug!(
            "saved {} (save {}, {} bytes)",
            self.state_file_path.display(),
            state.save_version,
            serialized.len()
        );
        Ok(())
    }

    /// Load release state from file
    pub async fn load_state(&self) -> Result<LoadStateResult> {
        let contents = tokio::fs::read_to_string(&self.state_file_path)
            .await
            .map_err(|e| StateError::LoadFailed {
                reason: format!(
                    "Failed to read file {}: {}",
                    self.state_file_path.display(),
                    e
                ),
            })?;

        let state: ReleaseState =
            serde_json::from_str(&contents).map_err(|e| StateError::Corrupted {
                reason: format!("Failed to deserialize state: {}", e),
            })?;
        state.validate()?;

        let mut warnings = Vec::new();
        if !state.errors.is_empty() {
            warnings.push(format!(
                "previous run stopped with: {}",
                state.errors.last().map(|e| e.message.as_str()).unwrap_or_default()
            ));
        }

        Ok(LoadStateResult { state, warnings })
    }

    /// Load release state when a state file exists
    pub async fn load_if_exists(&self) -> Result<Option<LoadStateResult>> {
        if !self.state_exists() {
            return Ok(None);
        }
        self.load_state().await.map(Some)
    }

    /// Delete the state file
    pub fn cleanup_state(&self) -> Result<()> {
        if self.state_file_path.exists() {
            fs::remove_file(&self.state_file_path).map_err(|e| StateError::SaveFailed {
                reason: format!("Failed to remove state file: {}", e),
            })?;
        }
        Ok(())
    }
}
