//! Run State Persistence
//!
//! Saves the executor's position and captured outputs to a JSON file so an
//! interrupted setup can be resumed where it stopped. The file remembers
//! which workflow it belongs to; state for a different workflow is ignored.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Position in the workflow plus every value captured so far.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionState {
    /// Index of the current workflow step
    pub current_index: usize,

    /// Output name -> last written value, shared by all steps
    pub captured_outputs: HashMap<String, String>,
}

/// Contents of the state file.
#[derive(Serialize, Deserialize, Debug, Clone)]
struct SavedState {
    workflow: String,
    #[serde(flatten)]
    state: ExecutionState,
    updated_at: DateTime<Utc>,
}

/// Load/save access to a state file for one workflow.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    workflow: String,
}

impl StateStore {
    /// Creates a store for `workflow` (usually the workflow file path).
    pub fn new(path: impl Into<PathBuf>, workflow: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            workflow: workflow.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the saved state, or returns a fresh one when there is none.
    pub fn load_or_create(&self) -> Result<ExecutionState, StateError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No state file at {}, starting fresh", self.path.display());
                return Ok(ExecutionState::default());
            }
            Err(source) => {
                return Err(StateError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let saved: SavedState = serde_json::from_str(&content).map_err(|source| StateError::Decode {
            path: self.path.clone(),
            source,
        })?;

        if saved.workflow != self.workflow {
            warn!(
                "State file {} belongs to workflow '{}', starting fresh",
                self.path.display(),
                saved.workflow
            );
            return Ok(ExecutionState::default());
        }

        info!(
            "Resuming at step {} with {} captured outputs (saved {})",
            saved.state.current_index + 1,
            saved.state.captured_outputs.len(),
            saved.updated_at
        );
        Ok(saved.state)
    }

    /// Writes `state` to the state file, replacing its previous content.
    pub fn save(&self, state: &ExecutionState) -> Result<(), StateError> {
        let saved = SavedState {
            workflow: self.workflow.clone(),
            state: state.clone(),
            updated_at: Utc::now(),
        };

        let json = serde_json::to_string_pretty(&saved).map_err(|source| StateError::Decode {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(|source| StateError::Io {
            path: self.path.clone(),
            source,
        })
    }

    /// Deletes the state file if it exists.
    pub fn delete(&self) -> Result<(), StateError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Deleted state file: {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }

    /// Discards any saved progress and returns a fresh state.
    ///
    /// Even a corrupt or foreign state file is removed.
    pub fn start_fresh(&self) -> Result<ExecutionState, StateError> {
        self.delete()?;
        Ok(ExecutionState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_state() -> ExecutionState {
        let mut state = ExecutionState {
            current_index: 1,
            ..Default::default()
        };
        state
            .captured_outputs
            .insert("NAME".to_string(), "Alice".to_string());
        state
    }

    #[test]
    fn test_load_missing_file_is_fresh() {
        let temp_dir = tempdir().unwrap();
        let store = StateStore::new(temp_dir.path().join("state.json"), "setup.workflow");

        let state = store.load_or_create().unwrap();
        assert_eq!(state, ExecutionState::default());
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = tempdir().unwrap();
        let store = StateStore::new(temp_dir.path().join("state.json"), "setup.workflow");

        store.save(&sample_state()).unwrap();
        let loaded = store.load_or_create().unwrap();

        assert_eq!(loaded.current_index, 1);
        assert_eq!(loaded.captured_outputs.get("NAME").map(String::as_str), Some("Alice"));
    }

    #[test]
    fn test_state_of_other_workflow_ignored() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("state.json");

        StateStore::new(&path, "one.workflow").save(&sample_state()).unwrap();
        let loaded = StateStore::new(&path, "two.workflow").load_or_create().unwrap();

        assert_eq!(loaded, ExecutionState::default());
    }

    #[test]
    fn test_corrupt_state_file_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();

        let result = StateStore::new(&path, "setup.workflow").load_or_create();
        assert!(matches!(result, Err(StateError::Decode { .. })));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let store = StateStore::new("/nonexistent/dir/state.json", "setup.workflow");
        let result = store.save(&sample_state());
        assert!(matches!(result, Err(StateError::Io { .. })));
    }

    #[test]
    fn test_delete() {
        let temp_dir = tempdir().unwrap();
        let store = StateStore::new(temp_dir.path().join("state.json"), "setup.workflow");

        // Deleting a missing file is fine
        store.delete().unwrap();

        store.save(&ExecutionState::default()).unwrap();
        assert!(store.path().exists());
        store.delete().unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_start_fresh_discards_saved_progress() {
        let temp_dir = tempdir().unwrap();
        let store = StateStore::new(temp_dir.path().join("state.json"), "setup.workflow");
        store.save(&sample_state()).unwrap();

        assert_eq!(store.start_fresh().unwrap(), ExecutionState::default());
        assert!(!store.path().exists());
        assert_eq!(store.load_or_create().unwrap(), ExecutionState::default());
    }

    #[test]
    fn test_start_fresh_removes_corrupt_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("state.json");
        fs::write(&path, "{ not json").unwrap();
        let store = StateStore::new(&path, "setup.workflow");

        assert_eq!(store.start_fresh().unwrap(), ExecutionState::default());
        assert!(store.load_or_create().is_ok());
    }
}
