//src/storage.rs
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::APP_DIR_NAME;
use crate::models::AppState;

const DATA_FILE_NAME: &str = "app_data.json";
const DATA_ENV_VAR: &str = "OVERLOAD_DATA_DIR";

// Custom Error type for store operations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to get application data directory")]
    DataDir,
    #[error("I/O error accessing data file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Data file {path:?} is not a valid store: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to serialize application state: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Gets the path to the JSON store file.
/// Exposed at crate root as `get_data_path_util`
pub fn get_data_path() -> Result<PathBuf, StorageError> {
    let app_dir = if let Ok(dir) = std::env::var(DATA_ENV_VAR) {
        PathBuf::from(dir)
    } else {
        dirs::data_dir()
            .ok_or(StorageError::DataDir)?
            .join(APP_DIR_NAME)
    };
    if !app_dir.exists() {
        fs::create_dir_all(&app_dir).map_err(|source| StorageError::Io {
            path: app_dir.clone(),
            source,
        })?;
    }
    Ok(app_dir.join(DATA_FILE_NAME))
}

/// Owns the single in-memory `AppState` and its backing JSON file.
#[derive(Debug)]
pub struct Storage {
    path: PathBuf,
    state: AppState,
    pretty: bool,
}

impl Storage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: AppState::default(),
            pretty: true,
        }
    }

    #[must_use]
    pub const fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the store into memory.
    ///
    /// A missing file is a first run and leaves the defaults in place. An
    /// unreadable or unparseable file also resets to defaults, but the error is
    /// returned so the caller can report it.
    pub fn load(&mut self) -> Result<(), StorageError> {
        self.state = AppState::default();

        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                log::debug!("No store at {}, starting fresh", self.path.display());
                return Ok(());
            }
            Err(source) => {
                return Err(StorageError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let state: AppState =
            serde_json::from_str(&content).map_err(|source| StorageError::Parse {
                path: self.path.clone(),
                source,
            })?;
        self.state = state;
        log::debug!(
            "Loaded {} program(s) and {} history session(s) from {}",
            self.state.programs.len(),
            self.state.workout_history.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Serializes the whole state and overwrites the store.
    pub fn save(&self) -> Result<(), StorageError> {
        let content = if self.pretty {
            serde_json::to_string_pretty(&self.state)
        } else {
            serde_json::to_string(&self.state)
        }
        .map_err(StorageError::Serialize)?;

        if let Some(parent_dir) = self.path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                fs::create_dir_all(parent_dir).map_err(|source| StorageError::Io {
                    path: parent_dir.to_path_buf(),
                    source,
                })?;
            }
        }
        fs::write(&self.path, content).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })?;
        log::debug!("Saved state to {}", self.path.display());
        Ok(())
    }

    pub const fn get(&self) -> &AppState {
        &self.state
    }

    pub fn get_mut(&mut self) -> &mut AppState {
        &mut self.state
    }

    pub fn set(&mut self, new_state: AppState) {
        self.state = new_state;
    }
}
