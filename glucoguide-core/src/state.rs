//! Application state container.
//!
//! Only the session is persisted. The container is created by [`AppState::hydrate`],
//! which loads the persisted slice from disk before anything can read it.
//!
//! ```text
//! <DATA_DIR>/
//!   state.json     {"session": {...} | null}
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::identity::{IdentityProvider, Session};

/// The subset of application state that survives restarts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default)]
    pub session: Option<Session>,
}

/// Errors that can occur loading or saving the persisted state.
#[derive(Debug)]
pub enum StateError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_json::Error),
    WriteError(PathBuf, std::io::Error),
}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateError::ReadError(path, e) => {
                write!(f, "Failed to read state file '{}': {}", path.display(), e)
            }
            StateError::ParseError(path, e) => {
                write!(f, "Failed to parse state file '{}': {}", path.display(), e)
            }
            StateError::WriteError(path, e) => {
                write!(f, "Failed to write state file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for StateError {}

/// Holds the identity provider seeded from the persisted session.
#[derive(Debug, Clone)]
pub struct AppState {
    path: PathBuf,
    identity: IdentityProvider,
}

impl AppState {
    /// Loads `path` (a missing file means a fresh install) and builds the state.
    pub fn hydrate(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let persisted = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| StateError::ReadError(path.clone(), e))?;
            serde_json::from_str::<PersistedState>(&contents)
                .map_err(|e| StateError::ParseError(path.clone(), e))?
        } else {
            PersistedState::default()
        };

        tracing::debug!(
            path = %path.display(),
            signed_in = persisted.session.is_some(),
            "hydrated app state"
        );
        Ok(Self {
            path,
            identity: IdentityProvider::new(persisted.session),
        })
    }

    pub fn identity(&self) -> &IdentityProvider {
        &self.identity
    }

    pub fn session(&self) -> Option<Session> {
        self.identity.current()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the persisted slice. Uses a temp file and rename so a crash
    /// never leaves a truncated state file.
    pub fn save(&self) -> Result<(), StateError> {
        let persisted = PersistedState {
            session: self.identity.current(),
        };
        let json = serde_json::to_string_pretty(&persisted)
            .map_err(|e| StateError::ParseError(self.path.clone(), e))?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StateError::WriteError(parent.to_path_buf(), e))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| StateError::WriteError(tmp.clone(), e))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| StateError::WriteError(self.path.clone(), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_hydrate_missing_file_is_logged_out() {
        let temp = TempDir::new().unwrap();
        let state = AppState::hydrate(temp.path().join("state.json")).unwrap();
        assert!(state.session().is_none());
    }

    #[test]
    fn test_session_survives_save_and_hydrate() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("state.json");

        let state = AppState::hydrate(&path).unwrap();
        state.identity().sign_in("u1", "a@example.com").unwrap();
        state.save().unwrap();

        let restored = AppState::hydrate(&path).unwrap();
        assert_eq!(restored.session().unwrap().owner_id(), "u1");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_sign_out_is_persisted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");

        let state = AppState::hydrate(&path).unwrap();
        state.identity().sign_in_anonymously();
        state.save().unwrap();
        state.identity().sign_out();
        state.save().unwrap();

        assert!(AppState::hydrate(&path).unwrap().session().is_none());
    }

    #[test]
    fn test_corrupt_state_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = AppState::hydrate(&path).unwrap_err();
        assert!(matches!(err, StateError::ParseError(_, _)));
    }
}
