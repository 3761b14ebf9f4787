//! File-backed progression persistence.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 2,
//!   "total_xp": 1820,
//!   "level": 2,
//!   "skills": { "coding": { "xp": 40, "level": 3 } },
//!   "total_active_ms": 364000,
//!   "sessions": 4
//! }
//! ```
//!
//! # Recovery
//!
//! - Missing file → fresh state.
//! - Empty or corrupt JSON → fresh state, logged.
//! - Version mismatch → fresh state, logged. No partial migration.
//! - Same version with missing skill keys → keys filled with zero records,
//!   existing progress kept.
//! - The stored overall level is ignored and rebuilt from `total_xp`.
//!
//! # Atomic Writes
//!
//! Temp file in the same directory + rename, so a crash mid-write leaves the
//! previous file intact.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::ladder::overall_level_for;
use super::state::ProgressionState;
use crate::error::{PetError, Result};

pub const PROGRESSION_VERSION: u32 = 2;

#[derive(Debug, Serialize, Deserialize)]
struct ProgressionFile {
    version: u32,
    #[serde(flatten)]
    state: ProgressionState,
}

#[derive(Debug, Deserialize)]
struct VersionHeader {
    #[serde(default)]
    version: Option<u32>,
}

/// Where progression lives. In-memory stores never touch disk (tests).
#[derive(Debug, Clone)]
pub struct ProgressionStore {
    file_path: Option<PathBuf>,
}

impl ProgressionStore {
    pub fn new(file_path: &Path) -> Self {
        Self {
            file_path: Some(file_path.to_path_buf()),
        }
    }

    pub fn new_in_memory() -> Self {
        Self { file_path: None }
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Strict read: `Ok(None)` when nothing is stored, an error when the file
    /// exists but can't be used.
    pub fn read(&self) -> Result<Option<ProgressionState>> {
        let Some(path) = &self.file_path else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| PetError::Io {
            context: format!("reading {}", path.display()),
            source,
        })?;
        if content.trim().is_empty() {
            return Err(corruption(path, "file is empty"));
        }

        let header: VersionHeader =
            serde_json::from_str(&content).map_err(|err| corruption(path, err.to_string()))?;
        match header.version {
            Some(PROGRESSION_VERSION) => {}
            Some(other) => {
                return Err(corruption(
                    path,
                    format!("unsupported version {other} (expected {PROGRESSION_VERSION})"),
                ))
            }
            None => return Err(corruption(path, "missing version")),
        }

        let file: ProgressionFile =
            serde_json::from_str(&content).map_err(|err| corruption(path, err.to_string()))?;
        Ok(Some(file.state))
    }

    /// Lenient read used at startup. Never fails; unusable data degrades to
    /// a fresh state. The result is normalized (missing skills filled, level
    /// loops re-run).
    pub fn load_or_default(&self) -> ProgressionState {
        let mut state = match self.read() {
            Ok(Some(state)) => state,
            Ok(None) => {
                debug!("No persisted progression; starting fresh");
                ProgressionState::default()
            }
            Err(err) => {
                warn!(error = %err, "Persisted progression unusable; starting fresh");
                ProgressionState::default()
            }
        };
        normalize(&mut state);
        state
    }

    pub fn save(&self, state: &ProgressionState) -> Result<()> {
        let Some(path) = &self.file_path else {
            return Ok(());
        };

        let file = ProgressionFile {
            version: PROGRESSION_VERSION,
            state: state.clone(),
        };
        let content = serde_json::to_string_pretty(&file).map_err(|source| PetError::Json {
            context: "serializing progression".to_string(),
            source,
        })?;

        let parent_dir = path
            .parent()
            .ok_or_else(|| write_failed(path, "path has no parent directory"))?;
        fs::create_dir_all(parent_dir).map_err(|err| write_failed(path, err.to_string()))?;
        let mut temp_file =
            NamedTempFile::new_in(parent_dir).map_err(|err| write_failed(path, err.to_string()))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|err| write_failed(path, err.to_string()))?;
        temp_file
            .flush()
            .map_err(|err| write_failed(path, err.to_string()))?;
        temp_file
            .persist(path)
            .map_err(|err| write_failed(path, err.error.to_string()))?;
        Ok(())
    }
}

fn normalize(state: &mut ProgressionState) {
    let added = state.fill_missing_skills();
    if added > 0 {
        debug!(added, "Filled missing skill records");
    }
    for record in state.skills.values_mut() {
        record.repair();
    }
    // The overall level is derived from lifetime XP; the stored one is a cache.
    let rebuilt = overall_level_for(state.total_xp);
    if rebuilt != state.level {
        debug!(stored = state.level, rebuilt, "Rebuilt overall level from lifetime XP");
    }
    state.level = rebuilt;
}

fn corruption(path: &Path, details: impl Into<String>) -> PetError {
    PetError::PersistenceCorruption {
        path: path.to_path_buf(),
        details: details.into(),
    }
}

fn write_failed(path: &Path, details: impl Into<String>) -> PetError {
    PetError::PersistenceWriteFailed {
        path: path.to_path_buf(),
        details: details.into(),
    }
}
