//! Storage configuration and path management for Claude Pet.
//!
//! Production code uses [`StorageConfig::from_home`], which points at
//! `~/.claude-pet/`. Tests use [`StorageConfig::with_root`] with a temp dir.

use std::path::{Path, PathBuf};

use crate::error::{PetError, Result};

const ROOT_DIR_NAME: &str = ".claude-pet";

/// Central configuration for all Claude Pet storage paths.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    root: PathBuf,
}

impl StorageConfig {
    /// Resolves the default root under the user's home directory.
    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir().ok_or(PetError::HomeNotFound)?;
        Ok(Self {
            root: home.join(ROOT_DIR_NAME),
        })
    }

    /// Creates a StorageConfig with a custom root directory.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to config.toml (observer toggles, cadences, thresholds).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// Path to progression.json (persisted XP/level state).
    pub fn progression_file(&self) -> PathBuf {
        self.root.join("progression.json")
    }

    /// Path to the daemon's Unix socket.
    pub fn socket_file(&self) -> PathBuf {
        self.root.join("daemon.sock")
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Directories
    // ─────────────────────────────────────────────────────────────────────────────

    /// Path to logs/ (hook debug logs).
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
