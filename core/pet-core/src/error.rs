//! Error types for pet-core operations.
//!
//! Nothing in this crate is fatal to the hosting process. Callers decide
//! whether an error degrades to "no signal this tick" or "defaults".

use std::path::PathBuf;

/// All errors that can occur in pet-core operations.
#[derive(Debug, thiserror::Error)]
pub enum PetError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeNotFound,

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Persistence Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Persisted progression unusable: {path}: {details}")]
    PersistenceCorruption { path: PathBuf, details: String },

    #[error("Persisted progression write failed: {path}: {details}")]
    PersistenceWriteFailed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Source Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    Source(#[from] SourceError),
}

/// Failure of a single observation source. Isolated per tick by the resolver.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    #[error("Probe unavailable: {0}")]
    Unavailable(String),

    #[error("Observation failed: {0}")]
    Observation(String),
}

/// Convenience type alias for Results using PetError.
pub type Result<T> = std::result::Result<T, PetError>;

impl From<PetError> for String {
    fn from(err: PetError) -> String {
        err.to_string()
    }
}
