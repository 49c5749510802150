//! # World Error Types
//!
//! Errors surfaced by configuration loading and persistence. Generation, streaming, the
//! overlay and gravity are total and never fail.

use thiserror::Error;

/// Errors that can occur while configuring, saving or loading a world.
#[derive(Error, Debug)]
pub enum WorldError {
    /// Save data carries no seed.
    #[error("save data has no seed")]
    MissingSeed,

    /// Save data is present but unusable.
    #[error("invalid save data: {0}")]
    InvalidSaveData(String),

    /// Save data was written by an incompatible version.
    #[error("unsupported save version: {0}")]
    UnsupportedVersion(String),

    /// No save exists under the given name.
    #[error("world not found: {0}")]
    WorldNotFound(String),

    /// Configuration values are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Filesystem or thread error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON could not be parsed or written.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for world operations.
pub type WorldResult<T> = Result<T, WorldError>;
