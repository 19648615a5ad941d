// src/error.rs
//! Crate-level error type

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline and configuration operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Reading a candidate file failed
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The `.bak` copy could not be made; the file was not touched
    #[error("Failed to back up {path}: {source}")]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing the transformed file failed
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Source directory not found: {0}")]
    SourceNotFound(PathBuf),

    #[error("Invalid skip pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    /// Errors that abort the run instead of failing a single file
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Io { .. } | Self::Backup { .. } | Self::Write { .. })
    }
}
