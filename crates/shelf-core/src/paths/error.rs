//! Path errors.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to resolve or prepare the downloads directory.
#[derive(Debug, Error)]
pub enum PathError {
    /// `~` was used but the platform reports no home directory.
    #[error("Cannot determine home directory")]
    NoHomeDir,

    #[error("Cannot determine system data directory")]
    NoDataDir,

    #[error("{0} exists but is not a directory")]
    NotADirectory(PathBuf),

    #[error("Failed to create directory {path}: {reason}")]
    CreateFailed { path: PathBuf, reason: String },

    /// The write probe could not be created.
    #[error("Directory {path} is not writable: {reason}")]
    NotWritable { path: PathBuf, reason: String },

    /// A configured path was blank.
    #[error("Path cannot be empty")]
    EmptyPath,

    /// A relative path could not be anchored.
    #[error("Cannot determine current directory: {0}")]
    CurrentDirError(String),
}
