//! Download error types.
//!
//! These errors are designed to be serializable and not depend on external
//! error types like `std::io::Error`. For I/O errors, we capture the kind
//! and message as strings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for download operations.
///
/// Plain data so hosts can serialize it and outcomes can compare it.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum DownloadError {
    /// I/O error during file operations.
    #[error("I/O error ({kind}): {message}")]
    Io {
        /// The kind of I/O error (e.g., "not found", "permission denied").
        kind: String,
        /// Detailed error message.
        message: String,
    },

    /// The track source could not list the item's tracks.
    #[error("Track listing failed for {item_id}: {message}")]
    TrackSource {
        /// Item whose tracks were requested.
        item_id: String,
        /// Detailed error message.
        message: String,
    },

    /// The transfer engine rejected or failed a request.
    #[error("Transfer engine error: {message}")]
    Engine {
        /// Detailed error message.
        message: String,
    },

    /// A single track transfer failed.
    #[error("Transfer of track {track_index} failed for {item_id}")]
    TransferFailed {
        /// Item whose track failed.
        item_id: String,
        /// Failed track index.
        track_index: u32,
    },

    /// The caller passed an unusable item id.
    #[error("Invalid item id: {value:?}")]
    InvalidItem {
        /// The rejected value.
        value: String,
    },

    /// General/uncategorized error.
    #[error("{message}")]
    Other {
        /// Error message.
        message: String,
    },
}

impl From<crate::paths::PathError> for DownloadError {
    fn from(err: crate::paths::PathError) -> Self {
        Self::io("downloads directory", err.to_string())
    }
}

impl DownloadError {
    /// Create an I/O error from kind and message strings.
    pub fn io(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Io {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error from a `std::io::Error`.
    ///
    /// This captures the error kind name and message for serialization.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        let kind = err.kind();
        Self::Io {
            kind: format!("{kind:?}"),
            message: err.to_string(),
        }
    }

    /// Create a track source error.
    pub fn track_source(item_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TrackSource {
            item_id: item_id.into(),
            message: message.into(),
        }
    }

    /// Create a transfer engine error.
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Create a transfer failure error.
    pub fn transfer_failed(item_id: impl Into<String>, track_index: u32) -> Self {
        Self::TransferFailed {
            item_id: item_id.into(),
            track_index,
        }
    }

    /// Create an invalid item error.
    pub fn invalid_item(value: impl Into<String>) -> Self {
        Self::InvalidItem {
            value: value.into(),
        }
    }

    /// Create a generic error.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Check if this error is recoverable (a fresh enqueue may succeed).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::TrackSource { .. } | Self::Engine { .. } | Self::TransferFailed { .. }
        )
    }

    /// Convert to a user-friendly message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Io { message, .. } => format!("File operation failed: {message}"),
            Self::TrackSource { message, .. } => {
                format!("Could not load the track list: {message}")
            }
            Self::Engine { message } => format!("The downloader reported an error: {message}"),
            Self::TransferFailed { track_index, .. } => {
                format!("Track {} could not be downloaded.", track_index + 1)
            }
            Self::InvalidItem { .. } => "This item cannot be downloaded.".to_string(),
            Self::Other { message } => message.clone(),
        }
    }
}
