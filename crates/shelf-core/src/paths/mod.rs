//! Path utilities for shelf data directories and user-configurable locations.
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError` for clear error handling
//! - No interactive/terminal I/O - adapters handle user prompts separately
//! - OS-specific logic is kept private in `platform`

mod downloads;
mod ensure;
mod error;
mod platform;

// Error type
pub use error::PathError;

// Platform roots
pub use platform::data_root;

// Downloads directory
pub use downloads::{
    DOWNLOADS_DIR_ENV, DownloadsDirResolution, DownloadsDirSource, default_downloads_dir,
    resolve_downloads_dir,
};

// Directory creation
pub use ensure::{prepare_downloads_dir, verify_writable};
