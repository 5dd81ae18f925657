//! Downloads directory resolution.
//!
//! Provides utilities for resolving the downloads directory from explicit
//! paths, environment variables, or platform defaults.

use std::env;
use std::path::PathBuf;

use super::error::PathError;
use super::platform::{data_root, normalize_user_path};

/// Environment variable overriding the downloads directory.
pub const DOWNLOADS_DIR_ENV: &str = "SHELF_DOWNLOADS_DIR";

/// How the downloads directory was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadsDirSource {
    /// The caller passed an explicit path (settings, CLI flag).
    Explicit,
    /// The path came from `SHELF_DOWNLOADS_DIR`.
    EnvVar,
    /// Fallback default under the platform data directory.
    Default,
}

/// Resolution result for the downloads directory.
#[derive(Debug, Clone)]
pub struct DownloadsDirResolution {
    /// The resolved path to the downloads directory.
    pub path: PathBuf,
    /// How the path was determined.
    pub source: DownloadsDirSource,
}

/// Return the platform-specific default downloads directory.
///
/// Defaults to `<data_local_dir>/shelf/downloads`.
pub fn default_downloads_dir() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join("downloads"))
}

/// Resolve the downloads directory from an explicit override, env var, or default.
///
/// Resolution order:
/// 1. Explicit path provided by caller (highest priority)
/// 2. `SHELF_DOWNLOADS_DIR` environment variable
/// 3. Default downloads directory
pub fn resolve_downloads_dir(explicit: Option<&str>) -> Result<DownloadsDirResolution, PathError> {
    if let Some(path_str) = explicit {
        return Ok(DownloadsDirResolution {
            path: normalize_user_path(path_str)?,
            source: DownloadsDirSource::Explicit,
        });
    }

    if let Ok(env_path) = env::var(DOWNLOADS_DIR_ENV) {
        if !env_path.trim().is_empty() {
            tracing::debug!(path = %env_path, "Using downloads directory from environment");
            return Ok(DownloadsDirResolution {
                path: normalize_user_path(&env_path)?,
                source: DownloadsDirSource::EnvVar,
            });
        }
    }

    Ok(DownloadsDirResolution {
        path: default_downloads_dir()?,
        source: DownloadsDirSource::Default,
    })
}
