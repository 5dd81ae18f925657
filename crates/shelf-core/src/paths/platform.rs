//! Platform-specific path helpers.

use std::env;
use std::path::PathBuf;

use super::error::PathError;

/// Application name used for platform data directories.
const APP_DIR_NAME: &str = "shelf";

/// Root directory for application data (e.g. `~/.local/share/shelf`).
pub fn data_root() -> Result<PathBuf, PathError> {
    let data_dir = dirs::data_local_dir().ok_or(PathError::NoDataDir)?;
    Ok(data_dir.join(APP_DIR_NAME))
}

/// Expand `~`, trim whitespace and make the path absolute.
pub(super) fn normalize_user_path(raw: &str) -> Result<PathBuf, PathError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathError::EmptyPath);
    }

    let expanded = if trimmed.starts_with("~/") || trimmed == "~" {
        let home = dirs::home_dir().ok_or(PathError::NoHomeDir)?;
        if trimmed == "~" {
            home
        } else {
            home.join(trimmed.trim_start_matches("~/"))
        }
    } else {
        PathBuf::from(trimmed)
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(expanded))
            .map_err(|e| PathError::CurrentDirError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_path_rejected() {
        assert!(matches!(normalize_user_path("  "), Err(PathError::EmptyPath)));
    }

    #[test]
    fn test_relative_path_made_absolute() {
        let path = normalize_user_path("books").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("books"));
    }
}
