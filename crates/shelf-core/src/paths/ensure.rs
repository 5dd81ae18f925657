//! Downloads directory preparation.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use super::error::PathError;

/// Marker written and removed again to prove the directory accepts files.
const WRITE_PROBE: &str = ".shelf_write_test";

/// Create the downloads directory (and parents) and check it is writable.
///
/// An existing regular file at `path` is an error; the scheduler never
/// replaces user files.
pub fn prepare_downloads_dir(path: &Path) -> Result<(), PathError> {
    if path.as_os_str().is_empty() {
        return Err(PathError::EmptyPath);
    }

    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path.to_path_buf()));
        }
    } else {
        fs::create_dir_all(path).map_err(|e| PathError::CreateFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "Created downloads directory");
    }

    verify_writable(path)
}

/// Write and remove a probe file inside `path`.
pub fn verify_writable(path: &Path) -> Result<(), PathError> {
    let probe = path.join(WRITE_PROBE);
    let not_writable = |reason: String| PathError::NotWritable {
        path: path.to_path_buf(),
        reason,
    };

    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&probe)
        .map_err(|e| not_writable(e.to_string()))?;
    file.write_all(b"ok").map_err(|e| not_writable(e.to_string()))?;
    drop(file);

    let _ = fs::remove_file(&probe);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_creates_nested_dirs_without_leaving_probe() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("books").join("audio");

        prepare_downloads_dir(&nested).unwrap();
        assert!(nested.is_dir());
        assert!(!nested.join(WRITE_PROBE).exists());
    }

    #[test]
    fn test_existing_dir_is_accepted() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("track_000.mp3"), b"audio").unwrap();

        prepare_downloads_dir(tmp.path()).unwrap();
        assert!(tmp.path().join("track_000.mp3").exists());
    }

    #[test]
    fn test_file_is_not_a_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file");
        fs::write(&file, b"x").unwrap();

        let result = prepare_downloads_dir(&file);
        assert!(matches!(result, Err(PathError::NotADirectory(_))));
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(matches!(
            prepare_downloads_dir(Path::new("")),
            Err(PathError::EmptyPath)
        ));
    }
}
