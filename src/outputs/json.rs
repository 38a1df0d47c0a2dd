//! JSON output for the static site.
//!
//! Each run serializes its whole document and overwrites the previous file;
//! there are no incremental writes. When a backup is requested the existing
//! file is first copied next to it with a `.prev` suffix, giving one
//! generation of rollback:
//!
//! ```text
//! data/
//! ├── marketcap.json
//! └── marketcap.json.prev
//! ```

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{error, info, instrument};

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to create {}: {}", .path.display(), .source)]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to back up {}: {}", .path.display(), .source)]
    Backup {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}: {}", .path.display(), .source)]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// `news.json` -> `news.json.prev`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".prev");
    PathBuf::from(name)
}

/// Serialize `value` as pretty JSON and overwrite `path`.
///
/// # Arguments
///
/// * `path` - Output file; missing parent directories are created
/// * `value` - Document to serialize
/// * `backup` - Copy an existing file to [`backup_path`] before replacing it
///
/// # Returns
///
/// `Ok(())` once the whole document is on disk.
///
/// # Errors
///
/// Any failure is a [`WriteError`]; the run has nothing to show without
/// its output file, so callers treat it as fatal.
#[instrument(level = "info", skip_all, fields(path = %path.display(), backup = backup))]
pub async fn write_json<T: Serialize>(
    path: &Path,
    value: &T,
    backup: bool,
) -> Result<(), WriteError> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).await.map_err(|source| {
            error!(dir = %dir.display(), error = %source, "Failed to create output dir");
            WriteError::CreateDir {
                path: dir.to_path_buf(),
                source,
            }
        })?;
    }

    if backup && fs::try_exists(path).await.unwrap_or(false) {
        let prev = backup_path(path);
        fs::copy(path, &prev)
            .await
            .map_err(|source| WriteError::Backup {
                path: prev.clone(),
                source,
            })?;
        info!(prev = %prev.display(), "Backed up previous output");
    }

    fs::write(path, json)
        .await
        .map_err(|source| WriteError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    info!("Wrote JSON output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backup_path() {
        assert_eq!(
            backup_path(Path::new("data/marketcap.json")),
            PathBuf::from("data/marketcap.json.prev")
        );
    }

    #[tokio::test]
    async fn test_write_creates_dirs_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("site").join("data").join("news.json");

        write_json(&path, &json!({"run": 1}), false).await.unwrap();
        write_json(&path, &json!({"run": 2}), false).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["run"], 2);
        assert!(!backup_path(&path).exists());
    }

    #[tokio::test]
    async fn test_write_with_backup_keeps_previous_generation() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("marketcap.json");

        write_json(&path, &json!({"run": 1}), true).await.unwrap();
        assert!(!backup_path(&path).exists());

        write_json(&path, &json!({"run": 2}), true).await.unwrap();
        write_json(&path, &json!({"run": 3}), true).await.unwrap();

        let current: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let prev: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(backup_path(&path)).unwrap()).unwrap();
        assert_eq!(current["run"], 3);
        assert_eq!(prev["run"], 2);
    }

    #[tokio::test]
    async fn test_write_into_file_path_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, "not a dir").unwrap();

        let err = write_json(&blocker.join("news.json"), &json!({}), false)
            .await
            .unwrap_err();
        assert!(matches!(err, WriteError::CreateDir { .. }));
    }
}
