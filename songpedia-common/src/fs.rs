//! Durable file replacement
//!
//! Every on-disk artifact (checkpoint, crawler progress, shard files, manifest,
//! TOML config) is replaced through [`write_atomic`]: once it returns, a crash
//! leaves either the old or the new content on disk, never a torn file.

use crate::Result;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Replace `path` with `contents` via write-temp, fsync, rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path_for(path);
    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    sync_parent_dir(path);
    Ok(())
}

/// Serialize `value` as JSON and replace `path` with it.
pub fn write_json_atomic<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    write_atomic(path, &bytes)
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// Directory fsync makes the rename itself durable; unsupported on Windows.
#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        let dir = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(handle) = File::open(dir) {
            if let Err(e) = handle.sync_all() {
                tracing::debug!(dir = %dir.display(), error = %e, "Directory fsync failed");
            }
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("progress.json");

        write_atomic(&path, b"first").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");

        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");

        // No temp file left behind
        assert!(!dir.path().join("nested").join("progress.json.tmp").exists());
    }

    #[test]
    fn test_write_json_atomic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("value.json");

        write_json_atomic(&path, &serde_json::json!({"current_index": 3})).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed["current_index"], 3);
    }
}
