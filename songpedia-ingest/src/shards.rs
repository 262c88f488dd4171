//! Shard files and shard manifest
//!
//! A shard is `song_titles<N>.json`, a JSON array of catalog records. The
//! crawler extends a shard once per completed query (read, extend, replace);
//! the resolver reads shards back in ascending id order.
//!
//! `shards.json` lists every shard id ever written so the resolver iterates
//! exactly the shards that exist instead of a hard-coded range.

use crate::models::CatalogRecord;
use serde::{Deserialize, Serialize};
use songpedia_common::{fs::write_json_atomic, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MANIFEST_FILE: &str = "shards.json";
const SHARD_PREFIX: &str = "song_titles";
const SHARD_SUFFIX: &str = ".json";

/// On-disk manifest of existing shard ids
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardManifest {
    pub shards: BTreeSet<u32>,
}

/// Shard files rooted in the data directory
///
/// Single writer only.
#[derive(Debug, Clone)]
pub struct ShardStore {
    dir: PathBuf,
}

impl ShardStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: data_dir.to_path_buf(),
        }
    }

    pub fn shard_path(&self, shard_id: u32) -> PathBuf {
        self.dir
            .join(format!("{}{}{}", SHARD_PREFIX, shard_id, SHARD_SUFFIX))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    /// Load a shard. Absent or undecodable shards read as empty.
    pub fn load(&self, shard_id: u32) -> Vec<CatalogRecord> {
        let path = self.shard_path(shard_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(shard_id, "Shard file not found, treating as empty");
                return Vec::new();
            }
            Err(e) => {
                warn!(shard_id, error = %e, "Shard file unreadable, treating as empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    shard_id,
                    path = %path.display(),
                    error = %e,
                    "Shard file is corrupt, treating as empty"
                );
                Vec::new()
            }
        }
    }

    /// Extend a shard with `records` and register it in the manifest.
    ///
    /// Returns the shard length after the write.
    pub fn append(&self, shard_id: u32, records: &[CatalogRecord]) -> Result<usize> {
        let mut existing = self.load(shard_id);
        existing.extend_from_slice(records);
        write_json_atomic(&self.shard_path(shard_id), &existing)?;
        self.register(shard_id)?;
        Ok(existing.len())
    }

    /// Replace a shard wholesale and register it in the manifest.
    pub fn write(&self, shard_id: u32, records: &[CatalogRecord]) -> Result<()> {
        write_json_atomic(&self.shard_path(shard_id), records)?;
        self.register(shard_id)
    }

    /// Read the manifest; `None` when missing or corrupt.
    pub fn load_manifest(&self) -> Option<ShardManifest> {
        let content = std::fs::read_to_string(self.manifest_path()).ok()?;
        match serde_json::from_str(&content) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!(error = %e, "Shard manifest is corrupt, ignoring it");
                None
            }
        }
    }

    fn register(&self, shard_id: u32) -> Result<()> {
        let mut manifest = self.load_manifest().unwrap_or_default();
        if manifest.shards.insert(shard_id) {
            write_json_atomic(&self.manifest_path(), &manifest)?;
            debug!(shard_id, "Registered shard in manifest");
        }
        Ok(())
    }

    /// Shard ids in ascending order, from the manifest or a directory scan.
    pub fn list(&self) -> Result<Vec<u32>> {
        if let Some(manifest) = self.load_manifest() {
            return Ok(manifest.shards.into_iter().collect());
        }

        warn!(
            dir = %self.dir.display(),
            "No shard manifest, discovering shards from file names"
        );
        self.discover()
    }

    fn discover(&self) -> Result<Vec<u32>> {
        let mut ids = BTreeSet::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let entry = entry?;
            if let Some(id) = entry.file_name().to_str().and_then(parse_shard_file_name) {
                ids.insert(id);
            }
        }
        Ok(ids.into_iter().collect())
    }

    /// Shard ids within `[start, max]` (`max = None` means unbounded).
    pub fn range(&self, start: u32, max: Option<u32>) -> Result<Vec<u32>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|id| *id >= start && max.map_or(true, |max| *id <= max))
            .collect())
    }
}

fn parse_shard_file_name(name: &str) -> Option<u32> {
    name.strip_prefix(SHARD_PREFIX)?
        .strip_suffix(SHARD_SUFFIX)?
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str) -> CatalogRecord {
        CatalogRecord::new(id, format!("Song {}", id), "Album")
    }

    #[test]
    fn test_append_extends_and_registers() {
        let dir = TempDir::new().unwrap();
        let store = ShardStore::new(dir.path());

        assert_eq!(store.append(3, &[record("a")]).unwrap(), 1);
        assert_eq!(store.append(3, &[record("b"), record("c")]).unwrap(), 3);

        let ids: Vec<String> = store.load(3).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(store.list().unwrap(), vec![3]);
        assert!(dir.path().join("song_titles3.json").exists());
    }

    #[test]
    fn test_corrupt_shard_is_empty_and_overwritten() {
        let dir = TempDir::new().unwrap();
        let store = ShardStore::new(dir.path());
        std::fs::write(store.shard_path(1), "[{\"id\": ").unwrap();

        assert!(store.load(1).is_empty());
        assert_eq!(store.append(1, &[record("a")]).unwrap(), 1);
        assert_eq!(store.load(1).len(), 1);
    }

    #[test]
    fn test_discovery_without_manifest() {
        let dir = TempDir::new().unwrap();
        let store = ShardStore::new(dir.path());
        for id in [2u32, 10, 1] {
            std::fs::write(store.shard_path(id), "[]").unwrap();
        }
        std::fs::write(dir.path().join("song_titles_progress.json"), "\"i: 0 File: 1\"").unwrap();
        std::fs::write(dir.path().join("song_titles.json"), "[]").unwrap();

        assert_eq!(store.list().unwrap(), vec![1, 2, 10]);
        assert_eq!(store.range(2, Some(9)).unwrap(), vec![2]);
        assert_eq!(store.range(2, None).unwrap(), vec![2, 10]);
    }

    #[test]
    fn test_manifest_wins_over_directory() {
        let dir = TempDir::new().unwrap();
        let store = ShardStore::new(dir.path());
        store.write(5, &[record("a")]).unwrap();
        std::fs::write(store.shard_path(6), "[]").unwrap();

        assert_eq!(store.list().unwrap(), vec![5]);
    }

    #[test]
    fn test_parse_shard_file_name() {
        assert_eq!(parse_shard_file_name("song_titles12.json"), Some(12));
        assert_eq!(parse_shard_file_name("song_titles.json"), None);
        assert_eq!(parse_shard_file_name("song_titles_progress.json"), None);
        assert_eq!(parse_shard_file_name("songs.json"), None);
    }
}
