//! Checkpoint persistence
//!
//! Two independent cursors live in the data directory:
//! - `progress.json` — resolver checkpoint `{"current_index": i, "file_num": s}`
//! - `song_titles_progress.json` — crawler progress, the JSON string
//!   `"i: <i> File: <file_num>"`
//!
//! Both are replaced with write-temp-then-rename, so a save that returned
//! survives a crash.

use crate::models::{Checkpoint, CrawlProgress};
use regex::Regex;
use songpedia_common::{fs::write_json_atomic, Error, Result};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const CHECKPOINT_FILE: &str = "progress.json";
pub const CRAWL_PROGRESS_FILE: &str = "song_titles_progress.json";

/// Resolver checkpoint store
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    last_saved: Option<Checkpoint>,
}

impl CheckpointStore {
    pub fn new(data_dir: &Path) -> Self {
        Self::at(data_dir.join(CHECKPOINT_FILE))
    }

    pub fn at(path: PathBuf) -> Self {
        Self {
            path,
            last_saved: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint; absent file means `(0, 1)`.
    pub fn load(&self) -> Result<Checkpoint> {
        Ok(self.load_saved()?.unwrap_or_default())
    }

    /// Load the checkpoint, `None` when no run has saved one yet.
    ///
    /// A file that exists but does not decode is an error rather than a
    /// silent restart from the beginning.
    pub fn load_saved(&self) -> Result<Option<Checkpoint>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).map(Some).map_err(|e| {
                Error::InvalidInput(format!(
                    "Checkpoint {} is unreadable: {}",
                    self.path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Durably replace the checkpoint.
    ///
    /// Refuses to move backwards relative to the last value this store wrote.
    pub fn save(&mut self, checkpoint: Checkpoint) -> Result<()> {
        if let Some(last) = self.last_saved {
            if checkpoint < last {
                return Err(Error::Internal(format!(
                    "Checkpoint regression: ({}, {}) after ({}, {})",
                    checkpoint.current_index,
                    checkpoint.file_num,
                    last.current_index,
                    last.file_num
                )));
            }
        }

        write_json_atomic(&self.path, &checkpoint)?;
        self.last_saved = Some(checkpoint);
        tracing::trace!(
            current_index = checkpoint.current_index,
            file_num = checkpoint.file_num,
            "Checkpoint saved"
        );
        Ok(())
    }

    pub fn last_saved(&self) -> Option<Checkpoint> {
        self.last_saved
    }
}

/// Crawler progress store
#[derive(Debug)]
pub struct CrawlProgressStore {
    path: PathBuf,
}

impl CrawlProgressStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(CRAWL_PROGRESS_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last completed query, if any crawl has run.
    pub fn load(&self) -> Result<Option<CrawlProgress>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let text: String = serde_json::from_str(&content).map_err(|e| {
            Error::InvalidInput(format!(
                "Crawl progress {} is unreadable: {}",
                self.path.display(),
                e
            ))
        })?;

        parse_progress(&text).map(Some).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Crawl progress {} has unexpected content: {:?}",
                self.path.display(),
                text
            ))
        })
    }

    pub fn save(&self, progress: CrawlProgress) -> Result<()> {
        write_json_atomic(&self.path, &format_progress(progress))
    }
}

/// `"i: <i> File: <file_num>"`
pub fn format_progress(progress: CrawlProgress) -> String {
    format!("i: {} File: {}", progress.query_index, progress.file_num)
}

pub fn parse_progress(text: &str) -> Option<CrawlProgress> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"^\s*i:\s*(\d+)\s+File:\s*(\d+)\s*$").ok())
        .as_ref()?;

    let caps = pattern.captures(text)?;
    Some(CrawlProgress {
        query_index: caps[1].parse().ok()?,
        file_num: caps[2].parse().ok()?,
    })
}
