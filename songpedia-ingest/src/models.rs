//! Pipeline data model
//!
//! Catalog records flow from the crawler into shard files and from shard
//! files into the resolver. Fields beyond `id`, `name` and `album.name` are
//! carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Track record as returned by the catalog service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Opaque catalog track id
    pub id: String,
    /// Track title
    pub name: String,
    pub album: AlbumRef,
    /// Remaining catalog fields, passed through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Album reference embedded in a catalog record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumRef {
    /// Album title
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CatalogRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>, album: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            album: AlbumRef {
                name: album.into(),
                extra: Map::new(),
            },
            extra: Map::new(),
        }
    }

    pub fn album_name(&self) -> &str {
        &self.album.name
    }
}

/// Validated (song, album, article) triple persisted in the article store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRow {
    pub id: String,
    pub name: String,
    pub album: String,
    pub article: String,
}

/// Resolver cursor: every record strictly before `(file_num, current_index)`
/// has been attempted.
///
/// Ordered by shard first, then position within the shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(default)]
    pub current_index: usize,
    #[serde(default = "first_shard")]
    pub file_num: u32,
}

fn first_shard() -> u32 {
    1
}

impl Default for Checkpoint {
    fn default() -> Self {
        Self {
            current_index: 0,
            file_num: first_shard(),
        }
    }
}

impl Checkpoint {
    pub fn new(current_index: usize, file_num: u32) -> Self {
        Self {
            current_index,
            file_num,
        }
    }
}

impl Ord for Checkpoint {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.file_num, self.current_index).cmp(&(other.file_num, other.current_index))
    }
}

impl PartialOrd for Checkpoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Last query the crawler completed and the shard it wrote to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlProgress {
    pub query_index: usize,
    pub file_num: u32,
}

impl CrawlProgress {
    /// Position to resume from: the following query, in the shard the
    /// rotation rule selects after `query_index`.
    pub fn next_position(&self, shard_size: usize) -> (usize, u32) {
        let file_num = if rotates_after(self.query_index, shard_size) {
            self.file_num + 1
        } else {
            self.file_num
        };
        (self.query_index + 1, file_num)
    }
}

/// Shard rotation rule: the crawler moves to the next shard after query `i`
/// when `i mod K == 0`.
pub fn rotates_after(query_index: usize, shard_size: usize) -> bool {
    shard_size > 0 && query_index % shard_size == 0
}
