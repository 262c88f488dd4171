//! songpedia-ingest: song article corpus pipeline
//!
//! Builds a local corpus of song articles in three resumable stages:
//!
//! 1. **Crawl**: paginated catalog queries materialized into shard files
//!    (`song_titles<N>.json`), progress in `song_titles_progress.json`
//! 2. **Resolve**: each shard record looked up in the encyclopedia (title,
//!    then album), relevance-filtered and stored in `songs.db`, with the
//!    position checkpointed in `progress.json` after every record
//! 3. **Analyze**: pairwise article similarity by named-entity overlap and
//!    document similarity
//!
//! Every stage can be killed and restarted without losing or duplicating
//! work.

pub mod analysis;
pub mod checkpoint;
pub mod db;
pub mod error;
pub mod models;
pub mod queries;
pub mod services;
pub mod shards;
pub mod utils;
pub mod workflow;

pub use error::{IngestError, IngestResult};
pub use models::{ArticleRow, CatalogRecord, Checkpoint, CrawlProgress};
