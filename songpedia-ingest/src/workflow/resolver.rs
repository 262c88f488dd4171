//! Article resolver
//!
//! Walks shards from the checkpoint and produces at most one article row per
//! catalog record.
//!
//! # Per record
//! 1. Look up an article by track title, falling back to the album title
//! 2. Apply the relevance filter
//! 3. Insert-or-ignore accepted triples into the article store
//! 4. Advance the checkpoint to `(i + 1, shard_id)` whatever the outcome
//!
//! The checkpoint records work attempted, not work that succeeded. It is
//! written after the insert commits, so a crash between the two replays one
//! record and insert-or-ignore absorbs the replay.

use crate::checkpoint::CheckpointStore;
use crate::db::{ArticleStore, InsertOutcome};
use crate::error::{IngestError, IngestResult};
use crate::models::{CatalogRecord, Checkpoint};
use crate::services::{Encyclopedia, LookupError};
use crate::shards::ShardStore;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Token every accepted article must contain
pub const RELEVANCE_TOKEN: &str = "song";

/// Which title produced the article
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupSource {
    Title,
    Album,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArticle {
    pub source: LookupSource,
    pub text: String,
}

/// Decision for one catalog record
#[derive(Debug)]
pub enum ArticleOutcome {
    Accepted(ResolvedArticle),
    /// Neither title nor album has an article
    NotFound,
    /// An article was found but fails the relevance filter
    Irrelevant,
    /// Neither lookup produced an article and at least one failed in transport
    Transport(LookupError),
}

/// Relevance filter: the article mentions the track or the album, and the
/// word "song". Case-sensitive substring containment on the raw text.
pub fn is_relevant(article: &str, name: &str, album: &str) -> bool {
    (article.contains(name) || article.contains(album)) && article.contains(RELEVANCE_TOKEN)
}

async fn lookup<E: Encyclopedia + ?Sized>(encyclopedia: &E, title: &str) -> Result<String, LookupError> {
    let text = encyclopedia.page(title).await?;
    if text.is_empty() {
        return Err(LookupError::NotFound(title.to_string()));
    }
    Ok(text)
}

/// Resolve the article for one record: title first, album on failure
pub async fn resolve_article<E: Encyclopedia + ?Sized>(
    encyclopedia: &E,
    record: &CatalogRecord,
) -> ArticleOutcome {
    let name = record.name.as_str();
    let album = record.album_name();

    let resolved = match lookup(encyclopedia, name).await {
        Ok(text) => ResolvedArticle {
            source: LookupSource::Title,
            text,
        },
        Err(title_err) => {
            debug!(record_id = %record.id, title = %name, error = %title_err, "No article for title");
            match lookup(encyclopedia, album).await {
                Ok(text) => ResolvedArticle {
                    source: LookupSource::Album,
                    text,
                },
                Err(album_err) => {
                    debug!(record_id = %record.id, album = %album, error = %album_err, "No article for album");
                    return if title_err.is_transport() {
                        ArticleOutcome::Transport(title_err)
                    } else if album_err.is_transport() {
                        ArticleOutcome::Transport(album_err)
                    } else {
                        ArticleOutcome::NotFound
                    };
                }
            }
        }
    };

    if is_relevant(&resolved.text, name, album) {
        ArticleOutcome::Accepted(resolved)
    } else {
        ArticleOutcome::Irrelevant
    }
}

/// Statistics for one resolver run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveSummary {
    pub attempted: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub not_found: usize,
    pub irrelevant: usize,
    pub transport_failures: usize,
    pub store_failures: usize,
    pub shards_visited: usize,
}

/// Article resolver
pub struct Resolver<E> {
    encyclopedia: E,
    store: ArticleStore,
    shards: ShardStore,
    checkpoint: CheckpointStore,
}

impl<E: Encyclopedia> Resolver<E> {
    pub fn new(encyclopedia: E, store: ArticleStore, data_dir: &Path) -> Self {
        Self {
            encyclopedia,
            store,
            shards: ShardStore::new(data_dir),
            checkpoint: CheckpointStore::new(data_dir),
        }
    }

    pub fn encyclopedia(&self) -> &E {
        &self.encyclopedia
    }

    pub fn store(&self) -> &ArticleStore {
        &self.store
    }

    /// Start position: explicit overrides, else the saved checkpoint.
    ///
    /// Without a saved checkpoint the run starts at the lowest registered
    /// shard, so a consolidated sweep shard 0 is not skipped.
    pub fn start_position(
        &self,
        start_index: Option<usize>,
        start_shard: Option<u32>,
    ) -> IngestResult<Checkpoint> {
        let saved = match self.checkpoint.load_saved()? {
            Some(saved) => saved,
            None => {
                let mut initial = Checkpoint::default();
                if let Some(lowest) = self.shards.list()?.first() {
                    initial.file_num = initial.file_num.min(*lowest);
                }
                initial
            }
        };
        Ok(Checkpoint::new(
            start_index.unwrap_or(saved.current_index),
            start_shard.unwrap_or(saved.file_num),
        ))
    }

    /// Resolve every record from `(start_index, start_shard_id)` through the
    /// last shard `<= max_shard_id` (all shards when `None`).
    pub async fn resolve(
        &mut self,
        start_index: usize,
        start_shard_id: u32,
        max_shard_id: Option<u32>,
        cancel: &CancellationToken,
    ) -> IngestResult<ResolveSummary> {
        let shard_ids = self.shards.range(start_shard_id, max_shard_id)?;
        let mut summary = ResolveSummary::default();

        info!(
            start_index,
            start_shard_id,
            max_shard_id = ?max_shard_id,
            shards = shard_ids.len(),
            "Starting article resolution"
        );

        for shard_id in shard_ids {
            let records = self.shards.load(shard_id);
            let begin = if shard_id == start_shard_id { start_index } else { 0 };
            summary.shards_visited += 1;

            info!(shard_id, records = records.len(), begin, "Resolving shard");

            for (i, record) in records.iter().enumerate().skip(begin) {
                if cancel.is_cancelled() {
                    return Err(IngestError::Interrupted);
                }

                let outcome = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(IngestError::Interrupted),
                    outcome = resolve_article(&self.encyclopedia, record) => outcome,
                };

                self.apply(shard_id, i, record, outcome, &mut summary).await;
                self.checkpoint.save(Checkpoint::new(i + 1, shard_id))?;
            }
        }

        info!(
            attempted = summary.attempted,
            inserted = summary.inserted,
            duplicates = summary.duplicates,
            not_found = summary.not_found,
            irrelevant = summary.irrelevant,
            transport_failures = summary.transport_failures,
            store_failures = summary.store_failures,
            shards = summary.shards_visited,
            "Article resolution finished"
        );
        Ok(summary)
    }

    async fn apply(
        &self,
        shard_id: u32,
        index: usize,
        record: &CatalogRecord,
        outcome: ArticleOutcome,
        summary: &mut ResolveSummary,
    ) {
        summary.attempted += 1;

        let article = match outcome {
            ArticleOutcome::Accepted(article) => article,
            ArticleOutcome::NotFound => {
                summary.not_found += 1;
                debug!(shard_id, index, record_id = %record.id, "No article");
                return;
            }
            ArticleOutcome::Irrelevant => {
                summary.irrelevant += 1;
                debug!(shard_id, index, record_id = %record.id, "Article failed relevance filter");
                return;
            }
            ArticleOutcome::Transport(e) => {
                summary.transport_failures += 1;
                warn!(shard_id, index, record_id = %record.id, error = %e, "Article lookup failed");
                return;
            }
        };

        match self
            .store
            .insert_or_ignore(&record.id, &record.name, record.album_name(), &article.text)
            .await
        {
            Ok(InsertOutcome::Inserted) => {
                summary.inserted += 1;
                info!(
                    shard_id,
                    index,
                    record_id = %record.id,
                    name = %record.name,
                    source = ?article.source,
                    "Article stored"
                );
            }
            Ok(InsertOutcome::Duplicate) => summary.duplicates += 1,
            Err(e) => {
                // Record counts as attempted; the checkpoint still advances
                summary.store_failures += 1;
                error!(shard_id, index, record_id = %record.id, error = %e, "Database error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relevance_requires_song_token() {
        assert!(is_relevant("Yesterday is a song by the Beatles", "Yesterday", "Help!"));
        assert!(!is_relevant("Yesterday by the Beatles", "Yesterday", "Help!"));
    }

    #[test]
    fn test_relevance_accepts_album_mention() {
        assert!(is_relevant("Help! is an album; its title song", "Ticket to Ride", "Help!"));
        assert!(!is_relevant("An unrelated song article", "Ticket to Ride", "Help!"));
    }

    #[test]
    fn test_relevance_is_case_sensitive() {
        assert!(!is_relevant("yesterday is a song", "Yesterday", "Help!"));
        assert!(!is_relevant("Yesterday is a Song", "Yesterday", "Help!"));
        // "songwriter" contains the token
        assert!(is_relevant("Yesterday, by a songwriter", "Yesterday", "Help!"));
    }
}
