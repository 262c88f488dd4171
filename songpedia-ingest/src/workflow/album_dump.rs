//! Album article dump
//!
//! Looks up the article of every distinct album across all shards and writes
//! `{album_name: article_text | null}` to `songs.json`. No relevance filter
//! and no article store: this is a raw consolidated dump. On interrupt the
//! albums resolved so far are still written.

use crate::error::{IngestError, IngestResult};
use crate::services::Encyclopedia;
use crate::shards::ShardStore;
use songpedia_common::fs::write_atomic;
use std::collections::BTreeMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub const ALBUM_DUMP_FILE: &str = "songs.json";

/// Album name → article text (`None` when no article exists)
pub type AlbumArticles = BTreeMap<String, Option<String>>;

/// Resolve album articles for every shard and write them to `output`.
///
/// An interrupt writes the partial map, then returns `Interrupted`.
pub async fn dump_album_articles<E: Encyclopedia + ?Sized>(
    encyclopedia: &E,
    shards: &ShardStore,
    output: &Path,
    cancel: &CancellationToken,
) -> IngestResult<AlbumArticles> {
    let mut albums = AlbumArticles::new();
    let mut interrupted = false;

    'shards: for shard_id in shards.list()? {
        for record in shards.load(shard_id) {
            let album = record.album.name;
            if albums.contains_key(&album) {
                continue;
            }
            let lookup = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = encyclopedia.page(&album) => Some(result),
            };
            let Some(lookup) = lookup else {
                interrupted = true;
                break 'shards;
            };

            let article = match lookup {
                Ok(text) if !text.is_empty() => Some(text),
                Ok(_) => None,
                Err(e) => {
                    debug!(album = %album, error = %e, "No album article");
                    None
                }
            };
            info!(shard_id, album = %album, found = article.is_some(), "Album looked up");
            albums.insert(album, article);
        }
    }

    let json = serde_json::to_vec_pretty(&albums).map_err(songpedia_common::Error::from)?;
    write_atomic(output, &json)?;

    info!(
        albums = albums.len(),
        with_article = albums.values().filter(|a| a.is_some()).count(),
        output = %output.display(),
        interrupted,
        "Album dump written"
    );

    if interrupted {
        return Err(IngestError::Interrupted);
    }
    Ok(albums)
}
