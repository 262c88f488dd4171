//! Catalog crawler
//!
//! Materializes the catalog results for every query of an ordered query list
//! into shard files.
//!
//! # Per query
//! 1. Paginate the catalog (`limit` per page from offset 0) until a short
//!    page, or until the next offset reaches the service cap
//! 2. Extend the current shard with the query's records
//! 3. Persist crawler progress `(i, file_num)`
//! 4. Rotate to the next shard when `i mod K == 0`
//!
//! A catalog failure that survives the client's retries aborts the run; the
//! progress file still names the last completed query.

use crate::checkpoint::CrawlProgressStore;
use crate::error::{IngestError, IngestResult};
use crate::models::{rotates_after, CatalogRecord, CrawlProgress};
use crate::services::CatalogService;
use crate::shards::ShardStore;
use songpedia_common::config::CrawlConfig;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Crawl tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSettings {
    /// Queries per shard (K)
    pub shard_size: usize,
    pub page_limit: usize,
    pub max_offset: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self::from(&CrawlConfig::default())
    }
}

impl From<&CrawlConfig> for CrawlSettings {
    fn from(config: &CrawlConfig) -> Self {
        Self {
            shard_size: config.shard_size.max(1),
            page_limit: config.page_limit.max(1),
            max_offset: config.max_offset,
        }
    }
}

/// Statistics for one crawl run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub queries: usize,
    pub records: usize,
    pub shards_touched: BTreeSet<u32>,
    /// Queries whose results were cut off by the offset cap
    pub truncated_queries: usize,
}

/// Results of a single paginated query
#[derive(Debug, Clone, Default)]
pub struct QueryResults {
    pub records: Vec<CatalogRecord>,
    /// More results existed beyond the offset cap
    pub truncated: bool,
}

/// Catalog crawler
pub struct Crawler<C> {
    catalog: C,
    shards: ShardStore,
    progress: CrawlProgressStore,
    settings: CrawlSettings,
}

impl<C: CatalogService> Crawler<C> {
    pub fn new(catalog: C, data_dir: &Path, settings: CrawlSettings) -> Self {
        Self {
            catalog,
            shards: ShardStore::new(data_dir),
            progress: CrawlProgressStore::new(data_dir),
            settings,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Start position: explicit overrides, else the position following the
    /// progress file, else `(0, 1)`.
    pub fn resume_position(
        &self,
        start_query: Option<usize>,
        start_shard: Option<u32>,
    ) -> IngestResult<(usize, u32)> {
        let (saved_query, saved_shard) = match self.progress.load()? {
            Some(progress) => {
                let next = progress.next_position(self.settings.shard_size);
                info!(
                    last_query = progress.query_index,
                    last_shard = progress.file_num,
                    "Resuming crawl after saved progress"
                );
                next
            }
            None => (0, 1),
        };

        Ok((
            start_query.unwrap_or(saved_query),
            start_shard.unwrap_or(saved_shard),
        ))
    }

    /// Fetch every page of results for one query
    pub async fn fetch_all(
        &self,
        query: &str,
        cancel: &CancellationToken,
    ) -> IngestResult<QueryResults> {
        let limit = self.settings.page_limit;
        let mut results = QueryResults::default();
        let mut offset = 0;

        while offset < self.settings.max_offset {
            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(IngestError::Interrupted),
                fetched = self.catalog.search_tracks(query, limit, offset) => fetched,
            };
            let page = fetched.map_err(|source| IngestError::Catalog {
                query: query.to_string(),
                source,
            })?;

            debug!(
                query = %query,
                offset,
                slots = page.slots,
                records = page.records.len(),
                "Catalog page received"
            );
            let slots = page.slots;
            results.records.extend(page.records);

            // Null slots still count towards a full page
            if slots < limit {
                return Ok(results);
            }
            offset += limit;
        }

        results.truncated = true;
        debug!(query = %query, max_offset = self.settings.max_offset, "Query truncated at offset cap");
        Ok(results)
    }

    /// Crawl `queries[start_query_index..]`, writing into shards from
    /// `start_shard_id` onwards.
    pub async fn crawl(
        &self,
        queries: &[String],
        start_query_index: usize,
        start_shard_id: u32,
        cancel: &CancellationToken,
    ) -> IngestResult<CrawlSummary> {
        let mut summary = CrawlSummary::default();
        let mut file_num = start_shard_id;

        info!(
            total_queries = queries.len(),
            start_query_index,
            start_shard_id,
            shard_size = self.settings.shard_size,
            "Starting catalog crawl"
        );

        for (i, query) in queries.iter().enumerate().skip(start_query_index) {
            if cancel.is_cancelled() {
                return Err(IngestError::Interrupted);
            }

            let results = self.fetch_all(query, cancel).await?;
            let shard_len = self.shards.append(file_num, &results.records)?;
            self.progress.save(CrawlProgress {
                query_index: i,
                file_num,
            })?;

            info!(
                query_index = i,
                query = %query,
                records = results.records.len(),
                shard_id = file_num,
                shard_len,
                "Query complete"
            );

            summary.queries += 1;
            summary.records += results.records.len();
            summary.shards_touched.insert(file_num);
            if results.truncated {
                summary.truncated_queries += 1;
            }

            if rotates_after(i, self.settings.shard_size) {
                file_num += 1;
                debug!(next_shard = file_num, "Rotating shard");
            }
        }

        info!(
            queries = summary.queries,
            records = summary.records,
            shards = summary.shards_touched.len(),
            truncated = summary.truncated_queries,
            "Catalog crawl finished"
        );
        Ok(summary)
    }

    /// Alphabetical sweep: query 'A'..='Z', keep the first record per title,
    /// and replace `shard_id` with the consolidated list.
    pub async fn sweep(
        &self,
        shard_id: u32,
        cancel: &CancellationToken,
    ) -> IngestResult<CrawlSummary> {
        let mut summary = CrawlSummary::default();
        let mut songs = Vec::new();

        for letter in 'A'..='Z' {
            if cancel.is_cancelled() {
                return Err(IngestError::Interrupted);
            }

            let query = letter.to_string();
            let results = self.fetch_all(&query, cancel).await?;
            info!(query = %query, records = results.records.len(), "Sweep query complete");

            summary.queries += 1;
            if results.truncated {
                summary.truncated_queries += 1;
            }
            songs.extend(results.records);
        }

        let unique = unique_by_title(songs);
        self.shards.write(shard_id, &unique)?;

        summary.records = unique.len();
        summary.shards_touched.insert(shard_id);
        info!(shard_id, unique_titles = unique.len(), "Alphabetical sweep written");
        Ok(summary)
    }
}

/// First record per distinct `name`, in original order
pub fn unique_by_title(records: Vec<CatalogRecord>) -> Vec<CatalogRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|record| seen.insert(record.name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_by_title_keeps_first() {
        let records = vec![
            CatalogRecord::new("1", "Hello", "A"),
            CatalogRecord::new("2", "Halo", "B"),
            CatalogRecord::new("3", "Hello", "C"),
        ];
        let unique = unique_by_title(records);
        let ids: Vec<&str> = unique.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_settings_clamp_zero() {
        let settings = CrawlSettings::from(&CrawlConfig {
            shard_size: 0,
            page_limit: 0,
            max_offset: 1000,
        });
        assert_eq!(settings.shard_size, 1);
        assert_eq!(settings.page_limit, 1);
    }
}
