//! Test Helper Utilities
//!
//! In-process stand-ins for the catalog and encyclopedia services, plus
//! data-directory seeding helpers.

#![allow(dead_code)]

use async_trait::async_trait;
use songpedia_ingest::db::{ArticleStore, DATABASE_FILE};
use songpedia_ingest::services::{
    CatalogError, CatalogService, Encyclopedia, LookupError, TrackPage,
};
use songpedia_ingest::shards::ShardStore;
use songpedia_ingest::CatalogRecord;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

// =============================================================================
// Catalog
// =============================================================================

/// Catalog answering from a fixed result list per query
#[derive(Default)]
pub struct FakeCatalog {
    /// Result slots per query; `None` is a null slot
    results: HashMap<String, Vec<Option<CatalogRecord>>>,
    /// Queries that always produce full pages
    endless: HashSet<String>,
    failing: HashSet<String>,
    calls: Mutex<Vec<(String, usize, usize)>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` records `"<query>-<n>"` for `query`
    pub fn with_query(mut self, query: &str, count: usize) -> Self {
        let records = (0..count)
            .map(|n| {
                Some(CatalogRecord::new(
                    format!("{}-{}", query, n),
                    format!("{} track {}", query, n),
                    format!("{} album", query),
                ))
            })
            .collect();
        self.results.insert(query.to_string(), records);
        self
    }

    pub fn with_records(mut self, query: &str, records: Vec<CatalogRecord>) -> Self {
        self.results
            .insert(query.to_string(), records.into_iter().map(Some).collect());
        self
    }

    /// Replace the slot at `position` of `query`'s results with a null
    pub fn with_null_slot(mut self, query: &str, position: usize) -> Self {
        if let Some(slot) = self
            .results
            .get_mut(query)
            .and_then(|slots| slots.get_mut(position))
        {
            *slot = None;
        }
        self
    }

    pub fn with_endless_query(mut self, query: &str) -> Self {
        self.endless.insert(query.to_string());
        self
    }

    pub fn with_failing_query(mut self, query: &str) -> Self {
        self.failing.insert(query.to_string());
        self
    }

    /// `(query, limit, offset)` of every call, in order
    pub fn calls(&self) -> Vec<(String, usize, usize)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn queries_called(&self) -> Vec<String> {
        let mut queries: Vec<String> = Vec::new();
        for (query, _, _) in self.calls() {
            if queries.last() != Some(&query) {
                queries.push(query);
            }
        }
        queries
    }
}

#[async_trait]
impl CatalogService for FakeCatalog {
    async fn search_tracks(
        &self,
        query: &str,
        limit: usize,
        offset: usize,
    ) -> Result<TrackPage, CatalogError> {
        self.calls
            .lock()
            .unwrap()
            .push((query.to_string(), limit, offset));

        if self.failing.contains(query) {
            return Err(CatalogError::Api(503, "Service Unavailable".to_string()));
        }

        if self.endless.contains(query) {
            return Ok(TrackPage::from_slots(
                (offset..offset + limit)
                    .map(|n| {
                        Some(CatalogRecord::new(
                            format!("{}-{}", query, n),
                            format!("{} {}", query, n),
                            "Endless",
                        ))
                    })
                    .collect(),
            ));
        }

        let slots = self.results.get(query).cloned().unwrap_or_default();
        Ok(TrackPage::from_slots(
            slots.into_iter().skip(offset).take(limit).collect(),
        ))
    }
}

// =============================================================================
// Encyclopedia
// =============================================================================

/// Encyclopedia answering from a title → article map
#[derive(Default)]
pub struct FakeEncyclopedia {
    pages: HashMap<String, String>,
    transport_failures: HashSet<String>,
    calls: Mutex<Vec<String>>,
    /// Cancel the token once this many lookups have been served
    cancel_after: Option<(usize, CancellationToken)>,
}

impl FakeEncyclopedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, title: &str, text: &str) -> Self {
        self.pages.insert(title.to_string(), text.to_string());
        self
    }

    pub fn with_transport_failure(mut self, title: &str) -> Self {
        self.transport_failures.insert(title.to_string());
        self
    }

    pub fn cancel_after(mut self, lookups: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((lookups, token));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Encyclopedia for FakeEncyclopedia {
    async fn page(&self, title: &str) -> Result<String, LookupError> {
        let served = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(title.to_string());
            calls.len()
        };
        if let Some((limit, token)) = &self.cancel_after {
            if served >= *limit {
                token.cancel();
            }
        }

        if self.transport_failures.contains(title) {
            return Err(LookupError::Network("connection reset".to_string()));
        }
        self.pages
            .get(title)
            .cloned()
            .ok_or_else(|| LookupError::NotFound(title.to_string()))
    }
}

// =============================================================================
// Data directory
// =============================================================================

pub fn record(id: &str, name: &str, album: &str) -> CatalogRecord {
    CatalogRecord::new(id, name, album)
}

/// Write shards and register them in the manifest
pub fn seed_shards(data_dir: &Path, shards: &[(u32, Vec<CatalogRecord>)]) {
    let store = ShardStore::new(data_dir);
    for (id, records) in shards {
        store.write(*id, records).unwrap();
    }
}

pub async fn open_store(data_dir: &Path) -> ArticleStore {
    ArticleStore::open_exclusive(&data_dir.join(DATABASE_FILE))
        .await
        .unwrap()
}

/// Sorted `(id, name, album, article)` rows
pub async fn store_rows(store: &ArticleStore) -> Vec<(String, String, String, String)> {
    let mut rows: Vec<_> = store
        .all()
        .await
        .unwrap()
        .into_iter()
        .map(|row| (row.id, row.name, row.album, row.article))
        .collect();
    rows.sort();
    rows
}
