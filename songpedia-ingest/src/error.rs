//! Error types for songpedia-ingest

use crate::services::CatalogError;
use thiserror::Error;

/// Workflow error
#[derive(Debug, Error)]
pub enum IngestError {
    /// Catalog failure after retries; the run stops and the crawler progress
    /// file still names the last completed query
    #[error("Catalog query {query:?} failed: {source}")]
    Catalog {
        query: String,
        #[source]
        source: CatalogError,
    },

    /// Cancelled by the user; all completed work is checkpointed
    #[error("Interrupted")]
    Interrupted,

    /// songpedia-common error (I/O, database, configuration)
    #[error(transparent)]
    Common(#[from] songpedia_common::Error),
}

/// Result type for workflows
pub type IngestResult<T> = Result<T, IngestError>;
