//! Utility functions for songpedia-ingest

pub mod retry;

pub use retry::{retry_with_backoff, RetryPolicy};
