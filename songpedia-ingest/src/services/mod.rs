//! Remote service clients
//!
//! Both services sit behind traits so the workflows can run against
//! in-process fakes.

pub mod catalog_client;
pub mod encyclopedia_client;

pub use catalog_client::{CatalogError, CatalogService, SpotifyCatalogClient, TrackPage};
pub use encyclopedia_client::{Encyclopedia, LookupError, WikipediaClient};
