//! Ingestion workflows
//!
//! `queries → Crawler → shard files → Resolver → article store`, plus the
//! album article dump. All workflows run strictly sequentially and stop at
//! the next record boundary (or mid-request) when the cancellation token
//! fires.

pub mod album_dump;
pub mod crawler;
pub mod resolver;

pub use album_dump::{dump_album_articles, AlbumArticles, ALBUM_DUMP_FILE};
pub use crawler::{unique_by_title, CrawlSettings, CrawlSummary, Crawler, QueryResults};
pub use resolver::{
    is_relevant, resolve_article, ArticleOutcome, LookupSource, ResolveSummary, ResolvedArticle,
    Resolver,
};
