//! Article store database access
//!
//! Single SQLite file `songs.db` in the data directory holding the `songs`
//! table of validated (song, album, article) triples.

pub mod articles;

pub use articles::{ArticleStore, InsertOutcome};

pub const DATABASE_FILE: &str = "songs.db";
