//! Article store operations
//!
//! Schema (literal):
//! `songs(id TEXT PRIMARY KEY, name TEXT, album TEXT, article TEXT)`
//!
//! Rows are insert-or-ignore and never updated or deleted. Each insert is
//! its own implicit transaction, so a returned insert is durable.

use crate::models::ArticleRow;
use songpedia_common::Result;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqliteLockingMode, SqlitePoolOptions,
    SqliteSynchronous,
};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

/// Result of an insert-or-ignore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with this id already exists; nothing was written
    Duplicate,
}

/// Relational store of validated articles
#[derive(Debug, Clone)]
pub struct ArticleStore {
    pool: SqlitePool,
}

impl ArticleStore {
    /// Open (creating if missing) for exclusive use by one writer.
    ///
    /// One connection with SQLite exclusive locking: a second process
    /// opening the same file fails with "database is locked".
    pub async fn open_exclusive(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Delete)
            .synchronous(SqliteSynchronous::Full)
            .locking_mode(SqliteLockingMode::Exclusive);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_table().await?;

        info!("Article store opened: {}", db_path.display());
        Ok(store)
    }

    /// Open an existing store read-only (similarity analysis)
    pub async fn open_read_only(db_path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .read_only(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        debug!("Article store opened read-only: {}", db_path.display());
        Ok(Self { pool })
    }

    /// In-memory store for tests
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.init_table().await?;
        Ok(store)
    }

    async fn init_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS songs (
                id TEXT PRIMARY KEY,
                name TEXT,
                album TEXT,
                article TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert a row unless its id is already present
    pub async fn insert_or_ignore(
        &self,
        id: &str,
        name: &str,
        album: &str,
        article: &str,
    ) -> Result<InsertOutcome> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO songs (id, name, album, article) VALUES (?, ?, ?, ?)",
        )
        .bind(id)
        .bind(name)
        .bind(album)
        .bind(article)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(record_id = %id, "Article row already present, ignored");
            Ok(InsertOutcome::Duplicate)
        } else {
            Ok(InsertOutcome::Inserted)
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<ArticleRow>> {
        let row = sqlx::query("SELECT id, name, album, article FROM songs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| ArticleRow {
            id: row.get("id"),
            name: row.get::<Option<String>, _>("name").unwrap_or_default(),
            album: row.get::<Option<String>, _>("album").unwrap_or_default(),
            article: row.get::<Option<String>, _>("article").unwrap_or_default(),
        }))
    }

    /// All rows ordered by id
    pub async fn all(&self) -> Result<Vec<ArticleRow>> {
        let rows = sqlx::query("SELECT id, name, album, article FROM songs ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| ArticleRow {
                id: row.get("id"),
                name: row.get::<Option<String>, _>("name").unwrap_or_default(),
                album: row.get::<Option<String>, _>("album").unwrap_or_default(),
                article: row.get::<Option<String>, _>("article").unwrap_or_default(),
            })
            .collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM songs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Underlying pool, for maintenance queries outside the row API
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the pool, flushing and releasing the exclusive lock
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_insert_or_ignore_keeps_first_row() {
        let store = ArticleStore::in_memory().await.unwrap();

        let first = store
            .insert_or_ignore("x1", "Yesterday", "Help!", "Yesterday is a song")
            .await
            .unwrap();
        let second = store
            .insert_or_ignore("x1", "Other", "Other", "other song text")
            .await
            .unwrap();

        assert_eq!(first, InsertOutcome::Inserted);
        assert_eq!(second, InsertOutcome::Duplicate);
        assert_eq!(store.count().await.unwrap(), 1);

        let row = store.get("x1").await.unwrap().unwrap();
        assert_eq!(row.name, "Yesterday");
        assert_eq!(row.article, "Yesterday is a song");
    }

    #[tokio::test]
    async fn test_get_missing_row() {
        let store = ArticleStore::in_memory().await.unwrap();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_schema_is_literal() {
        let store = ArticleStore::in_memory().await.unwrap();
        let columns: Vec<(String, String, i64)> =
            sqlx::query_as("SELECT name, type, pk FROM pragma_table_info('songs') ORDER BY cid")
                .fetch_all(&store.pool)
                .await
                .unwrap();

        assert_eq!(
            columns,
            vec![
                ("id".to_string(), "TEXT".to_string(), 1),
                ("name".to_string(), "TEXT".to_string(), 0),
                ("album".to_string(), "TEXT".to_string(), 0),
                ("article".to_string(), "TEXT".to_string(), 0),
            ]
        );
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("songs.db");

        let store = ArticleStore::open_exclusive(&path).await.unwrap();
        store
            .insert_or_ignore("x1", "Yesterday", "Help!", "Yesterday is a song")
            .await
            .unwrap();
        store.close().await;

        let reader = ArticleStore::open_read_only(&path).await.unwrap();
        assert_eq!(reader.count().await.unwrap(), 1);
        assert_eq!(reader.all().await.unwrap()[0].album, "Help!");
        reader.close().await;
    }
}
