//! Database initialization
//!
//! Creates the SQLite database on first run and applies the schema. The item
//! store is the only state shared across concurrent category pipelines, so
//! WAL mode is enabled for concurrent readers during collection.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_and_migrate(&pool).await?;

    Ok(pool)
}

/// In-memory database for tests
pub async fn init_memory_database() -> Result<SqlitePool> {
    // A single persistent connection: each new in-memory connection would
    // otherwise see a fresh empty database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    configure_and_migrate(&pool).await?;

    Ok(pool)
}

async fn configure_and_migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL allows concurrent readers while collection writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    create_items_table(pool).await?;

    Ok(())
}

async fn create_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            link TEXT NOT NULL,
            summary TEXT NOT NULL DEFAULT '',
            feed TEXT NOT NULL,
            published_at TEXT NOT NULL,
            fetched_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_feed_fetched ON items(feed, fetched_at)")
        .execute(pool)
        .await?;

    Ok(())
}
