//! Item store: idempotent ingestion and recency queries
//!
//! Identity key is the item id; duplicate ids are rejected at this boundary
//! (INSERT OR IGNORE), which makes repeated collection runs safe.

use crate::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

/// External content unit collected from a feed
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Item {
    /// Unique, stable identifier from the source feed
    pub id: String,
    pub title: String,
    pub link: String,
    pub summary: String,
    /// Source feed tag this item came from
    pub feed: String,
    pub published_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

/// SQLite-backed item store
#[derive(Clone)]
pub struct ItemStore {
    pool: SqlitePool,
}

impl ItemStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert an item if its id is not already stored.
    ///
    /// Returns true when a row was inserted, false when the id already existed.
    pub async fn insert_if_absent(&self, item: &Item) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO items (id, title, link, summary, feed, published_at, fetched_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.title)
        .bind(&item.link)
        .bind(&item.summary)
        .bind(&item.feed)
        .bind(item.published_at.to_rfc3339())
        .bind(item.fetched_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Query recent items for a set of feed tags, newest first.
    ///
    /// An empty tag list returns an empty result: a category without
    /// configured feeds collects nothing by policy.
    pub async fn query_recent(
        &self,
        feeds: &[String],
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Item>> {
        if feeds.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = feeds.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT id, title, link, summary, feed, published_at, fetched_at \
             FROM items WHERE fetched_at > ? AND feed IN ({}) \
             ORDER BY fetched_at DESC LIMIT ?",
            placeholders
        );

        let mut query = sqlx::query(&sql).bind(since.to_rfc3339());
        for feed in feeds {
            query = query.bind(feed);
        }
        query = query.bind(limit);

        let rows = query.fetch_all(&self.pool).await?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(Item {
                id: row.get("id"),
                title: row.get("title"),
                link: row.get("link"),
                summary: row.get("summary"),
                feed: row.get("feed"),
                published_at: parse_timestamp(row.get("published_at")),
                fetched_at: parse_timestamp(row.get("fetched_at")),
            });
        }

        Ok(items)
    }

    /// Total stored item count (diagnostics)
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn parse_timestamp(raw: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;
    use chrono::Duration;

    fn sample_item(id: &str, feed: &str) -> Item {
        Item {
            id: id.to_string(),
            title: format!("Title for {}", id),
            link: format!("https://example.com/{}", id),
            summary: "A summary".to_string(),
            feed: feed.to_string(),
            published_at: Utc::now(),
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        let store = ItemStore::new(pool);

        let item = sample_item("post-1", "smallbusiness");
        assert!(store.insert_if_absent(&item).await.unwrap());
        assert!(!store.insert_if_absent(&item).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_query_recent_filters_by_feed_and_window() {
        let pool = init_memory_database().await.unwrap();
        let store = ItemStore::new(pool);

        store
            .insert_if_absent(&sample_item("a", "smallbusiness"))
            .await
            .unwrap();
        store
            .insert_if_absent(&sample_item("b", "artificial"))
            .await
            .unwrap();

        let since = Utc::now() - Duration::hours(24);
        let items = store
            .query_recent(&["smallbusiness".to_string()], since, 20)
            .await
            .unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "a");
    }

    #[tokio::test]
    async fn test_query_recent_empty_feed_list_returns_nothing() {
        let pool = init_memory_database().await.unwrap();
        let store = ItemStore::new(pool);
        store
            .insert_if_absent(&sample_item("a", "smallbusiness"))
            .await
            .unwrap();

        let since = Utc::now() - Duration::hours(24);
        let items = store.query_recent(&[], since, 20).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_query_recent_orders_newest_first() {
        let pool = init_memory_database().await.unwrap();
        let store = ItemStore::new(pool);

        let mut older = sample_item("old", "ai");
        older.fetched_at = Utc::now() - Duration::hours(2);
        let newer = sample_item("new", "ai");

        store.insert_if_absent(&older).await.unwrap();
        store.insert_if_absent(&newer).await.unwrap();

        let since = Utc::now() - Duration::hours(24);
        let items = store
            .query_recent(&["ai".to_string()], since, 20)
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "new");
        assert_eq!(items[1].id, "old");
    }
}
