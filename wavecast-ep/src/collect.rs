//! Feed collection into the item store
//!
//! Collection runs once per invocation, across the union of all configured
//! feed tags. Ingestion is idempotent (duplicate ids are ignored by the
//! store) and per-feed failures never abort the run.

use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wavecast_common::db::{Item, ItemStore};

const USER_AGENT: &str = "wavecast/0.1 (podcast production pipeline)";

/// Fetches the current items of one feed tag
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, feed: &str) -> Result<Vec<Item>, ProviderError>;
}

/// What one collection run did
#[derive(Debug, Default, PartialEq)]
pub struct CollectionSummary {
    pub feeds_fetched: usize,
    pub items_seen: usize,
    pub items_inserted: usize,
    pub failed_feeds: Vec<String>,
}

pub struct Collector {
    store: ItemStore,
    source: Arc<dyn FeedSource>,
    fetch_pause: Duration,
}

impl Collector {
    pub fn new(store: ItemStore, source: Arc<dyn FeedSource>, fetch_pause_ms: u64) -> Self {
        Self {
            store,
            source,
            fetch_pause: Duration::from_millis(fetch_pause_ms),
        }
    }

    /// Fetch every feed once and ingest new items.
    ///
    /// A short pause separates fetches to stay polite to feed servers. A
    /// failing feed is recorded and skipped; the remaining feeds still run.
    pub async fn collect(&self, feeds: &BTreeSet<String>) -> CollectionSummary {
        let mut summary = CollectionSummary::default();

        for (position, feed) in feeds.iter().enumerate() {
            if position > 0 {
                tokio::time::sleep(self.fetch_pause).await;
            }

            match self.source.fetch(feed).await {
                Ok(items) => {
                    summary.feeds_fetched += 1;
                    summary.items_seen += items.len();
                    for item in &items {
                        match self.store.insert_if_absent(item).await {
                            Ok(true) => summary.items_inserted += 1,
                            Ok(false) => {}
                            Err(err) => {
                                warn!(feed = %feed, item_id = %item.id, error = %err, "Item insert failed");
                            }
                        }
                    }
                    info!(feed = %feed, items = items.len(), "Feed fetched");
                }
                Err(err) => {
                    warn!(feed = %feed, error = %err, "Feed fetch failed, continuing with remaining feeds");
                    summary.failed_feeds.push(feed.clone());
                }
            }
        }

        info!(
            feeds = summary.feeds_fetched,
            inserted = summary.items_inserted,
            failed = summary.failed_feeds.len(),
            "Collection complete"
        );
        summary
    }
}

#[derive(Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<ListingChild>,
}

#[derive(Deserialize)]
struct ListingChild {
    data: PostData,
}

#[derive(Deserialize)]
struct PostData {
    /// Fullname, unique across the site
    name: String,
    title: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    created_utc: f64,
}

/// Reddit JSON listing feed source
pub struct RedditFeedSource {
    http_client: reqwest::Client,
    base_url: String,
}

impl RedditFeedSource {
    pub fn new(base_url: &str) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderError::Permanent(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl FeedSource for RedditFeedSource {
    async fn fetch(&self, feed: &str) -> Result<Vec<Item>, ProviderError> {
        let url = format!("{}/r/{}/.json", self.base_url, feed);
        tracing::debug!(url = %url, "Fetching feed");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let listing: Listing = response
            .json()
            .await
            .map_err(|e| ProviderError::Permanent(format!("Feed parse failed: {}", e)))?;

        let now = Utc::now();
        let items = listing
            .data
            .children
            .into_iter()
            .map(|child| {
                let post = child.data;
                let published_at = DateTime::<Utc>::from_timestamp(post.created_utc as i64, 0)
                    .unwrap_or(now);
                Item {
                    id: post.name,
                    title: post.title,
                    link: format!("https://www.reddit.com{}", post.permalink),
                    summary: post.selftext,
                    feed: feed.to_string(),
                    published_at,
                    fetched_at: now,
                }
            })
            .collect();

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wavecast_common::db::init_memory_database;

    struct ScriptedSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FeedSource for ScriptedSource {
        async fn fetch(&self, feed: &str) -> Result<Vec<Item>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if feed == "broken" {
                return Err(ProviderError::Transient("HTTP 429".to_string()));
            }
            let now = Utc::now();
            Ok(vec![Item {
                id: format!("{}-post", feed),
                title: format!("Post from {}", feed),
                link: "https://example.com".to_string(),
                summary: String::new(),
                feed: feed.to_string(),
                published_at: now,
                fetched_at: now,
            }])
        }
    }

    fn feeds(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_collect_ingests_and_counts() {
        let pool = init_memory_database().await.unwrap();
        let store = ItemStore::new(pool);
        let collector = Collector::new(
            store.clone(),
            Arc::new(ScriptedSource {
                calls: AtomicUsize::new(0),
            }),
            0,
        );

        let summary = collector.collect(&feeds(&["ai", "b2b"])).await;

        assert_eq!(summary.feeds_fetched, 2);
        assert_eq!(summary.items_inserted, 2);
        assert!(summary.failed_feeds.is_empty());
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_collect_is_idempotent_across_runs() {
        let pool = init_memory_database().await.unwrap();
        let store = ItemStore::new(pool);
        let collector = Collector::new(
            store.clone(),
            Arc::new(ScriptedSource {
                calls: AtomicUsize::new(0),
            }),
            0,
        );

        let first = collector.collect(&feeds(&["ai"])).await;
        let second = collector.collect(&feeds(&["ai"])).await;

        assert_eq!(first.items_inserted, 1);
        assert_eq!(second.items_inserted, 0);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_failing_feed_does_not_abort_run() {
        let pool = init_memory_database().await.unwrap();
        let store = ItemStore::new(pool);
        let source = Arc::new(ScriptedSource {
            calls: AtomicUsize::new(0),
        });
        let collector = Collector::new(store.clone(), source.clone(), 0);

        let summary = collector.collect(&feeds(&["ai", "broken", "b2b"])).await;

        assert_eq!(summary.failed_feeds, vec!["broken".to_string()]);
        assert_eq!(summary.items_inserted, 2);
        // All three feeds were attempted
        assert_eq!(source.calls.load(Ordering::SeqCst), 3);
    }
}
