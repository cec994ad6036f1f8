//! Run coordinator: one collection pass, then independent category pipelines
//!
//! Collection runs exactly once per invocation over the union of all
//! configured feed tags. Each category then runs as its own tokio task;
//! a category failing (or its task panicking) never touches the others.

use crate::collect::{CollectionSummary, Collector, FeedSource};
use crate::pipeline::{CategoryOutcome, CategoryPipeline, Collaborators, PipelineState};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{error, info};
use wavecast_common::config::Config;
use wavecast_common::db::ItemStore;

pub struct RunCoordinator {
    config: Config,
    store: ItemStore,
    feed_source: Arc<dyn FeedSource>,
    collaborators: Collaborators,
}

impl RunCoordinator {
    pub fn new(
        config: Config,
        store: ItemStore,
        feed_source: Arc<dyn FeedSource>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            config,
            store,
            feed_source,
            collaborators,
        }
    }

    /// Execute one full production run: collect, then one pipeline per
    /// category. Returns a terminal outcome for every configured category.
    pub async fn run(&self) -> BTreeMap<String, CategoryOutcome> {
        let summary = self.collect_once().await;
        info!(
            items_inserted = summary.items_inserted,
            failed_feeds = summary.failed_feeds.len(),
            "Collection pass finished"
        );

        let mut handles = Vec::new();
        for category in self.config.category_names() {
            let pipeline = CategoryPipeline::new(
                self.config.clone(),
                self.store.clone(),
                self.collaborators.clone(),
            );
            let name = category.clone();
            handles.push((
                category,
                tokio::spawn(async move { pipeline.run(&name).await }),
            ));
        }

        let mut outcomes = BTreeMap::new();
        for (category, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => {
                    error!(category = %category, error = %join_err, "Category task aborted");
                    CategoryOutcome {
                        category: category.clone(),
                        state: PipelineState::Failed,
                        failed_stage: None,
                        episode_path: None,
                        errors: vec![format!("Task aborted: {}", join_err)],
                    }
                }
            };
            outcomes.insert(category, outcome);
        }

        let succeeded = outcomes.values().filter(|o| o.succeeded()).count();
        info!(
            categories = outcomes.len(),
            succeeded,
            "Production run complete"
        );
        outcomes
    }

    /// Single collection pass over the union of all configured feeds
    async fn collect_once(&self) -> CollectionSummary {
        let feeds: BTreeSet<String> = self
            .config
            .categories
            .iter()
            .flat_map(|c| c.feeds.iter().cloned())
            .collect();

        info!(feeds = feeds.len(), "Starting collection pass");
        let collector = Collector::new(
            self.store.clone(),
            self.feed_source.clone(),
            self.config.collection.fetch_pause_ms,
        );
        collector.collect(&feeds).await
    }
}
