//! wavecast-ep - podcast production pipeline entry point
//!
//! One invocation performs one production run: a single collection pass,
//! then an independent episode pipeline per configured category.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wavecast_common::config::Config;
use wavecast_common::db::{init_database, ItemStore};
use wavecast_ep::analysis::GenerativeClient;
use wavecast_ep::collect::RedditFeedSource;
use wavecast_ep::delivery::{HttpUploader, LoggingDelivery};
use wavecast_ep::synth::SpeechClient;
use wavecast_ep::{Collaborators, RunCoordinator};

const FEED_BASE_URL: &str = "https://www.reddit.com";

#[derive(Parser, Debug)]
#[command(name = "wavecast-ep", about = "Per-category podcast production pipeline")]
struct Args {
    /// Configuration file (falls back to WAVECAST_CONFIG, then the
    /// user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Run only this category instead of all configured ones
    #[arg(long)]
    category: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting wavecast-ep");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = Config::resolve_path(args.config.as_deref())?;
    info!("Config: {}", config_path.display());
    let mut config = Config::load(&config_path)?;

    if let Some(category) = &args.category {
        config.categories.retain(|c| &c.name == category);
        if config.categories.is_empty() {
            anyhow::bail!("Unknown category: {}", category);
        }
    }

    let db_path = config.database_path();
    let pool = init_database(&db_path).await?;
    let store = ItemStore::new(pool);

    let collaborators = build_collaborators(&config)?;
    let feed_source = Arc::new(RedditFeedSource::new(FEED_BASE_URL)?);

    let coordinator = RunCoordinator::new(config, store, feed_source, collaborators);
    let outcomes = coordinator.run().await;

    let mut failed = 0;
    for (category, outcome) in &outcomes {
        if outcome.succeeded() {
            info!(
                category = %category,
                state = %outcome.state,
                episode = ?outcome.episode_path,
                "Category finished"
            );
        } else {
            failed += 1;
            warn!(
                category = %category,
                state = %outcome.state,
                errors = ?outcome.errors,
                "Category failed"
            );
        }
    }

    if failed == outcomes.len() && !outcomes.is_empty() {
        anyhow::bail!("All {} categories failed", failed);
    }

    Ok(())
}

fn build_collaborators(config: &Config) -> Result<Collaborators> {
    let text_key = std::env::var(&config.providers.text_api_key_env).with_context(|| {
        format!(
            "Missing text provider API key env var: {}",
            config.providers.text_api_key_env
        )
    })?;
    let speech_key = std::env::var(&config.providers.speech_api_key_env).with_context(|| {
        format!(
            "Missing speech provider API key env var: {}",
            config.providers.speech_api_key_env
        )
    })?;

    let report_generator = Arc::new(
        GenerativeClient::new(
            &config.providers.text_base_url,
            &text_key,
            &config.analysis.model,
        )
        .map_err(|e| anyhow::anyhow!("Text provider client: {}", e))?,
    );
    let synthesizer = Arc::new(
        SpeechClient::new(
            &config.providers.speech_base_url,
            &speech_key,
            &config.synthesis.model,
        )
        .map_err(|e| anyhow::anyhow!("Speech provider client: {}", e))?,
    );

    let uploader: Arc<dyn wavecast_ep::delivery::ArtifactUploader> =
        match (config.delivery.upload_enabled, &config.delivery.upload_url) {
            (true, Some(url)) => Arc::new(
                HttpUploader::new(url).map_err(|e| anyhow::anyhow!("Uploader client: {}", e))?,
            ),
            _ => Arc::new(LoggingDelivery),
        };

    Ok(Collaborators {
        report_generator,
        synthesizer,
        email: Arc::new(LoggingDelivery),
        uploader,
        publisher: Arc::new(LoggingDelivery),
    })
}
