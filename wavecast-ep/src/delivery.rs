//! Delivery collaborators: report email, artifact upload, feed publication
//!
//! Delivery is best-effort by contract: the pipeline logs failures here and
//! keeps the episode. Everything behind these traits is replaceable; the
//! defaults log instead of performing external side effects.

use crate::artifacts::EpisodeMetadata;
use crate::error::ProviderError;
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Sends the analysis report to the configured recipient
#[async_trait]
pub trait EmailDelivery: Send + Sync {
    async fn send_report(&self, category: &str, report: &str) -> Result<(), ProviderError>;
}

/// Pushes produced artifacts to external storage
#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    async fn upload(&self, path: &Path) -> Result<(), ProviderError>;
}

/// Announces a finished episode to the podcast feed
#[async_trait]
pub trait FeedPublisher: Send + Sync {
    async fn publish(&self, metadata: &EpisodeMetadata) -> Result<(), ProviderError>;
}

/// Email subject line for a category's daily report
pub fn report_subject(category: &str) -> String {
    format!(
        "[{}] Idées Business Du Jour : {}",
        category,
        Utc::now().format("%d/%m/%Y")
    )
}

/// Default collaborator: logs what would be delivered and succeeds
pub struct LoggingDelivery;

#[async_trait]
impl EmailDelivery for LoggingDelivery {
    async fn send_report(&self, category: &str, report: &str) -> Result<(), ProviderError> {
        info!(
            subject = %report_subject(category),
            report_chars = report.chars().count(),
            "Email delivery disabled, logging report instead"
        );
        Ok(())
    }
}

#[async_trait]
impl ArtifactUploader for LoggingDelivery {
    async fn upload(&self, path: &Path) -> Result<(), ProviderError> {
        info!(path = %path.display(), "Upload disabled, skipping artifact");
        Ok(())
    }
}

#[async_trait]
impl FeedPublisher for LoggingDelivery {
    async fn publish(&self, metadata: &EpisodeMetadata) -> Result<(), ProviderError> {
        info!(
            title = %metadata.title,
            duration_ms = metadata.duration_ms,
            "Feed publication disabled, skipping episode announcement"
        );
        Ok(())
    }
}

/// Uploader that PUTs each artifact to `{base_url}/{file_name}`
pub struct HttpUploader {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpUploader {
    pub fn new(base_url: &str) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| ProviderError::Permanent(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ArtifactUploader for HttpUploader {
    async fn upload(&self, path: &Path) -> Result<(), ProviderError> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                ProviderError::Permanent(format!("Artifact has no file name: {}", path.display()))
            })?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ProviderError::Permanent(format!("Cannot read artifact: {}", e)))?;

        let url = format!("{}/{}", self.base_url, file_name);
        info!(url = %url, bytes = bytes.len(), "Uploading artifact");

        let response = self
            .http_client
            .put(&url)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_carries_category_tag() {
        let subject = report_subject("B2B_MARKET");
        assert!(subject.starts_with("[B2B_MARKET]"));
        assert!(subject.contains("Idées Business Du Jour"));
    }

    #[tokio::test]
    async fn test_logging_delivery_always_succeeds() {
        let delivery = LoggingDelivery;
        assert!(delivery.send_report("X", "# Rapport").await.is_ok());
        assert!(delivery.upload(Path::new("/nonexistent")).await.is_ok());
    }
}
