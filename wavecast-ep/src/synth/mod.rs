//! Speech synthesis provider client
//!
//! The scheduler talks to synthesis through the SpeechSynthesizer trait so
//! tests can script failures; SpeechClient is the HTTP implementation with
//! request pacing.

pub mod scheduler;

use crate::audio::codec::decode_wav;
use crate::audio::AudioBuffer;
use crate::error::ProviderError;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const REQUEST_TIMEOUT_SECS: u64 = 120;
const PACING_MS: u64 = 200;

/// Converts one chunk of text into a decoded audio clip
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<AudioBuffer, ProviderError>;
}

/// Rate limiter spacing outgoing provider requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with request pacing
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: &'a str,
}

/// HTTP speech synthesis client (OpenAI-compatible audio/speech endpoint)
pub struct SpeechClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
    api_key: String,
    model: String,
}

impl SpeechClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Permanent(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(PACING_MS)),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for SpeechClient {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<AudioBuffer, ProviderError> {
        self.rate_limiter.wait().await;

        let url = format!("{}/audio/speech", self.base_url);
        tracing::debug!(voice = %voice, chars = text.chars().count(), "Requesting speech synthesis");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&SpeechRequest {
                model: &self.model,
                input: text,
                voice,
                response_format: "wav",
            })
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Transient(format!("Body read failed: {}", e)))?;

        decode_wav(&bytes).map_err(|e| ProviderError::Permanent(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_strips_trailing_slash() {
        let client = SpeechClient::new("https://api.example.com/v1/", "key", "tts-1").unwrap();
        assert_eq!(client.base_url, "https://api.example.com/v1");
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(100);

        let start = Instant::now();
        limiter.wait().await;
        let first = start.elapsed();
        limiter.wait().await;
        let second = start.elapsed();

        assert!(first < Duration::from_millis(50));
        assert!(second >= Duration::from_millis(90));
    }
}
