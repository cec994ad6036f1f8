//! Analysis report generation
//!
//! Recent items are summarized into a French markdown report by a
//! generative text provider. The pipeline talks to the provider through
//! the ReportGenerator trait; GenerativeClient is the HTTP implementation.

use crate::error::ProviderError;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use wavecast_common::config::AnalysisConfig;
use wavecast_common::db::Item;

/// Truncation applied to item summaries when building the prompt
const SUMMARY_PROMPT_CHARS: usize = 150;

/// Produces a markdown report from a fully built prompt
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

/// Analysis stage: prompt construction, empty-input policy, retries
pub struct Analyzer {
    generator: Arc<dyn ReportGenerator>,
    retry: RetryPolicy,
}

impl Analyzer {
    pub fn new(generator: Arc<dyn ReportGenerator>, config: &AnalysisConfig) -> Self {
        Self {
            generator,
            retry: RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.retry_backoff_ms),
            ),
        }
    }

    /// Generate the analysis report for a category.
    ///
    /// Zero items short-circuits to a fixed French notice without calling
    /// the provider; quota errors are retried per configuration.
    pub async fn analyze(&self, category: &str, items: &[Item]) -> Result<String, ProviderError> {
        if items.is_empty() {
            info!(category = %category, "No recent items, producing empty-input report");
            return Ok(empty_report(category));
        }

        let prompt = build_prompt(category, items);
        debug!(
            category = %category,
            item_count = items.len(),
            prompt_chars = prompt.chars().count(),
            "Requesting analysis report"
        );

        let report = self
            .retry
            .run("generate_report", || self.generator.generate(&prompt))
            .await?;

        info!(
            category = %category,
            report_chars = report.chars().count(),
            "Analysis report generated"
        );
        Ok(report)
    }
}

/// Report text when a category has no recent items
pub fn empty_report(category: &str) -> String {
    format!("Aucun élément récent pour la catégorie {}.", category)
}

/// Build the French analysis prompt over the recent items
fn build_prompt(category: &str, items: &[Item]) -> String {
    let mut items_text = String::new();
    for item in items {
        let summary: String = item.summary.chars().take(SUMMARY_PROMPT_CHARS).collect();
        items_text.push_str(&format!(
            "- [{}] {}\n  Summary: {}...\n  Link: {}\n\n",
            item.feed, item.title, summary, item.link
        ));
    }

    format!(
        "Tu es un analyste commercial expert. Analyse les publications suivantes \
         provenant de la catégorie '{category}'.\n\
         Identifie 5 idées de business prometteuses, tendances ou problèmes \
         (\"pain points\") que des entrepreneurs pourraient résoudre.\n\n\
         Formate ta réponse sous forme de rapport Markdown en FRANÇAIS.\n\
         IMPORTANT : N'utilise PAS de tableau pour les idées. Utilise le format \
         suivant pour une lisibilité maximale :\n\n\
         # Rapport d'Idées Business : {category}\n\n\
         ## 📊 Résumé Exécutif\n\
         Un aperçu de 2 phrases sur le sentiment actuel dans cette niche.\n\n\
         ## 🚀 Top 5 Opportunités\n\n\
         ### 1. [Nom de l'Idée/Tendance]\n\
         **🧐 Le Problème / Insight :**\n\
         [Description du problème, avec le contexte de la publication]\n\n\
         **💡 Solution / Produit Proposé :**\n\
         [Description concrète de la solution]\n\n\
         ---\n\
         (Répète pour les idées 2 à 5)\n\n\
         Voici les données à analyser :\n{items_text}"
    )
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// HTTP generative text client (Gemini-style generateContent endpoint)
pub struct GenerativeClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GenerativeClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::Permanent(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl ReportGenerator for GenerativeClient {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .http_client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status.as_u16(), body));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Permanent(format!("Response parse failed: {}", e)))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::Permanent("Provider returned no report text".to_string())
            })?;

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedGenerator {
        report: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ReportGenerator for FixedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.report.clone())
        }
    }

    fn item(title: &str, feed: &str) -> Item {
        Item {
            id: title.to_string(),
            title: title.to_string(),
            link: format!("https://example.com/{}", title),
            summary: "s".repeat(300),
            feed: feed.to_string(),
            published_at: Utc::now(),
            fetched_at: Utc::now(),
        }
    }

    fn analysis_config() -> AnalysisConfig {
        AnalysisConfig {
            retry_backoff_ms: 1,
            ..AnalysisConfig::default()
        }
    }

    #[tokio::test]
    async fn test_empty_items_short_circuits() {
        let generator = Arc::new(FixedGenerator {
            report: "unused".to_string(),
            calls: AtomicUsize::new(0),
        });
        let analyzer = Analyzer::new(generator.clone(), &analysis_config());

        let report = analyzer.analyze("AI_TOOLS", &[]).await.unwrap();

        assert_eq!(report, "Aucun élément récent pour la catégorie AI_TOOLS.");
        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_analyze_returns_provider_report() {
        let generator = Arc::new(FixedGenerator {
            report: "# Rapport".to_string(),
            calls: AtomicUsize::new(0),
        });
        let analyzer = Analyzer::new(generator, &analysis_config());

        let report = analyzer
            .analyze("B2B", &[item("a", "smallbusiness")])
            .await
            .unwrap();
        assert_eq!(report, "# Rapport");
    }

    #[test]
    fn test_prompt_contains_category_and_truncated_summaries() {
        let items = vec![item("Un titre", "smallbusiness")];
        let prompt = build_prompt("B2B_MARKET", &items);

        assert!(prompt.contains("B2B_MARKET"));
        assert!(prompt.contains("[smallbusiness] Un titre"));
        // 300-char summary truncated to 150 in the prompt
        assert!(prompt.contains(&format!("{}...", "s".repeat(150))));
        assert!(!prompt.contains(&"s".repeat(151)));
    }
}
