//! Configuration loading and validation
//!
//! Configuration is a single TOML file resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. `WAVECAST_CONFIG` environment variable
//! 3. `~/.config/wavecast/config.toml`
//!
//! All settings are validated once at startup; a missing or invalid required
//! setting is fatal before any category pipeline runs.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Top-level configuration passed into the run coordinator at construction.
/// No process-wide mutable state: everything flows through this struct.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Root folder for the item database and all produced artifacts
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// SQLite database file name, relative to `data_dir`
    #[serde(default = "default_db_file")]
    pub db_file: String,

    /// When set, a category with zero recent items stops after writing its
    /// empty-input report instead of producing a near-silent episode
    #[serde(default)]
    pub skip_empty_categories: bool,

    #[serde(default)]
    pub collection: CollectionConfig,

    /// Topical categories; the unit of independent pipeline execution.
    /// A category with no feeds yields zero items by explicit policy
    /// (no fallback to "all items").
    #[serde(default)]
    pub categories: Vec<CategoryConfig>,

    #[serde(default)]
    pub analysis: AnalysisConfig,

    #[serde(default)]
    pub script: ScriptConfig,

    #[serde(default)]
    pub synthesis: SynthesisConfig,

    #[serde(default)]
    pub mastering: MasteringConfig,

    #[serde(default)]
    pub delivery: DeliveryConfig,

    #[serde(default)]
    pub providers: ProviderConfig,
}

/// One named category and the feed tags that contribute items to it
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryConfig {
    pub name: String,
    #[serde(default)]
    pub feeds: Vec<String>,
}

/// Item collection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CollectionConfig {
    /// Recency window for analysis input, in hours
    #[serde(default = "default_window_hours")]
    pub window_hours: i64,

    /// Maximum items fed into one analysis
    #[serde(default = "default_item_limit")]
    pub item_limit: i64,

    /// Pause between per-feed fetches, to stay polite to feed servers
    #[serde(default = "default_fetch_pause_ms")]
    pub fetch_pause_ms: u64,
}

/// Report generation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_analysis_model")]
    pub model: String,

    /// Quota / rate-limit errors are retried this many times
    #[serde(default = "default_analysis_retries")]
    pub retry_attempts: u32,

    /// Fixed delay between analysis retries
    #[serde(default = "default_analysis_backoff_ms")]
    pub retry_backoff_ms: u64,
}

/// Script shaping: normalization rules, intro/outro framing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScriptConfig {
    /// Word-boundary, case-insensitive replacements applied to every script
    /// line before segmentation (TTS pronunciation fixes)
    #[serde(default)]
    pub text_normalization: BTreeMap<String, String>,

    /// Episode title prefix; final title is "{prefix} {date} - {category}"
    #[serde(default = "default_title_prefix")]
    pub title_prefix: String,

    /// Host intro line; `{category}` and `{date}` placeholders are expanded
    #[serde(default = "default_intro_template")]
    pub intro_template: String,

    /// Host outro line
    #[serde(default = "default_outro_template")]
    pub outro_template: String,
}

/// Speech synthesis settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SynthesisConfig {
    #[serde(default = "default_tts_model")]
    pub model: String,

    /// Speaker role → provider voice id; an unmapped role falls back to HOST
    #[serde(default = "default_voices")]
    pub voices: BTreeMap<String, String>,

    /// Maximum characters per chunk sent to the synthesis provider
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    /// Concurrent synthesis calls per batch
    #[serde(default = "default_concurrency")]
    pub concurrency_limit: usize,

    /// Per-call retry attempts for transient provider errors
    #[serde(default = "default_tts_retries")]
    pub retry_attempts: u32,

    /// Fixed delay between synthesis retries
    #[serde(default = "default_tts_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Whether an episode may be assembled from a partial clip set.
    /// When false, any failed chunk fails the category at the synthesis stage.
    #[serde(default = "default_true")]
    pub allow_partial_episodes: bool,
}

/// Audio assembly and mastering settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MasteringConfig {
    /// Bed intro zone length (voice starts after this offset)
    #[serde(default = "default_intro_ms")]
    pub intro_ms: u64,

    /// Bed outro zone length after the voice ends
    #[serde(default = "default_outro_ms")]
    pub outro_ms: u64,

    /// Extra bed length required beyond the voice track before zoning
    #[serde(default = "default_intro_padding_ms")]
    pub intro_padding_ms: u64,

    /// Crossfade window when rejoining intro→body and body→outro
    #[serde(default = "default_crossfade_ms")]
    pub crossfade_ms: u64,

    /// Ambient bed attenuation applied before zoning
    #[serde(default = "default_bed_gain_db")]
    pub bed_gain_db: f32,

    /// Body-zone attenuation relative to ambient, so speech stays intelligible
    #[serde(default = "default_ducking_db")]
    pub ducking_db: f32,

    /// Peak-normalization headroom for the final mix
    #[serde(default = "default_headroom_db")]
    pub headroom_db: f32,

    /// High-pass cutoff (rumble removal)
    #[serde(default = "default_eq_low_cut")]
    pub eq_low_cut_hz: f32,

    /// Low-pass cutoff (hiss removal)
    #[serde(default = "default_eq_high_cut")]
    pub eq_high_cut_hz: f32,

    /// Crossfade curve for bed zone joins
    #[serde(default)]
    pub crossfade_curve: crate::FadeCurve,

    /// Episode container format; only "wav" has a built-in encoder
    #[serde(default = "default_audio_format")]
    pub audio_format: String,

    /// Episode sample rate when a silent bed must be synthesized
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Optional background bed WAV; a silent bed is synthesized when absent
    #[serde(default)]
    pub bed_file: Option<PathBuf>,
}

/// Delivery (email / upload / feed) settings; all best-effort
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeliveryConfig {
    #[serde(default)]
    pub email_enabled: bool,

    #[serde(default)]
    pub recipient: Option<String>,

    #[serde(default)]
    pub upload_enabled: bool,

    /// HTTP endpoint artifacts are PUT to, suffixed with the artifact name
    #[serde(default)]
    pub upload_url: Option<String>,
}

/// External provider endpoints; API keys come from the named env vars
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    #[serde(default = "default_text_base_url")]
    pub text_base_url: String,

    #[serde(default = "default_text_key_env")]
    pub text_api_key_env: String,

    #[serde(default = "default_speech_base_url")]
    pub speech_base_url: String,

    #[serde(default = "default_speech_key_env")]
    pub speech_api_key_env: String,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("wavecast"))
        .unwrap_or_else(|| PathBuf::from("./wavecast_data"))
}

fn default_db_file() -> String {
    "items.db".to_string()
}

fn default_window_hours() -> i64 {
    24
}

fn default_item_limit() -> i64 {
    20
}

fn default_fetch_pause_ms() -> u64 {
    2000
}

fn default_analysis_model() -> String {
    "gemini-flash".to_string()
}

fn default_analysis_retries() -> u32 {
    3
}

fn default_analysis_backoff_ms() -> u64 {
    20_000
}

fn default_title_prefix() -> String {
    "Idées Business du".to_string()
}

fn default_intro_template() -> String {
    "Bienvenue dans cette analyse quotidienne du {date}. Aujourd'hui, focus \
     sur les opportunités identifiées dans la catégorie {category}."
        .to_string()
}

fn default_outro_template() -> String {
    "Merci d'avoir écouté cette analyse. À demain pour de nouvelles \
     opportunités !"
        .to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_voices() -> BTreeMap<String, String> {
    let mut voices = BTreeMap::new();
    voices.insert("HOST".to_string(), "alloy".to_string());
    voices.insert("EXPERT".to_string(), "onyx".to_string());
    voices
}

fn default_max_chars() -> usize {
    4000
}

fn default_concurrency() -> usize {
    3
}

fn default_tts_retries() -> u32 {
    3
}

fn default_tts_backoff_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_intro_ms() -> u64 {
    5000
}

fn default_outro_ms() -> u64 {
    5000
}

fn default_intro_padding_ms() -> u64 {
    5000
}

fn default_crossfade_ms() -> u64 {
    2000
}

fn default_bed_gain_db() -> f32 {
    -10.0
}

fn default_ducking_db() -> f32 {
    -15.0
}

fn default_headroom_db() -> f32 {
    0.1
}

fn default_eq_low_cut() -> f32 {
    80.0
}

fn default_eq_high_cut() -> f32 {
    12_000.0
}

fn default_audio_format() -> String {
    "wav".to_string()
}

fn default_sample_rate() -> u32 {
    24_000
}

fn default_text_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_text_key_env() -> String {
    "WAVECAST_TEXT_API_KEY".to_string()
}

fn default_speech_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_speech_key_env() -> String {
    "WAVECAST_SPEECH_API_KEY".to_string()
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
            item_limit: default_item_limit(),
            fetch_pause_ms: default_fetch_pause_ms(),
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            model: default_analysis_model(),
            retry_attempts: default_analysis_retries(),
            retry_backoff_ms: default_analysis_backoff_ms(),
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            text_normalization: BTreeMap::new(),
            title_prefix: default_title_prefix(),
            intro_template: default_intro_template(),
            outro_template: default_outro_template(),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            model: default_tts_model(),
            voices: default_voices(),
            max_chars: default_max_chars(),
            concurrency_limit: default_concurrency(),
            retry_attempts: default_tts_retries(),
            retry_backoff_ms: default_tts_backoff_ms(),
            allow_partial_episodes: true,
        }
    }
}

impl Default for MasteringConfig {
    fn default() -> Self {
        Self {
            intro_ms: default_intro_ms(),
            outro_ms: default_outro_ms(),
            intro_padding_ms: default_intro_padding_ms(),
            crossfade_ms: default_crossfade_ms(),
            bed_gain_db: default_bed_gain_db(),
            ducking_db: default_ducking_db(),
            headroom_db: default_headroom_db(),
            eq_low_cut_hz: default_eq_low_cut(),
            eq_high_cut_hz: default_eq_high_cut(),
            crossfade_curve: crate::FadeCurve::default(),
            audio_format: default_audio_format(),
            sample_rate: default_sample_rate(),
            bed_file: None,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            text_base_url: default_text_base_url(),
            text_api_key_env: default_text_key_env(),
            speech_base_url: default_speech_base_url(),
            speech_api_key_env: default_speech_key_env(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration file path following the priority order
    pub fn resolve_path(cli_arg: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = cli_arg {
            return Ok(path.to_path_buf());
        }

        if let Ok(path) = std::env::var("WAVECAST_CONFIG") {
            return Ok(PathBuf::from(path));
        }

        let default = dirs::config_dir()
            .map(|d| d.join("wavecast").join("config.toml"))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))?;
        if default.exists() {
            Ok(default)
        } else {
            Err(Error::Config(format!(
                "Config file not found: {}",
                default.display()
            )))
        }
    }

    /// Validate settings that have no sensible fallback
    pub fn validate(&self) -> Result<()> {
        if self.categories.is_empty() {
            return Err(Error::Config("No categories configured".to_string()));
        }
        for category in &self.categories {
            if category.name.trim().is_empty() {
                return Err(Error::Config("Category with empty name".to_string()));
            }
        }
        if self.synthesis.max_chars == 0 {
            return Err(Error::Config("synthesis.max_chars must be > 0".to_string()));
        }
        if self.synthesis.concurrency_limit == 0 {
            return Err(Error::Config(
                "synthesis.concurrency_limit must be > 0".to_string(),
            ));
        }
        if !self.synthesis.voices.contains_key("HOST") {
            return Err(Error::Config(
                "synthesis.voices must map the HOST role (fallback voice)".to_string(),
            ));
        }
        if self.mastering.audio_format != "wav" {
            return Err(Error::Config(format!(
                "Unsupported audio_format '{}': only 'wav' has a built-in encoder",
                self.mastering.audio_format
            )));
        }
        if self.mastering.eq_low_cut_hz >= self.mastering.eq_high_cut_hz {
            return Err(Error::Config(
                "mastering.eq_low_cut_hz must be below eq_high_cut_hz".to_string(),
            ));
        }
        if self.delivery.email_enabled && self.delivery.recipient.is_none() {
            return Err(Error::Config(
                "delivery.email_enabled set but no recipient configured".to_string(),
            ));
        }
        if self.delivery.upload_enabled && self.delivery.upload_url.is_none() {
            return Err(Error::Config(
                "delivery.upload_enabled set but no upload_url configured".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute path of the SQLite database file
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }

    /// Names of all configured categories, in configuration order
    pub fn category_names(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }

    /// Feed tags configured for a category; empty when unknown
    pub fn feeds_for(&self, category: &str) -> Vec<String> {
        self.categories
            .iter()
            .find(|c| c.name == category)
            .map(|c| c.feeds.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> &'static str {
        r#"
            data_dir = "/tmp/wavecast-test"

            [[categories]]
            name = "B2B_MARKET"
            feeds = ["smallbusiness", "b2b_sales"]

            [[categories]]
            name = "AI_TOOLS"
            feeds = ["artificial"]
        "#
    }

    #[test]
    fn test_minimal_config_parses_with_defaults() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.categories.len(), 2);
        assert_eq!(config.synthesis.max_chars, 4000);
        assert_eq!(config.synthesis.concurrency_limit, 3);
        assert_eq!(config.mastering.crossfade_ms, 2000);
        assert_eq!(config.mastering.ducking_db, -15.0);
        assert_eq!(config.synthesis.voices.get("HOST").unwrap(), "alloy");
    }

    #[test]
    fn test_unknown_category_has_no_feeds() {
        let config: Config = toml::from_str(minimal_toml()).unwrap();
        // Explicit policy: unconfigured category yields zero feeds, not "all"
        assert!(config.feeds_for("NO_SUCH_CATEGORY").is_empty());
        assert_eq!(config.feeds_for("AI_TOOLS"), vec!["artificial".to_string()]);
    }

    #[test]
    fn test_empty_categories_rejected() {
        let config: Config = toml::from_str(r#"data_dir = "/tmp/x""#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_max_chars_rejected() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.synthesis.max_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_wav_format_rejected() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.mastering.audio_format = "mp3".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_email_requires_recipient() {
        let mut config: Config = toml::from_str(minimal_toml()).unwrap();
        config.delivery.email_enabled = true;
        assert!(config.validate().is_err());
        config.delivery.recipient = Some("team@example.com".to_string());
        assert!(config.validate().is_ok());
    }
}
