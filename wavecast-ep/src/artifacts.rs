//! On-disk artifact layout and persistence
//!
//! Every stage output is persisted under the data directory, keyed by
//! category and date, so a failed run leaves inspectable intermediates:
//!
//! ```text
//! reports/latest_analysis_{category}.md
//! scripts/podcast_script_{category}_{yyyymmdd}.json
//! segments/segments_{category}_{yyyymmdd}.json
//! audio/raw/{category}/segment_{nnn}.wav
//! episodes/episode_{category}_{yyyymmdd}.{ext}   (+ sibling .json metadata)
//! ```

use crate::script::segmenter::SynthesisChunk;
use crate::script::PodcastScript;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use wavecast_common::{Error, Result};

/// Sibling metadata written next to every episode file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetadata {
    pub title: String,
    pub category: String,
    pub date: String,
    pub duration_ms: u64,
    pub duration_minutes: f64,
    pub total_segments: usize,
    pub audio_format: String,
    pub sample_rate: u32,
    pub created_at: DateTime<Utc>,
    pub segments: Vec<SegmentManifestEntry>,
}

/// One synthesized clip in the episode manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentManifestEntry {
    pub file: String,
    pub duration_ms: u64,
    pub speaker: String,
}

/// Artifact path scheme rooted at the data directory
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    root: PathBuf,
}

impl ArtifactPaths {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            root: data_dir.to_path_buf(),
        }
    }

    pub fn report_path(&self, category: &str) -> PathBuf {
        self.root
            .join("reports")
            .join(format!("latest_analysis_{}.md", category))
    }

    pub fn script_path(&self, category: &str, date_compact: &str) -> PathBuf {
        self.root
            .join("scripts")
            .join(format!("podcast_script_{}_{}.json", category, date_compact))
    }

    pub fn segments_path(&self, category: &str, date_compact: &str) -> PathBuf {
        self.root
            .join("segments")
            .join(format!("segments_{}_{}.json", category, date_compact))
    }

    pub fn raw_clip_path(&self, category: &str, index: usize) -> PathBuf {
        self.root
            .join("audio")
            .join("raw")
            .join(category)
            .join(format!("segment_{:03}.wav", index))
    }

    pub fn episode_path(&self, category: &str, date_compact: &str, extension: &str) -> PathBuf {
        self.root
            .join("episodes")
            .join(format!("episode_{}_{}.{}", category, date_compact, extension))
    }

    pub fn metadata_path(episode_path: &Path) -> PathBuf {
        episode_path.with_extension("json")
    }
}

fn write_with_parents(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

pub fn save_report(path: &Path, report: &str) -> Result<()> {
    write_with_parents(path, report.as_bytes())
}

pub fn save_script(path: &Path, script: &PodcastScript) -> Result<()> {
    let json = serde_json::to_string_pretty(script)
        .map_err(|e| Error::Internal(format!("Script serialization failed: {}", e)))?;
    write_with_parents(path, json.as_bytes())
}

/// Segments artifact: ordered chunk records plus summary counters
#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentsArtifact {
    pub total_segments: usize,
    pub total_chars: usize,
    pub segments: Vec<SynthesisChunk>,
}

pub fn save_segments(path: &Path, chunks: &[SynthesisChunk]) -> Result<()> {
    let artifact = SegmentsArtifact {
        total_segments: chunks.len(),
        total_chars: chunks.iter().map(|c| c.content.chars().count()).sum(),
        segments: chunks.to_vec(),
    };
    let json = serde_json::to_string_pretty(&artifact)
        .map_err(|e| Error::Internal(format!("Segments serialization failed: {}", e)))?;
    write_with_parents(path, json.as_bytes())
}

pub fn save_metadata(episode_path: &Path, metadata: &EpisodeMetadata) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata)
        .map_err(|e| Error::Internal(format!("Metadata serialization failed: {}", e)))?;
    write_with_parents(&ArtifactPaths::metadata_path(episode_path), json.as_bytes())
}

pub fn load_metadata(episode_path: &Path) -> Result<EpisodeMetadata> {
    let path = ArtifactPaths::metadata_path(episode_path);
    let content = std::fs::read_to_string(&path)
        .map_err(|_| Error::NotFound(format!("Metadata file: {}", path.display())))?;
    serde_json::from_str(&content)
        .map_err(|e| Error::InvalidInput(format!("Invalid metadata JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ScriptSegment, SpeakerRole};

    #[test]
    fn test_path_scheme() {
        let paths = ArtifactPaths::new(Path::new("/data"));

        assert_eq!(
            paths.report_path("B2B_MARKET"),
            Path::new("/data/reports/latest_analysis_B2B_MARKET.md")
        );
        assert_eq!(
            paths.episode_path("AI_TOOLS", "20260823", "wav"),
            Path::new("/data/episodes/episode_AI_TOOLS_20260823.wav")
        );
        assert_eq!(
            paths.raw_clip_path("AI_TOOLS", 7),
            Path::new("/data/audio/raw/AI_TOOLS/segment_007.wav")
        );
    }

    #[test]
    fn test_metadata_sibling_path() {
        let episode = Path::new("/data/episodes/episode_X_20260823.wav");
        assert_eq!(
            ArtifactPaths::metadata_path(episode),
            Path::new("/data/episodes/episode_X_20260823.json")
        );
    }

    #[test]
    fn test_metadata_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let episode = dir.path().join("episode_T_20260823.wav");

        let metadata = EpisodeMetadata {
            title: "Idées Business du 23 août 2026 - T".to_string(),
            category: "T".to_string(),
            date: "2026-08-23".to_string(),
            duration_ms: 120_000,
            duration_minutes: 2.0,
            total_segments: 3,
            audio_format: "wav".to_string(),
            sample_rate: 24_000,
            created_at: Utc::now(),
            segments: vec![SegmentManifestEntry {
                file: "segment_000.wav".to_string(),
                duration_ms: 40_000,
                speaker: "HOST".to_string(),
            }],
        };

        save_metadata(&episode, &metadata).unwrap();
        let loaded = load_metadata(&episode).unwrap();
        assert_eq!(loaded, metadata);
    }

    #[test]
    fn test_save_script_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scripts").join("podcast_script_C_20260823.json");

        let script = PodcastScript {
            title: "t".to_string(),
            date: "2026-08-23".to_string(),
            category: "C".to_string(),
            intro: "i".to_string(),
            outro: "o".to_string(),
            segments: vec![ScriptSegment {
                speaker: SpeakerRole::Host,
                content: "c".to_string(),
                emphasis: Vec::new(),
            }],
        };

        save_script(&path, &script).unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"HOST\""));
    }
}
