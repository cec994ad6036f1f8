//! Category pipeline state machine
//!
//! Each category starts at PENDING and progresses through fixed stages:
//! COLLECTED → ANALYZED → SCRIPTED → SEGMENTED → SYNTHESIZED → ASSEMBLED →
//! DELIVERED, with EMPTY and FAILED as the other terminal states. Stage
//! outputs are persisted as artifacts before the state advances, so a
//! failed run leaves everything produced so far on disk.

pub mod coordinator;

use crate::analysis::{Analyzer, ReportGenerator};
use crate::artifacts::{self, ArtifactPaths, EpisodeMetadata, SegmentManifestEntry};
use crate::audio::assembler::AudioAssembler;
use crate::audio::codec::{self, EpisodeEncoder, WavEncoder};
use crate::audio::AudioBuffer;
use crate::delivery::{ArtifactUploader, EmailDelivery, FeedPublisher};
use crate::error::StageError;
use crate::script::segmenter::{chunk_script, SynthesisChunk};
use crate::script::{self, PodcastScript};
use crate::synth::scheduler::{SynthesisScheduler, SynthesizedClip};
use crate::synth::SpeechSynthesizer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;
use wavecast_common::config::Config;
use wavecast_common::db::ItemStore;

/// Pipeline state for one category run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PipelineState {
    /// Created, nothing run yet
    Pending,
    /// Recent items queried from the store
    Collected,
    /// Analysis report produced and persisted
    Analyzed,
    /// Speaker-tagged script built
    Scripted,
    /// Script split into synthesis chunks
    Segmented,
    /// Clips synthesized (possibly partial, per policy)
    Synthesized,
    /// Episode audio and metadata written
    Assembled,
    /// All enabled deliveries succeeded
    Delivered,
    /// No recent items and the skip policy is active
    Empty,
    /// A stage failed; earlier artifacts remain on disk
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Delivered | PipelineState::Empty | PipelineState::Failed
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Pending => "PENDING",
            PipelineState::Collected => "COLLECTED",
            PipelineState::Analyzed => "ANALYZED",
            PipelineState::Scripted => "SCRIPTED",
            PipelineState::Segmented => "SEGMENTED",
            PipelineState::Synthesized => "SYNTHESIZED",
            PipelineState::Assembled => "ASSEMBLED",
            PipelineState::Delivered => "DELIVERED",
            PipelineState::Empty => "EMPTY",
            PipelineState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// The stage a category failed in, carried on the terminal outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Collect,
    Analyze,
    Script,
    Segment,
    Synthesize,
    Assemble,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineStage::Collect => "collect",
            PipelineStage::Analyze => "analyze",
            PipelineStage::Script => "script",
            PipelineStage::Segment => "segment",
            PipelineStage::Synthesize => "synthesize",
            PipelineStage::Assemble => "assemble",
        };
        f.write_str(name)
    }
}

/// A stage error tagged with the stage it happened in
#[derive(Debug)]
struct StageFailure {
    stage: PipelineStage,
    error: StageError,
}

impl StageFailure {
    fn at(stage: PipelineStage) -> impl FnOnce(StageError) -> StageFailure {
        move |error| StageFailure { stage, error }
    }
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub category: String,
    pub old_state: PipelineState,
    pub new_state: PipelineState,
    pub transitioned_at: DateTime<Utc>,
}

/// In-memory record of one category run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub category: String,
    pub state: PipelineState,
    /// Accumulated non-fatal stage errors (failed chunks, failed deliveries)
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(category: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            category: category.to_string(),
            state: PipelineState::Pending,
            errors: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new state, recording the event
    pub fn transition_to(&mut self, new_state: PipelineState) -> StateTransition {
        let transition = StateTransition {
            run_id: self.run_id,
            category: self.category.clone(),
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if new_state.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        info!(
            category = %transition.category,
            from = %transition.old_state,
            to = %transition.new_state,
            "Pipeline state transition"
        );
        transition
    }

    pub fn record_error(&mut self, message: String) {
        self.errors.push(message);
    }
}

/// External collaborators a pipeline talks to, all behind trait objects
#[derive(Clone)]
pub struct Collaborators {
    pub report_generator: Arc<dyn ReportGenerator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub email: Arc<dyn EmailDelivery>,
    pub uploader: Arc<dyn ArtifactUploader>,
    pub publisher: Arc<dyn FeedPublisher>,
}

/// Terminal result of one category run
#[derive(Debug)]
pub struct CategoryOutcome {
    pub category: String,
    pub state: PipelineState,
    /// Stage the run failed in, set only for the FAILED terminal state
    pub failed_stage: Option<PipelineStage>,
    pub episode_path: Option<PathBuf>,
    pub errors: Vec<String>,
}

impl CategoryOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(
            self.state,
            PipelineState::Delivered | PipelineState::Assembled | PipelineState::Empty
        )
    }
}

/// Produced artifact paths for one run, for the delivery stage
struct ProducedArtifacts {
    report: PathBuf,
    script: PathBuf,
    segments: PathBuf,
    episode: PathBuf,
    metadata: PathBuf,
}

/// Drives one category through all stages
pub struct CategoryPipeline {
    config: Config,
    store: ItemStore,
    collaborators: Collaborators,
    paths: ArtifactPaths,
}

impl CategoryPipeline {
    pub fn new(config: Config, store: ItemStore, collaborators: Collaborators) -> Self {
        let paths = ArtifactPaths::new(&config.data_dir);
        Self {
            config,
            store,
            collaborators,
            paths,
        }
    }

    /// Run the full pipeline for one category. Never panics or propagates:
    /// every failure becomes a terminal FAILED outcome for this category.
    pub async fn run(&self, category: &str) -> CategoryOutcome {
        let mut run = PipelineRun::new(category);
        info!(category = %category, run_id = %run.run_id, "Category pipeline started");

        let mut failed_stage = None;
        let episode_path = match self.execute(&mut run).await {
            Ok(path) => path,
            Err(failure) => {
                error!(
                    category = %category,
                    stage = %failure.stage,
                    error = %failure.error,
                    "Category pipeline failed"
                );
                run.record_error(failure.error.to_string());
                run.transition_to(PipelineState::Failed);
                failed_stage = Some(failure.stage);
                None
            }
        };

        info!(
            category = %category,
            state = %run.state,
            errors = run.errors.len(),
            "Category pipeline finished"
        );

        CategoryOutcome {
            category: category.to_string(),
            state: run.state,
            failed_stage,
            episode_path,
            errors: run.errors,
        }
    }

    async fn execute(&self, run: &mut PipelineRun) -> Result<Option<PathBuf>, StageFailure> {
        let now = Utc::now();
        let date_compact = now.format("%Y%m%d").to_string();

        let items = self
            .stage_collect(run)
            .await
            .map_err(StageFailure::at(PipelineStage::Collect))?;
        let report = self
            .stage_analyze(run, &items)
            .await
            .map_err(StageFailure::at(PipelineStage::Analyze))?;

        if items.is_empty() && self.config.skip_empty_categories {
            info!(category = %run.category, "No recent items, stopping after report");
            run.transition_to(PipelineState::Empty);
            return Ok(None);
        }

        let script = self
            .stage_script(run, &report, now, &date_compact)
            .map_err(StageFailure::at(PipelineStage::Script))?;
        let chunks = self
            .stage_segment(run, &script, &date_compact)
            .map_err(StageFailure::at(PipelineStage::Segment))?;
        if chunks.is_empty() {
            info!(category = %run.category, "Nothing to synthesize, stopping");
            run.transition_to(PipelineState::Empty);
            return Ok(None);
        }

        let clips = self
            .stage_synthesize(run, &chunks)
            .await
            .map_err(StageFailure::at(PipelineStage::Synthesize))?;
        let (episode_path, metadata) = self
            .stage_assemble(run, &script, &clips, &date_compact)
            .map_err(StageFailure::at(PipelineStage::Assemble))?;

        let produced = ProducedArtifacts {
            report: self.paths.report_path(&run.category),
            script: self.paths.script_path(&run.category, &date_compact),
            segments: self.paths.segments_path(&run.category, &date_compact),
            episode: episode_path.clone(),
            metadata: ArtifactPaths::metadata_path(&episode_path),
        };
        self.stage_deliver(run, &report, &metadata, &produced).await;

        Ok(Some(episode_path))
    }

    /// Query recent items for this category's feeds. A category with no
    /// configured feeds collects zero items, never "all items".
    async fn stage_collect(
        &self,
        run: &mut PipelineRun,
    ) -> Result<Vec<wavecast_common::db::Item>, StageError> {
        let feeds = self.config.feeds_for(&run.category);
        if feeds.is_empty() {
            warn!(category = %run.category, "No feeds configured for category");
        }

        let since = Utc::now() - chrono::Duration::hours(self.config.collection.window_hours);
        let items = self
            .store
            .query_recent(&feeds, since, self.config.collection.item_limit)
            .await?;

        info!(category = %run.category, items = items.len(), "Items collected");
        run.transition_to(PipelineState::Collected);
        Ok(items)
    }

    async fn stage_analyze(
        &self,
        run: &mut PipelineRun,
        items: &[wavecast_common::db::Item],
    ) -> Result<String, StageError> {
        let analyzer = Analyzer::new(
            self.collaborators.report_generator.clone(),
            &self.config.analysis,
        );
        let report = analyzer
            .analyze(&run.category, items)
            .await
            .map_err(|e| StageError::AnalysisFailed(e.to_string()))?;

        artifacts::save_report(&self.paths.report_path(&run.category), &report)?;
        run.transition_to(PipelineState::Analyzed);
        Ok(report)
    }

    fn stage_script(
        &self,
        run: &mut PipelineRun,
        report: &str,
        now: DateTime<Utc>,
        date_compact: &str,
    ) -> Result<PodcastScript, StageError> {
        let script = script::build_script(report, &run.category, &self.config.script, now);
        artifacts::save_script(
            &self.paths.script_path(&run.category, date_compact),
            &script,
        )?;
        run.transition_to(PipelineState::Scripted);
        Ok(script)
    }

    fn stage_segment(
        &self,
        run: &mut PipelineRun,
        script: &PodcastScript,
        date_compact: &str,
    ) -> Result<Vec<SynthesisChunk>, StageError> {
        let chunks = chunk_script(script, self.config.synthesis.max_chars);
        artifacts::save_segments(
            &self.paths.segments_path(&run.category, date_compact),
            &chunks,
        )?;
        info!(category = %run.category, chunks = chunks.len(), "Script segmented");
        run.transition_to(PipelineState::Segmented);
        Ok(chunks)
    }

    /// Synthesize all chunks. Partial results are accepted when the
    /// `allow_partial_episodes` policy is set; a total failure, or a
    /// partial one without that policy, fails the category.
    async fn stage_synthesize(
        &self,
        run: &mut PipelineRun,
        chunks: &[SynthesisChunk],
    ) -> Result<Vec<SynthesizedClip>, StageError> {
        let scheduler = SynthesisScheduler::new(
            self.collaborators.synthesizer.clone(),
            &self.config.synthesis,
        );
        let outcome = scheduler.synthesize_all(chunks).await;

        for failure in &outcome.failures {
            run.record_error(format!("Chunk {}: {}", failure.index, failure.cause));
        }

        if outcome.is_total_failure() {
            return Err(StageError::SynthesisFailed(
                "Every chunk failed synthesis".to_string(),
            ));
        }
        if !outcome.is_complete() && !self.config.synthesis.allow_partial_episodes {
            return Err(StageError::SynthesisFailed(format!(
                "{} of {} chunks failed and partial episodes are disabled",
                outcome.failures.len(),
                chunks.len()
            )));
        }

        let clips: Vec<SynthesizedClip> =
            outcome.clips.into_iter().flatten().collect();

        for clip in &clips {
            let path = self.paths.raw_clip_path(&run.category, clip.index);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let bytes = codec::encode_wav_bytes(&clip.audio)?;
            std::fs::write(&path, bytes)?;
        }

        info!(
            category = %run.category,
            clips = clips.len(),
            failed = run.errors.len(),
            "Synthesis complete"
        );
        run.transition_to(PipelineState::Synthesized);
        Ok(clips)
    }

    fn stage_assemble(
        &self,
        run: &mut PipelineRun,
        script: &PodcastScript,
        clips: &[SynthesizedClip],
        date_compact: &str,
    ) -> Result<(PathBuf, EpisodeMetadata), StageError> {
        let bed = self.load_bed()?;
        let buffers: Vec<AudioBuffer> = clips.iter().map(|c| c.audio.clone()).collect();

        let assembler = AudioAssembler::new(self.config.mastering.clone());
        let episode = assembler
            .assemble(&buffers, &bed)
            .map_err(|e| StageError::AssemblyFailed(e.to_string()))?;

        let encoder = WavEncoder;
        let episode_path =
            self.paths
                .episode_path(&run.category, date_compact, encoder.extension());
        if let Some(parent) = episode_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        encoder
            .encode_to_file(&episode, &episode_path)
            .map_err(|e| StageError::AssemblyFailed(e.to_string()))?;

        let metadata = EpisodeMetadata {
            title: script.title.clone(),
            category: run.category.clone(),
            date: script.date.clone(),
            duration_ms: episode.duration_ms(),
            duration_minutes: episode.duration_ms() as f64 / 60_000.0,
            total_segments: clips.len(),
            audio_format: self.config.mastering.audio_format.clone(),
            sample_rate: episode.sample_rate,
            created_at: Utc::now(),
            segments: clips
                .iter()
                .map(|clip| SegmentManifestEntry {
                    file: format!("segment_{:03}.wav", clip.index),
                    duration_ms: clip.audio.duration_ms(),
                    speaker: clip.speaker.as_str().to_string(),
                })
                .collect(),
        };
        artifacts::save_metadata(&episode_path, &metadata)?;

        run.transition_to(PipelineState::Assembled);
        Ok((episode_path, metadata))
    }

    /// Best-effort delivery. Failures are recorded on the run and logged;
    /// the episode stays ASSEMBLED when any delivery fails, and advances
    /// to DELIVERED only when everything enabled succeeded.
    async fn stage_deliver(
        &self,
        run: &mut PipelineRun,
        report: &str,
        metadata: &EpisodeMetadata,
        produced: &ProducedArtifacts,
    ) {
        let mut delivery_failed = false;

        if self.config.delivery.email_enabled {
            if let Err(err) = self
                .collaborators
                .email
                .send_report(&run.category, report)
                .await
            {
                warn!(category = %run.category, error = %err, "Report email failed");
                run.record_error(format!("Email delivery: {}", err));
                delivery_failed = true;
            }
        }

        if self.config.delivery.upload_enabled {
            let uploads = [
                &produced.report,
                &produced.script,
                &produced.segments,
                &produced.episode,
                &produced.metadata,
            ];
            for path in uploads {
                if let Err(err) = self.collaborators.uploader.upload(path).await {
                    warn!(
                        category = %run.category,
                        path = %path.display(),
                        error = %err,
                        "Artifact upload failed"
                    );
                    run.record_error(format!("Upload {}: {}", path.display(), err));
                    delivery_failed = true;
                }
            }
        }

        if let Err(err) = self.collaborators.publisher.publish(metadata).await {
            warn!(category = %run.category, error = %err, "Feed publication failed");
            run.record_error(format!("Feed publication: {}", err));
            delivery_failed = true;
        }

        if delivery_failed {
            warn!(category = %run.category, "Delivery incomplete, episode remains assembled");
        } else {
            run.transition_to(PipelineState::Delivered);
        }
    }

    /// Load the configured bed file, or an empty buffer meaning "no bed"
    fn load_bed(&self) -> Result<AudioBuffer, StageError> {
        match &self.config.mastering.bed_file {
            Some(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    StageError::MissingArtifact(format!("Bed file {}: {}", path.display(), e))
                })?;
                let bed = codec::decode_wav(&bytes)?;
                Ok(bed)
            }
            None => Ok(AudioBuffer::new(
                Vec::new(),
                self.config.mastering.sample_rate,
                1,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_records_event_and_terminal_end_time() {
        // A fresh run has not collected anything yet, so the first
        // transition is PENDING → COLLECTED, never a self-transition
        let mut run = PipelineRun::new("B2B_MARKET");
        assert_eq!(run.state, PipelineState::Pending);
        assert!(run.ended_at.is_none());

        let transition = run.transition_to(PipelineState::Collected);
        assert_eq!(transition.old_state, PipelineState::Pending);
        assert_eq!(transition.new_state, PipelineState::Collected);
        assert!(run.ended_at.is_none());

        run.transition_to(PipelineState::Failed);
        assert!(run.ended_at.is_some());
    }

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Delivered.is_terminal());
        assert!(PipelineState::Empty.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Assembled.is_terminal());
        assert!(!PipelineState::Collected.is_terminal());
        assert!(!PipelineState::Pending.is_terminal());
    }

    #[test]
    fn test_outcome_success_classification() {
        let outcome = CategoryOutcome {
            category: "X".to_string(),
            state: PipelineState::Failed,
            failed_stage: Some(PipelineStage::Synthesize),
            episode_path: None,
            errors: vec!["boom".to_string()],
        };
        assert!(!outcome.succeeded());

        let outcome = CategoryOutcome {
            category: "X".to_string(),
            state: PipelineState::Assembled,
            failed_stage: None,
            episode_path: Some(PathBuf::from("/tmp/e.wav")),
            errors: vec!["upload failed".to_string()],
        };
        assert!(outcome.succeeded());
    }
}
