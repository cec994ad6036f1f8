//! Bounded-concurrency synthesis scheduling
//!
//! Chunks are processed in batches of at most `concurrency_limit`; a batch
//! is awaited in full before the next one starts, which keeps the provider
//! load bounded without a free-running task pool. Results land at their
//! chunk's original index regardless of completion order.

use crate::error::ProviderError;
use crate::retry::RetryPolicy;
use crate::script::segmenter::SynthesisChunk;
use crate::script::SpeakerRole;
use crate::synth::SpeechSynthesizer;
use crate::audio::AudioBuffer;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use wavecast_common::config::SynthesisConfig;

/// One successfully synthesized chunk
#[derive(Debug, Clone)]
pub struct SynthesizedClip {
    /// Original chunk index; assembly order
    pub index: usize,
    pub speaker: SpeakerRole,
    pub voice: String,
    pub audio: AudioBuffer,
}

/// A chunk that failed every attempt
#[derive(Debug, Clone)]
pub struct ChunkFailure {
    pub index: usize,
    pub cause: String,
}

/// Result of a full synthesis batch run. `clips` has one slot per input
/// chunk, in input order; failed chunks leave their slot empty.
#[derive(Debug)]
pub struct BatchOutcome {
    pub clips: Vec<Option<SynthesizedClip>>,
    pub failures: Vec<ChunkFailure>,
}

impl BatchOutcome {
    /// Successful clips in input order, gaps removed
    pub fn successful_clips(&self) -> Vec<&SynthesizedClip> {
        self.clips.iter().flatten().collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn is_total_failure(&self) -> bool {
        !self.clips.is_empty() && self.clips.iter().all(|c| c.is_none())
    }
}

pub struct SynthesisScheduler {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    voices: BTreeMap<String, String>,
    concurrency_limit: usize,
    retry: RetryPolicy,
}

impl SynthesisScheduler {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, config: &SynthesisConfig) -> Self {
        Self {
            synthesizer,
            voices: config.voices.clone(),
            concurrency_limit: config.concurrency_limit.max(1),
            retry: RetryPolicy::new(
                config.retry_attempts,
                Duration::from_millis(config.retry_backoff_ms),
            ),
        }
    }

    /// Voice id for a speaker role; an unmapped role uses the HOST voice.
    /// Configuration validation guarantees the HOST mapping exists.
    fn voice_for(&self, speaker: SpeakerRole) -> String {
        self.voices
            .get(speaker.as_str())
            .or_else(|| self.voices.get(SpeakerRole::Host.as_str()))
            .cloned()
            .unwrap_or_else(|| "alloy".to_string())
    }

    /// Synthesize all chunks with bounded concurrency.
    ///
    /// Individual chunk failures never abort the run; the caller decides
    /// what a partial clip set means for the episode.
    pub async fn synthesize_all(&self, chunks: &[SynthesisChunk]) -> BatchOutcome {
        let mut clips: Vec<Option<SynthesizedClip>> = Vec::new();
        clips.resize_with(chunks.len(), || None);
        let mut failures = Vec::new();

        let batch_count = chunks.len().div_ceil(self.concurrency_limit);

        for (batch_number, batch) in chunks.chunks(self.concurrency_limit).enumerate() {
            let futures = batch.iter().map(|chunk| self.synthesize_chunk(chunk));
            let results = futures::future::join_all(futures).await;

            for (chunk, result) in batch.iter().zip(results) {
                match result {
                    Ok(clip) => {
                        if let Some(slot) = clips.get_mut(chunk.index) {
                            *slot = Some(clip);
                        }
                    }
                    Err(err) => {
                        warn!(
                            chunk_index = chunk.index,
                            speaker = %chunk.speaker,
                            error = %err,
                            "Chunk synthesis failed, continuing with remaining chunks"
                        );
                        failures.push(ChunkFailure {
                            index: chunk.index,
                            cause: err.to_string(),
                        });
                    }
                }
            }

            info!(
                batch = batch_number + 1,
                batches = batch_count,
                "Synthesis batch complete"
            );
        }

        failures.sort_by_key(|f| f.index);
        BatchOutcome { clips, failures }
    }

    async fn synthesize_chunk(
        &self,
        chunk: &SynthesisChunk,
    ) -> Result<SynthesizedClip, ProviderError> {
        let voice = self.voice_for(chunk.speaker);
        let audio = self
            .retry
            .run("synthesize_chunk", || {
                self.synthesizer.synthesize(&chunk.content, &voice)
            })
            .await?;

        Ok(SynthesizedClip {
            index: chunk.index,
            speaker: chunk.speaker,
            voice,
            audio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::SegmentKind;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Synthesizer that delays inversely to the chunk index, so later
    /// chunks complete before earlier ones within a batch.
    struct ReversingSynth;

    #[async_trait]
    impl SpeechSynthesizer for ReversingSynth {
        async fn synthesize(&self, text: &str, _voice: &str) -> Result<AudioBuffer, ProviderError> {
            let index: u64 = text.parse().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(20u64.saturating_sub(index * 5))).await;
            // Encode the input index as the frame count
            Ok(AudioBuffer::new(vec![0.1; index as usize + 1], 24000, 1))
        }
    }

    /// Fails chunks whose content contains "fail"
    struct SelectiveFailSynth {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SpeechSynthesizer for SelectiveFailSynth {
        async fn synthesize(&self, text: &str, _voice: &str) -> Result<AudioBuffer, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if text.contains("fail") {
                Err(ProviderError::Permanent("scripted failure".to_string()))
            } else {
                Ok(AudioBuffer::new(vec![0.1; 10], 24000, 1))
            }
        }
    }

    fn chunk(index: usize, content: &str) -> SynthesisChunk {
        SynthesisChunk {
            index,
            source_segment_index: 1,
            chunk_index: index,
            speaker: SpeakerRole::Host,
            kind: SegmentKind::Main,
            content: content.to_string(),
            emphasis: Vec::new(),
        }
    }

    fn config(concurrency: usize) -> SynthesisConfig {
        SynthesisConfig {
            concurrency_limit: concurrency,
            retry_attempts: 1,
            retry_backoff_ms: 1,
            ..SynthesisConfig::default()
        }
    }

    #[tokio::test]
    async fn test_order_preserved_despite_completion_order() {
        let scheduler = SynthesisScheduler::new(Arc::new(ReversingSynth), &config(4));
        let chunks: Vec<_> = (0..4).map(|i| chunk(i, &i.to_string())).collect();

        let outcome = scheduler.synthesize_all(&chunks).await;

        assert!(outcome.is_complete());
        for (i, slot) in outcome.clips.iter().enumerate() {
            let clip = slot.as_ref().unwrap();
            assert_eq!(clip.index, i);
            assert_eq!(clip.audio.samples.len(), i + 1);
        }
    }

    #[tokio::test]
    async fn test_failed_chunk_leaves_gap_and_batch_continues() {
        let synth = Arc::new(SelectiveFailSynth {
            calls: AtomicUsize::new(0),
        });
        let scheduler = SynthesisScheduler::new(synth.clone(), &config(2));
        let chunks = vec![chunk(0, "bonjour"), chunk(1, "fail here"), chunk(2, "suite")];

        let outcome = scheduler.synthesize_all(&chunks).await;

        assert!(outcome.clips[0].is_some());
        assert!(outcome.clips[1].is_none());
        assert!(outcome.clips[2].is_some());
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 1);
        // Every chunk was attempted
        assert_eq!(synth.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unmapped_role_falls_back_to_host_voice() {
        let scheduler = SynthesisScheduler::new(Arc::new(ReversingSynth), &config(1));
        // EXPERT removed from the voice map
        let mut cfg = config(1);
        cfg.voices.remove("EXPERT");
        let scheduler_no_expert = SynthesisScheduler::new(Arc::new(ReversingSynth), &cfg);

        assert_eq!(scheduler.voice_for(SpeakerRole::Expert), "onyx");
        assert_eq!(scheduler_no_expert.voice_for(SpeakerRole::Expert), "alloy");
    }

    #[tokio::test]
    async fn test_total_failure_detection() {
        let synth = Arc::new(SelectiveFailSynth {
            calls: AtomicUsize::new(0),
        });
        let scheduler = SynthesisScheduler::new(synth, &config(2));
        let chunks = vec![chunk(0, "fail a"), chunk(1, "fail b")];

        let outcome = scheduler.synthesize_all(&chunks).await;
        assert!(outcome.is_total_failure());
        assert_eq!(outcome.failures.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_chunk_list() {
        let outcome = SynthesisScheduler::new(Arc::new(ReversingSynth), &config(3))
            .synthesize_all(&[])
            .await;
        assert!(outcome.clips.is_empty());
        assert!(outcome.is_complete());
        assert!(!outcome.is_total_failure());
    }
}
