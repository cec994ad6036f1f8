//! Episode assembly: voice track, ambient bed, mastering
//!
//! Assembly is a fixed sequence over pure buffer operations, so the same
//! clips and settings always produce the same bytes:
//!
//! 1. concatenate clips into the voice track;
//! 2. attenuate and loop the bed, then zone it into intro, ducked body
//!    and outro;
//! 3. rejoin the zones with equal-power crossfades;
//! 4. overlay the voice at the intro offset;
//! 5. master: peak-normalize, then high-pass, then low-pass.

use crate::audio::AudioBuffer;
use tracing::{debug, info};
use wavecast_common::config::MasteringConfig;
use wavecast_common::{Error, Result};

pub struct AudioAssembler {
    config: MasteringConfig,
}

impl AudioAssembler {
    pub fn new(config: MasteringConfig) -> Self {
        Self { config }
    }

    /// Assemble a finished episode from synthesized clips and a bed.
    ///
    /// An empty bed buffer means "no bed": a silent one of matching shape
    /// is used so zoning and overlay still apply.
    pub fn assemble(&self, clips: &[AudioBuffer], bed: &AudioBuffer) -> Result<AudioBuffer> {
        let voice = self.concatenate_voice(clips)?;
        let voice_ms = voice.duration_ms();
        debug!(
            voice_ms,
            clip_count = clips.len(),
            "Voice track concatenated"
        );

        let bed = self.prepare_bed(bed, &voice, voice_ms)?;
        let mut episode = self.zone_bed(&bed, voice_ms);

        episode.overlay(&voice, self.config.intro_ms);

        episode.normalize(self.config.headroom_db);
        episode.high_pass(self.config.eq_low_cut_hz);
        episode.low_pass(self.config.eq_high_cut_hz);

        info!(
            duration_ms = episode.duration_ms(),
            sample_rate = episode.sample_rate,
            "Episode assembled"
        );
        Ok(episode)
    }

    /// Sequential clip concatenation, no gaps. All clips must share the
    /// same sample rate and channel layout.
    fn concatenate_voice(&self, clips: &[AudioBuffer]) -> Result<AudioBuffer> {
        let mut iter = clips.iter().filter(|c| !c.is_empty());
        let first = iter
            .next()
            .ok_or_else(|| Error::InvalidInput("No clips to assemble".to_string()))?;

        let mut voice = first.clone();
        for clip in iter {
            if clip.sample_rate != voice.sample_rate || clip.channels != voice.channels {
                return Err(Error::InvalidInput(format!(
                    "Clip format mismatch: {} Hz/{} ch vs {} Hz/{} ch",
                    clip.sample_rate, clip.channels, voice.sample_rate, voice.channels
                )));
            }
            voice.append(clip);
        }
        Ok(voice)
    }

    /// Attenuate the bed and loop it until it covers all three zones:
    /// intro, ducked body and outro. An absent bed becomes silence of that
    /// length.
    fn prepare_bed(
        &self,
        bed: &AudioBuffer,
        voice: &AudioBuffer,
        voice_ms: u64,
    ) -> Result<AudioBuffer> {
        let lead_ms = self.config.intro_ms.max(self.config.intro_padding_ms);
        let target_ms = lead_ms + voice_ms + self.config.outro_ms;

        if bed.is_empty() {
            return Ok(AudioBuffer::silent(
                target_ms,
                voice.sample_rate,
                voice.channels,
            ));
        }

        if bed.sample_rate != voice.sample_rate || bed.channels != voice.channels {
            return Err(Error::InvalidInput(format!(
                "Bed format mismatch: {} Hz/{} ch vs voice {} Hz/{} ch",
                bed.sample_rate, bed.channels, voice.sample_rate, voice.channels
            )));
        }

        let attenuated = bed.gain_db(self.config.bed_gain_db);
        Ok(attenuated.loop_to_ms(target_ms))
    }

    /// Slice the bed into intro, ducked body and outro zones and rejoin
    /// them with crossfades.
    fn zone_bed(&self, bed: &AudioBuffer, voice_ms: u64) -> AudioBuffer {
        let intro_end = self.config.intro_ms;
        let body_end = intro_end + voice_ms;
        let outro_end = body_end + self.config.outro_ms;

        let mut episode = bed.slice_ms(0, intro_end);
        let body = bed
            .slice_ms(intro_end, body_end)
            .gain_db(self.config.ducking_db);
        let outro = bed.slice_ms(body_end, outro_end);

        episode.append_crossfade(&body, self.config.crossfade_ms, self.config.crossfade_curve);
        episode.append_crossfade(&outro, self.config.crossfade_ms, self.config.crossfade_curve);
        episode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MasteringConfig {
        MasteringConfig {
            intro_ms: 1000,
            outro_ms: 1000,
            intro_padding_ms: 1000,
            crossfade_ms: 100,
            ..MasteringConfig::default()
        }
    }

    fn clip(duration_ms: u64, value: f32) -> AudioBuffer {
        let frames = (duration_ms * 24000 / 1000) as usize;
        AudioBuffer::new(vec![value; frames], 24000, 1)
    }

    #[test]
    fn test_assemble_rejects_empty_clip_set() {
        let assembler = AudioAssembler::new(config());
        let bed = AudioBuffer::new(Vec::new(), 24000, 1);
        assert!(assembler.assemble(&[], &bed).is_err());
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let assembler = AudioAssembler::new(config());
        let clips = vec![clip(500, 0.4), clip(700, 0.3)];
        let bed = clip(800, 0.2);

        let first = assembler.assemble(&clips, &bed).unwrap();
        let second = assembler.assemble(&clips, &bed).unwrap();
        assert_eq!(first.samples, second.samples);
    }

    #[test]
    fn test_episode_covers_voice_plus_intro() {
        let assembler = AudioAssembler::new(config());
        let clips = vec![clip(2000, 0.4)];
        let bed = clip(500, 0.2);

        let episode = assembler.assemble(&clips, &bed).unwrap();
        // Voice overlaid at the intro offset must fit inside the episode
        assert!(episode.duration_ms() >= 1000 + 2000);
    }

    #[test]
    fn test_bed_loops_to_cover_all_zones() {
        // 3 s bed against a 10 s voice: intro (5 s) + body (10 s) + outro
        // (5 s) requires at least 20 s of bed material
        let assembler = AudioAssembler::new(MasteringConfig {
            intro_ms: 5000,
            outro_ms: 5000,
            intro_padding_ms: 5000,
            ..MasteringConfig::default()
        });
        let bed = clip(3000, 0.2);
        let voice = clip(10_000, 0.4);

        let prepared = assembler.prepare_bed(&bed, &voice, 10_000).unwrap();
        assert!(prepared.duration_ms() >= 20_000);
    }

    #[test]
    fn test_outro_zone_has_bed_material() {
        // A short bed whose loop used to stop at voice + padding left the
        // outro slice empty; the full zoned bed must end with a real outro
        let assembler = AudioAssembler::new(MasteringConfig {
            intro_ms: 5000,
            outro_ms: 5000,
            intro_padding_ms: 5000,
            crossfade_ms: 2000,
            ..MasteringConfig::default()
        });
        let bed = clip(3000, 0.2);
        let voice = clip(10_000, 0.4);

        let prepared = assembler.prepare_bed(&bed, &voice, 10_000).unwrap();
        let outro = prepared.slice_ms(5000 + 10_000, 5000 + 10_000 + 5000);
        assert_eq!(outro.duration_ms(), 5000);
        assert!(outro.samples.iter().any(|s| *s != 0.0));

        // intro + body + outro minus the two crossfade overlaps
        let zoned = assembler.zone_bed(&prepared, 10_000);
        assert!(zoned.duration_ms() >= 5000 + 10_000 + 5000 - 2 * 2000);
    }

    #[test]
    fn test_silent_bed_synthesized_when_absent() {
        let assembler = AudioAssembler::new(config());
        let voice = clip(2000, 0.4);
        let empty = AudioBuffer::new(Vec::new(), 24000, 1);

        let prepared = assembler.prepare_bed(&empty, &voice, 2000).unwrap();
        assert!(prepared.samples.iter().all(|s| *s == 0.0));
        assert!(prepared.duration_ms() >= 2000 + 1000);
    }

    #[test]
    fn test_format_mismatch_rejected() {
        let assembler = AudioAssembler::new(config());
        let clips = vec![clip(500, 0.4), AudioBuffer::new(vec![0.1; 100], 44100, 1)];
        let bed = AudioBuffer::new(Vec::new(), 24000, 1);
        assert!(assembler.assemble(&clips, &bed).is_err());
    }

    #[test]
    fn test_final_peak_respects_headroom() {
        let assembler = AudioAssembler::new(config());
        let clips = vec![clip(2000, 0.9)];
        let bed = clip(500, 0.8);

        let episode = assembler.assemble(&clips, &bed).unwrap();
        let peak = episode.samples.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        // Filters only remove energy after normalization
        assert!(peak <= 1.0);
    }
}
