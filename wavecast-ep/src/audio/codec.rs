//! WAV decode for synthesized clips and episode export
//!
//! Clips arrive from the speech provider as WAV bytes and are decoded into
//! f32 buffers for assembly. Export goes through the EpisodeEncoder trait;
//! the built-in encoder writes 16-bit PCM WAV. Lossy formats are an
//! external-encoder concern and are rejected at configuration time.

use crate::audio::AudioBuffer;
use std::io::Cursor;
use std::path::Path;
use wavecast_common::{Error, Result};

/// Writes a finished episode buffer to disk in a concrete container format
pub trait EpisodeEncoder: Send + Sync {
    /// File extension for the produced format, without the dot
    fn extension(&self) -> &'static str;

    fn encode_to_file(&self, audio: &AudioBuffer, path: &Path) -> Result<()>;
}

/// Built-in 16-bit PCM WAV encoder
pub struct WavEncoder;

impl EpisodeEncoder for WavEncoder {
    fn extension(&self) -> &'static str {
        "wav"
    }

    fn encode_to_file(&self, audio: &AudioBuffer, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: audio.channels,
            sample_rate: audio.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::create(path, spec)
            .map_err(|e| Error::Internal(format!("WAV write failed: {}", e)))?;

        for sample in &audio.samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer
                .write_sample((clamped * i16::MAX as f32) as i16)
                .map_err(|e| Error::Internal(format!("WAV write failed: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| Error::Internal(format!("WAV write failed: {}", e)))?;

        Ok(())
    }
}

/// Decode WAV bytes into an f32 buffer. Accepts 16-bit integer and 32-bit
/// float sample formats, which covers the speech providers in use.
pub fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| Error::InvalidInput(format!("WAV decode failed: {}", e)))?;

    let spec = reader.spec();
    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .map(|s| s.map(|v| v as f32 / i16::MAX as f32))
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::InvalidInput(format!("WAV decode failed: {}", e)))?,
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::InvalidInput(format!("WAV decode failed: {}", e)))?,
        (format, bits) => {
            return Err(Error::InvalidInput(format!(
                "Unsupported WAV sample format: {:?}/{} bits",
                format, bits
            )));
        }
    };

    Ok(AudioBuffer::new(samples, spec.sample_rate, spec.channels))
}

/// Encode a buffer to WAV bytes in memory (clip persistence)
pub fn encode_wav_bytes(audio: &AudioBuffer) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::Internal(format!("WAV encode failed: {}", e)))?;
        for sample in &audio.samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer
                .write_sample((clamped * i16::MAX as f32) as i16)
                .map_err(|e| Error::Internal(format!("WAV encode failed: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::Internal(format!("WAV encode failed: {}", e)))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_bytes_round_trip() {
        let original = AudioBuffer::new(vec![0.0, 0.5, -0.5, 0.25], 24000, 1);
        let bytes = encode_wav_bytes(&original).unwrap();
        let decoded = decode_wav(&bytes).unwrap();

        assert_eq!(decoded.sample_rate, 24000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples.len(), 4);
        for (a, b) in original.samples.iter().zip(decoded.samples.iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_wav(b"not a wav file").is_err());
    }

    #[test]
    fn test_file_encoder_writes_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("episode.wav");
        let audio = AudioBuffer::silent(100, 24000, 1);

        WavEncoder.encode_to_file(&audio, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        let decoded = decode_wav(&bytes).unwrap();
        assert_eq!(decoded.duration_ms(), 100);
    }
}
