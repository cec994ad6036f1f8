//! In-memory audio buffers and the pure operations the assembler composes
//!
//! Samples are interleaved f32 in [-1.0, 1.0]. Every operation here is a
//! pure function of its inputs, so an assembly over identical clips and
//! identical settings produces identical bytes.

pub mod assembler;
pub mod codec;

use wavecast_common::FadeCurve;

/// Interleaved f32 PCM audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Silence of the given duration
    pub fn silent(duration_ms: u64, sample_rate: u32, channels: u16) -> Self {
        let frames = frames_for_ms(duration_ms, sample_rate);
        Self {
            samples: vec![0.0; frames * channels as usize],
            sample_rate,
            channels,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frame count (samples per channel)
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Duration in milliseconds, rounded down
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.frames() as u64 * 1000) / self.sample_rate as u64
    }

    /// Copy of the frames in [start_ms, end_ms), clamped to the buffer
    pub fn slice_ms(&self, start_ms: u64, end_ms: u64) -> AudioBuffer {
        let ch = self.channels as usize;
        let start = frames_for_ms(start_ms, self.sample_rate).min(self.frames()) * ch;
        let end = frames_for_ms(end_ms, self.sample_rate).min(self.frames()) * ch;
        let samples = if start < end {
            self.samples[start..end].to_vec()
        } else {
            Vec::new()
        };
        AudioBuffer::new(samples, self.sample_rate, self.channels)
    }

    /// Apply a constant gain in decibels
    pub fn gain_db(&self, db: f32) -> AudioBuffer {
        let factor = db_to_linear(db);
        AudioBuffer::new(
            self.samples.iter().map(|s| s * factor).collect(),
            self.sample_rate,
            self.channels,
        )
    }

    /// Append another buffer with no gap or overlap
    pub fn append(&mut self, other: &AudioBuffer) {
        self.samples.extend_from_slice(&other.samples);
    }

    /// Append with a crossfade: the tail of self fades out while the head
    /// of `other` fades in over `window_ms`, overlapping by the window.
    pub fn append_crossfade(&mut self, other: &AudioBuffer, window_ms: u64, curve: FadeCurve) {
        let ch = self.channels as usize;
        let window_frames = frames_for_ms(window_ms, self.sample_rate)
            .min(self.frames())
            .min(other.frames());

        if window_frames == 0 {
            self.append(other);
            return;
        }

        let tail_start = (self.frames() - window_frames) * ch;
        for frame in 0..window_frames {
            let position = (frame as f32 + 0.5) / window_frames as f32;
            let out_gain = curve.fade_out_gain(position);
            let in_gain = curve.fade_in_gain(position);
            for c in 0..ch {
                let idx = tail_start + frame * ch + c;
                self.samples[idx] =
                    self.samples[idx] * out_gain + other.samples[frame * ch + c] * in_gain;
            }
        }

        self.samples
            .extend_from_slice(&other.samples[window_frames * ch..]);
    }

    /// Loop by self-concatenation until at least `target_ms` long.
    /// An empty buffer cannot be extended and is returned as-is.
    pub fn loop_to_ms(&self, target_ms: u64) -> AudioBuffer {
        let mut out = self.clone();
        if self.is_empty() {
            return out;
        }
        while out.duration_ms() < target_ms {
            out.samples.extend_from_slice(&self.samples);
        }
        out
    }

    /// Mix `overlay` into self starting at `position_ms`, extending self if
    /// the overlay runs past the end.
    pub fn overlay(&mut self, overlay: &AudioBuffer, position_ms: u64) {
        let ch = self.channels as usize;
        let offset = frames_for_ms(position_ms, self.sample_rate) * ch;
        let needed = offset + overlay.samples.len();
        if self.samples.len() < needed {
            self.samples.resize(needed, 0.0);
        }
        for (i, s) in overlay.samples.iter().enumerate() {
            self.samples[offset + i] += s;
        }
    }

    /// Peak-normalize so the loudest sample sits `headroom_db` below full
    /// scale. A silent buffer is left untouched.
    pub fn normalize(&mut self, headroom_db: f32) {
        let peak = self
            .samples
            .iter()
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
        if peak <= f32::EPSILON {
            return;
        }
        let target = db_to_linear(-headroom_db.abs());
        let factor = target / peak;
        for s in &mut self.samples {
            *s *= factor;
        }
    }

    /// Single-pole high-pass filter, applied per channel
    pub fn high_pass(&mut self, cutoff_hz: f32) {
        if cutoff_hz <= 0.0 || self.is_empty() {
            return;
        }
        let ch = self.channels as usize;
        let alpha = pole_coefficient(cutoff_hz, self.sample_rate);
        for c in 0..ch {
            let mut prev_in = 0.0f32;
            let mut prev_out = 0.0f32;
            let mut i = c;
            while i < self.samples.len() {
                let x = self.samples[i];
                let y = alpha * (prev_out + x - prev_in);
                prev_in = x;
                prev_out = y;
                self.samples[i] = y;
                i += ch;
            }
        }
    }

    /// Single-pole low-pass filter, applied per channel
    pub fn low_pass(&mut self, cutoff_hz: f32) {
        if cutoff_hz <= 0.0 || self.is_empty() {
            return;
        }
        let ch = self.channels as usize;
        let alpha = 1.0 - pole_coefficient(cutoff_hz, self.sample_rate);
        for c in 0..ch {
            let mut prev_out = 0.0f32;
            let mut i = c;
            while i < self.samples.len() {
                let x = self.samples[i];
                let y = prev_out + alpha * (x - prev_out);
                prev_out = y;
                self.samples[i] = y;
                i += ch;
            }
        }
    }
}

pub(crate) fn frames_for_ms(ms: u64, sample_rate: u32) -> usize {
    ((ms as u128 * sample_rate as u128) / 1000) as usize
}

pub(crate) fn db_to_linear(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

fn pole_coefficient(cutoff_hz: f32, sample_rate: u32) -> f32 {
    let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff_hz);
    let dt = 1.0 / sample_rate as f32;
    rc / (rc + dt)
}
