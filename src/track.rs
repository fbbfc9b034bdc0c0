// src/track.rs

use crate::decoder::dsp;

/// Fully decoded PCM audio for one file. Immutable once built.
#[derive(Clone, Debug)]
pub struct AudioTrack {
    sample_rate: u32,
    /// Planar samples, one `Vec` per channel, all the same length.
    channels: Vec<Vec<f32>>,
    duration: f64,
}

impl AudioTrack {
    /// Builds a track from planar channel data. Channels shorter than the
    /// first one are padded with silence.
    pub fn from_planar(sample_rate: u32, mut channels: Vec<Vec<f32>>) -> Self {
        let frames = channels.first().map(|c| c.len()).unwrap_or(0);
        for ch in channels.iter_mut() {
            ch.resize(frames, 0.0);
        }
        let duration = if sample_rate == 0 { 0.0 } else { frames as f64 / sample_rate as f64 };
        Self { sample_rate, channels, duration }
    }

    pub fn mono(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self::from_planar(sample_rate, vec![samples])
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    /// Seconds of audio.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn channel_data(&self, channel: usize) -> &[f32] {
        self.channels.get(channel).map(|c| c.as_slice()).unwrap_or(&[])
    }

    pub fn planar(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Frame-interleaved copy of all channels.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut planar = self.channels.clone();
        dsp::interleave(&mut planar)
    }
}
