// src/waveform/mod.rs
pub mod render;
pub mod terminal;

use crate::track::AudioTrack;

pub use render::{CursorOverlay, WaveformSurface};

/// Normalised per-bucket amplitudes of the analysed channel.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformModel {
    amplitudes: Vec<f32>,
}

impl WaveformModel {
    pub fn from_track(track: &AudioTrack) -> Self {
        Self { amplitudes: downsample(track) }
    }

    pub fn amplitudes(&self) -> &[f32] {
        &self.amplitudes
    }

    pub fn len(&self) -> usize {
        self.amplitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }
}

/// Reduces channel 0 of `track` to `sample_rate` buckets.
///
/// Each bucket holds the mean absolute amplitude of `len / sample_rate`
/// consecutive samples (any remainder at the end is not analysed). Buckets are
/// then scaled so the loudest one is exactly 1.0. A silent track yields all
/// zeros, a track shorter than one bucket per sample-rate unit yields nothing.
pub fn downsample(track: &AudioTrack) -> Vec<f32> {
    downsample_samples(track.channel_data(0), track.sample_rate() as usize)
}

pub fn downsample_samples(samples: &[f32], buckets: usize) -> Vec<f32> {
    if buckets == 0 {
        return Vec::new();
    }
    let block_size = samples.len() / buckets;
    if block_size == 0 {
        return Vec::new();
    }

    let mut filtered: Vec<f32> = samples
        .chunks_exact(block_size)
        .take(buckets)
        .map(|block| {
            let sum: f64 = block.iter().map(|s| s.abs() as f64).sum();
            (sum / block_size as f64) as f32
        })
        .collect();

    let max = filtered.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        for v in filtered.iter_mut() {
            *v /= max;
        }
    } else {
        filtered.fill(0.0);
    }
    filtered
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_count_follows_sample_rate() {
        // 10 Hz "sample rate", 3.5 s of audio: 10 buckets of 3 samples, 5 samples unused
        let track = AudioTrack::mono(10, vec![0.5; 35]);
        let buckets = downsample(&track);
        assert_eq!(buckets.len(), 10);
        assert!(buckets.iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_normalised_to_unit_peak() {
        let samples: Vec<f32> = vec![0.1, -0.1, 0.4, -0.4, 0.2, 0.2, 0.0, 0.0];
        let buckets = downsample_samples(&samples, 4);
        assert_eq!(buckets.len(), 4);
        assert!(buckets.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert_eq!(buckets[1], 1.0);
        assert!((buckets[0] - 0.25).abs() < 1e-6);
        assert!((buckets[2] - 0.5).abs() < 1e-6);
        assert_eq!(buckets[3], 0.0);
    }

    #[test]
    fn test_silence_is_all_zero() {
        let track = AudioTrack::mono(4, vec![0.0; 40]);
        let buckets = downsample(&track);
        assert_eq!(buckets.len(), 4);
        assert!(buckets.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_too_short_track_yields_no_buckets() {
        let track = AudioTrack::mono(100, vec![0.3; 99]);
        assert!(downsample(&track).is_empty());
        assert!(WaveformModel::from_track(&track).is_empty());
    }

    #[test]
    fn test_only_first_channel_analysed() {
        let track = AudioTrack::from_planar(2, vec![vec![0.0, 0.0, 0.5, 0.5], vec![1.0; 4]]);
        assert_eq!(downsample(&track), vec![0.0, 1.0]);
    }

    #[test]
    fn test_deterministic() {
        let samples: Vec<f32> = (0..1000).map(|i| ((i * 37 % 101) as f32 / 101.0) - 0.5).collect();
        assert_eq!(downsample_samples(&samples, 50), downsample_samples(&samples, 50));
    }
}
