// src/decoder/prepare.rs

use crate::decoder::{dsp, resample};
use crate::error::Result;
use crate::track::AudioTrack;

/// Channel count and sample rate an output renders at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceLayout {
    pub channels: usize,
    pub sample_rate: u32,
}

impl DeviceLayout {
    pub fn new(channels: usize, sample_rate: u32) -> Self {
        Self { channels: channels.max(1), sample_rate }
    }

    pub fn of_track(track: &AudioTrack) -> Self {
        Self::new(track.channel_count(), track.sample_rate())
    }
}

/// Interleaved samples already converted to one [`DeviceLayout`], ready to
/// hand to an output without further work.
#[derive(Clone, Debug)]
pub struct PreparedAudio {
    layout: DeviceLayout,
    samples: Vec<f32>,
}

impl PreparedAudio {
    /// Converts `track` to `layout`: channel count first, then rate. With no
    /// layout the track keeps its own.
    ///
    /// Resampling a long track is expensive, so call this off any thread that
    /// has to stay responsive.
    pub fn convert(track: &AudioTrack, layout: Option<DeviceLayout>) -> Result<Self> {
        let source = DeviceLayout::of_track(track);
        let layout = layout.unwrap_or(source);
        if layout == source {
            return Ok(Self { layout, samples: track.interleaved() });
        }

        let mut planar = track.planar().to_vec();
        if source.channels != layout.channels {
            let interleaved = dsp::interleave(&mut planar);
            let mixed = dsp::updown_mix_interleaved(&interleaved, source.channels, layout.channels);
            planar = vec![Vec::with_capacity(track.frames()); layout.channels];
            dsp::append_interleaved_to_planar(&mixed, &mut planar);
        }
        let mut planar = resample::resample_planar(&planar, source.sample_rate, layout.sample_rate)?;
        let samples = dsp::interleave(&mut planar);
        log::debug!(
            "Prepared {} device frames from {} Hz / {} ch",
            samples.len() / layout.channels,
            source.sample_rate,
            source.channels
        );
        Ok(Self { layout, samples })
    }

    pub fn layout(&self) -> DeviceLayout {
        self.layout
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.layout.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_to_stereo_same_rate() {
        let track = AudioTrack::mono(8000, vec![0.25, -0.5]);
        let audio = PreparedAudio::convert(&track, Some(DeviceLayout::new(2, 8000))).unwrap();
        assert_eq!(audio.samples(), &[0.25, 0.25, -0.5, -0.5]);
        assert_eq!(audio.frames(), 2);
    }

    #[test]
    fn test_resamples_to_device_rate() {
        let track = AudioTrack::from_planar(8000, vec![vec![0.1; 8000], vec![0.1; 8000]]);
        let audio = PreparedAudio::convert(&track, Some(DeviceLayout::new(2, 16000))).unwrap();
        assert_eq!(audio.layout(), DeviceLayout::new(2, 16000));
        assert_eq!(audio.samples().len(), 16000 * 2);
    }

    #[test]
    fn test_no_layout_keeps_track_format() {
        let track = AudioTrack::from_planar(10, vec![vec![1.0, 2.0], vec![-1.0, -2.0]]);
        let audio = PreparedAudio::convert(&track, None).unwrap();
        assert_eq!(audio.layout(), DeviceLayout::new(2, 10));
        assert_eq!(audio.into_samples(), vec![1.0, -1.0, 2.0, -2.0]);
    }
}
