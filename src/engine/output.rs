// src/engine/output.rs

use crate::config::PlayerConfig;
use crate::decoder::{dsp, DeviceLayout, PreparedAudio};
use crate::error::{PlayerError, Result};

/// Identifies one started source so a stale handle cannot stop a newer one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceHandle(pub u64);

/// An audio clock plus a single playable source.
///
/// The clock only advances while the output is resumed, so
/// `now() - started_at` is the audible elapsed time.
pub trait AudioOutput {
    /// The layout this output renders at, or `None` if it takes whatever
    /// layout it is given.
    fn layout(&self) -> Option<DeviceLayout>;

    /// Installs audio converted to [`AudioOutput::layout`]. Any running source
    /// is dropped.
    fn bind(&mut self, audio: PreparedAudio) -> Result<()>;

    /// Seconds on the output clock.
    fn now(&self) -> f64;

    fn resume(&mut self) -> Result<()>;

    fn suspend(&mut self) -> Result<()>;

    /// Starts rendering the bound track from `offset_secs`.
    /// Fails if another source is still active.
    fn start_source(&mut self, offset_secs: f64) -> Result<SourceHandle>;

    fn stop_source(&mut self, handle: SourceHandle);

    fn set_gain(&mut self, gain: f32);

    fn active_sources(&self) -> usize;

    /// Releases device resources. Later calls are harmless no-ops.
    fn close(&mut self);
}

/// Creates one output per loaded file.
pub trait OutputFactory {
    type Output: AudioOutput;

    /// Layout the next opened output is expected to have. Lets callers
    /// convert audio before the output exists.
    fn layout(&mut self) -> Result<Option<DeviceLayout>>;

    fn open(&mut self, config: &PlayerConfig) -> Result<Self::Output>;
}

#[derive(Clone, Copy, Debug)]
struct ActiveSource {
    id: u64,
    frame: usize,
    fade_left: usize,
}

/// Interleaved PCM plus playback cursor, shared between control code and
/// whatever pulls samples (a device callback or an offline renderer).
#[derive(Debug)]
pub struct SourceBus {
    samples: Vec<f32>,
    channels: usize,
    sample_rate: u32,
    running: bool,
    clock_frames: u64,
    source: Option<ActiveSource>,
    gain: f32,
    fade_frames: usize,
    next_id: u64,
    closed: bool,
}

impl SourceBus {
    pub fn new(channels: usize, sample_rate: u32, fade_ms: u32) -> Self {
        Self {
            samples: Vec::new(),
            channels: channels.max(1),
            sample_rate,
            running: false,
            clock_frames: 0,
            source: None,
            gain: 1.0,
            fade_frames: dsp::fade_samples_ms(sample_rate, fade_ms),
            next_id: 1,
            closed: false,
        }
    }

    /// Replaces the playable audio. `samples` must already match this bus's
    /// channel count and sample rate.
    pub fn load(&mut self, samples: Vec<f32>) {
        self.source = None;
        self.samples = samples;
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn now(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.clock_frames as f64 / self.sample_rate as f64
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn set_running(&mut self, running: bool) -> Result<()> {
        if self.closed {
            return Err(PlayerError::IllegalState("output is closed"));
        }
        self.running = running;
        Ok(())
    }

    pub fn start(&mut self, offset_secs: f64) -> Result<SourceHandle> {
        if self.closed {
            return Err(PlayerError::IllegalState("output is closed"));
        }
        if self.source.is_some() {
            return Err(PlayerError::IllegalState("a source is already active"));
        }
        let id = self.next_id;
        self.next_id += 1;
        let frame = (offset_secs.max(0.0) * self.sample_rate as f64).round() as usize;
        self.source = Some(ActiveSource { id, frame, fade_left: self.fade_frames });
        Ok(SourceHandle(id))
    }

    pub fn stop(&mut self, handle: SourceHandle) {
        if self.source.is_some_and(|s| s.id == handle.0) {
            self.source = None;
        }
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn active_sources(&self) -> usize {
        usize::from(self.source.is_some())
    }

    /// Playback position of the active source in seconds.
    pub fn source_position(&self) -> Option<f64> {
        self.source.map(|s| s.frame as f64 / self.sample_rate.max(1) as f64)
    }

    pub fn close(&mut self) {
        self.closed = true;
        self.running = false;
        self.source = None;
        self.samples = Vec::new();
    }

    /// Fills `out` (interleaved, this bus's channel count). While suspended
    /// the buffer is silent and the clock stands still.
    pub fn render(&mut self, out: &mut [f32]) {
        if !self.running || self.closed {
            out.fill(0.0);
            return;
        }

        let channels = self.channels;
        let total_frames = self.samples.len() / channels;
        let gain = self.gain;
        let fade = self.fade_frames;

        for frame_out in out.chunks_mut(channels) {
            match self.source.as_mut() {
                Some(src) if src.frame < total_frames => {
                    let ramp = if src.fade_left > 0 && fade > 0 {
                        let r = (fade - src.fade_left) as f32 / fade as f32;
                        src.fade_left -= 1;
                        r
                    } else {
                        1.0
                    };
                    let base = src.frame * channels;
                    for (o, s) in frame_out.iter_mut().zip(&self.samples[base..base + channels]) {
                        *o = s * gain * ramp;
                    }
                    src.frame += 1;
                }
                _ => frame_out.fill(0.0),
            }
        }

        self.clock_frames += (out.len() / channels) as u64;
    }
}

/// Output rendered on demand by the caller instead of a sound card. Used for
/// headless hosts and tests; the clock moves only through [`OfflineOutput::render`]
/// or [`OfflineOutput::advance`].
#[derive(Debug)]
pub struct OfflineOutput {
    bus: SourceBus,
    layout: Option<DeviceLayout>,
    fade_ms: u32,
}

impl OfflineOutput {
    /// Plays every track in its own layout.
    pub fn new(fade_ms: u32) -> Self {
        Self { bus: SourceBus::new(1, 0, fade_ms), layout: None, fade_ms }
    }

    /// Behaves like a device fixed at `layout`.
    pub fn with_layout(layout: DeviceLayout, fade_ms: u32) -> Self {
        Self {
            bus: SourceBus::new(layout.channels, layout.sample_rate, fade_ms),
            layout: Some(layout),
            fade_ms,
        }
    }

    pub fn bus(&self) -> &SourceBus {
        &self.bus
    }

    pub fn render(&mut self, out: &mut [f32]) {
        self.bus.render(out);
    }

    /// Renders and discards `secs` worth of audio.
    pub fn advance(&mut self, secs: f64) {
        let frames = (secs.max(0.0) * self.bus.sample_rate() as f64).round() as usize;
        let mut scratch = vec![0.0f32; frames * self.bus.channels()];
        self.bus.render(&mut scratch);
    }
}

impl AudioOutput for OfflineOutput {
    fn layout(&self) -> Option<DeviceLayout> {
        self.layout
    }

    fn bind(&mut self, audio: PreparedAudio) -> Result<()> {
        let layout = audio.layout();
        if self.layout.is_some_and(|own| own != layout) {
            return Err(PlayerError::Output(format!("audio prepared for {layout:?}, output is {:?}", self.layout)));
        }
        let mut bus = SourceBus::new(layout.channels, layout.sample_rate, self.fade_ms);
        bus.set_gain(self.bus.gain());
        bus.load(audio.into_samples());
        self.bus = bus;
        Ok(())
    }

    fn now(&self) -> f64 {
        self.bus.now()
    }

    fn resume(&mut self) -> Result<()> {
        self.bus.set_running(true)
    }

    fn suspend(&mut self) -> Result<()> {
        self.bus.set_running(false)
    }

    fn start_source(&mut self, offset_secs: f64) -> Result<SourceHandle> {
        self.bus.start(offset_secs)
    }

    fn stop_source(&mut self, handle: SourceHandle) {
        self.bus.stop(handle);
    }

    fn set_gain(&mut self, gain: f32) {
        self.bus.set_gain(gain);
    }

    fn active_sources(&self) -> usize {
        self.bus.active_sources()
    }

    fn close(&mut self) {
        self.bus.close();
    }
}

/// Hands out [`OfflineOutput`]s, optionally pinned to one layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineFactory {
    pub layout: Option<DeviceLayout>,
}

impl OfflineFactory {
    pub fn with_layout(layout: DeviceLayout) -> Self {
        Self { layout: Some(layout) }
    }
}

impl OutputFactory for OfflineFactory {
    type Output = OfflineOutput;

    fn layout(&mut self) -> Result<Option<DeviceLayout>> {
        Ok(self.layout)
    }

    fn open(&mut self, config: &PlayerConfig) -> Result<OfflineOutput> {
        Ok(match self.layout {
            Some(layout) => OfflineOutput::with_layout(layout, config.fade_in_ms),
            None => OfflineOutput::new(config.fade_in_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::AudioTrack;

    fn bound(samples: Vec<f32>, rate: u32) -> OfflineOutput {
        let mut out = OfflineOutput::new(0);
        let audio = PreparedAudio::convert(&AudioTrack::mono(rate, samples), None).unwrap();
        out.bind(audio).unwrap();
        out
    }

    #[test]
    fn test_clock_frozen_while_suspended() {
        let mut out = bound(vec![0.5; 100], 10);
        out.advance(2.0);
        assert_eq!(out.now(), 0.0);
        out.resume().unwrap();
        out.advance(2.0);
        assert_eq!(out.now(), 2.0);
        out.suspend().unwrap();
        out.advance(5.0);
        assert_eq!(out.now(), 2.0);
    }

    #[test]
    fn test_source_renders_from_offset_with_gain() {
        let samples: Vec<f32> = (0..10).map(|i| i as f32 / 10.0).collect();
        let mut out = bound(samples, 10);
        out.set_gain(0.5);
        out.resume().unwrap();
        out.start_source(0.3).unwrap();
        let mut buf = [0.0f32; 4];
        out.render(&mut buf);
        assert_eq!(buf, [0.15, 0.2, 0.25, 0.3]);
    }

    #[test]
    fn test_past_end_is_silence() {
        let mut out = bound(vec![1.0; 3], 10);
        out.resume().unwrap();
        out.start_source(0.0).unwrap();
        let mut buf = [9.0f32; 5];
        out.render(&mut buf);
        assert_eq!(buf, [1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_single_source_invariant() {
        let mut out = bound(vec![0.0; 10], 10);
        let first = out.start_source(0.0).unwrap();
        assert!(matches!(out.start_source(0.0), Err(PlayerError::IllegalState(_))));
        out.stop_source(SourceHandle(first.0 + 100));
        assert_eq!(out.active_sources(), 1);
        out.stop_source(first);
        assert_eq!(out.active_sources(), 0);
        assert!(out.start_source(0.5).is_ok());
    }

    #[test]
    fn test_fade_in_ramps_from_silence() {
        let mut bus = SourceBus::new(1, 1000, 4);
        bus.load(vec![1.0; 10]);
        bus.set_running(true).unwrap();
        bus.start(0.0).unwrap();
        let mut buf = [0.0f32; 6];
        bus.render(&mut buf);
        assert_eq!(buf, [0.0, 0.25, 0.5, 0.75, 1.0, 1.0]);
    }

    #[test]
    fn test_closed_output_rejects_start() {
        let mut out = bound(vec![0.0; 10], 10);
        out.close();
        assert!(out.start_source(0.0).is_err());
        assert!(out.resume().is_err());
    }

    #[test]
    fn test_fixed_layout_rejects_mismatched_audio() {
        let mut out = OfflineOutput::with_layout(DeviceLayout::new(2, 20), 0);
        let track = AudioTrack::mono(10, vec![0.5; 10]);
        let raw = PreparedAudio::convert(&track, None).unwrap();
        assert!(matches!(out.bind(raw), Err(PlayerError::Output(_))));

        let converted = PreparedAudio::convert(&track, out.layout()).unwrap();
        out.bind(converted).unwrap();
        assert_eq!(out.bus().channels(), 2);
        assert_eq!(out.bus().sample_rate(), 20);
    }
}
