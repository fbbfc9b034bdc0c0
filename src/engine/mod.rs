// src/engine/mod.rs

pub mod animation;
pub mod output;
pub mod session;
pub mod time;

pub use animation::{AnimationLoop, FrameHandle};
pub use output::{AudioOutput, OfflineFactory, OfflineOutput, OutputFactory, SourceHandle};
pub use session::{Phase, PlaybackSession};
pub use time::{axis_ticks, format_time, AxisTick};

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use crate::config::PlayerConfig;
use crate::decoder::PreparedAudio;
use crate::error::{PlayerError, Result};
use crate::track::AudioTrack;

/// Notifications flowing out of the engine. Nothing flows back in except
/// through the command methods.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    /// Elapsed playback time in seconds, from an animation frame or a seek.
    TimeUpdate(f64),
    /// The cursor must snap to zero.
    CursorReset,
    PhaseChanged(Phase),
    /// Playback reached the end of the track.
    Ended,
    /// The engine was destroyed.
    Detached,
}

/// Transport state machine over one audio output.
pub struct PlaybackEngine<O: AudioOutput> {
    output: O,
    track: Option<Arc<AudioTrack>>,
    session: PlaybackSession,
    source: Option<SourceHandle>,
    animation: AnimationLoop,
    frame_handle: Option<FrameHandle>,
    events: VecDeque<EngineEvent>,
    max_gain: f32,
    end_tolerance: f64,
    destroyed: bool,
}

impl<O: AudioOutput> PlaybackEngine<O> {
    pub fn new(mut output: O, config: &PlayerConfig) -> Self {
        let volume = clamp_gain(config.initial_volume, config.max_gain);
        output.set_gain(volume);
        Self {
            output,
            track: None,
            session: PlaybackSession::new(volume),
            source: None,
            animation: AnimationLoop::new(config.frame_interval()),
            frame_handle: None,
            events: VecDeque::new(),
            max_gain: config.max_gain,
            end_tolerance: config.end_tolerance_secs,
            destroyed: false,
        }
    }

    /// Binds a decoded track, converting it to the output layout on this
    /// thread. Any running playback is stopped and the session starts over
    /// at zero.
    pub fn load_track(&mut self, track: Arc<AudioTrack>) -> Result<()> {
        self.ensure_alive()?;
        let audio = PreparedAudio::convert(&track, self.output.layout())?;
        self.load_prepared(track, audio)
    }

    /// Like [`PlaybackEngine::load_track`] with the conversion already done.
    /// Audio prepared for a different layout is converted again.
    pub fn load_prepared(&mut self, track: Arc<AudioTrack>, audio: PreparedAudio) -> Result<()> {
        self.ensure_alive()?;
        let audio = match self.output.layout() {
            Some(layout) if layout != audio.layout() => {
                log::warn!("Output layout changed to {layout:?}, converting again");
                PreparedAudio::convert(&track, Some(layout))?
            }
            _ => audio,
        };
        self.halt_source();
        self.output.bind(audio)?;
        log::info!("Engine loaded track: {:.2}s", track.duration());
        self.track = Some(track);
        self.session.started_at = 0.0;
        self.session.paused_at = 0.0;
        self.set_phase(Phase::Idle);
        Ok(())
    }

    pub fn play(&mut self) -> Result<()> {
        self.ensure_alive()?;
        if self.track.is_none() {
            return Err(PlayerError::NotReady("play called before a track was loaded"));
        }
        if self.session.phase == Phase::Playing {
            return Ok(());
        }
        self.start_from(self.session.paused_at)?;
        self.set_phase(Phase::Playing);
        Ok(())
    }

    /// Stops playback. With `reset` the position goes back to zero and the
    /// phase to `Idle`, otherwise the current position is kept for resume.
    pub fn pause(&mut self, reset: bool) -> Result<()> {
        self.ensure_alive()?;
        if self.source.is_none() {
            return Err(PlayerError::IllegalState("pause requires an active source"));
        }

        let elapsed = if reset { 0.0 } else { self.current_time() };
        self.halt_source();
        if let Err(e) = self.output.suspend() {
            log::warn!("Failed to suspend output: {e}");
        }
        self.session.paused_at = elapsed;

        if reset {
            self.events.push_back(EngineEvent::CursorReset);
            self.set_phase(Phase::Idle);
        } else {
            self.set_phase(Phase::Paused);
        }
        log::debug!("Paused at {elapsed:.3}s (reset: {reset})");
        Ok(())
    }

    /// `pause(reset = true)`, but also fine when nothing is playing.
    pub fn stop(&mut self) -> Result<()> {
        self.ensure_alive()?;
        if self.source.is_some() {
            return self.pause(true);
        }
        self.session.paused_at = 0.0;
        self.events.push_back(EngineEvent::CursorReset);
        self.set_phase(Phase::Idle);
        Ok(())
    }

    /// Moves the playhead to `time`, clamped to the track. A playing engine
    /// keeps playing from the new position.
    pub fn seek(&mut self, time: f64) -> Result<()> {
        self.ensure_alive()?;
        let duration = match &self.track {
            Some(track) => track.duration(),
            None => return Err(PlayerError::NotReady("seek called before a track was loaded")),
        };
        let target = if time.is_nan() { 0.0 } else { time.clamp(0.0, duration) };

        self.session.paused_at = target;
        if self.session.phase == Phase::Playing {
            self.halt_source();
            if let Err(e) = self.start_from(target) {
                self.set_phase(Phase::Paused);
                return Err(e);
            }
        }
        self.events.push_back(EngineEvent::TimeUpdate(target));
        log::debug!("Seek to {target:.3}s");
        Ok(())
    }

    /// Sets the output gain, clamped to `0..=max_gain`. Returns the applied value.
    pub fn change_volume(&mut self, volume: f32) -> Result<f32> {
        self.ensure_alive()?;
        let gain = clamp_gain(volume, self.max_gain);
        self.session.volume = gain;
        self.output.set_gain(gain);
        Ok(gain)
    }

    /// Elapsed playback time in seconds, never beyond the track.
    pub fn current_time(&self) -> f64 {
        let elapsed = if self.session.phase == Phase::Playing {
            self.output.now() - self.session.started_at
        } else {
            self.session.paused_at
        };
        elapsed.clamp(0.0, self.duration())
    }

    pub fn duration(&self) -> f64 {
        self.track.as_ref().map(|t| t.duration()).unwrap_or(0.0)
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn volume(&self) -> f32 {
        self.session.volume
    }

    pub fn track(&self) -> Option<&Arc<AudioTrack>> {
        self.track.as_ref()
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_armed()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    /// Drives one animation frame. While playing this publishes the elapsed
    /// time, or finishes the track once it is within the end tolerance.
    /// Returns true if a frame was delivered.
    pub fn animation_frame(&mut self, now: Instant) -> bool {
        if self.destroyed || self.session.phase != Phase::Playing {
            return false;
        }
        let Some(handle) = self.frame_handle else {
            return false;
        };
        if !self.animation.take_frame(handle, now) {
            return false;
        }

        let elapsed = self.current_time();
        if elapsed >= self.duration() - self.end_tolerance {
            if let Err(e) = self.pause(true) {
                log::warn!("Failed to finish playback: {e}");
                return false;
            }
            log::info!("Playback finished");
            self.events.push_back(EngineEvent::Ended);
            return true;
        }

        self.events.push_back(EngineEvent::TimeUpdate(elapsed));
        true
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    /// Stops everything and releases the output. Safe to call repeatedly.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.halt_source();
        if let Err(e) = self.output.suspend() {
            log::debug!("Suspend during destroy failed: {e}");
        }
        self.output.close();
        self.track = None;
        self.session = PlaybackSession::new(self.session.volume);
        self.destroyed = true;
        self.events.push_back(EngineEvent::Detached);
        log::info!("Engine destroyed");
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(PlayerError::IllegalState("engine has been destroyed"));
        }
        Ok(())
    }

    fn start_from(&mut self, offset: f64) -> Result<()> {
        self.halt_source();
        self.output.resume()?;
        let handle = self.output.start_source(offset)?;
        self.source = Some(handle);
        self.session.started_at = self.output.now() - offset;
        // the live position now comes from the clock
        self.session.paused_at = 0.0;
        self.frame_handle = Some(self.animation.arm());
        Ok(())
    }

    /// Cancels the frame loop and stops the active source, in that order.
    fn halt_source(&mut self) {
        self.animation.cancel();
        self.frame_handle = None;
        if let Some(handle) = self.source.take() {
            self.output.stop_source(handle);
        }
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.session.phase != phase {
            log::debug!("Phase {:?} -> {:?}", self.session.phase, phase);
            self.session.phase = phase;
            self.events.push_back(EngineEvent::PhaseChanged(phase));
        }
    }
}

impl<O: AudioOutput> Drop for PlaybackEngine<O> {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn clamp_gain(volume: f32, max_gain: f32) -> f32 {
    if volume.is_nan() { 0.0 } else { volume.clamp(0.0, max_gain) }
}
