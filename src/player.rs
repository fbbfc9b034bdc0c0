// src/player.rs

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::audio::CpalFactory;
use crate::config::PlayerConfig;
use crate::cursor::CursorController;
use crate::decoder::{self, PreparedAudio};
use crate::engine::{AudioOutput, EngineEvent, OutputFactory, Phase, PlaybackEngine};
use crate::error::{ErrorKind, PlayerError, Result};
use crate::track::AudioTrack;
use crate::waveform::{terminal, CursorOverlay, WaveformModel, WaveformSurface};

/// Pixel size of the area the player draws into.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct HostContainer {
    pub width: f64,
    pub height: f64,
}

impl HostContainer {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlayerEvent {
    /// A file finished decoding and the waveform is drawn.
    Loaded { duration: f64, buckets: usize },
    /// The playhead moved, from playback or a drag.
    CursorUpdate { time: f64 },
    /// A drag finished and playback was moved to `time`.
    SeekCommitted { time: f64 },
    PhaseChanged(Phase),
    Error { kind: ErrorKind, message: String },
}

type Listener = Box<dyn FnMut(&PlayerEvent)>;

/// Everything that lives exactly as long as one loaded file.
struct LoadedSession<O: AudioOutput> {
    engine: PlaybackEngine<O>,
    model: WaveformModel,
    surface: WaveformSurface,
    cursor: CursorController,
}

/// The host-facing surface: commands in, [`PlayerEvent`]s out.
///
/// Every error a command returns is also published as [`PlayerEvent::Error`].
pub struct Player<F: OutputFactory = CpalFactory> {
    config: PlayerConfig,
    factory: F,
    container: Option<HostContainer>,
    session: Option<LoadedSession<F::Output>>,
    listeners: Vec<Listener>,
    destroyed: bool,
}

impl<F: OutputFactory> Player<F> {
    pub fn new(config: PlayerConfig, factory: F) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            factory,
            container: None,
            session: None,
            listeners: Vec::new(),
            destroyed: false,
        })
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&PlayerEvent) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Attaches (or resizes) the drawing area. A loaded waveform is laid out
    /// again and the playhead keeps its time.
    pub fn mount(&mut self, container: HostContainer) -> Result<()> {
        let result = self.try_mount(container);
        self.finish(result)
    }

    fn try_mount(&mut self, container: HostContainer) -> Result<()> {
        self.ensure_alive()?;
        let HostContainer { width, height } = container;
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            return Err(PlayerError::Configuration(format!("invalid container size {width}x{height}")));
        }
        if let Some(session) = self.session.as_mut() {
            let surface = WaveformSurface::render(
                session.model.amplitudes(),
                width,
                height,
                session.engine.duration(),
                &self.config,
            )?;
            session.cursor.rebind(surface.cursor_overlay());
            session.surface = surface;
        }
        self.container = Some(container);
        log::debug!("Mounted into {width}x{height}");
        Ok(())
    }

    pub fn container(&self) -> Option<HostContainer> {
        self.container
    }

    /// Decodes `bytes` and replaces the current session with a fresh one.
    /// A file that fails to decode leaves the previous session untouched.
    pub fn load_file(&mut self, bytes: Vec<u8>, mime_hint: Option<&str>) -> Result<()> {
        let result = self
            .ensure_ready_to_load()
            .and_then(|_| self.factory.layout())
            .and_then(|layout| decoder::load_prepared(bytes, mime_hint, layout))
            .and_then(|(track, audio)| self.install(track, audio));
        self.finish(result)
    }

    pub fn load_path(&mut self, path: &Path) -> Result<()> {
        let result = decoder::read_file(path);
        match self.finish(result) {
            Ok(bytes) => self.load_file(bytes, None),
            Err(e) => Err(e),
        }
    }

    /// Like [`Player::load_file`] with the decode and the conversion to the
    /// device layout on tokio's blocking pool.
    pub async fn load_file_async(&mut self, bytes: Vec<u8>, mime_hint: Option<String>) -> Result<()> {
        let layout = self.ensure_ready_to_load().and_then(|_| self.factory.layout());
        let result = match layout {
            Ok(layout) => decoder::load_prepared_async(bytes, mime_hint, layout).await,
            Err(e) => Err(e),
        };
        let result = result.and_then(|(track, audio)| self.install(track, audio));
        self.finish(result)
    }

    fn ensure_ready_to_load(&self) -> Result<()> {
        self.ensure_alive()?;
        self.container
            .map(|_| ())
            .ok_or_else(|| PlayerError::Configuration("no host container mounted".into()))
    }

    fn install(&mut self, track: AudioTrack, audio: PreparedAudio) -> Result<()> {
        let container = self
            .container
            .ok_or_else(|| PlayerError::Configuration("no host container mounted".into()))?;

        let model = WaveformModel::from_track(&track);
        let surface = WaveformSurface::render(
            model.amplitudes(),
            container.width,
            container.height,
            track.duration(),
            &self.config,
        )?;
        self.teardown_session();
        let output = self.factory.open(&self.config)?;
        let mut engine = PlaybackEngine::new(output, &self.config);
        let duration = track.duration();
        engine.load_prepared(Arc::new(track), audio)?;
        engine.drain_events();

        let cursor = CursorController::new(surface.cursor_overlay(), self.config.drag_throttle());
        let buckets = model.len();
        self.session = Some(LoadedSession { engine, model, surface, cursor });

        log::info!("Loaded {duration:.2}s of audio into {buckets} buckets");
        self.emit(PlayerEvent::Loaded { duration, buckets });
        Ok(())
    }

    pub fn play(&mut self) -> Result<()> {
        let result = self.engine_mut().and_then(|e| e.play());
        self.finish(result)
    }

    pub fn pause(&mut self) -> Result<()> {
        let result = self.engine_mut().and_then(|e| e.pause(false));
        self.finish(result)
    }

    /// Pauses and rewinds to zero.
    pub fn stop(&mut self) -> Result<()> {
        let result = self.engine_mut().and_then(|e| e.stop());
        self.finish(result)
    }

    pub fn toggle(&mut self) -> Result<()> {
        if self.phase() == Phase::Playing { self.pause() } else { self.play() }
    }

    pub fn seek(&mut self, time: f64) -> Result<()> {
        let result = self.engine_mut().and_then(|e| e.seek(time));
        self.finish(result)
    }

    pub fn seek_by(&mut self, delta: f64) -> Result<()> {
        let target = self.current_time() + delta;
        self.seek(target)
    }

    /// Returns the gain actually applied.
    pub fn set_volume(&mut self, volume: f32) -> Result<f32> {
        let result = self.engine_mut().and_then(|e| e.change_volume(volume));
        self.finish(result)
    }

    /// Releases the loaded file: audio stops, timers are cancelled and the
    /// waveform is dropped. The player can load another file afterwards.
    pub fn reset(&mut self) -> Result<()> {
        let result = self.ensure_alive();
        if result.is_ok() {
            self.teardown_session();
            log::info!("Player reset");
        }
        self.finish(result)
    }

    /// Tears everything down. Later commands fail with an illegal-state
    /// error; calling this again does nothing.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.teardown_session();
        self.listeners.clear();
        self.container = None;
        self.destroyed = true;
        log::info!("Player destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn duration(&self) -> f64 {
        self.session.as_ref().map(|s| s.engine.duration()).unwrap_or(0.0)
    }

    pub fn current_time(&self) -> f64 {
        self.session.as_ref().map(|s| s.engine.current_time()).unwrap_or(0.0)
    }

    pub fn phase(&self) -> Phase {
        self.session.as_ref().map(|s| s.engine.phase()).unwrap_or(Phase::Idle)
    }

    pub fn volume(&self) -> f32 {
        self.session
            .as_ref()
            .map(|s| s.engine.volume())
            .unwrap_or(self.config.initial_volume)
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_some()
    }

    pub fn is_dragging(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.cursor.is_dragging())
    }

    pub fn surface(&self) -> Option<&WaveformSurface> {
        self.session.as_ref().map(|s| &s.surface)
    }

    pub fn cursor(&self) -> Option<&CursorOverlay> {
        self.session.as_ref().map(|s| s.cursor.overlay())
    }

    pub fn waveform(&self) -> Option<&WaveformModel> {
        self.session.as_ref().map(|s| &s.model)
    }

    /// The drawn scene as SVG, if a file is loaded.
    pub fn svg(&self) -> Option<String> {
        self.session.as_ref().map(|s| s.surface.to_svg(s.cursor.overlay()))
    }

    /// The drawn scene as text rows, one character per pixel.
    pub fn rows(&self) -> Vec<String> {
        self.session
            .as_ref()
            .map(|s| terminal::render_rows(&s.surface, s.cursor.overlay()))
            .unwrap_or_default()
    }

    pub fn output_mut(&mut self) -> Option<&mut F::Output> {
        self.session.as_mut().map(|s| s.engine.output_mut())
    }

    /// Host frame hook: flushes a parked drag update, then lets the engine
    /// publish playback time. Call it once per display frame.
    pub fn tick(&mut self, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let dragged = session.cursor.poll(now);
        session.engine.animation_frame(now);
        if let Some(time) = dragged {
            self.emit(PlayerEvent::CursorUpdate { time });
        }
        self.pump_engine();
    }

    pub fn pointer_down(&mut self, x: f64) -> Result<()> {
        self.pointer_down_at(x, Instant::now())
    }

    pub fn pointer_move(&mut self, x: f64) -> Result<()> {
        self.pointer_move_at(x, Instant::now())
    }

    /// Starts a drag at `x`, in pixels from the container's left edge.
    pub fn pointer_down_at(&mut self, x: f64, now: Instant) -> Result<()> {
        let left = self.config.margin.left;
        let result = self.session_mut().map(|s| s.cursor.drag_start(x - left, now));
        if let Ok(time) = result {
            self.emit(PlayerEvent::CursorUpdate { time });
        }
        self.finish(result.map(|_| ()))
    }

    pub fn pointer_move_at(&mut self, x: f64, now: Instant) -> Result<()> {
        let left = self.config.margin.left;
        let result = self.session_mut().map(|s| s.cursor.drag_move(x - left, now));
        if let Ok(Some(time)) = result {
            self.emit(PlayerEvent::CursorUpdate { time });
        }
        self.finish(result.map(|_| ()))
    }

    /// Finishes a drag and seeks to where it ended. Without a drag in
    /// progress this does nothing.
    pub fn pointer_up(&mut self) -> Result<()> {
        let result = self.session_mut().and_then(|s| match s.cursor.drag_end() {
            Some(commit) => s.engine.seek(commit.time).map(|_| Some(commit.time)),
            None => Ok(None),
        });
        if let Ok(Some(time)) = result {
            self.emit(PlayerEvent::SeekCommitted { time });
        }
        self.finish(result.map(|_| ()))
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.destroyed {
            return Err(PlayerError::IllegalState("player has been destroyed"));
        }
        Ok(())
    }

    fn session_mut(&mut self) -> Result<&mut LoadedSession<F::Output>> {
        self.ensure_alive()?;
        self.session.as_mut().ok_or(PlayerError::NotReady("no track loaded"))
    }

    fn engine_mut(&mut self) -> Result<&mut PlaybackEngine<F::Output>> {
        self.session_mut().map(|s| &mut s.engine)
    }

    fn teardown_session(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.cursor.teardown();
            session.engine.destroy();
        }
    }

    /// Routes pending engine events, then reports `result` if it failed.
    fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        self.pump_engine();
        if let Err(e) = &result {
            log::warn!("{e}");
            self.emit(PlayerEvent::Error { kind: e.kind(), message: e.user_message() });
        }
        result
    }

    fn pump_engine(&mut self) {
        let events = match self.session.as_mut() {
            Some(session) => session.engine.drain_events(),
            None => return,
        };
        for event in events {
            match event {
                EngineEvent::TimeUpdate(time) => {
                    let moved = self.session.as_mut().is_some_and(|s| s.cursor.follow(time));
                    if moved {
                        self.emit(PlayerEvent::CursorUpdate { time });
                    }
                }
                EngineEvent::CursorReset => {
                    if let Some(session) = self.session.as_mut() {
                        session.cursor.reset();
                    }
                    self.emit(PlayerEvent::CursorUpdate { time: 0.0 });
                }
                EngineEvent::PhaseChanged(phase) => self.emit(PlayerEvent::PhaseChanged(phase)),
                EngineEvent::Ended => log::debug!("Track ended"),
                EngineEvent::Detached => {}
            }
        }
    }

    fn emit(&mut self, event: PlayerEvent) {
        for listener in self.listeners.iter_mut() {
            listener(&event);
        }
    }
}

impl<F: OutputFactory> Drop for Player<F> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::tests::sine_wav;
    use crate::decoder::DeviceLayout;
    use crate::engine::OfflineFactory;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    type Events = Rc<RefCell<Vec<PlayerEvent>>>;

    /// 440x125 container with default margins: a 400px wide graph, which is
    /// 200 px per second for the two-second fixture.
    fn mounted() -> (Player<OfflineFactory>, Events) {
        let mut player = Player::new(PlayerConfig::default(), OfflineFactory::default()).unwrap();
        let events: Events = Rc::default();
        let sink = events.clone();
        player.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        player.mount(HostContainer::new(440.0, 125.0)).unwrap();
        (player, events)
    }

    fn loaded() -> (Player<OfflineFactory>, Events) {
        let (mut player, events) = mounted();
        player.load_file(sine_wav(8_000, 2.0), Some("audio/wav")).unwrap();
        events.borrow_mut().clear();
        (player, events)
    }

    fn advance(player: &mut Player<OfflineFactory>, secs: f64) {
        player.output_mut().unwrap().advance(secs);
    }

    #[test]
    fn test_load_requires_container() {
        let mut player = Player::new(PlayerConfig::default(), OfflineFactory::default()).unwrap();
        let events: Events = Rc::default();
        let sink = events.clone();
        player.subscribe(move |e| sink.borrow_mut().push(e.clone()));

        let err = player.load_file(sine_wav(8_000, 0.5), None).unwrap_err();
        assert!(matches!(err, PlayerError::Configuration(_)));
        assert!(matches!(
            events.borrow().last(),
            Some(PlayerEvent::Error { kind: ErrorKind::Configuration, .. })
        ));
        assert!(player.mount(HostContainer::new(0.0, 100.0)).is_err());
    }

    #[test]
    fn test_load_publishes_waveform() {
        let (mut player, events) = mounted();
        player.load_file(sine_wav(8_000, 1.5), None).unwrap();
        assert_eq!(player.duration(), 1.5);
        assert_eq!(player.waveform().unwrap().len(), 8_000);
        assert_eq!(player.surface().unwrap().bars().len(), 8_000);
        assert!(player.svg().unwrap().starts_with("<svg"));
        assert_eq!(events.borrow()[0], PlayerEvent::Loaded { duration: 1.5, buckets: 8_000 });
    }

    #[test]
    fn test_bad_file_keeps_player_usable() {
        let (mut player, events) = mounted();
        let err = player.load_file(b"GIF89a not audio".to_vec(), Some("image/gif")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(
            events.borrow().last(),
            Some(&PlayerEvent::Error { kind: ErrorKind::Decode, message: "Unsupported audio file".into() })
        );
        assert!(player.load_file(sine_wav(8_000, 0.5), None).is_ok());
    }

    #[test]
    fn test_commands_before_load_are_not_ready() {
        let (mut player, events) = mounted();
        assert!(matches!(player.play(), Err(PlayerError::NotReady(_))));
        assert!(matches!(player.seek(1.0), Err(PlayerError::NotReady(_))));
        assert_eq!(player.current_time(), 0.0);
        assert!(matches!(
            events.borrow().last(),
            Some(PlayerEvent::Error { kind: ErrorKind::IllegalState, .. })
        ));
    }

    #[test]
    fn test_playback_moves_cursor() {
        let (mut player, events) = loaded();
        player.play().unwrap();
        assert_eq!(events.borrow()[0], PlayerEvent::PhaseChanged(Phase::Playing));

        advance(&mut player, 0.75);
        player.tick(Instant::now());
        assert_eq!(player.current_time(), 0.75);
        assert_eq!(player.cursor().unwrap().position_px(), 150.0);
        assert_eq!(events.borrow().last(), Some(&PlayerEvent::CursorUpdate { time: 0.75 }));
    }

    #[test]
    fn test_drag_seeks_while_playing() {
        let (mut player, events) = loaded();
        let t0 = Instant::now();
        player.play().unwrap();
        advance(&mut player, 0.5);

        player.pointer_down_at(20.0 + 100.0, t0).unwrap();
        assert!(player.is_dragging());
        player.pointer_move_at(20.0 + 300.0, t0 + Duration::from_millis(2)).unwrap();
        player.tick(t0 + Duration::from_millis(4));
        // playback frames do not move the playhead during a drag
        assert_eq!(player.cursor().unwrap().position_px(), 100.0);

        player.pointer_up().unwrap();
        assert!(!player.is_dragging());
        assert_eq!(player.phase(), Phase::Playing);
        assert_eq!(player.current_time(), 1.5);
        assert_eq!(player.output_mut().unwrap().active_sources(), 1);
        assert!(events.borrow().contains(&PlayerEvent::SeekCommitted { time: 1.5 }));
    }

    #[test]
    fn test_stop_snaps_cursor_home() {
        let (mut player, events) = loaded();
        player.play().unwrap();
        advance(&mut player, 1.0);
        player.tick(Instant::now());
        player.stop().unwrap();
        assert_eq!(player.phase(), Phase::Idle);
        assert_eq!(player.current_time(), 0.0);
        assert_eq!(player.cursor().unwrap().position_px(), 0.0);
        assert!(events.borrow().contains(&PlayerEvent::CursorUpdate { time: 0.0 }));
    }

    #[test]
    fn test_pause_without_play_reports_error() {
        let (mut player, _events) = loaded();
        assert!(matches!(player.pause(), Err(PlayerError::IllegalState(_))));
    }

    #[test]
    fn test_remount_keeps_cursor_time() {
        let (mut player, _events) = loaded();
        player.seek(0.75).unwrap();
        assert_eq!(player.cursor().unwrap().position_px(), 150.0);
        player.mount(HostContainer::new(840.0, 125.0)).unwrap();
        assert_eq!(player.surface().unwrap().graph_width(), 800.0);
        assert_eq!(player.cursor().unwrap().position_px(), 300.0);
    }

    #[test]
    fn test_reset_then_reload() {
        let (mut player, _events) = loaded();
        player.play().unwrap();
        player.reset().unwrap();
        assert!(!player.is_loaded());
        assert!(matches!(player.play(), Err(PlayerError::NotReady(_))));
        player.load_file(sine_wav(8_000, 0.5), None).unwrap();
        assert_eq!(player.duration(), 0.5);
    }

    #[test]
    fn test_destroy_is_final() {
        let (mut player, _events) = loaded();
        player.play().unwrap();
        player.destroy();
        player.destroy();
        assert!(matches!(player.play(), Err(PlayerError::IllegalState(_))));
        assert!(matches!(player.reset(), Err(PlayerError::IllegalState(_))));
        assert!(player.load_file(sine_wav(8_000, 0.5), None).is_err());
        assert!(player.rows().is_empty());
    }

    #[tokio::test]
    async fn test_async_load() {
        let (mut player, events) = mounted();
        player.load_file_async(sine_wav(8_000, 0.5), None).await.unwrap();
        assert_eq!(player.duration(), 0.5);
        assert!(matches!(events.borrow()[0], PlayerEvent::Loaded { .. }));
    }

    #[tokio::test]
    async fn test_async_load_targets_device_layout() {
        let layout = DeviceLayout::new(1, 16_000);
        let mut player = Player::new(PlayerConfig::default(), OfflineFactory::with_layout(layout)).unwrap();
        player.mount(HostContainer::new(440.0, 125.0)).unwrap();
        player.load_file_async(sine_wav(8_000, 2.0), None).await.unwrap();

        let bus = player.output_mut().unwrap().bus();
        assert_eq!((bus.channels(), bus.sample_rate()), (1, 16_000));
        assert_eq!(player.duration(), 2.0);

        player.play().unwrap();
        advance(&mut player, 0.5);
        assert_eq!(player.current_time(), 0.5);
    }
}
