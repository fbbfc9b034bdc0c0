// src/engine/session.rs

use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Phase {
    /// Nothing loaded, stopped, or reset to the start.
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Transport bookkeeping, all times in seconds on the output clock.
///
/// While playing, elapsed time is `clock_now - started_at`; otherwise the
/// resume point is `paused_at`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PlaybackSession {
    pub phase: Phase,
    pub started_at: f64,
    pub paused_at: f64,
    pub volume: f32,
}

impl PlaybackSession {
    pub fn new(volume: f32) -> Self {
        Self { phase: Phase::Idle, started_at: 0.0, paused_at: 0.0, volume }
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Playing
    }
}
