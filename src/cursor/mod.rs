// src/cursor/mod.rs
pub mod throttle;

use std::time::{Duration, Instant};

use crate::waveform::CursorOverlay;

pub use throttle::Throttle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorState {
    Idle,
    Dragging,
}

/// Result of a finished drag: where the engine should seek to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeekCommit {
    pub time: f64,
    pub position_px: f64,
}

/// Owns the playhead overlay and the drag gesture.
///
/// While a drag is in progress playback-driven updates are ignored, so the
/// playhead stays under the pointer.
#[derive(Debug)]
pub struct CursorController {
    overlay: CursorOverlay,
    state: CursorState,
    throttle: Throttle<f64>,
    drag_px: f64,
}

impl CursorController {
    pub fn new(overlay: CursorOverlay, throttle: Duration) -> Self {
        Self { overlay, state: CursorState::Idle, throttle: Throttle::new(throttle), drag_px: 0.0 }
    }

    pub fn overlay(&self) -> &CursorOverlay {
        &self.overlay
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        self.state == CursorState::Dragging
    }

    pub fn position_px(&self) -> f64 {
        self.overlay.position_px()
    }

    /// Time shown by the playhead.
    pub fn time(&self) -> f64 {
        self.overlay.time_at(self.overlay.position_px())
    }

    /// Moves the playhead to the playback time. Returns false (and does
    /// nothing) while dragging.
    pub fn follow(&mut self, time: f64) -> bool {
        if self.is_dragging() {
            return false;
        }
        self.overlay.show_time(time);
        true
    }

    pub fn reset(&mut self) {
        self.throttle.cancel();
        self.overlay.show_time(0.0);
        if self.is_dragging() {
            self.drag_px = 0.0;
        }
    }

    /// Swaps in an overlay for a re-rendered surface, keeping the time shown.
    pub fn rebind(&mut self, overlay: CursorOverlay) {
        let time = self.time();
        self.overlay = overlay;
        self.overlay.show_time(time);
        self.drag_px = self.overlay.position_px();
    }

    /// Starts a drag at the pointer position. Returns the time under it.
    pub fn drag_start(&mut self, px: f64, now: Instant) -> f64 {
        self.state = CursorState::Dragging;
        self.throttle.cancel();
        self.drag_px = self.overlay.clamp_px(px);
        if let Some(p) = self.throttle.push(self.drag_px, now) {
            self.overlay.set_position(p);
        }
        log::debug!("Drag start at {:.1}px", self.drag_px);
        self.overlay.time_at(self.drag_px)
    }

    /// Tracks the pointer. The latest position is always remembered; the
    /// visible playhead moves at most once per throttle interval. Returns the
    /// time shown if the playhead moved.
    pub fn drag_move(&mut self, px: f64, now: Instant) -> Option<f64> {
        if !self.is_dragging() {
            return None;
        }
        self.drag_px = self.overlay.clamp_px(px);
        let p = self.throttle.push(self.drag_px, now)?;
        self.overlay.set_position(p);
        Some(self.overlay.time_at(p))
    }

    pub fn drag_move_by(&mut self, dx: f64, now: Instant) -> Option<f64> {
        self.drag_move(self.drag_px + dx, now)
    }

    /// Applies a parked drag position whose throttle slot has come up.
    pub fn poll(&mut self, now: Instant) -> Option<f64> {
        let p = self.throttle.poll(now)?;
        self.overlay.set_position(p);
        Some(self.overlay.time_at(p))
    }

    /// Ends the drag at the last pointer position.
    pub fn drag_end(&mut self) -> Option<SeekCommit> {
        if !self.is_dragging() {
            return None;
        }
        self.throttle.cancel();
        self.state = CursorState::Idle;
        self.overlay.set_position(self.drag_px);
        let commit = SeekCommit { time: self.overlay.time_at(self.drag_px), position_px: self.drag_px };
        log::debug!("Drag end at {:.1}px -> {:.3}s", commit.position_px, commit.time);
        Some(commit)
    }

    /// Abandons any drag and pending throttled update.
    pub fn teardown(&mut self) {
        self.throttle.cancel();
        self.state = CursorState::Idle;
    }
}
