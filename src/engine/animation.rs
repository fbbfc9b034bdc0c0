// src/engine/animation.rs

use std::time::{Duration, Instant};

/// Names one armed loop. Frames are only handed out to the current handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHandle(u64);

/// Per-frame driver for cursor updates while playing.
///
/// At most one loop is armed at a time: arming always cancels the previous
/// one first, and every arm gets a fresh handle so a frame requested for an
/// old loop is dropped.
#[derive(Debug)]
pub struct AnimationLoop {
    interval: Duration,
    generation: u64,
    armed: Option<u64>,
    last_frame: Option<Instant>,
}

impl AnimationLoop {
    pub fn new(interval: Duration) -> Self {
        Self { interval, generation: 0, armed: None, last_frame: None }
    }

    /// Stops any running loop and starts a new one.
    pub fn arm(&mut self) -> FrameHandle {
        self.cancel();
        self.generation += 1;
        self.armed = Some(self.generation);
        FrameHandle(self.generation)
    }

    /// Returns true if a loop was running.
    pub fn cancel(&mut self) -> bool {
        self.last_frame = None;
        self.armed.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    /// Claims the frame at `now` for `handle`. Fails for a stale handle, and
    /// until the interval has elapsed since the last delivered frame.
    pub fn take_frame(&mut self, handle: FrameHandle, now: Instant) -> bool {
        if self.armed != Some(handle.0) {
            return false;
        }
        if let Some(last) = self.last_frame {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_frame = Some(now);
        true
    }
}
