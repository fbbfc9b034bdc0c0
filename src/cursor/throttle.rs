// src/cursor/throttle.rs

use std::time::{Duration, Instant};

/// Rate limiter that never loses the newest value.
///
/// A value pushed inside the interval is parked; later pushes overwrite it and
/// [`Throttle::poll`] releases it once the interval has passed.
#[derive(Debug)]
pub struct Throttle<T> {
    interval: Duration,
    last_flush: Option<Instant>,
    pending: Option<T>,
}

impl<T> Throttle<T> {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last_flush: None, pending: None }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn due(&self, now: Instant) -> bool {
        match self.last_flush {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }

    /// Returns the value right away if the interval has elapsed, otherwise
    /// keeps it as the pending one.
    pub fn push(&mut self, value: T, now: Instant) -> Option<T> {
        if self.due(now) {
            self.last_flush = Some(now);
            self.pending = None;
            Some(value)
        } else {
            self.pending = Some(value);
            None
        }
    }

    /// Releases the pending value if its slot has come up.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        if self.pending.is_some() && self.due(now) {
            self.last_flush = Some(now);
            return self.pending.take();
        }
        None
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Drops the pending value and forgets the last flush.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.last_flush = None;
    }
}
