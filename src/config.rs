// src/config.rs

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{PlayerError, Result};

/// Space reserved around the plotted graph, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct Margin {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for Margin {
    fn default() -> Self {
        Self { top: 0.0, bottom: 25.0, left: 20.0, right: 20.0 }
    }
}

/// Tunables for the player. Every field has a default, so a config file only
/// needs the keys it overrides.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub margin: Margin,
    /// Spacing of time-axis labels.
    pub tick_step_secs: f64,
    /// Minimum spacing between two visual cursor updates while dragging.
    pub drag_throttle_ms: u64,
    /// Target spacing of animation frames.
    pub frame_interval_ms: u64,
    pub initial_volume: f32,
    /// Upper bound of the output gain; volume is clamped to `0..=max_gain`.
    pub max_gain: f32,
    /// How close to the end counts as "finished" (rounding slack).
    pub end_tolerance_secs: f64,
    /// Linear ramp applied whenever a source starts.
    pub fade_in_ms: u32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            margin: Margin::default(),
            tick_step_secs: 15.0,
            drag_throttle_ms: 8,
            frame_interval_ms: 16,
            initial_volume: 1.0,
            max_gain: 1.0,
            end_tolerance_secs: 0.1,
            fade_in_ms: 10,
        }
    }
}

impl PlayerConfig {
    /// Defaults for a character-cell host where one cell counts as one pixel.
    pub fn terminal() -> Self {
        Self {
            margin: Margin { top: 0.0, bottom: 2.0, left: 2.0, right: 2.0 },
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| PlayerError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        log::info!("Loaded player config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let m = &self.margin;
        if [m.top, m.bottom, m.left, m.right].iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(PlayerError::Configuration("margins must be finite and non-negative".into()));
        }
        if !(self.tick_step_secs.is_finite() && self.tick_step_secs > 0.0) {
            return Err(PlayerError::Configuration("tick_step_secs must be positive".into()));
        }
        if self.frame_interval_ms == 0 {
            return Err(PlayerError::Configuration("frame_interval_ms must be at least 1".into()));
        }
        if !(self.max_gain.is_finite() && self.max_gain > 0.0) {
            return Err(PlayerError::Configuration("max_gain must be positive".into()));
        }
        if !(self.end_tolerance_secs.is_finite() && self.end_tolerance_secs >= 0.0) {
            return Err(PlayerError::Configuration("end_tolerance_secs must be non-negative".into()));
        }
        Ok(())
    }

    pub fn drag_throttle(&self) -> Duration {
        Duration::from_millis(self.drag_throttle_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PlayerConfig::from_json(r#"{ "tick_step_secs": 30, "margin": { "left": 4 } }"#).unwrap();
        assert_eq!(config.tick_step_secs, 30.0);
        assert_eq!(config.margin.left, 4.0);
        assert_eq!(config.margin.right, 20.0);
        assert_eq!(config.drag_throttle(), Duration::from_millis(8));
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = PlayerConfig::from_json(r#"{ "tick_step_secs": 0 }"#).unwrap_err();
        assert!(matches!(err, PlayerError::Configuration(_)));
        assert!(PlayerConfig::from_json("not json").is_err());
    }
}
