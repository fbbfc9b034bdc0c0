// src/waveform/render.rs

//! Retained scene for the waveform view.
//!
//! All x coordinates are relative to the left edge of the graph area (the
//! container's left margin is applied only when the scene is serialised), all
//! y coordinates are relative to the top of the container.

use std::fmt::Write as FmtWrite;

use crate::config::{Margin, PlayerConfig};
use crate::engine::time::{axis_ticks, format_time, AxisTick};
use crate::error::{PlayerError, Result};

const BAR_COLOR: &str = "#ff1493";
const GRID_COLOR: &str = "#ffd6edb0";
const AXIS_COLOR: &str = "#930860";

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bar {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Corner radius; half a band gives the rounded look.
    pub rx: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacedTick {
    pub x: f64,
    pub tick: AxisTick,
}

/// Static part of the view: built once per track and never redrawn.
#[derive(Clone, Debug)]
pub struct WaveformSurface {
    width: f64,
    height: f64,
    margin: Margin,
    graph_width: f64,
    graph_height: f64,
    duration: f64,
    bars: Vec<Bar>,
    vertical_grid: Vec<f64>,
    horizontal_grid: Vec<f64>,
    ticks: Vec<PlacedTick>,
    axis_y: f64,
}

/// "Nice" tick values covering `[start, stop]`, roughly `count` of them,
/// spaced by 1, 2 or 5 times a power of ten.
pub fn nice_ticks(start: f64, stop: f64, count: usize) -> Vec<f64> {
    if !(start.is_finite() && stop.is_finite()) || count == 0 {
        return Vec::new();
    }
    if stop <= start {
        return if stop == start { vec![start] } else { Vec::new() };
    }

    let raw = (stop - start) / count as f64;
    let power = raw.log10().floor();
    let base = 10f64.powf(power);
    let error = raw / base;
    let factor = if error >= 50f64.sqrt() {
        10.0
    } else if error >= 10f64.sqrt() {
        5.0
    } else if error >= 2f64.sqrt() {
        2.0
    } else {
        1.0
    };
    let step = factor * base;

    let first = (start / step).ceil() as i64;
    let last = (stop / step).floor() as i64;
    (first..=last).map(|k| k as f64 * step).collect()
}

impl WaveformSurface {
    /// Lays out one bar per amplitude inside a `width` × `height` container.
    pub fn render(
        amplitudes: &[f32],
        width: f64,
        height: f64,
        duration: f64,
        config: &PlayerConfig,
    ) -> Result<Self> {
        let margin = config.margin;
        let graph_width = width - margin.left - margin.right;
        let graph_height = height - margin.top - margin.bottom;
        if !(graph_width > 0.0 && graph_height > 0.0) {
            return Err(PlayerError::Configuration(format!(
                "container {width}x{height} leaves no room for the graph"
            )));
        }

        let center = height / 2.0;
        let n = amplitudes.len();
        let band = if n > 0 { graph_width / n as f64 } else { 0.0 };

        let bars = amplitudes
            .iter()
            .enumerate()
            .map(|(i, &a)| {
                let h = a.clamp(0.0, 1.0) as f64 * graph_height;
                Bar { x: i as f64 * band, y: center - h / 2.0, width: band, height: h, rx: band / 2.0 }
            })
            .collect();

        let vertical_grid = if n > 0 {
            nice_ticks(0.0, (n - 1) as f64, 10).into_iter().map(|i| 0.5 + i * band).collect()
        } else {
            Vec::new()
        };
        let horizontal_grid = nice_ticks(0.0, 1.0, 10)
            .into_iter()
            .map(|v| margin.top + v * graph_height)
            .collect();

        let ticks = axis_ticks(duration, config.tick_step_secs)
            .into_iter()
            .map(|tick| {
                let x = if duration > 0.0 { tick.time / duration * graph_width } else { 0.0 };
                PlacedTick { x, tick }
            })
            .collect();

        log::debug!("Rendered waveform: {n} bars into {graph_width:.0}x{graph_height:.0}");

        Ok(Self {
            width,
            height,
            margin,
            graph_width,
            graph_height,
            duration,
            bars,
            vertical_grid,
            horizontal_grid,
            ticks,
            axis_y: height - margin.bottom,
        })
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn margin(&self) -> Margin {
        self.margin
    }

    pub fn graph_width(&self) -> f64 {
        self.graph_width
    }

    pub fn graph_height(&self) -> f64 {
        self.graph_height
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn vertical_grid(&self) -> &[f64] {
        &self.vertical_grid
    }

    pub fn horizontal_grid(&self) -> &[f64] {
        &self.horizontal_grid
    }

    pub fn ticks(&self) -> &[PlacedTick] {
        &self.ticks
    }

    /// A fresh playhead marker bound to this surface's scale, parked at zero.
    pub fn cursor_overlay(&self) -> CursorOverlay {
        CursorOverlay::new(self.graph_width, self.graph_height, self.duration)
    }

    /// Serialises the scene plus the playhead as an SVG document.
    pub fn to_svg(&self, cursor: &CursorOverlay) -> String {
        let mut s = String::with_capacity(256 + self.bars.len() * 96);
        let _ = write!(
            s,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" style="display:block">"#,
            w = self.width,
            h = self.height
        );
        let _ = write!(s, r#"<g transform="translate({}, 0)">"#, self.margin.left);

        // grid
        let _ = write!(s, r#"<g stroke-width="0.5" stroke="{GRID_COLOR}">"#);
        for x in &self.vertical_grid {
            let _ = write!(s, r#"<line x1="{x}" x2="{x}" y1="0" y2="{}"/>"#, self.height);
        }
        for y in &self.horizontal_grid {
            let _ = write!(s, r#"<line x1="0" x2="{}" y1="{y}" y2="{y}"/>"#, self.width);
        }
        s.push_str("</g>");

        // bars
        let _ = write!(s, r#"<g fill="{BAR_COLOR}">"#);
        for b in &self.bars {
            let _ = write!(
                s,
                r#"<rect x="{}" y="{}" width="{}" height="{}" rx="{}" ry="{}"/>"#,
                b.x, b.y, b.width, b.height, b.rx, b.rx
            );
        }
        s.push_str("</g>");

        // time axis
        let _ = write!(
            s,
            r#"<g transform="translate(0, {})" fill="{AXIS_COLOR}" font-size="11" text-anchor="middle">"#,
            self.axis_y
        );
        for t in &self.ticks {
            let _ = write!(s, r#"<text x="{}" y="16">{}</text>"#, t.x, t.tick.label);
        }
        s.push_str("</g>");

        cursor.write_svg(&mut s);
        s.push_str("</g></svg>");
        s
    }
}

/// The playhead: a vertical marker plus a time label, positioned in graph
/// pixels. Moving it never touches the bars.
#[derive(Clone, Debug, PartialEq)]
pub struct CursorOverlay {
    graph_width: f64,
    graph_height: f64,
    duration: f64,
    position_px: f64,
    label: String,
}

impl CursorOverlay {
    pub fn new(graph_width: f64, graph_height: f64, duration: f64) -> Self {
        Self {
            graph_width: graph_width.max(0.0),
            graph_height,
            duration: duration.max(0.0),
            position_px: 0.0,
            label: format_time(0.0),
        }
    }

    pub fn graph_width(&self) -> f64 {
        self.graph_width
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Pixels per second of audio.
    pub fn scale(&self) -> f64 {
        if self.duration > 0.0 { self.graph_width / self.duration } else { 0.0 }
    }

    pub fn clamp_px(&self, px: f64) -> f64 {
        if px.is_nan() { 0.0 } else { px.clamp(0.0, self.graph_width) }
    }

    pub fn time_at(&self, px: f64) -> f64 {
        if self.graph_width <= 0.0 {
            return 0.0;
        }
        self.clamp_px(px) / self.graph_width * self.duration
    }

    pub fn px_at(&self, time: f64) -> f64 {
        self.clamp_px(time * self.scale())
    }

    pub fn position_px(&self) -> f64 {
        self.position_px
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Moves the marker; the label shows the time under the new position.
    pub fn set_position(&mut self, px: f64) {
        self.position_px = self.clamp_px(px);
        self.label = format_time(self.time_at(self.position_px));
    }

    /// Moves the marker to the pixel for `time` and labels it with `time` itself.
    pub fn show_time(&mut self, time: f64) {
        self.position_px = self.px_at(time);
        self.label = format_time(time);
    }

    fn write_svg(&self, s: &mut String) {
        let _ = write!(
            s,
            r#"<g transform="translate({}, 0)" style="will-change:transform;cursor:ew-resize">"#,
            self.position_px
        );
        let _ = write!(s, r#"<rect x="-10" y="0" width="20" height="{}" fill="transparent"/>"#, self.graph_height);
        let _ = write!(
            s,
            r#"<line x1="0" x2="0" y1="20" y2="{}" stroke="{BAR_COLOR}" stroke-width="2"/>"#,
            self.graph_height
        );
        let _ = write!(s, r#"<polygon points="-5,20 5,20 0,27" fill="{BAR_COLOR}"/>"#);
        let _ = write!(
            s,
            r#"<text x="0" y="17" text-anchor="middle" fill="{BAR_COLOR}" font-size="12px" font-weight="600">{}</text>"#,
            self.label
        );
        s.push_str("</g>");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(amps: &[f32], duration: f64) -> WaveformSurface {
        WaveformSurface::render(amps, 440.0, 125.0, duration, &PlayerConfig::default()).unwrap()
    }

    #[test]
    fn test_bars_span_graph_width() {
        let s = surface(&[0.0, 0.5, 1.0, 0.25], 60.0);
        assert_eq!(s.graph_width(), 400.0);
        assert_eq!(s.graph_height(), 100.0);
        let bars = s.bars();
        assert_eq!(bars.len(), 4);
        assert_eq!(bars[0].x, 0.0);
        assert_eq!(bars[3].x + bars[3].width, 400.0);
        assert_eq!(bars[0].rx, 50.0);
    }

    #[test]
    fn test_bars_centered_and_proportional() {
        let s = surface(&[1.0, 0.5], 10.0);
        let center = 125.0 / 2.0;
        for b in s.bars() {
            assert!((b.y + b.height / 2.0 - center).abs() < 1e-9);
        }
        assert_eq!(s.bars()[0].height, 100.0);
        assert_eq!(s.bars()[1].height, 50.0);
    }

    #[test]
    fn test_axis_ticks_placed_on_time_scale() {
        let s = surface(&[0.5; 8], 40.0);
        let xs: Vec<f64> = s.ticks().iter().map(|t| t.x).collect();
        assert_eq!(xs, vec![0.0, 150.0, 300.0, 400.0]);
        assert_eq!(s.ticks()[1].tick.label, "00:15");
    }

    #[test]
    fn test_container_too_small() {
        let err = WaveformSurface::render(&[0.5], 30.0, 100.0, 1.0, &PlayerConfig::default()).unwrap_err();
        assert!(matches!(err, PlayerError::Configuration(_)));
    }

    #[test]
    fn test_nice_ticks() {
        assert_eq!(nice_ticks(0.0, 1.0, 10).len(), 11);
        assert_eq!(nice_ticks(0.0, 100.0, 10), (0..=10).map(|i| i as f64 * 10.0).collect::<Vec<_>>());
        assert_eq!(nice_ticks(0.0, 43.0, 10), (0..=8).map(|i| i as f64 * 5.0).collect::<Vec<_>>());
        assert_eq!(nice_ticks(3.0, 3.0, 10), vec![3.0]);
    }

    #[test]
    fn test_overlay_scale_and_conversion() {
        let s = surface(&[0.5; 4], 80.0);
        let mut cursor = s.cursor_overlay();
        assert_eq!(cursor.scale(), 5.0);
        assert_eq!(cursor.time_at(200.0), 40.0);
        assert_eq!(cursor.time_at(-30.0), 0.0);
        assert_eq!(cursor.time_at(9_000.0), 80.0);

        cursor.show_time(65.0);
        assert_eq!(cursor.position_px(), 325.0);
        assert_eq!(cursor.label(), "01:05");

        cursor.set_position(1_000.0);
        assert_eq!(cursor.position_px(), 400.0);
        assert_eq!(cursor.label(), "01:20");
    }

    #[test]
    fn test_svg_contains_bars_and_cursor() {
        let s = surface(&[0.5, 1.0], 20.0);
        let mut cursor = s.cursor_overlay();
        cursor.show_time(10.0);
        let svg = s.to_svg(&cursor);
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<rect x=\"").count(), 3); // two bars + cursor hitbox
        assert!(svg.contains("translate(200, 0)"));
        assert!(svg.contains(">00:10<"));
    }
}
