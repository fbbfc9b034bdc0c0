// src/waveform/terminal.rs

use super::render::{CursorOverlay, WaveformSurface};

/// Rasterises the surface into text rows, one character per pixel.
///
/// Bars sharing a column collapse to the tallest; the playhead is drawn over
/// the bars and the axis labels go on the row at the bottom margin.
pub fn render_rows(surface: &WaveformSurface, cursor: &CursorOverlay) -> Vec<String> {
    let width = surface.width().max(0.0) as usize;
    let height = surface.height().max(0.0) as usize;
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let margin = surface.margin();
    let left = margin.left.round() as usize;
    let graph_cols = surface.graph_width().floor() as usize;
    let center = surface.height() / 2.0;
    let axis_row = (surface.height() - margin.bottom).floor().max(0.0) as usize;
    let graph_rows = axis_row.min(height);

    let mut grid = vec![vec![' '; width]; height];

    // --- 1. Bars ---
    let bars = surface.bars();
    if !bars.is_empty() {
        let band = bars[0].width.max(f64::MIN_POSITIVE);
        for col in 0..graph_cols {
            let x = left + col;
            if x >= width {
                break;
            }
            let first = ((col as f64) / band).floor() as usize;
            let last = (((col + 1) as f64) / band).ceil() as usize;
            let h = bars[first.min(bars.len())..last.min(bars.len())]
                .iter()
                .map(|b| b.height)
                .fold(0.0f64, f64::max);
            if h <= 0.0 {
                continue;
            }
            let half = (h / 2.0).max(0.5);
            for (y, row) in grid.iter_mut().enumerate().take(graph_rows) {
                let mid = y as f64 + 0.5;
                if (mid - center).abs() <= half {
                    row[x] = '█';
                }
            }
        }
    }

    // --- 2. Playhead ---
    if graph_cols > 0 {
        let col = (cursor.position_px().floor() as usize).min(graph_cols - 1);
        let x = left + col;
        if x < width {
            for (y, row) in grid.iter_mut().enumerate().take(graph_rows) {
                row[x] = if y == 0 { '▼' } else { '│' };
            }
        }
    }

    // --- 3. Axis labels ---
    if axis_row < height {
        let mut next_free = 0usize;
        for placed in surface.ticks() {
            let label: Vec<char> = placed.tick.label.chars().collect();
            if label.len() > width {
                continue;
            }
            let anchor = left as f64 + placed.x - label.len() as f64 / 2.0;
            let start = (anchor.round().max(0.0) as usize).min(width - label.len());
            if start < next_free {
                continue;
            }
            grid[axis_row][start..start + label.len()].copy_from_slice(&label);
            next_free = start + label.len() + 1;
        }
    }

    grid.into_iter().map(|row| row.into_iter().collect()).collect()
}
