// src/engine/time.rs

use serde::Serialize;

/// One labelled mark on the time axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisTick {
    /// Position in seconds from the start of the track.
    pub time: f64,
    pub label: String,
}

/// Formats seconds as `MM:SS`, or `HH:MM:SS` from one hour on.
/// Fractions are truncated; negative and non-finite input reads as zero.
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 { seconds.floor() as u64 } else { 0 };
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes:02}:{secs:02}")
    }
}

/// Tick positions for a track of `duration` seconds: every `step` seconds,
/// always starting at zero and always ending exactly at `duration`.
pub fn axis_ticks(duration: f64, step: f64) -> Vec<AxisTick> {
    let mut times = vec![0.0];

    if duration.is_finite() && duration > 0.0 && step > 0.0 {
        // integer stepping so long tracks don't accumulate float drift
        let mut index = 1u64;
        loop {
            let t = index as f64 * step;
            if t >= duration {
                break;
            }
            times.push(t);
            index += 1;
        }
        if times.last().copied() != Some(duration) {
            times.push(duration);
        }
    }

    times
        .into_iter()
        .map(|time| AxisTick { time, label: format_time(time) })
        .collect()
}
