// src/decoder/dsp.rs

/// Splits interleaved frames onto the end of each planar channel.
pub fn append_interleaved_to_planar(interleaved: &[f32], planar: &mut [Vec<f32>]) {
    let channels = planar.len();
    if channels == 0 {
        return;
    }
    for frame in interleaved.chunks_exact(channels) {
        for (ch, &s) in planar.iter_mut().zip(frame) {
            ch.push(s);
        }
    }
}

/// Number of whole frames available across all channels.
pub fn planar_len(planar: &[Vec<f32>]) -> usize {
    planar.iter().map(|v| v.len()).min().unwrap_or(0)
}

pub fn interleave(planar: &mut [Vec<f32>]) -> Vec<f32> {
    let channels = planar.len();
    let frames = planar_len(planar);
    let mut out = Vec::with_capacity(frames * channels);
    for f in 0..frames {
        out.extend(planar.iter().map(|ch| ch[f]));
    }
    out
}

/// Converts interleaved audio between channel layouts.
/// Mono is duplicated, stereo is averaged to mono, other down-mixes average
/// neighbouring channels and other up-mixes repeat the source channels.
pub fn updown_mix_interleaved(input: &[f32], in_ch: usize, out_ch: usize) -> Vec<f32> {
    if in_ch == out_ch || in_ch == 0 || out_ch == 0 {
        return input.to_vec();
    }
    let mut out = Vec::with_capacity(input.len() / in_ch * out_ch);

    for frame in input.chunks_exact(in_ch) {
        if out_ch < in_ch {
            let factor = in_ch as f32 / out_ch as f32;
            for oc in 0..out_ch {
                let start = (oc as f32 * factor).floor() as usize;
                let end = (((oc + 1) as f32 * factor).ceil() as usize).min(in_ch);
                let group = &frame[start..end];
                let avg = if group.is_empty() { 0.0 } else { group.iter().sum::<f32>() / group.len() as f32 };
                out.push(avg);
            }
        } else {
            out.extend((0..out_ch).map(|oc| frame[oc % in_ch]));
        }
    }

    out
}

#[inline]
pub fn fade_samples_ms(sample_rate: u32, ms: u32) -> usize {
    ((sample_rate as u64 * ms as u64) / 1000) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planar_round_trip_through_helpers() {
        let mut planar = vec![Vec::new(), Vec::new()];
        append_interleaved_to_planar(&[1.0, -1.0, 2.0, -2.0, 3.0], &mut planar);
        // trailing half frame is dropped
        assert_eq!(planar, vec![vec![1.0, 2.0], vec![-1.0, -2.0]]);

        assert_eq!(planar_len(&planar), 2);
        assert_eq!(interleave(&mut planar), vec![1.0, -1.0, 2.0, -2.0]);
    }

    #[test]
    fn test_stereo_to_mono_averages() {
        let mono = updown_mix_interleaved(&[0.5, -0.5, 1.0, 0.0], 2, 1);
        assert_eq!(mono, vec![0.0, 0.5]);
    }

    #[test]
    fn test_mono_to_stereo_duplicates() {
        assert_eq!(updown_mix_interleaved(&[0.25, 0.75], 1, 2), vec![0.25, 0.25, 0.75, 0.75]);
    }

    #[test]
    fn test_fade_length() {
        assert_eq!(fade_samples_ms(48_000, 10), 480);
    }
}
