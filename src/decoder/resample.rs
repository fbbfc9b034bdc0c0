// src/decoder/resample.rs

use rubato::{
    calculate_cutoff, Resampler, SincFixedIn, SincInterpolationParameters,
    SincInterpolationType, WindowFunction,
};

use crate::decoder::dsp;
use crate::error::{PlayerError, Result};

pub fn build_resampler(
    src_rate: u32,
    dst_rate: u32,
    channels: usize,
) -> Result<Option<SincFixedIn<f32>>> {
    if src_rate == dst_rate {
        return Ok(None);
    }
    let ratio = dst_rate as f64 / src_rate as f64;
    let sinc_len = 256usize;
    let window = WindowFunction::BlackmanHarris2;
    let f_cutoff = calculate_cutoff(sinc_len, window);
    let params = SincInterpolationParameters {
        sinc_len,
        f_cutoff,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 128,
        window,
    };
    let chunk_size = 1024;
    let r = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, channels)
        .map_err(|e| PlayerError::Output(format!("cannot build resampler: {e}")))?;
    Ok(Some(r))
}

/// Converts a whole planar buffer from `src_rate` to `dst_rate`.
///
/// The resampler's group delay is trimmed from the front and the result is cut
/// to the exact expected length, so offsets in seconds map to the same audio
/// before and after conversion.
pub fn resample_planar(planar: &[Vec<f32>], src_rate: u32, dst_rate: u32) -> Result<Vec<Vec<f32>>> {
    let Some(mut resampler) = build_resampler(src_rate, dst_rate, planar.len())? else {
        return Ok(planar.to_vec());
    };
    let in_frames = dsp::planar_len(planar);
    let expected = (in_frames as f64 * dst_rate as f64 / src_rate as f64).round() as usize;
    run_whole(&mut resampler, planar, expected)
}

/// Feeds `planar` through `resampler` one chunk at a time, reading each chunk
/// in place, and returns `expected` frames per channel.
fn run_whole<R: Resampler<f32>>(resampler: &mut R, planar: &[Vec<f32>], expected: usize) -> Result<Vec<Vec<f32>>> {
    let in_frames = dsp::planar_len(planar);
    let delay = resampler.output_delay();
    let mut out: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); planar.len()];

    let mut pos = 0;
    loop {
        let need = resampler.input_frames_next();
        if pos + need > in_frames {
            break;
        }
        let block: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..pos + need]).collect();
        let processed = resampler
            .process(&block, None)
            .map_err(|e| PlayerError::Output(format!("resample failed: {e}")))?;
        append_block(&mut out, processed);
        pos += need;
    }

    if pos < in_frames {
        let tail: Vec<&[f32]> = planar.iter().map(|ch| &ch[pos..in_frames]).collect();
        let processed = resampler
            .process_partial(Some(tail.as_slice()), None)
            .map_err(|e| PlayerError::Output(format!("resample failed: {e}")))?;
        append_block(&mut out, processed);
    }

    // flush the delay line until the tail is complete
    while dsp::planar_len(&out) < expected + delay {
        let processed = resampler
            .process_partial::<&[f32]>(None, None)
            .map_err(|e| PlayerError::Output(format!("resample flush failed: {e}")))?;
        if processed.first().map_or(true, |b| b.is_empty()) {
            break;
        }
        append_block(&mut out, processed);
    }

    for ch in out.iter_mut() {
        let start = delay.min(ch.len());
        ch.drain(..start);
        ch.resize(expected, 0.0);
    }
    Ok(out)
}

fn append_block(out: &mut [Vec<f32>], block: Vec<Vec<f32>>) {
    for (dst, src) in out.iter_mut().zip(block) {
        dst.extend(src);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rubato::{FastFixedIn, PolynomialDegree};
    use std::time::{Duration, Instant};

    #[test]
    fn test_same_rate_is_passthrough() {
        let planar = vec![vec![0.1, 0.2, 0.3]];
        assert_eq!(resample_planar(&planar, 44_100, 44_100).unwrap(), planar);
    }

    #[test]
    fn test_upsample_length_matches_ratio() {
        let planar = vec![vec![0.0f32; 22_050], vec![0.0f32; 22_050]];
        let out = resample_planar(&planar, 22_050, 44_100).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].len(), 44_100);
        assert_eq!(out[1].len(), 44_100);
    }

    #[test]
    fn test_upsampled_ramp_stays_aligned() {
        let n = 8_000;
        let ramp: Vec<f32> = (0..n).map(|i| i as f32 / n as f32).collect();
        let out = resample_planar(&[ramp], 8_000, 16_000).unwrap();
        assert_eq!(out[0].len(), 2 * n);
        // chunk boundaries sit at multiples of 1024 input frames
        for j in [2_048, 4_100, 8_000, 12_290] {
            let want = j as f32 / (2 * n) as f32;
            assert!((out[0][j] - want).abs() < 1e-2, "frame {j}: {} vs {want}", out[0][j]);
        }
    }

    /// Best of three runs of a cheap polynomial resampler over `secs` of stereo.
    fn time_stereo_run(secs: usize) -> Duration {
        let frames = 44_100 * secs;
        let planar = vec![vec![0.1f32; frames]; 2];
        let expected = 48_000 * secs;
        (0..3)
            .map(|_| {
                let mut r =
                    FastFixedIn::<f32>::new(48_000.0 / 44_100.0, 1.0, PolynomialDegree::Linear, 1024, 2).unwrap();
                let start = Instant::now();
                let out = run_whole(&mut r, &planar, expected).unwrap();
                let elapsed = start.elapsed();
                assert_eq!(out[1].len(), expected);
                elapsed
            })
            .min()
            .unwrap()
    }

    #[test]
    fn test_cost_grows_linearly_with_length() {
        let short = time_stereo_run(10);
        let long = time_stereo_run(40);
        // four times the input; copying the remainder per chunk would be ~16x
        assert!(long < short * 8, "10s took {short:?}, 40s took {long:?}");
    }
}
