// src/decoder/mod.rs

pub mod dsp;
pub mod prepare;
pub mod resample;
pub mod sniff;

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::error::{PlayerError, Result};
use crate::track::AudioTrack;

pub use prepare::{DeviceLayout, PreparedAudio};
pub use sniff::AudioFormat;

/// Reads a whole file into memory.
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    let bytes = std::fs::read(path)?;
    log::debug!("Read {} bytes from {}", bytes.len(), path.display());
    Ok(bytes)
}

fn map_symphonia(err: SymphoniaError) -> PlayerError {
    match err {
        SymphoniaError::IoError(e) => PlayerError::Io(e),
        other => PlayerError::Decode(other.to_string()),
    }
}

/// Decodes an in-memory file into PCM. Blocks until the whole stream is decoded.
///
/// `mime_hint` is the type declared by whatever supplied the bytes (a file
/// picker, a drag-drop payload) if known.
pub fn load(bytes: Vec<u8>, mime_hint: Option<&str>) -> Result<AudioTrack> {
    let format_hint = sniff::validate(&bytes, mime_hint)?;

    let mut hint = Hint::new();
    if let Some(fmt) = format_hint {
        hint.with_extension(fmt.extension());
        hint.mime_type(fmt.mime());
    }

    // --- 1. Detect container ---
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let detected = get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(map_symphonia)?;
    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| PlayerError::Decode("no audio track found".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(map_symphonia)?;

    // --- 2. Decode every packet into planar f32 ---
    let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
    let mut planar: Vec<Vec<f32>> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut skipped = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(map_symphonia(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                skipped += 1;
                log::warn!("Skipping undecodable packet: {msg}");
                continue;
            }
            Err(SymphoniaError::IoError(_)) => {
                skipped += 1;
                continue;
            }
            Err(e) => return Err(map_symphonia(e)),
        };

        if decoded.frames() == 0 {
            continue;
        }

        let spec = *decoded.spec();
        let packet_channels = spec.channels.count();
        if planar.is_empty() {
            planar = vec![Vec::new(); packet_channels.max(1)];
            sample_rate = spec.rate;
        }

        let samples = copy_packet(&mut sample_buf, decoded);

        if packet_channels == planar.len() {
            dsp::append_interleaved_to_planar(samples, &mut planar);
        } else {
            let mixed = dsp::updown_mix_interleaved(samples, packet_channels, planar.len());
            dsp::append_interleaved_to_planar(&mixed, &mut planar);
        }
    }

    let frames = dsp::planar_len(&planar);
    if frames == 0 || sample_rate == 0 {
        return Err(PlayerError::Decode("stream contains no audio frames".into()));
    }
    if skipped > 0 {
        log::warn!("{skipped} packet(s) could not be decoded and were skipped");
    }

    let track = AudioTrack::from_planar(sample_rate, planar);
    log::info!(
        "Decoded track: channels: {}, sample_rate: {}, duration: {:.2}s",
        track.channel_count(),
        track.sample_rate(),
        track.duration()
    );
    Ok(track)
}

/// Copies one decoded packet into `slot` as interleaved samples. The buffer is
/// reused while it holds `capacity * channels` samples for this packet's spec.
fn copy_packet<'a>(slot: &'a mut Option<SampleBuffer<f32>>, decoded: AudioBufferRef<'_>) -> &'a [f32] {
    let spec = *decoded.spec();
    let needed = decoded.capacity() * spec.channels.count();
    if slot.as_ref().map_or(true, |b| b.capacity() < needed) {
        *slot = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
    }
    match slot {
        Some(buf) => {
            buf.copy_interleaved_ref(decoded);
            buf.samples()
        }
        None => &[],
    }
}

/// Decodes and converts to `layout` in one blocking call.
pub fn load_prepared(
    bytes: Vec<u8>,
    mime_hint: Option<&str>,
    layout: Option<DeviceLayout>,
) -> Result<(AudioTrack, PreparedAudio)> {
    let track = load(bytes, mime_hint)?;
    let audio = PreparedAudio::convert(&track, layout)?;
    Ok((track, audio))
}

/// [`load_prepared`] on the blocking pool: neither the decode nor the
/// resample to the device rate runs on the caller's thread.
pub async fn load_prepared_async(
    bytes: Vec<u8>,
    mime_hint: Option<String>,
    layout: Option<DeviceLayout>,
) -> Result<(AudioTrack, PreparedAudio)> {
    tokio::task::spawn_blocking(move || load_prepared(bytes, mime_hint.as_deref(), layout))
        .await
        .map_err(|e| PlayerError::Decode(format!("decode task failed: {e}")))?
}

/// Asynchronous form of [`load`]: decoding runs on the blocking pool and the
/// caller suspends until it completes.
pub async fn load_async(bytes: Vec<u8>, mime_hint: Option<String>) -> Result<AudioTrack> {
    tokio::task::spawn_blocking(move || load(bytes, mime_hint.as_deref()))
        .await
        .map_err(|e| PlayerError::Decode(format!("decode task failed: {e}")))?
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// 16-bit PCM WAV in memory.
    pub(crate) fn wav_bytes(sample_rate: u32, channels: u16, frames: &[Vec<f32>]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for frame in frames {
                for &s in frame {
                    writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    pub(crate) fn sine_wav(sample_rate: u32, seconds: f32) -> Vec<u8> {
        let n = (sample_rate as f32 * seconds) as usize;
        let frames: Vec<Vec<f32>> = (0..n)
            .map(|i| {
                let s = (i as f32 * 440.0 * std::f32::consts::TAU / sample_rate as f32).sin() * 0.5;
                vec![s, -s]
            })
            .collect();
        wav_bytes(sample_rate, 2, &frames)
    }

    #[test]
    fn test_decodes_stereo_wav() {
        let track = load(sine_wav(8_000, 1.5), None).unwrap();
        assert_eq!(track.sample_rate(), 8_000);
        assert_eq!(track.channel_count(), 2);
        assert_eq!(track.frames(), 12_000);
        assert!((track.duration() - 1.5).abs() < 1e-9);

        let left = track.channel_data(0);
        let right = track.channel_data(1);
        assert!((left[100] + right[100]).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_non_audio() {
        let err = load(b"\x89PNG\r\n\x1a\n0000000000".to_vec(), None).unwrap_err();
        assert!(matches!(err, PlayerError::NotAudio(_)));
        let err = load(sine_wav(8_000, 0.1), Some("text/plain")).unwrap_err();
        assert!(matches!(err, PlayerError::NotAudio(_)));
    }

    #[test]
    fn test_corrupt_wav_is_decode_or_io_error() {
        let mut bytes = sine_wav(8_000, 0.5);
        bytes.truncate(20);
        let err = load(bytes, None).unwrap_err();
        assert!(matches!(err, PlayerError::Decode(_) | PlayerError::Io(_)));
    }

    #[test]
    fn test_read_missing_file_is_io() {
        let err = read_file(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Io);
    }

    #[test]
    fn test_packet_buffer_grows_when_channels_increase() {
        use symphonia::core::audio::{AsAudioBufferRef, AudioBuffer, Channels, Signal, SignalSpec};

        let mut slot = None;
        let mut mono = AudioBuffer::<f32>::new(256, SignalSpec::new(8_000, Channels::FRONT_LEFT));
        mono.render_reserved(Some(256));
        mono.chan_mut(0).fill(0.25);
        assert_eq!(copy_packet(&mut slot, mono.as_audio_buffer_ref()).len(), 256);

        // same frame capacity, twice the samples
        let stereo_spec = SignalSpec::new(8_000, Channels::FRONT_LEFT | Channels::FRONT_RIGHT);
        let mut stereo = AudioBuffer::<f32>::new(256, stereo_spec);
        stereo.render_reserved(Some(256));
        let (left, right) = stereo.chan_pair_mut(0, 1);
        left.fill(0.5);
        right.fill(-0.5);
        let samples = copy_packet(&mut slot, stereo.as_audio_buffer_ref());
        assert_eq!(samples.len(), 512);
        assert_eq!(&samples[..4], &[0.5, -0.5, 0.5, -0.5]);

        // a smaller packet reuses the grown buffer
        let samples = copy_packet(&mut slot, mono.as_audio_buffer_ref());
        assert_eq!(samples.len(), 256);
        assert!(slot.is_some_and(|b| b.capacity() == 512));
    }

    #[tokio::test]
    async fn test_load_prepared_async_converts_off_thread() {
        let layout = DeviceLayout::new(1, 16_000);
        let (track, audio) = load_prepared_async(sine_wav(8_000, 0.5), None, Some(layout)).await.unwrap();
        assert_eq!(track.sample_rate(), 8_000);
        assert_eq!(audio.layout(), layout);
        assert_eq!(audio.frames(), 8_000);
    }

    #[tokio::test]
    async fn test_load_async_matches_blocking() {
        let track = load_async(sine_wav(8_000, 0.25), Some("audio/wav".into())).await.unwrap();
        assert_eq!(track.frames(), 2_000);
    }
}
