// src/decoder/sniff.rs

//! Cheap type check run before handing bytes to the decoder.

use crate::error::{PlayerError, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Flac,
    Ogg,
    Mp4,
    Aac,
}

impl AudioFormat {
    /// File extension passed to symphonia as a format hint.
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Mp4 => "m4a",
            AudioFormat::Aac => "aac",
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Mp4 => "audio/mp4",
            AudioFormat::Aac => "audio/aac",
        }
    }
}

/// Identifies the container from its magic bytes.
pub fn sniff(bytes: &[u8]) -> Option<AudioFormat> {
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return Some(AudioFormat::Wav);
    }
    if bytes.starts_with(b"fLaC") {
        return Some(AudioFormat::Flac);
    }
    if bytes.starts_with(b"OggS") {
        return Some(AudioFormat::Ogg);
    }
    if bytes.starts_with(b"ID3") {
        return Some(AudioFormat::Mp3);
    }
    if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        return Some(AudioFormat::Mp4);
    }
    if bytes.len() >= 2 && bytes[0] == 0xFF {
        // ADTS: 1111 1111 1111 x00x, MPEG audio: 1111 1111 111x xxxx
        if bytes[1] & 0xF6 == 0xF0 {
            return Some(AudioFormat::Aac);
        }
        if bytes[1] & 0xE0 == 0xE0 {
            return Some(AudioFormat::Mp3);
        }
    }
    None
}

/// Rejects obviously non-audio input.
///
/// A declared MIME type wins when present (it must mention `audio`);
/// otherwise the bytes themselves must look like a known container.
pub fn validate(bytes: &[u8], mime_hint: Option<&str>) -> Result<Option<AudioFormat>> {
    let sniffed = sniff(bytes);
    match mime_hint {
        Some(mime) if !mime.to_ascii_lowercase().contains("audio") => {
            Err(PlayerError::NotAudio(format!("declared type is {mime}")))
        }
        Some(_) => Ok(sniffed),
        None => sniffed
            .map(Some)
            .ok_or_else(|| PlayerError::NotAudio("unrecognised file signature".into())),
    }
}
