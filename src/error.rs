// src/error.rs

//! Error taxonomy for loading and playback.

use std::fmt;
use thiserror::Error;

/// The four classes of failure a host has to tell apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Decode,
    Configuration,
    IllegalState,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Io => "io",
            ErrorKind::Decode => "decode",
            ErrorKind::Configuration => "configuration",
            ErrorKind::IllegalState => "illegal-state",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum PlayerError {
    /// The byte source could not be read.
    #[error("could not read audio data: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes are audio-like but the container or codec is unsupported or corrupt.
    #[error("failed to decode audio: {0}")]
    Decode(String),

    /// Rejected by the type sniff before any decode was attempted.
    #[error("not an audio file: {0}")]
    NotAudio(String),

    /// Missing host container or invalid settings.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A playback command was issued before a track was loaded.
    #[error("no track loaded: {0}")]
    NotReady(&'static str),

    /// The command is not valid in the current phase.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// The audio device could not be opened or driven.
    #[error("audio output error: {0}")]
    Output(String),
}

impl PlayerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlayerError::Io(_) => ErrorKind::Io,
            PlayerError::Decode(_) | PlayerError::NotAudio(_) => ErrorKind::Decode,
            PlayerError::Configuration(_) | PlayerError::Output(_) => ErrorKind::Configuration,
            PlayerError::NotReady(_) | PlayerError::IllegalState(_) => ErrorKind::IllegalState,
        }
    }

    /// Short text suitable for showing to the user.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Io => "Could not read file".to_string(),
            ErrorKind::Decode => "Unsupported audio file".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlayerError>;
