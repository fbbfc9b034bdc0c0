// src/lib.rs

pub mod audio;
pub mod config;
pub mod controller;
pub mod cursor;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod player;
pub mod track;
pub mod waveform;

pub use config::PlayerConfig;
pub use engine::{Phase, PlaybackEngine};
pub use error::{ErrorKind, PlayerError};
pub use player::{HostContainer, Player, PlayerEvent};
pub use track::AudioTrack;
pub use waveform::{WaveformModel, WaveformSurface};
