use std::path::PathBuf;

use thiserror::Error;

use crate::inject::InjectError;

pub type Result<T> = std::result::Result<T, MidiKeysError>;

#[derive(Debug, Error)]
pub enum MidiKeysError {
    #[error("File '{}' not found!", .path.display())]
    InputNotFound { path: PathBuf },

    #[error("Failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed MIDI input: {0}")]
    MalformedInput(String),

    #[error("Track {index} does not exist (file has {count} tracks)")]
    TrackOutOfRange { index: usize, count: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No playable notes")]
    NoPlayableNotes,

    #[error("Key injection failed on track {track}")]
    InjectionFailure {
        track: usize,
        #[source]
        source: InjectError,
    },

    #[error("Invalid track script: {0}")]
    Script(#[from] serde_json::Error),
}
