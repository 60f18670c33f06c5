// Error types for loading and playing audio sources
use std::path::PathBuf;
use thiserror::Error;

/// Why an audio source could not be loaded.
///
/// Every variant leaves the engine closed; callers that only care about
/// success can use `is_ok()` on the result of `AudioEngine::load`.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("failed to open {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to probe file format: {0}")]
    Probe(String),

    #[error("no audio track found")]
    NoAudioTrack,

    #[error("unsupported codec: {0}")]
    Codec(String),

    #[error("no output device available")]
    NoOutputDevice,

    #[error("output device does not support {channels} channels at {sample_rate} Hz")]
    UnsupportedConfig { channels: u16, sample_rate: u32 },

    #[error("output stream error: {0}")]
    Stream(String),

    #[error("failed to start decode worker: {0}")]
    Worker(#[from] std::io::Error),
}

pub type AudioResult<T> = Result<T, AudioError>;
