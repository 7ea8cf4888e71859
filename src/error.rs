//! Error types

use thiserror::Error;

/// Failures while reading host settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse settings: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("settings must be a JSON object")]
    NotAnObject,
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to start generator thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("no output device found")]
    NoOutputDevice,

    #[error("failed to get default output config: {0}")]
    OutputConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("unsupported sample format: {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),
}
