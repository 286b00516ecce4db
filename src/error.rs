// Skylapse Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkylapseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Location '{0}' is a region; sunrise/sunset needs a single place")]
    UnsupportedLocationKind(String),

    #[error("No sources configured for this location")]
    NoSourcesConfigured,

    #[error("Sources must be a list, not a keyed mapping")]
    InvalidSourceCollection,

    #[error("Sun offset of {minutes} minutes is outside the allowed +/-{max} range")]
    OffsetOutOfRange { minutes: i64, max: i64 },

    #[error("Fetch failed for {src}: {message}")]
    Fetch {
        src: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("FFmpeg error: {0}")]
    FFmpeg(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for SkylapseError {
    fn from(err: anyhow::Error) -> Self {
        SkylapseError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SkylapseError>;
