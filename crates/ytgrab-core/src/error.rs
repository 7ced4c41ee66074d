//! Library-wide error types.

use thiserror::Error;

/// Library-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Library-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Extractor error: {0}")]
    Extractor(String),

    #[error("Transcoder error: {0}")]
    Transcoder(String),

    #[error("Input closed before a valid answer was given")]
    InputClosed,

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn extractor(msg: impl Into<String>) -> Self {
        Self::Extractor(msg.into())
    }

    pub fn transcoder(msg: impl Into<String>) -> Self {
        Self::Transcoder(msg.into())
    }
}
