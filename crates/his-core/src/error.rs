//! Error types shared across the HIS reference-data crates

use thiserror::Error;

/// Errors raised by a remote reference-data source
///
/// Every variant means the remote is unavailable for this request. Callers in
/// the sync layer recover from these locally by degrading to an empty result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Remote returned status {0}")]
    Status(u16),

    #[error("Failed to decode remote payload: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    /// Create a new Unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a new Decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io(err.to_string())
    }
}
