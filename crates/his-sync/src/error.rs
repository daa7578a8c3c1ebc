//! Error types for his-sync

use his_core::SourceError;
use his_storage::StorageError;
use thiserror::Error;

/// Errors that can occur while loading reference data
///
/// Clone so one in-flight result can be handed to every waiter.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Remote source error: {0}")]
    Source(#[from] SourceError),
}

impl SyncError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Whether the caller passed a bad argument
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument(_) | Self::Storage(StorageError::InvalidArgument(_))
        )
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;
