//! Error types for the reference-data node

use thiserror::Error;

/// Errors that can occur in the reference-data node
#[derive(Debug, Error)]
pub enum NodeError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] his_storage::StorageError),

    /// Sync error
    #[error("Sync error: {0}")]
    Sync(#[from] his_sync::SyncError),

    /// Selector error
    #[error("Selector error: {0}")]
    Selector(#[from] his_selectors::SelectorError),

    /// Node already started
    #[error("Node already started")]
    AlreadyStarted,

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

impl NodeError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        NodeError::Io(e.to_string())
    }
}

/// Result type alias for node operations
pub type NodeResult<T> = Result<T, NodeError>;
