//! Error types for his-storage
//!
//! This module defines the error types used throughout the storage crate.

use thiserror::Error;

/// Errors that can occur in storage operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// A key is missing or structurally malformed
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error during storage operations
    #[error("I/O error: {0}")]
    Io(String),

    /// Error during serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Error during deserialization
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// A blocking storage task panicked or was cancelled
    #[error("Storage task failed: {0}")]
    Task(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

impl From<tokio::task::JoinError> for StorageError {
    fn from(err: tokio::task::JoinError) -> Self {
        StorageError::Task(err.to_string())
    }
}

impl StorageError {
    /// Create a new InvalidArgument error
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create a new Database error from any redb error
    pub fn database(err: impl std::fmt::Display) -> Self {
        Self::Database(err.to_string())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// Whether this error reports a bad request rather than a storage fault
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, StorageError::InvalidArgument(_))
    }
}

/// Convert from postcard Error to StorageError
impl From<postcard::Error> for StorageError {
    fn from(err: postcard::Error) -> Self {
        StorageError::Deserialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_error() {
        let err = StorageError::invalid_argument("parent code is required");
        assert!(err.is_invalid_argument());
        assert!(err.to_string().contains("parent code is required"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let storage_err: StorageError = io_err.into();
        assert!(matches!(storage_err, StorageError::Io(_)));
        assert!(!storage_err.is_invalid_argument());
    }

    #[test]
    fn test_database_error() {
        let err = StorageError::database("table missing");
        assert!(matches!(err, StorageError::Database(_)));
    }
}
