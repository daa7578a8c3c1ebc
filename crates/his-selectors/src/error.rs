//! Error types for his-selectors

use his_sync::SyncError;
use thiserror::Error;

/// Validation state of a form field
///
/// These are reported through `validate()`, never returned as errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("A value is required")]
    Required,

    #[error("Text does not match any option")]
    InvalidOption,
}

/// Errors raised by selector operations
#[derive(Debug, Clone, Error)]
pub enum SelectorError {
    #[error("Level {level} out of range (controller has {levels} levels)")]
    LevelOutOfRange { level: usize, levels: usize },

    #[error("Code '{code}' is not a candidate at level {level}")]
    NotACandidate { level: usize, code: String },

    #[error("Candidates for level {0} are not loaded")]
    CandidatesNotReady(usize),

    #[error("Unknown text field: {0}")]
    UnknownField(String),

    #[error("Cascade needs at least one level")]
    EmptyConfig,

    #[error("Failed to load candidates: {0}")]
    Load(#[from] SyncError),
}

/// Result type for selector operations
pub type SelectorResult<T> = Result<T, SelectorError>;
