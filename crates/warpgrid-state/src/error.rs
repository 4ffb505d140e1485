//! Error types for the scheduler store.

use thiserror::Error;

/// Result type alias for scheduler store operations.
pub type StateResult<T> = Result<T, StateError>;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open scheduler store: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("failed to encode record: {0}")]
    Encode(String),

    /// A stored value no longer decodes as the expected record.
    #[error("corrupt record {key}: {reason}")]
    Corrupt { key: String, reason: String },
}
