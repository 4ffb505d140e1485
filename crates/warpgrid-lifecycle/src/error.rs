//! Lifecycle error types.

use thiserror::Error;

use crate::state::LifecycleState;

/// Result type alias for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Result type alias for storage collaborator operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced by the lifecycle controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The requested edge is not in the transition table. Indicates caller
    /// misuse; never forces the machine to `DEAD` on its own.
    #[error("invalid lifecycle transition from {from} to {to}")]
    InvalidTransition {
        from: LifecycleState,
        to: LifecycleState,
    },

    /// Storage could not be prepared. The machine is already `DEAD` by the
    /// time the caller sees this.
    #[error("storage initialization failed: {0}")]
    StorageInitialization(#[source] StorageError),

    /// Another trigger moved the lifecycle to `DEAD` while this operation
    /// was in progress.
    #[error("lifecycle shut down while the operation was in progress")]
    Terminated,

    #[error("invalid leading options: {0}")]
    InvalidOptions(String),
}

/// Errors reported by a [`crate::Storage`] implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage has not been prepared")]
    NotPrepared,

    #[error("storage has been stopped")]
    Stopped,

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors reported by a [`crate::LeaderControl`] handle.
#[derive(Debug, Error)]
pub enum LeadershipError {
    #[error("failed to join leader group: {0}")]
    Join(String),

    #[error("interrupted while updating leadership")]
    Interrupted,

    #[error("failed to update server set: {0}")]
    ServerSetUpdate(String),
}
