//! Error types for lock operations.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during lock operations.
///
/// Losing a race for a free key is not an error: `try_lock` reports it as
/// `Ok(false)`.
#[derive(Error, Debug)]
pub enum LockError {
    /// `try_lock` was called on a handle that already holds its lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// The handle does not currently own the lease (never acquired, released,
    /// or expired and taken over by another holder).
    #[error("lock is not held by current holder")]
    NotHeld,

    /// Blocking acquisition did not succeed before its deadline.
    #[error("wait for lock timed out after {0:?}")]
    WaitTimeout(Duration),

    /// The caller's cancel token fired.
    #[error("lock operation was cancelled")]
    Cancelled,

    /// Malformed lock or backend configuration.
    #[error("invalid lock config: {0}")]
    InvalidConfig(String),

    /// The backend could not be reached or initialized.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A backend operation failed.
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The handle or manager has been closed.
    #[error("lock has been closed")]
    Closed,

    /// No backend is registered under the requested name.
    #[error("unknown backend {0:?}")]
    UnknownBackend(String),
}

impl LockError {
    /// Returns `true` for [`LockError::NotHeld`].
    pub fn is_not_held(&self) -> bool {
        matches!(self, Self::NotHeld)
    }

    /// Returns `true` for [`LockError::WaitTimeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::WaitTimeout(_))
    }

    /// Returns `true` when the error came from the backing store rather than
    /// from the lock protocol itself.
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::BackendUnavailable(_))
    }
}

/// Result type for lock operations.
pub type LockResult<T> = Result<T, LockError>;
