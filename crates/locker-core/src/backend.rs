//! The capability contract every lock backend implements.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::LockResult;

/// Atomic lease primitives over a key/value namespace.
///
/// Each method must be atomic with respect to concurrent callers on the same
/// key. A record whose lease has expired counts as absent for every method.
/// Any backend that implements these primitives correctly can be swapped for
/// any other.
///
/// # Example
///
/// ```rust,ignore
/// let backend: Arc<dyn LockBackend> = Arc::new(MemoryLockBackend::new());
/// if backend.acquire_if_absent("job:1", &token, Duration::from_secs(5)).await? {
///     // we own job:1 for the next five seconds
///     backend.delete_if_owner("job:1", &token).await?;
/// }
/// ```
#[async_trait]
pub trait LockBackend: Send + Sync + 'static {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Creates a record for `key` owned by `token`, expiring after `ttl`,
    /// unless a live record already exists.
    ///
    /// Returns whether the record was created.
    async fn acquire_if_absent(&self, key: &str, token: &str, ttl: Duration) -> LockResult<bool>;

    /// Resets the expiry of `key` to `ttl` from now if its live record is
    /// owned by `token`.
    ///
    /// Returns `false` without side effects when the owner differs or the
    /// record is gone.
    async fn extend_if_owner(&self, key: &str, token: &str, ttl: Duration) -> LockResult<bool>;

    /// Removes the record for `key` if it is owned by `token`.
    async fn delete_if_owner(&self, key: &str, token: &str) -> LockResult<bool>;

    /// Remaining lease time of the live record for `key`.
    ///
    /// With `owner` set, a record carrying a different token is reported as
    /// absent.
    async fn remaining_ttl(&self, key: &str, owner: Option<&str>) -> LockResult<Option<Duration>>;

    /// Releases resources held by the backend.
    async fn close(&self) -> LockResult<()> {
        Ok(())
    }
}
