//! Per-lock configuration.

use std::time::Duration;

use crate::error::{LockError, LockResult};

/// Lease and acquisition settings for a single lock handle.
///
/// # Example
///
/// ```rust
/// use locker_core::LockConfig;
/// use std::time::Duration;
///
/// let config = LockConfig::default()
///     .with_ttl(Duration::from_secs(10))
///     .with_refresh_interval(Duration::from_secs(3));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// Lease duration granted by each acquisition or refresh.
    pub ttl: Duration,
    /// Maximum time `lock` waits before giving up.
    pub acquire_timeout: Duration,
    /// Delay between acquisition attempts in `lock`.
    pub poll_interval: Duration,
    /// Cadence of automatic lease renewal. Zero disables renewal.
    pub refresh_interval: Duration,
    /// Release a held lease when its handle is dropped without unlock or
    /// close. Otherwise the lease is left to expire.
    pub auto_close: bool,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30),
            acquire_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(100),
            refresh_interval: Duration::ZERO,
            auto_close: true,
        }
    }
}

impl LockConfig {
    /// Sets the lease duration.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets how long `lock` may wait for the lease.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets the retry cadence used by `lock`.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Enables automatic renewal at the given cadence (zero disables it).
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Sets whether dropping a held handle releases its lease.
    pub fn with_auto_close(mut self, auto_close: bool) -> Self {
        self.auto_close = auto_close;
        self
    }

    /// Returns `true` if a background renewal task runs while the lock is held.
    pub fn renews(&self) -> bool {
        !self.refresh_interval.is_zero()
    }

    /// Checks the configuration invariants.
    ///
    /// Renewal must land before the lease expires, so a non-zero refresh
    /// interval has to be strictly shorter than the ttl.
    pub fn validate(&self) -> LockResult<()> {
        if self.ttl.is_zero() {
            return Err(LockError::InvalidConfig("ttl must be positive".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(LockError::InvalidConfig(
                "poll interval must be positive".to_string(),
            ));
        }
        if self.renews() && self.refresh_interval >= self.ttl {
            return Err(LockError::InvalidConfig(format!(
                "refresh interval {:?} must be shorter than ttl {:?}",
                self.refresh_interval, self.ttl
            )));
        }
        Ok(())
    }
}
