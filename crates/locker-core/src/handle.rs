//! Lock handle: per-acquisition state machine and background lease renewal.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Span, debug, field, instrument, warn};

use crate::backend::LockBackend;
use crate::cancel::CancelToken;
use crate::config::LockConfig;
use crate::error::{LockError, LockResult};
use crate::manager::ManagerShared;
use crate::timeout::{Deadline, instant_after};

/// Upper bound for the best-effort release performed by [`LockHandle::close`].
pub const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Upper bound for a single background renewal round trip.
pub const RENEWAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle state of a [`LockHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// Not holding the lease; may acquire.
    Idle,
    /// Holding the lease (as far as this handle knows).
    Held,
    /// Retired. Terminal.
    Closed,
}

struct HandleState {
    lock_state: LockState,
    renewal: Option<RenewalTask>,
}

/// Background task extending the lease every `refresh_interval`.
struct RenewalTask {
    task: JoinHandle<()>,
}

impl RenewalTask {
    fn spawn(handle: Weak<HandleInner>, interval: Duration, ttl: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(instant_after(Instant::now(), interval), interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                // Handle dropped without close
                let Some(inner) = handle.upgrade() else {
                    break;
                };
                inner.renew_once(ttl).await;
            }
        });
        Self { task }
    }

    /// Aborts the task and waits for it to finish.
    ///
    /// Callers hold the handle state lock, so the task is either sleeping or
    /// waiting for that lock; both are cancellation points.
    async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

pub(crate) struct HandleInner {
    key: String,
    token: String,
    config: LockConfig,
    backend: Arc<dyn LockBackend>,
    manager: Weak<ManagerShared>,
    state: Mutex<HandleState>,
    lost_sender: watch::Sender<bool>,
}

impl HandleInner {
    async fn try_lock_locked(
        self: &Arc<Self>,
        state: &mut HandleState,
        cancel: &CancelToken,
    ) -> LockResult<bool> {
        match state.lock_state {
            LockState::Closed => return Err(LockError::Closed),
            LockState::Held => {
                return Err(LockError::AcquireFailed(
                    "lock is already held by this handle".to_string(),
                ));
            }
            LockState::Idle => {}
        }

        let acquired = self
            .backend
            .acquire_if_absent(&self.key, &self.token, self.config.ttl)
            .await?;
        if !acquired {
            return Ok(false);
        }

        // The caller gave up while the request was in flight
        if cancel.is_cancelled() {
            self.release_best_effort().await;
            return Err(LockError::Cancelled);
        }

        state.lock_state = LockState::Held;
        self.lost_sender.send_replace(false);
        if self.config.renews() {
            state.renewal = Some(RenewalTask::spawn(
                Arc::downgrade(self),
                self.config.refresh_interval,
                self.config.ttl,
            ));
        }
        debug!(lock.key = %self.key, backend = self.backend.name(), "lock acquired");
        Ok(true)
    }

    async fn unlock_locked(&self, state: &mut HandleState, cancel: &CancelToken) -> LockResult<()> {
        if state.lock_state != LockState::Held {
            return Err(LockError::NotHeld);
        }

        Self::stop_renewal(state).await;

        let released = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LockError::Cancelled),
            released = self.backend.delete_if_owner(&self.key, &self.token) => released?,
        };

        state.lock_state = LockState::Idle;
        if !released {
            self.lost_sender.send_replace(true);
            return Err(LockError::NotHeld);
        }
        debug!(lock.key = %self.key, backend = self.backend.name(), "lock released");
        Ok(())
    }

    async fn refresh_locked(
        &self,
        state: &HandleState,
        ttl: Duration,
        cancel: &CancelToken,
    ) -> LockResult<()> {
        if state.lock_state != LockState::Held {
            return Err(LockError::NotHeld);
        }

        let extended = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LockError::Cancelled),
            extended = self.backend.extend_if_owner(&self.key, &self.token, ttl) => extended?,
        };

        if !extended {
            self.lost_sender.send_replace(true);
            return Err(LockError::NotHeld);
        }
        Ok(())
    }

    async fn renew_once(&self, ttl: Duration) {
        let never = CancelToken::never();
        let state = self.state.lock().await;
        let refresh = self.refresh_locked(&state, ttl, &never);
        let result = match tokio::time::timeout(RENEWAL_TIMEOUT, refresh).await {
            Ok(result) => result,
            Err(_) => Err(LockError::Backend(Box::new(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("lock renewal timed out after {:?}", RENEWAL_TIMEOUT),
            )))),
        };
        drop(state);

        match result {
            Ok(()) => debug!(lock.key = %self.key, ttl = ?ttl, "lock renewed"),
            Err(e) => warn!(
                lock.key = %self.key,
                backend = self.backend.name(),
                error = %e,
                "lock renewal failed"
            ),
        }
    }

    /// Deletes our record, logging instead of returning failures.
    async fn release_best_effort(&self) {
        match tokio::time::timeout(
            CLOSE_GRACE,
            self.backend.delete_if_owner(&self.key, &self.token),
        )
        .await
        {
            Ok(Ok(true)) => debug!(lock.key = %self.key, "lock released"),
            Ok(Ok(false)) => debug!(lock.key = %self.key, "lease already lost, nothing to release"),
            Ok(Err(e)) => warn!(lock.key = %self.key, error = %e, "failed to release lock"),
            Err(_) => warn!(lock.key = %self.key, grace = ?CLOSE_GRACE, "timed out releasing lock"),
        }
    }

    async fn stop_renewal(state: &mut HandleState) {
        if let Some(renewal) = state.renewal.take() {
            renewal.stop().await;
        }
    }

    pub(crate) async fn close(&self) {
        let mut state = self.state.lock().await;
        if state.lock_state == LockState::Closed {
            return;
        }

        Self::stop_renewal(&mut state).await;
        if state.lock_state == LockState::Held {
            self.release_best_effort().await;
        }
        state.lock_state = LockState::Closed;
        drop(state);

        self.forget();
    }

    fn forget(&self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.forget(&self.token);
        }
    }
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(renewal) = state.renewal.take() {
            renewal.task.abort();
        }
        let held = state.lock_state == LockState::Held;
        self.forget();

        // Without auto_close the lease is left to expire on its own
        if !(held && self.config.auto_close) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let backend = self.backend.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        runtime.spawn(async move {
            match tokio::time::timeout(CLOSE_GRACE, backend.delete_if_owner(&key, &token)).await {
                Ok(Ok(released)) => debug!(lock.key = %key, released, "dropped handle released its lease"),
                Ok(Err(e)) => warn!(lock.key = %key, error = %e, "failed to release lease of dropped handle"),
                Err(_) => warn!(lock.key = %key, grace = ?CLOSE_GRACE, "timed out releasing lease of dropped handle"),
            }
        });
    }
}

/// A lock on one key, bound to one backend.
///
/// The handle's token is fixed at creation, so every acquisition attempt from
/// the same handle presents the same identity. Clones share state.
///
/// Dropping the last clone while the lease is held stops renewal; with
/// `auto_close` set the lease is also released in the background, otherwise
/// it is left to expire.
///
/// # Example
///
/// ```rust,ignore
/// let handle = manager.create_lock("job:1")?;
/// handle.lock(&CancelToken::never()).await?;
/// do_work().await;
/// handle.unlock(&CancelToken::never()).await?;
/// ```
#[derive(Clone)]
pub struct LockHandle {
    inner: Arc<HandleInner>,
    lost_receiver: watch::Receiver<bool>,
}

impl LockHandle {
    pub(crate) fn new(
        key: String,
        token: String,
        config: LockConfig,
        backend: Arc<dyn LockBackend>,
        manager: Weak<ManagerShared>,
    ) -> Self {
        let (lost_sender, lost_receiver) = watch::channel(false);
        let inner = Arc::new(HandleInner {
            key,
            token,
            config,
            backend,
            manager,
            state: Mutex::new(HandleState {
                lock_state: LockState::Idle,
                renewal: None,
            }),
            lost_sender,
        });
        Self {
            inner,
            lost_receiver,
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<HandleInner> {
        Arc::downgrade(&self.inner)
    }

    pub fn key(&self) -> &str {
        &self.inner.key
    }

    /// The ownership token presented on every backend call.
    pub fn token(&self) -> &str {
        &self.inner.token
    }

    pub fn config(&self) -> &LockConfig {
        &self.inner.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend.name()
    }

    pub async fn state(&self) -> LockState {
        self.inner.state.lock().await.lock_state
    }

    pub async fn is_held(&self) -> bool {
        self.state().await == LockState::Held
    }

    /// Returns a receiver that flips to `true` when the handle discovers its
    /// lease is gone (a refresh, renewal, ttl query or unlock found another
    /// owner or no record). Reset to `false` on the next acquisition.
    ///
    /// ```rust,ignore
    /// let mut lost = handle.lost_token().clone();
    /// tokio::select! {
    ///     _ = lost.wait_for(|lost| *lost) => eprintln!("lock was lost"),
    ///     _ = do_work() => {}
    /// }
    /// ```
    pub fn lost_token(&self) -> &watch::Receiver<bool> {
        &self.lost_receiver
    }

    /// Attempts to acquire the lease once.
    ///
    /// Returns `Ok(false)` when another holder owns a live lease.
    #[instrument(skip(self, cancel), fields(lock.key = %self.inner.key, backend = self.inner.backend.name(), acquired = field::Empty))]
    pub async fn try_lock(&self, cancel: &CancelToken) -> LockResult<bool> {
        if cancel.is_cancelled() {
            return Err(LockError::Cancelled);
        }
        let mut state = self.inner.state.lock().await;
        let acquired = self.inner.try_lock_locked(&mut state, cancel).await?;
        Span::current().record("acquired", acquired);
        Ok(acquired)
    }

    /// Acquires the lease, polling until `acquire_timeout` elapses.
    ///
    /// At least one attempt is made, even with a zero timeout.
    ///
    /// # Errors
    ///
    /// * `LockError::WaitTimeout` - the deadline passed first
    /// * `LockError::Cancelled` - `cancel` fired
    /// * `LockError::Backend` - a backend fault aborted the wait
    #[instrument(skip(self, cancel), fields(lock.key = %self.inner.key, backend = self.inner.backend.name(), attempts = field::Empty, elapsed_ms = field::Empty))]
    pub async fn lock(&self, cancel: &CancelToken) -> LockResult<()> {
        let start = Instant::now();
        let deadline = Deadline::after(self.inner.config.acquire_timeout);
        let mut attempts: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(LockError::Cancelled);
            }
            if deadline.has_passed() {
                Span::current().record("attempts", attempts);
                return Err(LockError::WaitTimeout(deadline.budget()));
            }

            attempts += 1;
            {
                let mut state = self.inner.state.lock().await;
                if self.inner.try_lock_locked(&mut state, cancel).await? {
                    Span::current().record("attempts", attempts);
                    Span::current().record("elapsed_ms", start.elapsed().as_millis() as u64);
                    return Ok(());
                }
            }

            // The attempt at the deadline was the last one
            let pause = deadline.clamp(self.inner.config.poll_interval);
            if pause.is_zero() {
                Span::current().record("attempts", attempts);
                return Err(LockError::WaitTimeout(deadline.budget()));
            }
            tokio::select! {
                _ = cancel.cancelled() => return Err(LockError::Cancelled),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    /// Releases the lease. The handle returns to idle and may lock again
    /// with the same token.
    ///
    /// Returns `LockError::NotHeld` if the handle is not holding the lock, or
    /// if the lease expired and another holder took it; either way the handle
    /// ends up idle.
    #[instrument(skip(self, cancel), fields(lock.key = %self.inner.key, backend = self.inner.backend.name()))]
    pub async fn unlock(&self, cancel: &CancelToken) -> LockResult<()> {
        let mut state = self.inner.state.lock().await;
        self.inner.unlock_locked(&mut state, cancel).await
    }

    /// Extends the lease to `ttl` from now.
    ///
    /// A `NotHeld` result means ownership is gone; the handle stays `Held`
    /// until the caller unlocks or closes it.
    #[instrument(skip(self, cancel), fields(lock.key = %self.inner.key, backend = self.inner.backend.name(), ttl = ?ttl))]
    pub async fn refresh(&self, cancel: &CancelToken, ttl: Duration) -> LockResult<()> {
        if ttl.is_zero() {
            return Err(LockError::InvalidConfig("ttl must be positive".to_string()));
        }
        let state = self.inner.state.lock().await;
        self.inner.refresh_locked(&state, ttl, cancel).await
    }

    /// Remaining lease time. Reports `NotHeld` once the lease has expired or
    /// belongs to someone else.
    #[instrument(skip(self, cancel), fields(lock.key = %self.inner.key, backend = self.inner.backend.name()))]
    pub async fn ttl(&self, cancel: &CancelToken) -> LockResult<Duration> {
        let state = self.inner.state.lock().await;
        if state.lock_state != LockState::Held {
            return Err(LockError::NotHeld);
        }

        let remaining = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LockError::Cancelled),
            remaining = self.inner.backend.remaining_ttl(&self.inner.key, Some(&self.inner.token)) => remaining?,
        };

        match remaining {
            Some(remaining) => Ok(remaining),
            None => {
                self.inner.lost_sender.send_replace(true);
                Err(LockError::NotHeld)
            }
        }
    }

    /// Retires the handle.
    ///
    /// Safe to call repeatedly. If the lease is held it is released on a best
    /// effort basis, bounded by [`CLOSE_GRACE`]; failures are logged, since the
    /// lease expires on its own.
    #[instrument(skip(self), fields(lock.key = %self.inner.key, backend = self.inner.backend.name()))]
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

impl fmt::Debug for LockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockHandle")
            .field("key", &self.inner.key)
            .field("token", &self.inner.token)
            .field("backend", &self.inner.backend.name())
            .finish_non_exhaustive()
    }
}
