//! Lock manager: binds a backend and issues handles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::{debug, instrument};

use crate::backend::LockBackend;
use crate::cancel::CancelToken;
use crate::config::LockConfig;
use crate::error::{LockError, LockResult};
use crate::handle::{HandleInner, LockHandle};
use crate::token::create_token;

pub(crate) struct ManagerShared {
    backend: Arc<dyn LockBackend>,
    registry: Mutex<HandleRegistry>,
}

#[derive(Default)]
struct HandleRegistry {
    closed: bool,
    /// Live handles keyed by token.
    handles: HashMap<String, Weak<HandleInner>>,
}

impl ManagerShared {
    fn registry(&self) -> std::sync::MutexGuard<'_, HandleRegistry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn forget(&self, token: &str) {
        self.registry().handles.remove(token);
    }
}

/// Factory for lock handles over one backend.
///
/// Configure once at startup and create handles by key anywhere in the
/// application. Clones share the backend and handle bookkeeping.
///
/// # Example
///
/// ```rust,ignore
/// let manager = LockManager::new(MemoryLockBackend::new());
/// let handle = manager.create_lock("my-resource")?;
/// if handle.try_lock(&CancelToken::never()).await? {
///     // exclusive access
///     handle.unlock(&CancelToken::never()).await?;
/// }
/// manager.close().await?;
/// ```
#[derive(Clone)]
pub struct LockManager {
    shared: Arc<ManagerShared>,
    defaults: LockConfig,
}

impl LockManager {
    /// Creates a manager over `backend`.
    pub fn new(backend: impl LockBackend) -> Self {
        Self::from_backend(Arc::new(backend))
    }

    /// Creates a manager over an already shared backend.
    pub fn from_backend(backend: Arc<dyn LockBackend>) -> Self {
        Self {
            shared: Arc::new(ManagerShared {
                backend,
                registry: Mutex::new(HandleRegistry::default()),
            }),
            defaults: LockConfig::default(),
        }
    }

    /// Sets the configuration used by [`LockManager::create_lock`].
    pub fn with_defaults(mut self, defaults: LockConfig) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &LockConfig {
        &self.defaults
    }

    pub fn backend(&self) -> &Arc<dyn LockBackend> {
        &self.shared.backend
    }

    pub fn backend_name(&self) -> &'static str {
        self.shared.backend.name()
    }

    /// Creates an idle handle for `key` with the manager's default config.
    pub fn create_lock(&self, key: &str) -> LockResult<LockHandle> {
        self.create_lock_with(key, self.defaults)
    }

    /// Creates an idle handle for `key`.
    ///
    /// # Errors
    ///
    /// * `LockError::InvalidConfig` - empty key or invalid `config`
    /// * `LockError::Closed` - the manager has been closed
    pub fn create_lock_with(&self, key: &str, config: LockConfig) -> LockResult<LockHandle> {
        if key.is_empty() {
            return Err(LockError::InvalidConfig("lock key must not be empty".to_string()));
        }
        config.validate()?;

        let mut registry = self.shared.registry();
        if registry.closed {
            return Err(LockError::Closed);
        }

        let handle = LockHandle::new(
            key.to_string(),
            create_token(),
            config,
            self.shared.backend.clone(),
            Arc::downgrade(&self.shared),
        );
        registry
            .handles
            .insert(handle.token().to_string(), handle.downgrade());
        Ok(handle)
    }

    /// Creates a handle and blocks until it holds the lease.
    ///
    /// The handle is closed again if acquisition fails.
    pub async fn lock(
        &self,
        key: &str,
        config: LockConfig,
        cancel: &CancelToken,
    ) -> LockResult<LockHandle> {
        let handle = self.create_lock_with(key, config)?;
        if let Err(e) = handle.lock(cancel).await {
            handle.close().await;
            return Err(e);
        }
        Ok(handle)
    }

    /// Creates a handle and makes a single acquisition attempt.
    ///
    /// Returns `Ok(None)` if the key is held elsewhere.
    pub async fn try_lock(
        &self,
        key: &str,
        config: LockConfig,
        cancel: &CancelToken,
    ) -> LockResult<Option<LockHandle>> {
        let handle = self.create_lock_with(key, config)?;
        match handle.try_lock(cancel).await {
            Ok(true) => Ok(Some(handle)),
            Ok(false) => {
                handle.close().await;
                Ok(None)
            }
            Err(e) => {
                handle.close().await;
                Err(e)
            }
        }
    }

    /// Number of handles created by this manager that are neither closed nor
    /// dropped.
    pub fn live_handles(&self) -> usize {
        self.shared
            .registry()
            .handles
            .values()
            .filter(|handle| handle.strong_count() > 0)
            .count()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.registry().closed
    }

    /// Closes every live handle, then the backend. Idempotent.
    #[instrument(skip(self), fields(backend = self.shared.backend.name()))]
    pub async fn close(&self) -> LockResult<()> {
        let handles: Vec<Weak<HandleInner>> = {
            let mut registry = self.shared.registry();
            if registry.closed {
                return Ok(());
            }
            registry.closed = true;
            registry.handles.drain().map(|(_, handle)| handle).collect()
        };

        debug!(handles = handles.len(), "closing lock manager");
        for handle in handles {
            if let Some(handle) = handle.upgrade() {
                handle.close().await;
            }
        }

        self.shared.backend.close().await
    }
}

impl std::fmt::Debug for LockManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockManager")
            .field("backend", &self.shared.backend.name())
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}
