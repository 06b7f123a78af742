//! Backend selection by name.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use locker_core::error::{LockError, LockResult};
use locker_core::manager::LockManager;
use serde_json::Value;
use tracing::{debug, instrument};

/// Future returned by a [`ManagerFactory`].
pub type ManagerFuture = Pin<Box<dyn Future<Output = LockResult<LockManager>> + Send>>;

/// Builds a manager from a backend-specific configuration value.
pub type ManagerFactory = Arc<dyn Fn(Option<Value>) -> ManagerFuture + Send + Sync>;

/// Maps backend names to manager factories.
///
/// Build one at startup and hand it to whatever selects the backend; nothing
/// is registered implicitly.
///
/// # Example
///
/// ```rust,no_run
/// use locker::Registry;
/// use serde_json::json;
///
/// # async fn run() -> locker::LockResult<()> {
/// let registry = Registry::with_default_backends();
/// let manager = registry
///     .build("redis", Some(json!({ "addr": "localhost:6379" })))
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    factories: HashMap<String, ManagerFactory>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the in-process (`"memory"`) and Redis (`"redis"`)
    /// backends.
    pub fn with_default_backends() -> Self {
        let mut registry = Self::new();
        registry.insert(locker_memory::ADAPTER_NAME, |config| async move {
            locker_memory::new_manager(config)
        });
        registry.insert(locker_redis::ADAPTER_NAME, locker_redis::new_manager);
        registry
    }

    /// Registers `factory` under `name`.
    ///
    /// # Errors
    ///
    /// Returns `LockError::InvalidConfig` if the name is empty or taken.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, factory: F) -> LockResult<()>
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LockResult<LockManager>> + Send + 'static,
    {
        let name = name.into();
        if name.is_empty() {
            return Err(LockError::InvalidConfig("backend name must not be empty".to_string()));
        }
        if self.factories.contains_key(&name) {
            return Err(LockError::InvalidConfig(format!(
                "backend {name:?} is already registered"
            )));
        }
        self.insert(name, factory);
        Ok(())
    }

    fn insert<F, Fut>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = LockResult<LockManager>> + Send + 'static,
    {
        let factory: ManagerFactory =
            Arc::new(move |config: Option<Value>| -> ManagerFuture { Box::pin(factory(config)) });
        self.factories.insert(name.into(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Builds a manager for the backend registered under `name`.
    ///
    /// # Errors
    ///
    /// * `LockError::UnknownBackend` - nothing is registered under `name`
    /// * whatever the backend's factory reports
    #[instrument(skip(self, config), fields(backend = name))]
    pub async fn build(&self, name: &str, config: Option<Value>) -> LockResult<LockManager> {
        let factory = self
            .factories
            .get(name)
            .cloned()
            .ok_or_else(|| LockError::UnknownBackend(name.to_string()))?;
        let manager = factory(config).await?;
        debug!("lock manager ready");
        Ok(manager)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("backends", &self.names())
            .finish()
    }
}
