//! Manager construction for the Redis backend.

use locker_core::error::{LockError, LockResult};
use locker_core::manager::LockManager;
use serde_json::Value;

use crate::backend::RedisLockBackend;
use crate::options::RedisOptions;

/// Name the Redis backend is registered under.
pub const ADAPTER_NAME: &str = "redis";

/// Parses the backend's configuration value. `None` and `null` mean defaults.
pub fn parse_options(config: Option<Value>) -> LockResult<RedisOptions> {
    match config {
        None | Some(Value::Null) => Ok(RedisOptions::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| LockError::InvalidConfig(format!("invalid Redis options: {e}"))),
    }
}

/// Connects to Redis and builds a manager over the connection.
///
/// # Errors
///
/// * `LockError::InvalidConfig` - the configuration value is malformed
/// * `LockError::BackendUnavailable` - the server is unreachable
pub async fn new_manager(config: Option<Value>) -> LockResult<LockManager> {
    let options = parse_options(config)?;
    let backend = RedisLockBackend::connect(&options).await?;
    Ok(LockManager::new(backend))
}
