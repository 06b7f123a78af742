//! Manager construction for the in-process backend.

use locker_core::error::{LockError, LockResult};
use locker_core::manager::LockManager;
use serde_json::Value;

use crate::backend::MemoryLockBackend;

/// Name the in-process backend is registered under.
pub const ADAPTER_NAME: &str = "memory";

/// Builds a manager over a fresh in-process table.
///
/// The backend takes no options; `None`, `null` or an object are accepted
/// and anything else is rejected.
pub fn new_manager(config: Option<Value>) -> LockResult<LockManager> {
    match config {
        None | Some(Value::Null) | Some(Value::Object(_)) => {}
        Some(other) => {
            return Err(LockError::InvalidConfig(format!(
                "memory backend expects no options, got {other}"
            )));
        }
    }
    Ok(LockManager::new(MemoryLockBackend::new()))
}
