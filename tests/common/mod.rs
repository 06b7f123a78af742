//! Shared helpers for integration tests.

#![allow(dead_code)]

use locker::prelude::*;
use locker::MemoryLockBackend;
use std::sync::Arc;
use std::time::Duration;

/// A manager over a fresh in-process table, plus the table itself for
/// inspecting records.
pub fn memory_manager() -> (Arc<MemoryLockBackend>, LockManager) {
    let backend = Arc::new(MemoryLockBackend::new());
    let manager = LockManager::from_backend(backend.clone());
    (backend, manager)
}

/// Short lease, fast polling, no renewal, handles survive unlock.
pub fn fast_config() -> LockConfig {
    LockConfig::default()
        .with_ttl(Duration::from_millis(200))
        .with_acquire_timeout(Duration::from_millis(100))
        .with_poll_interval(Duration::from_millis(10))
        .with_auto_close(false)
}

pub fn never() -> CancelToken {
    CancelToken::never()
}
