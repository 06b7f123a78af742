//! Mutex-guarded record table.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use locker_core::backend::LockBackend;
use locker_core::error::LockResult;
use locker_core::timeout::instant_after;
use tokio::time::Instant;
use tracing::trace;

/// Backing record for one held key.
#[derive(Debug, Clone)]
struct Record {
    token: String,
    expires_at: Instant,
}

impl Record {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Lock backend over a process-local table.
///
/// Expired records are not swept; they are ignored by every primitive and
/// evicted lazily when the key is acquired again.
///
/// The table may be shared by several managers (`LockManager::from_backend`),
/// so closing a manager never touches records it does not own; `close` is a
/// no-op.
#[derive(Debug, Default)]
pub struct MemoryLockBackend {
    records: Mutex<HashMap<String, Record>>,
}

impl MemoryLockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of live (unexpired) records.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.records().values().filter(|r| r.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every record, live or not.
    pub fn clear(&self) {
        self.records().clear();
    }
}

#[async_trait]
impl LockBackend for MemoryLockBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn acquire_if_absent(&self, key: &str, token: &str, ttl: Duration) -> LockResult<bool> {
        let now = Instant::now();
        let mut records = self.records();

        if let Some(existing) = records.get(key) {
            if existing.is_live(now) {
                return Ok(false);
            }
            trace!(lock.key = key, "evicting expired record");
        }

        records.insert(
            key.to_string(),
            Record {
                token: token.to_string(),
                expires_at: instant_after(now, ttl),
            },
        );
        Ok(true)
    }

    async fn extend_if_owner(&self, key: &str, token: &str, ttl: Duration) -> LockResult<bool> {
        let now = Instant::now();
        let mut records = self.records();

        match records.get_mut(key) {
            Some(record) if record.token == token && record.is_live(now) => {
                record.expires_at = instant_after(now, ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_if_owner(&self, key: &str, token: &str) -> LockResult<bool> {
        let now = Instant::now();
        let mut records = self.records();

        match records.get(key) {
            Some(record) if record.token == token => {
                let live = record.is_live(now);
                records.remove(key);
                // Deleting our own expired record is a cleanup, not a release
                Ok(live)
            }
            _ => Ok(false),
        }
    }

    async fn remaining_ttl(&self, key: &str, owner: Option<&str>) -> LockResult<Option<Duration>> {
        let now = Instant::now();
        let records = self.records();

        Ok(records
            .get(key)
            .filter(|record| record.is_live(now))
            .filter(|record| owner.is_none_or(|owner| owner == record.token))
            .map(|record| record.expires_at - now))
    }

}
