//! Redis connection options.

use std::time::Duration;

use fred::prelude::*;
use locker_core::error::{LockError, LockResult};
use serde::{Deserialize, Serialize};

/// Timeout used when none (or zero) is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for the Redis backend.
///
/// Deserializable from the backend's configuration value:
///
/// ```json
/// { "addr": "localhost:6379", "password": "secret", "db": 2, "timeout": 3000 }
/// ```
///
/// `timeout` is in milliseconds on the wire and bounds connection setup and
/// every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisOptions {
    /// `host:port`, or a full `redis://` / `rediss://` URL.
    pub addr: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: u8,
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Prepended to every lock key.
    pub key_prefix: String,
}

impl Default for RedisOptions {
    fn default() -> Self {
        Self {
            addr: "localhost:6379".to_string(),
            username: None,
            password: None,
            db: 0,
            timeout: DEFAULT_TIMEOUT,
            key_prefix: String::new(),
        }
    }
}

impl RedisOptions {
    /// Options for the server at `addr`, defaults elsewhere.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(
        mut self,
        username: Option<impl Into<String>>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.map(Into::into);
        self.password = Some(password.into());
        self
    }

    pub fn with_db(mut self, db: u8) -> Self {
        self.db = db;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// The configured timeout, falling back to [`DEFAULT_TIMEOUT`] for zero.
    pub fn effective_timeout(&self) -> Duration {
        if self.timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            self.timeout
        }
    }

    /// Converts to a client configuration.
    pub fn to_config(&self) -> LockResult<RedisConfig> {
        let addr = self.addr.trim();
        if addr.is_empty() {
            return Err(LockError::InvalidConfig("Redis address is empty".to_string()));
        }

        let url = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("redis://{addr}")
        };
        let mut config = RedisConfig::from_url(&url).map_err(|e| {
            LockError::InvalidConfig(format!("invalid Redis address {addr:?}: {e}"))
        })?;

        if let Some(username) = self.username.as_deref().filter(|u| !u.is_empty()) {
            config.username = Some(username.to_string());
        }
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            config.password = Some(password.to_string());
        }
        config.database = Some(self.db);
        Ok(config)
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
