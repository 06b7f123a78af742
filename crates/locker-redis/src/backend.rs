//! Redis lock backend.

use std::time::Duration;

use async_trait::async_trait;
use fred::prelude::*;
use fred::types::{ConnectionConfig, CustomCommand, PerformanceConfig};
use locker_core::backend::LockBackend;
use locker_core::error::{LockError, LockResult};
use tracing::{debug, instrument};

use crate::options::RedisOptions;

/// Lua script to extend the lease if we still own it.
const EXTEND_SCRIPT_LUA: &str = r#"
    if redis.call('get', KEYS[1]) == ARGV[1] then
        return redis.call('pexpire', KEYS[1], ARGV[2])
    end
    return 0
"#;

/// Lua script to delete the lease if we still own it.
const RELEASE_SCRIPT_LUA: &str = r#"
    if redis.call('get', KEYS[1]) == ARGV[1] then
        return redis.call('del', KEYS[1])
    end
    return 0
"#;

/// Lua script returning the lease's remaining milliseconds, or -2 when the key
/// is missing or (with a non-empty ARGV[1]) owned by another token.
const TTL_SCRIPT_LUA: &str = r#"
    local owner = redis.call('get', KEYS[1])
    if not owner then
        return -2
    end
    if ARGV[1] ~= '' and owner ~= ARGV[1] then
        return -2
    end
    return redis.call('pttl', KEYS[1])
"#;

fn backend_error(op: &str, e: RedisError) -> LockError {
    LockError::Backend(Box::new(std::io::Error::other(format!(
        "Redis {op} failed: {e}"
    ))))
}

fn unavailable(message: String) -> LockError {
    LockError::BackendUnavailable(Box::new(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        message,
    )))
}

/// Longest lease sent to the server; Redis rejects expiries past its clock
/// range.
const MAX_TTL: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Lease durations are sent as whole milliseconds, at least one.
fn ttl_millis(ttl: Duration) -> i64 {
    ttl.min(MAX_TTL).as_millis().max(1) as i64
}

/// Lock backend over a single Redis server.
///
/// Acquisition is a single `SET NX PX`; ownership-checked operations run as
/// Lua scripts so the token comparison and the mutation are one atomic step
/// on the server.
pub struct RedisLockBackend {
    client: RedisClient,
    key_prefix: String,
    /// Whether `close` should quit the client.
    owns_client: bool,
}

impl RedisLockBackend {
    /// Connects to the server described by `options`.
    ///
    /// Fails fast with `LockError::BackendUnavailable` if the server cannot be
    /// reached within the configured timeout.
    #[instrument(skip(options), fields(redis.addr = %options.addr, redis.db = options.db))]
    pub async fn connect(options: &RedisOptions) -> LockResult<Self> {
        let config = options.to_config()?;
        let timeout = options.effective_timeout();

        let performance = PerformanceConfig {
            default_command_timeout: timeout,
            ..Default::default()
        };
        let connection = ConnectionConfig {
            connection_timeout: timeout,
            ..Default::default()
        };

        let client = RedisClient::new(config, Some(performance), Some(connection), None);
        client.connect();

        let connected = match tokio::time::timeout(timeout, client.wait_for_connect()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(unavailable(format!(
                "failed to connect to Redis at {}: {}",
                options.addr, e
            ))),
            Err(_) => Err(unavailable(format!(
                "timed out connecting to Redis at {} after {:?}",
                options.addr, timeout
            ))),
        };
        if let Err(e) = connected {
            let _ = tokio::time::timeout(timeout, client.quit()).await;
            return Err(e);
        }

        debug!("connected to Redis");
        Ok(Self {
            client,
            key_prefix: options.key_prefix.clone(),
            owns_client: true,
        })
    }

    /// Uses an existing, already connected client.
    ///
    /// The client is shared, not owned: closing the backend leaves it open.
    pub fn from_client(client: RedisClient) -> Self {
        Self {
            client,
            key_prefix: String::new(),
            owns_client: false,
        }
    }

    /// Sets the prefix prepended to every lock key.
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn client(&self) -> &RedisClient {
        &self.client
    }

    /// The Redis key used for lock `key`.
    pub fn redis_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    async fn eval(&self, op: &str, script: &'static str, args: Vec<RedisValue>) -> LockResult<i64> {
        let mut eval_args: Vec<RedisValue> = Vec::with_capacity(args.len() + 2);
        eval_args.push(script.into());
        eval_args.push(1_i64.into()); // numkeys
        eval_args.extend(args);

        let cmd = CustomCommand::new_static("EVAL", None, false);
        self.client
            .custom(cmd, eval_args)
            .await
            .map_err(|e| backend_error(op, e))
    }
}

#[async_trait]
impl LockBackend for RedisLockBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn acquire_if_absent(&self, key: &str, token: &str, ttl: Duration) -> LockResult<bool> {
        let key = self.redis_key(key);

        // SET NX replies OK when the key was set and nil when it already exists
        let result: Option<String> = self
            .client
            .set(
                &key,
                token,
                Some(Expiration::PX(ttl_millis(ttl))),
                Some(SetOptions::NX),
                false,
            )
            .await
            .map_err(|e| backend_error("SET NX", e))?;

        Ok(result.is_some())
    }

    async fn extend_if_owner(&self, key: &str, token: &str, ttl: Duration) -> LockResult<bool> {
        let result = self
            .eval(
                "EVAL (extend)",
                EXTEND_SCRIPT_LUA,
                vec![
                    self.redis_key(key).into(),
                    token.into(),
                    ttl_millis(ttl).into(),
                ],
            )
            .await?;
        Ok(result == 1)
    }

    async fn delete_if_owner(&self, key: &str, token: &str) -> LockResult<bool> {
        let result = self
            .eval(
                "EVAL (release)",
                RELEASE_SCRIPT_LUA,
                vec![self.redis_key(key).into(), token.into()],
            )
            .await?;
        Ok(result == 1)
    }

    async fn remaining_ttl(&self, key: &str, owner: Option<&str>) -> LockResult<Option<Duration>> {
        let millis = self
            .eval(
                "EVAL (ttl)",
                TTL_SCRIPT_LUA,
                vec![self.redis_key(key).into(), owner.unwrap_or("").into()],
            )
            .await?;

        // -1 (no expiry) is not a lease we created
        Ok((millis > 0).then(|| Duration::from_millis(millis as u64)))
    }

    async fn close(&self) -> LockResult<()> {
        if !self.owns_client {
            return Ok(());
        }
        self.client
            .quit()
            .await
            .map_err(|e| backend_error("QUIT", e))
    }
}
