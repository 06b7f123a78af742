//! Lease-based distributed locks for Rust with pluggable backends.
//!
//! A lock is a time-bounded lease on a named key. Handles acquire, renew and
//! release leases through a backend that provides four atomic primitives;
//! the in-process and Redis backends are interchangeable.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use locker::prelude::*;
//! use locker::Registry;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Select a backend once at startup
//!     let registry = Registry::with_default_backends();
//!     let manager = registry.build("memory", None).await?;
//!
//!     // Create a lock by key
//!     let config = LockConfig::default().with_ttl(Duration::from_secs(10));
//!     let handle = manager.create_lock_with("my-resource", config)?;
//!
//!     // Acquire, waiting up to the configured acquire timeout
//!     handle.lock(&CancelToken::never()).await?;
//!
//!     // Critical section - we hold the lease
//!     println!("Doing critical work...");
//!
//!     handle.unlock(&CancelToken::never()).await?;
//!     manager.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! ## In-process
//!
//! A mutex-guarded table; exclusion holds between handles of one process.
//!
//! ```rust
//! use locker::{LockManager, MemoryLockBackend};
//!
//! let manager = LockManager::new(MemoryLockBackend::new());
//! ```
//!
//! ## Redis
//!
//! `SET NX PX` for acquisition, Lua scripts for ownership-checked extend,
//! release and ttl queries.
//!
//! ```rust,no_run
//! use locker::{LockManager, RedisLockBackend, RedisOptions};
//!
//! # async fn run() -> locker::LockResult<()> {
//! let backend = RedisLockBackend::connect(&RedisOptions::new("localhost:6379")).await?;
//! let manager = LockManager::new(backend);
//! # Ok(())
//! # }
//! ```
//!
//! # Crate Organization
//!
//! This is a facade crate that re-exports types from:
//! - `locker-core`: configuration, errors, the backend contract, handles and managers
//! - `locker-memory`: in-process backend
//! - `locker-redis`: Redis backend
//!
//! For fine-grained control, you can depend on individual crates instead.

pub mod registry;

pub use locker_core::*;
pub use locker_memory::MemoryLockBackend;
pub use locker_redis::{RedisLockBackend, RedisOptions};
pub use registry::{ManagerFactory, ManagerFuture, Registry};
