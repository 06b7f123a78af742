//! Core types for lease-based distributed locks.
//!
//! A [`LockManager`] binds one [`LockBackend`] and issues [`LockHandle`]s by
//! key. Backends only provide four atomic primitives; the acquire, renew and
//! release protocol lives in the handle and is shared by every backend.

pub mod backend;
pub mod cancel;
pub mod config;
pub mod error;
pub mod handle;
pub mod manager;
pub mod prelude;
pub mod timeout;
pub mod token;

pub use error::{LockError, LockResult};
pub use prelude::*;
