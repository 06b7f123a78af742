//! In-process backend for locks.
//!
//! Records live in one mutex-guarded map, so mutual exclusion only holds
//! between handles of the same process.

pub mod backend;
pub mod provider;

pub use backend::MemoryLockBackend;
pub use provider::{ADAPTER_NAME, new_manager};
