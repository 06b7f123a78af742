//! Convenience prelude for lock types.

pub use crate::backend::LockBackend;
pub use crate::cancel::{CancelSource, CancelToken};
pub use crate::config::LockConfig;
pub use crate::error::{LockError, LockResult};
pub use crate::handle::{LockHandle, LockState};
pub use crate::manager::LockManager;
