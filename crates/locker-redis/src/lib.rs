//! Redis backend for locks.
//!
//! One Redis server is the single source of truth; there is no multi-server
//! quorum. Leases are plain string keys holding the owner's token with a
//! millisecond expiry.

pub mod backend;
pub mod options;
pub mod provider;

pub use backend::RedisLockBackend;
pub use options::RedisOptions;
pub use provider::{ADAPTER_NAME, new_manager, parse_options};
