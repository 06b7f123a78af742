//! Ownership tokens presented to backends.

use std::process;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

/// Identifies this process instance: pid plus a random salt, so a recycled
/// pid on another boot never reproduces an old token.
fn process_tag() -> &'static str {
    static TAG: OnceLock<String> = OnceLock::new();
    TAG.get_or_init(|| {
        let salt: u32 = rand::thread_rng().r#gen();
        format!("{:x}.{salt:08x}", process::id())
    })
}

/// Generates a fresh handle token.
///
/// Format: `{pid_hex}.{salt}.{sequence_hex}.{nonce}`. Tokens from one process
/// share the first two segments; the sequence keeps them unique within it
/// and the nonce makes them unguessable.
pub fn create_token() -> String {
    static SEQUENCE: AtomicU64 = AtomicU64::new(0);
    let sequence = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let nonce: u64 = rand::thread_rng().r#gen();
    format!("{}.{sequence:x}.{nonce:016x}", process_tag())
}
