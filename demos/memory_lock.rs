//! Example: In-process leases
//!
//! Run with: `cargo run --example memory_lock`

use locker::prelude::*;
use locker::MemoryLockBackend;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let manager = LockManager::new(MemoryLockBackend::new());

    // Background renewal keeps the lease alive while we work
    let config = LockConfig::default()
        .with_ttl(Duration::from_millis(500))
        .with_refresh_interval(Duration::from_millis(150))
        .with_acquire_timeout(Duration::from_secs(2));

    let handle = manager.create_lock_with("report:daily", config)?;
    println!("Created lock: {}", handle.key());

    handle.lock(&CancelToken::never()).await?;
    println!("Lock acquired");

    // A second handle cannot get in while the first holds the lease
    let other = manager.create_lock_with("report:daily", config.with_auto_close(false))?;
    let acquired = other.try_lock(&CancelToken::never()).await?;
    println!("Second handle acquired: {}", acquired);

    println!("Doing work longer than one lease...");
    tokio::time::sleep(Duration::from_secs(1)).await;
    println!(
        "Remaining lease: {:?}",
        handle.ttl(&CancelToken::never()).await?
    );

    handle.unlock(&CancelToken::never()).await?;
    println!("Lock released, handle is now {:?}", handle.state().await);

    // Give up waiting after a deadline or on request
    let source = CancelSource::new();
    source.cancel_after(Duration::from_millis(50));
    let acquired = other.try_lock(&source.token()).await?;
    println!("Second handle acquired after release: {}", acquired);

    manager.close().await?;
    println!("Manager closed");
    Ok(())
}
