//! Example: Using Redis leases
//!
//! Run with: `cargo run --example redis_lock`
//!
//! Requires a Redis server. Set REDIS_URL environment variable
//! or modify the URL below.

use locker::prelude::*;
use locker::{RedisLockBackend, RedisOptions};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Get Redis URL from environment or use default
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    println!("Connecting to Redis...");
    let options = RedisOptions::new(redis_url)
        .with_timeout(Duration::from_secs(3))
        .with_key_prefix("locker-demo:");
    let backend = RedisLockBackend::connect(&options).await?;
    let manager = LockManager::new(backend).with_defaults(
        LockConfig::default()
            .with_ttl(Duration::from_secs(10))
            .with_refresh_interval(Duration::from_secs(3)),
    );

    let handle = manager.create_lock("example-resource")?;
    println!("Created lock: {}", handle.key());

    println!("Acquiring lock with 5 second timeout...");
    handle.lock(&CancelToken::never()).await?;
    println!("Lock acquired! (will be renewed every 3 seconds)");

    // Watch for losing the lease while working
    let mut lost = handle.lost_token().clone();
    tokio::select! {
        _ = lost.wait_for(|lost| *lost) => println!("Lease was lost!"),
        _ = tokio::time::sleep(Duration::from_secs(15)) => println!("Work completed"),
    }

    println!(
        "Remaining lease: {:?}",
        handle.ttl(&CancelToken::never()).await?
    );
    handle.unlock(&CancelToken::never()).await?;
    println!("Lock released");

    manager.close().await?;
    Ok(())
}
