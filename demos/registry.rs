//! Example: Choosing a backend by name
//!
//! Run with: `cargo run --example registry -- memory`
//! or `cargo run --example registry -- redis` (uses REDIS_URL)

use locker::prelude::*;
use locker::Registry;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let backend = std::env::args().nth(1).unwrap_or_else(|| "memory".to_string());
    let options = match backend.as_str() {
        "redis" => Some(json!({
            "addr": std::env::var("REDIS_URL").unwrap_or_else(|_| "localhost:6379".to_string()),
            "timeout": 3000,
        })),
        _ => None,
    };

    let registry = Registry::with_default_backends();
    println!("Available backends: {:?}", registry.names());

    let manager = match registry.build(&backend, options).await {
        Ok(manager) => manager,
        Err(LockError::UnknownBackend(name)) => {
            eprintln!("No backend named {name:?}");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    println!("Using backend: {}", manager.backend_name());

    match manager
        .try_lock("nightly-import", LockConfig::default(), &CancelToken::never())
        .await?
    {
        Some(handle) => {
            println!("Got the lock, running import");
            handle.unlock(&CancelToken::never()).await?;
        }
        None => println!("Another worker is running the import"),
    }

    manager.close().await?;
    Ok(())
}
