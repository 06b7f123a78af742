//! Lease semantics of lock handles over the in-process backend.

use locker::prelude::*;
use std::time::Duration;
use tokio::time::Instant;

mod common;
use common::{fast_config, memory_manager, never};

#[tokio::test(start_paused = true)]
async fn test_mutual_exclusion_under_concurrent_try_lock() {
    let (_backend, manager) = memory_manager();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let handle = manager.create_lock_with("shared", fast_config()).unwrap();
        tasks.push(tokio::spawn(async move {
            handle.try_lock(&CancelToken::never()).await.unwrap()
        }));
    }

    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test(start_paused = true)]
async fn test_expired_lease_can_be_taken_over() {
    let (_backend, manager) = memory_manager();
    let first = manager.create_lock_with("job", fast_config()).unwrap();
    let second = manager.create_lock_with("job", fast_config()).unwrap();

    assert!(first.try_lock(&never()).await.unwrap());
    assert!(!second.try_lock(&never()).await.unwrap());

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(second.try_lock(&never()).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_stale_owner_is_rejected() {
    let (_backend, manager) = memory_manager();
    let stale = manager.create_lock_with("job", fast_config()).unwrap();
    let fresh = manager.create_lock_with("job", fast_config()).unwrap();

    assert!(stale.try_lock(&never()).await.unwrap());
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(fresh.try_lock(&never()).await.unwrap());

    let refresh = stale.refresh(&never(), Duration::from_millis(200)).await;
    assert!(refresh.unwrap_err().is_not_held());
    assert!(*stale.lost_token().borrow());

    assert!(stale.ttl(&never()).await.unwrap_err().is_not_held());
    assert!(stale.unlock(&never()).await.unwrap_err().is_not_held());
    assert_eq!(stale.state().await, LockState::Idle);

    // The new owner is untouched
    assert!(fresh.ttl(&never()).await.is_ok());
    fresh.unlock(&never()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_blocking_lock_times_out_on_held_key() {
    let (_backend, manager) = memory_manager();
    let holder = manager
        .create_lock_with("job", fast_config().with_ttl(Duration::from_secs(60)))
        .unwrap();
    assert!(holder.try_lock(&never()).await.unwrap());

    let waiter = manager.create_lock_with("job", fast_config()).unwrap();
    let start = Instant::now();
    let result = waiter.lock(&never()).await;
    let elapsed = start.elapsed();

    assert!(matches!(result, Err(LockError::WaitTimeout(t)) if t == Duration::from_millis(100)));
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed <= Duration::from_millis(110), "waited {elapsed:?}");
    assert_eq!(waiter.state().await, LockState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_blocking_lock_acquires_after_release() {
    let (_backend, manager) = memory_manager();
    let holder = manager.create_lock_with("job", fast_config()).unwrap();
    assert!(holder.try_lock(&never()).await.unwrap());

    let waiter = manager
        .create_lock_with("job", fast_config().with_acquire_timeout(Duration::from_secs(1)))
        .unwrap();
    let release = {
        let holder = holder.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            holder.unlock(&CancelToken::never()).await
        })
    };

    waiter.lock(&never()).await.unwrap();
    release.await.unwrap().unwrap();
    assert!(waiter.is_held().await);
}

#[tokio::test(start_paused = true)]
async fn test_unlock_twice_reports_not_held() {
    let (backend, manager) = memory_manager();
    let handle = manager.create_lock_with("job", fast_config()).unwrap();

    assert!(handle.try_lock(&never()).await.unwrap());
    handle.unlock(&never()).await.unwrap();
    assert!(handle.unlock(&never()).await.unwrap_err().is_not_held());
    assert!(backend.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unlock_twice_with_auto_close_stays_idle() {
    let (backend, manager) = memory_manager();
    let handle = manager
        .create_lock_with("job", fast_config().with_auto_close(true))
        .unwrap();

    assert!(handle.try_lock(&never()).await.unwrap());
    handle.unlock(&never()).await.unwrap();
    assert!(handle.unlock(&never()).await.unwrap_err().is_not_held());
    assert_eq!(handle.state().await, LockState::Idle);
    assert!(backend.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_default_handle_is_reusable_after_unlock() {
    let (_backend, manager) = memory_manager();
    let handle = manager.create_lock("job").unwrap();
    let token = handle.token().to_string();

    for _ in 0..3 {
        assert!(handle.try_lock(&never()).await.unwrap());
        handle.unlock(&never()).await.unwrap();
    }
    assert_eq!(handle.state().await, LockState::Idle);
    assert_eq!(handle.token(), token);
}

#[tokio::test(start_paused = true)]
async fn test_unbounded_settings_do_not_panic() {
    let (_backend, manager) = memory_manager();
    let config = fast_config()
        .with_ttl(Duration::MAX)
        .with_acquire_timeout(Duration::MAX);
    let holder = manager.create_lock_with("job", config).unwrap();
    holder.lock(&never()).await.unwrap();
    holder.refresh(&never(), Duration::MAX).await.unwrap();
    assert!(holder.ttl(&never()).await.unwrap() > Duration::from_secs(86_400));

    let waiter = manager.create_lock_with("job", config).unwrap();
    let result = waiter
        .lock(&CancelToken::with_timeout(Duration::from_millis(30)))
        .await;
    assert!(matches!(result, Err(LockError::Cancelled)));
}

#[tokio::test(start_paused = true)]
async fn test_renewal_keeps_lease_alive() {
    let (_backend, manager) = memory_manager();
    let holder = manager
        .create_lock_with(
            "job",
            fast_config().with_refresh_interval(Duration::from_millis(50)),
        )
        .unwrap();
    let competitor = manager.create_lock_with("job", fast_config()).unwrap();

    assert!(holder.try_lock(&never()).await.unwrap());

    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(500) {
        tokio::time::sleep(Duration::from_millis(25)).await;
        let remaining = holder.ttl(&never()).await.unwrap();
        assert!(remaining > Duration::ZERO);
        assert!(!competitor.try_lock(&never()).await.unwrap());
    }

    assert!(!*holder.lost_token().borrow());
    holder.unlock(&never()).await.unwrap();
    assert!(competitor.try_lock(&never()).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_lease_without_renewal_expires() {
    let (_backend, manager) = memory_manager();
    let holder = manager.create_lock_with("job", fast_config()).unwrap();
    assert!(holder.try_lock(&never()).await.unwrap());

    tokio::time::sleep(Duration::from_millis(201)).await;
    assert!(holder.ttl(&never()).await.unwrap_err().is_not_held());
}

#[tokio::test(start_paused = true)]
async fn test_explicit_refresh_extends_lease() {
    let (_backend, manager) = memory_manager();
    let holder = manager.create_lock_with("job", fast_config()).unwrap();
    assert!(holder.try_lock(&never()).await.unwrap());

    tokio::time::sleep(Duration::from_millis(150)).await;
    holder.refresh(&never(), Duration::from_millis(400)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    let remaining = holder.ttl(&never()).await.unwrap();
    assert!(remaining > Duration::from_millis(200), "remaining {remaining:?}");
}

#[tokio::test(start_paused = true)]
async fn test_operations_on_idle_handle() {
    let (_backend, manager) = memory_manager();
    let handle = manager.create_lock_with("job", fast_config()).unwrap();

    assert!(handle.unlock(&never()).await.unwrap_err().is_not_held());
    assert!(handle.ttl(&never()).await.unwrap_err().is_not_held());
    let refresh = handle.refresh(&never(), Duration::from_millis(100)).await;
    assert!(refresh.unwrap_err().is_not_held());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_token_fails_fast() {
    let (_backend, manager) = memory_manager();
    let handle = manager.create_lock_with("job", fast_config()).unwrap();
    let source = CancelSource::new();
    source.cancel();

    let result = handle.try_lock(&source.token()).await;
    assert!(matches!(result, Err(LockError::Cancelled)));
    let result = handle.lock(&source.token()).await;
    assert!(matches!(result, Err(LockError::Cancelled)));
    assert_eq!(handle.state().await, LockState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_handle_can_reacquire_after_unlock() {
    let (_backend, manager) = memory_manager();
    let handle = manager.create_lock_with("job", fast_config()).unwrap();
    let token = handle.token().to_string();

    assert!(handle.try_lock(&never()).await.unwrap());
    handle.unlock(&never()).await.unwrap();
    assert!(handle.try_lock(&never()).await.unwrap());
    assert_eq!(handle.token(), token);
}

/// Two handles race for `job:1`; the loser takes over once the winner's lease
/// lapses, and the winner's late unlock is rejected.
#[tokio::test(start_paused = true)]
async fn test_job_takeover_scenario() {
    let (_backend, manager) = memory_manager();
    let h1 = manager.create_lock_with("job:1", fast_config()).unwrap();
    let h2 = manager.create_lock_with("job:1", fast_config()).unwrap();
    let start = Instant::now();

    let (c1, c2) = (never(), never());
    let (r1, r2) = tokio::join!(h1.try_lock(&c1), h2.try_lock(&c2));
    let (r1, r2) = (r1.unwrap(), r2.unwrap());
    assert!(r1 ^ r2, "exactly one handle wins");
    let (winner, loser) = if r1 { (h1, h2) } else { (h2, h1) };

    assert!(!loser.try_lock(&never()).await.unwrap());

    tokio::time::sleep_until(start + Duration::from_millis(250)).await;
    assert!(loser.try_lock(&never()).await.unwrap());

    tokio::time::sleep_until(start + Duration::from_millis(260)).await;
    assert!(winner.unlock(&never()).await.unwrap_err().is_not_held());
    assert!(loser.is_held().await);
}
