//! Cancellation signal accepted by every blocking lock operation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

/// Owning side of a cancellation signal.
///
/// Cloning shares the same signal. Cancelling is sticky: once fired, every
/// token derived from this source stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelSource {
    sender: Arc<watch::Sender<bool>>,
}

/// Observing side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    receiver: Option<watch::Receiver<bool>>,
}

impl CancelSource {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Returns a token observing this source.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            receiver: Some(self.sender.subscribe()),
        }
    }

    /// Fires the signal.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    /// Fires the signal once `delay` has elapsed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn cancel_after(&self, delay: Duration) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            sender.send_replace(true);
        });
    }
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// A token that never fires.
    pub fn never() -> Self {
        Self { receiver: None }
    }

    /// Convenience: a token that fires after `delay`.
    pub fn with_timeout(delay: Duration) -> Self {
        let source = CancelSource::new();
        source.cancel_after(delay);
        source.token()
    }

    pub fn is_cancelled(&self) -> bool {
        self.receiver.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once the signal fires. Never resolves for [`CancelToken::never`]
    /// or when every source has been dropped without cancelling.
    pub async fn cancelled(&self) {
        let Some(receiver) = &self.receiver else {
            return std::future::pending().await;
        };
        let mut receiver = receiver.clone();
        if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::never()
    }
}
