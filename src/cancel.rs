//! Run-scoped cancellation.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

use crate::error::TransportError;

/// Cooperative cancellation token shared by everything in one run.
///
/// Cloning is cheap; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancellationToken {
    /// Create a new token (not cancelled).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every waiter.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Run `future` unless the token fires first.
    ///
    /// On cancellation the future is dropped, which aborts in-flight HTTP
    /// requests and kills `git` subprocesses spawned with `kill_on_drop`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Cancelled`] if the token fires first, and
    /// otherwise whatever `future` returns.
    pub async fn guard<T, F>(&self, future: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        if self.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        tokio::select! {
            biased;
            () = self.cancelled() => Err(TransportError::Cancelled),
            result = future => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn guard_passes_result_through() {
        let token = CancellationToken::new();
        let result = token.guard(async { Ok::<_, TransportError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn guard_fails_fast_when_already_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        let result = token.guard(async { Ok::<_, TransportError>(7) }).await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }

    #[tokio::test]
    async fn cancel_interrupts_pending_future() {
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = token
            .guard(async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, TransportError>(())
            })
            .await;
        assert!(matches!(result, Err(TransportError::Cancelled)));
        assert!(token.is_cancelled());
    }
}
