//! Cooperative cancellation for pipeline runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// Cancellation handle bound to one recognizer invocation.
///
/// Exactly one handle exists per active pipeline run; the session owns it
/// and every task participating in the run holds a clone. [`abort`] is
/// idempotent: the first call wakes all waiters, subsequent calls are no-ops.
///
/// [`abort`]: CancelHandle::abort
#[derive(Debug, Clone)]
pub struct CancelHandle {
    aborted: Arc<AtomicBool>,
    tx: broadcast::Sender<()>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            aborted: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// Abort the run this handle is bound to. Safe to call multiple times.
    pub fn abort(&self) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            // No receivers is fine: is_aborted() already reads true.
            let _ = self.tx.send(());
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    /// Whether `other` is a clone of this handle (same underlying run).
    pub fn same_handle(&self, other: &CancelHandle) -> bool {
        Arc::ptr_eq(&self.aborted, &other.aborted)
    }

    /// Resolves once [`abort`](CancelHandle::abort) has been called.
    pub async fn cancelled(&self) {
        if self.is_aborted() {
            return;
        }
        let mut rx = self.tx.subscribe();
        // abort() may have won the race before we subscribed.
        if self.is_aborted() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_abort_is_idempotent() {
        let handle = CancelHandle::new();
        assert!(!handle.is_aborted());

        handle.abort();
        assert!(handle.is_aborted());

        // Second abort is a no-op, not a panic or a second wake-up.
        handle.abort();
        assert!(handle.is_aborted());
    }

    #[tokio::test]
    async fn test_cancelled_resolves_after_abort() {
        let handle = CancelHandle::new();
        let waiter = handle.clone();

        let task = tokio::spawn(async move {
            waiter.cancelled().await;
        });

        handle.abort();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_cancelled_resolves_immediately_when_already_aborted() {
        let handle = CancelHandle::new();
        handle.abort();
        handle.cancelled().await;
    }

    #[tokio::test]
    async fn test_same_handle_tracks_clones_only() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(handle.same_handle(&clone));
        assert!(!handle.same_handle(&CancelHandle::new()));
    }
}
