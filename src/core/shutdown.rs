use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;

/// Process-wide stop signal shared by all loops.
///
/// Loops check [`Shutdown::is_triggered`] once per cycle and use
/// [`Shutdown::wait_timeout`] for their interval so a trigger cuts the sleep
/// short without interrupting any in-flight I/O.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<ShutdownInner>,
}

#[derive(Default)]
struct ShutdownInner {
    triggered: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Safe to call from any thread, including the Ctrl+C handler.
    pub fn trigger(&self) {
        self.inner.triggered.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.triggered.load(Ordering::SeqCst)
    }

    /// Sleeps for `duration` or until shutdown is triggered, whichever is first.
    pub async fn wait_timeout(&self, duration: Duration) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // registrieren bevor das Flag gelesen wird, sonst geht ein trigger() verloren
        notified.as_mut().enable();

        if self.is_triggered() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = notified => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn trigger_interrupts_wait() {
        let shutdown = Shutdown::new();
        let waiter = shutdown.clone();

        let handle = tokio::spawn(async move {
            let start = Instant::now();
            waiter.wait_timeout(Duration::from_secs(30)).await;
            start.elapsed()
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();

        let elapsed = handle.await.unwrap();
        assert!(elapsed < Duration::from_secs(5));
        assert!(shutdown.is_triggered());
    }

    #[tokio::test]
    async fn wait_returns_immediately_once_triggered() {
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let start = Instant::now();
        shutdown.wait_timeout(Duration::from_secs(30)).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn wait_times_out_without_trigger() {
        let shutdown = Shutdown::new();
        shutdown.wait_timeout(Duration::from_millis(10)).await;
        assert!(!shutdown.is_triggered());
    }
}
