//! Scoped ownership of a launched browser.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::backend::BrowserHandle;

/// Owns the browser for the duration of one run and closes it exactly once.
///
/// The normal path is [`SessionGuard::release`]. If the guard is dropped
/// without being released (the run future was dropped or panicked), the close
/// is scheduled on the current tokio runtime instead.
pub struct SessionGuard<B: BrowserHandle> {
    browser: Arc<B>,
    released: bool,
}

impl<B: BrowserHandle> SessionGuard<B> {
    pub fn new(browser: B) -> Self {
        Self {
            browser: Arc::new(browser),
            released: false,
        }
    }

    /// Shared handle for the agent. Closing stays with the guard.
    pub fn browser(&self) -> Arc<B> {
        Arc::clone(&self.browser)
    }

    /// Closes the browser and consumes the guard.
    pub async fn release(mut self) -> anyhow::Result<()> {
        // Marked before awaiting: a close that was started is never retried.
        self.released = true;
        debug!("Closing browser");
        self.browser.close().await
    }
}

impl<B: BrowserHandle> Drop for SessionGuard<B> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let browser = Arc::clone(&self.browser);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                debug!("Session guard dropped before release, closing browser in background");
                handle.spawn(async move {
                    if let Err(e) = browser.close().await {
                        warn!(error = %format!("{:#}", e), "Background browser close failed");
                    }
                });
            }
            Err(_) => warn!("Session guard dropped outside a runtime; browser left open"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBrowser(Arc<AtomicUsize>);

    #[async_trait]
    impl BrowserHandle for CountingBrowser {
        async fn close(&self) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn release_closes_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let guard = SessionGuard::new(CountingBrowser(closes.clone()));
        let _shared = guard.browser();
        guard.release().await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn drop_without_release_closes_in_background() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let _guard = SessionGuard::new(CountingBrowser(closes.clone()));
        }
        for _ in 0..10 {
            if closes.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
