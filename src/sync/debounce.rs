//! Single-slot debounce timer on the tokio runtime

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

struct Pending {
    handle: JoinHandle<()>,
    /// Set once the window elapsed and the action started
    fired: Arc<AtomicBool>,
}

/// Runs the most recently scheduled action once the window passes without a
/// new one. At most one action is pending at a time.
pub struct Debouncer {
    window: Duration,
    pending: Option<Pending>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self { window, pending: None }
    }

    /// Replace whatever is pending with `action`, restarting the window
    pub fn schedule<F>(&mut self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);
        let window = self.window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            flag.store(true, Ordering::SeqCst);
            action.await;
        });

        debug!("Debounce scheduled in {:?}", window);
        self.pending = Some(Pending { handle, fired });
    }

    /// Drop the pending action if it has not started.
    /// Returns true when something was cancelled. A started action stays
    /// tracked so `settle` can wait for it.
    pub fn cancel(&mut self) -> bool {
        match &self.pending {
            Some(pending) if !pending.fired.load(Ordering::SeqCst) => {}
            _ => return false,
        }
        if let Some(pending) = self.pending.take() {
            pending.handle.abort();
            debug!("Debounce cancelled");
        }
        true
    }

    /// Wait for an action that already started
    pub async fn settle(&mut self) {
        let started = self
            .pending
            .as_ref()
            .is_some_and(|p| p.fired.load(Ordering::SeqCst));
        if started && let Some(pending) = self.pending.take() {
            let _ = pending.handle.await;
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
