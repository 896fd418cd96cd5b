//! Coalescing repaint signal.
//!
//! Producers call `request()` from any thread; the render loop awaits
//! `wait()` and claims the request with `take()` right before drawing.
//! Requests made while one is already pending are folded into it, so a burst
//! of invalidations costs one wakeup and one frame.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

#[derive(Debug, Default)]
pub struct RepaintSignal {
    pending: AtomicBool,
    notify: Notify,
    requests: AtomicU64,
}

impl RepaintSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a repaint as pending. Never blocks.
    pub fn request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if !self.pending.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }

    /// Resolves once a request may be pending. Spurious wakeups are possible;
    /// confirm with `take()`.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }

    /// Claims the pending request, returning whether there was one.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Total number of `request()` calls, coalesced or not.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}
