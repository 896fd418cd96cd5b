//! Producer-side handle and the state it shares with the render context.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use pbar_core::{Counter, CounterRegistry, StyledText};

use crate::iter::CounterIter;
use crate::repaint::RepaintSignal;

/// Render-context diagnostics readable from the producer side.
#[derive(Debug, Default)]
pub(crate) struct RenderStats {
    frames: AtomicU64,
    active: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl RenderStats {
    pub(crate) fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn frames(&self) -> u64 {
        self.frames.load(Ordering::Acquire)
    }

    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Release);
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn record_error(&self, message: String) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(message);
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// State owned jointly by the controller, its handles and the render context.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) registry: CounterRegistry,
    pub(crate) repaint: Arc<RepaintSignal>,
    pub(crate) stats: RenderStats,
    title: RwLock<Option<StyledText>>,
    bottom_toolbar: RwLock<Option<StyledText>>,
}

impl Shared {
    pub(crate) fn new(title: Option<StyledText>, bottom_toolbar: Option<StyledText>) -> Self {
        Self {
            title: RwLock::new(title),
            bottom_toolbar: RwLock::new(bottom_toolbar),
            ..Self::default()
        }
    }

    pub(crate) fn title(&self) -> Option<StyledText> {
        self.title
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn bottom_toolbar(&self) -> Option<StyledText> {
        self.bottom_toolbar
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Options for a new counter.
#[derive(Debug, Clone, Default)]
pub struct CounterOptions {
    pub label: String,
    pub remove_when_done: bool,
    /// Explicit total; when `None` it is taken from the source's exact size
    /// hint, if it has one.
    pub total: Option<u64>,
}

impl CounterOptions {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn total(mut self, total: u64) -> Self {
        self.total = Some(total);
        self
    }

    #[must_use]
    pub fn remove_when_done(mut self) -> Self {
        self.remove_when_done = true;
        self
    }
}

/// Exact length of `iter` if its size hint pins it down.
fn known_len<I: Iterator>(iter: &I) -> Option<u64> {
    match iter.size_hint() {
        (lower, Some(upper)) if lower == upper => u64::try_from(lower).ok(),
        _ => None,
    }
}

/// Cloneable, thread-safe handle for producers.
///
/// Everything here is non-blocking with respect to rendering: the only
/// locks taken are the registry's, held for a push or a removal.
#[derive(Debug, Clone)]
pub struct OverlayHandle {
    pub(crate) shared: Arc<Shared>,
}

impl OverlayHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Requests a repaint. Never blocks and never fails.
    pub fn invalidate(&self) {
        self.shared.repaint.request();
    }

    /// Registers a counter for `data` and returns the iterator that drives it.
    pub fn new_counter<I>(&self, data: I, options: CounterOptions) -> CounterIter<I::IntoIter>
    where
        I: IntoIterator,
    {
        let iter = data.into_iter();
        let total = options.total.or_else(|| known_len(&iter));
        let counter = Arc::new(Counter::new(
            options.label,
            total,
            options.remove_when_done,
        ));
        self.shared.registry.push(Arc::clone(&counter));
        CounterIter::new(iter, counter, self.clone())
    }

    /// Registered counters in display order.
    pub fn counters(&self) -> Vec<Arc<Counter>> {
        self.shared.registry.snapshot()
    }

    pub fn set_title(&self, title: Option<StyledText>) {
        *self
            .shared
            .title
            .write()
            .unwrap_or_else(PoisonError::into_inner) = title;
        self.invalidate();
    }

    pub fn set_bottom_toolbar(&self, toolbar: Option<StyledText>) {
        *self
            .shared
            .bottom_toolbar
            .write()
            .unwrap_or_else(PoisonError::into_inner) = toolbar;
        self.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> OverlayHandle {
        OverlayHandle::new(Arc::new(Shared::default()))
    }

    #[test]
    fn test_total_from_exact_size_hint() {
        let handle = handle();
        let iter = handle.new_counter(vec![1, 2, 3], CounterOptions::new("vec"));
        assert_eq!(iter.counter().total(), Some(3));
    }

    #[test]
    fn test_total_unknown_for_unbounded_source() {
        let handle = handle();
        let iter = handle.new_counter(0.., CounterOptions::new("forever"));
        assert_eq!(iter.counter().total(), None);

        let filtered = handle.new_counter((0..10).filter(|n| n % 2 == 0), CounterOptions::new("f"));
        assert_eq!(filtered.counter().total(), None);
    }

    #[test]
    fn test_explicit_total_wins() {
        let handle = handle();
        let iter = handle.new_counter(0.., CounterOptions::new("n").total(42));
        assert_eq!(iter.counter().total(), Some(42));
    }

    #[test]
    fn test_counters_in_creation_order() {
        let handle = handle();
        let _a = handle.new_counter(0..1, CounterOptions::new("a"));
        let _b = handle.new_counter(0..1, CounterOptions::new("b"));
        let labels: Vec<_> = handle
            .counters()
            .iter()
            .map(|c| c.label().to_string())
            .collect();
        assert_eq!(labels, ["a", "b"]);
    }

    #[test]
    fn test_set_title_invalidates() {
        let handle = handle();
        handle.set_title(Some(StyledText::plain("Downloading")));
        assert!(handle.shared.repaint.is_pending());
        assert_eq!(
            handle.shared.title().map(|t| t.to_plain()).as_deref(),
            Some("Downloading")
        );
    }

    #[test]
    fn test_invalidate_from_many_threads() {
        let handle = handle();
        std::thread::scope(|scope| {
            for _ in 0..8 {
                let handle = handle.clone();
                scope.spawn(move || {
                    for _ in 0..1000 {
                        handle.invalidate();
                    }
                });
            }
        });
        assert_eq!(handle.shared.repaint.requests(), 8000);
        assert!(handle.shared.repaint.take());
        assert!(!handle.shared.repaint.take());
    }
}
