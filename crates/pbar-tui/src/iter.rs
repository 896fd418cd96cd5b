use std::sync::Arc;

use pbar_core::Counter;

use crate::handle::OverlayHandle;

/// Iterator that advances a counter per yielded item.
///
/// Completion (exhaustion, early drop, or unwinding through the loop body)
/// marks the counter done exactly once and, for `remove_when_done`
/// counters, unregisters it.
#[derive(Debug)]
pub struct CounterIter<I> {
    inner: I,
    counter: Arc<Counter>,
    handle: OverlayHandle,
    finished: bool,
}

impl<I> CounterIter<I> {
    pub(crate) fn new(inner: I, counter: Arc<Counter>, handle: OverlayHandle) -> Self {
        Self {
            inner,
            counter,
            handle,
            finished: false,
        }
    }

    pub fn counter(&self) -> &Arc<Counter> {
        &self.counter
    }

    fn finish(&mut self) {
        if std::mem::replace(&mut self.finished, true) {
            return;
        }
        self.counter.mark_done();
        if self.counter.remove_when_done() {
            self.handle.shared.registry.remove(&self.counter);
        }
        self.handle.invalidate();
    }
}

impl<I: Iterator> Iterator for CounterIter<I> {
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if let Some(item) = self.inner.next() {
            self.counter.advance();
            self.handle.invalidate();
            Some(item)
        } else {
            self.finish();
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.finished {
            (0, Some(0))
        } else {
            self.inner.size_hint()
        }
    }
}

impl<I> Drop for CounterIter<I> {
    fn drop(&mut self) {
        self.finish();
    }
}
