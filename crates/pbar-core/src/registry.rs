//! Ordered counter registry shared between producers and the renderer.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::counter::Counter;

/// Insertion-ordered list of counters. Order defines vertical stacking.
///
/// Cloning yields another handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct CounterRegistry {
    counters: Arc<Mutex<Vec<Arc<Counter>>>>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Arc<Counter>>> {
        // The vector stays consistent even if a holder panicked.
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, counter: Arc<Counter>) {
        self.lock().push(counter);
    }

    /// Removes `counter` by identity. Returns whether it was present.
    pub fn remove(&self, counter: &Arc<Counter>) -> bool {
        let mut counters = self.lock();
        match counters.iter().position(|c| Arc::ptr_eq(c, counter)) {
            Some(index) => {
                counters.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, counter: &Arc<Counter>) -> bool {
        self.lock().iter().any(|c| Arc::ptr_eq(c, counter))
    }

    /// Copy of the current list, in registry order.
    pub fn snapshot(&self) -> Vec<Arc<Counter>> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
