//! Progress counter state.
//!
//! A `Counter` is written by exactly one producer (the iteration wrapper bound
//! to it) and read by the render context on every frame. Mutable fields are
//! atomics so readers never block the writer and never observe a torn value.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// One tracked unit of progress.
#[derive(Debug)]
pub struct Counter {
    label: String,
    current: AtomicU64,
    total: Option<u64>,
    start_time: Instant,
    done: AtomicBool,
    remove_when_done: bool,
}

impl Counter {
    /// Creates a counter that started now.
    pub fn new(label: impl Into<String>, total: Option<u64>, remove_when_done: bool) -> Self {
        Self::started_at(label, total, remove_when_done, Instant::now())
    }

    /// Creates a counter with an explicit start instant.
    pub fn started_at(
        label: impl Into<String>,
        total: Option<u64>,
        remove_when_done: bool,
        start_time: Instant,
    ) -> Self {
        Self {
            label: label.into(),
            current: AtomicU64::new(0),
            total,
            start_time,
            done: AtomicBool::new(false),
            remove_when_done,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Acquire)
    }

    /// Known total, or `None` when it could not be derived.
    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn remove_when_done(&self) -> bool {
        self.remove_when_done
    }

    /// Increments `current` by one.
    pub fn advance(&self) {
        self.current.fetch_add(1, Ordering::AcqRel);
    }

    /// Marks the counter done. Idempotent.
    pub fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    /// Completion percentage in `0..=100` (more if `current` overshoots
    /// `total`). Returns `0.0` when the total is unknown.
    pub fn percentage(&self) -> f64 {
        match self.total {
            Some(total) => self.current() as f64 * 100.0 / total.max(1) as f64,
            None => 0.0,
        }
    }

    /// Time since the counter was created.
    pub fn elapsed(&self) -> Duration {
        self.elapsed_at(Instant::now())
    }

    pub fn elapsed_at(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_time)
    }

    /// Estimated time remaining.
    ///
    /// `None` means unknown: the total is missing, nothing has been
    /// processed yet, or the estimate does not fit a `Duration`.
    /// Overshooting the total yields zero.
    pub fn time_left(&self) -> Option<Duration> {
        self.time_left_at(Instant::now())
    }

    pub fn time_left_at(&self, now: Instant) -> Option<Duration> {
        self.total?;
        let percentage = self.percentage();
        if percentage <= 0.0 {
            return None;
        }
        let remaining = (100.0 - percentage).max(0.0);
        Duration::try_from_secs_f64(self.elapsed_at(now).as_secs_f64() * remaining / percentage).ok()
    }

    /// Items per second since start, or `None` before any time has passed.
    pub fn rate_at(&self, now: Instant) -> Option<f64> {
        let secs = self.elapsed_at(now).as_secs_f64();
        (secs > 0.0).then(|| self.current() as f64 / secs)
    }
}
