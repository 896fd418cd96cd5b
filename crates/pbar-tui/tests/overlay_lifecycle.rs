//! End-to-end overlay behavior against an in-memory terminal.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Result, bail};
use pbar_core::formatters::{Label, Progress, Text};
use pbar_core::{Counter, FormatError, Formatter, OverlayView, StyledText, WidthHint};
use crossterm::event::Event;
use pbar_tui::input::Input;
use pbar_tui::{
    CounterOptions, ERROR_PLACEHOLDER, Output, OutputKind, OverlayState, ProgressOverlay,
};
use ratatui::backend::TestBackend;
use ratatui::{Frame, Terminal};

/// Everything the overlay drew, one entry per frame.
#[derive(Clone, Default)]
struct Screen {
    frames: Arc<Mutex<Vec<Vec<String>>>>,
    finished: Arc<AtomicBool>,
}

impl Screen {
    fn count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    fn last(&self) -> Vec<String> {
        self.frames.lock().unwrap().last().cloned().unwrap_or_default()
    }

    fn last_text(&self) -> String {
        self.last().join("\n")
    }
}

struct CaptureOutput {
    terminal: Terminal<TestBackend>,
    screen: Screen,
    /// Draws allowed before every draw fails.
    fail_after: Option<usize>,
    draws: AtomicUsize,
}

impl CaptureOutput {
    fn new(screen: &Screen) -> Self {
        Self {
            terminal: Terminal::new(TestBackend::new(60, 6)).unwrap(),
            screen: screen.clone(),
            fail_after: None,
            draws: AtomicUsize::new(0),
        }
    }

    fn failing_after(screen: &Screen, draws: usize) -> Self {
        Self {
            fail_after: Some(draws),
            ..Self::new(screen)
        }
    }
}

impl Output for CaptureOutput {
    fn draw(&mut self, render: &mut dyn FnMut(&mut Frame<'_>)) -> Result<()> {
        let attempt = self.draws.fetch_add(1, Ordering::SeqCst);
        if self.fail_after.is_some_and(|limit| attempt >= limit) {
            bail!("terminal went away");
        }
        self.terminal.draw(|frame| render(frame))?;
        let buffer = self.terminal.backend().buffer();
        let area = buffer.area;
        let lines = (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
                    .trim_end()
                    .to_string()
            })
            .collect();
        self.screen.frames.lock().unwrap().push(lines);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.terminal.clear()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.screen.finished.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn kind(&self) -> OutputKind {
        OutputKind::Custom("capture".into())
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn overlay(screen: &Screen, min_redraw: Duration, refresh: Option<Duration>) -> ProgressOverlay {
    ProgressOverlay::builder()
        .output(Box::new(CaptureOutput::new(screen)))
        .no_input()
        .min_redraw_interval(min_redraw)
        .refresh_interval(refresh)
        .build()
        .unwrap()
}

#[test]
fn test_burst_of_invalidations_draws_once() {
    let screen = Screen::default();
    let mut overlay = overlay(&screen, Duration::from_millis(200), None);
    overlay.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || overlay.frames_drawn() == 1));

    for _ in 0..10 {
        overlay.invalidate();
    }
    assert!(wait_until(Duration::from_secs(2), || overlay.frames_drawn() == 2));
    thread::sleep(Duration::from_millis(400));
    assert_eq!(overlay.frames_drawn(), 2);

    overlay.stop().unwrap();
}

#[test]
fn test_coalesced_frame_shows_latest_state() {
    let screen = Screen::default();
    let mut overlay = ProgressOverlay::builder()
        .output(Box::new(CaptureOutput::new(&screen)))
        .no_input()
        .formatters(vec![
            Arc::new(Label::new()),
            Arc::new(Text::new(" ")),
            Arc::new(Progress),
        ])
        .min_redraw_interval(Duration::from_millis(100))
        .refresh_interval(None)
        .build()
        .unwrap();
    overlay.start().unwrap();

    let mut items = overlay.new_counter(0..20, CounterOptions::new("work"));
    for _ in 0..7 {
        items.next();
    }
    assert!(wait_until(Duration::from_secs(2), || {
        screen.last_text().contains("work   7/ 20")
    }));

    drop(items);
    overlay.stop().unwrap();
    assert!(screen.finished.load(Ordering::SeqCst));
}

#[test]
fn test_no_frames_after_stop() {
    let screen = Screen::default();
    let mut overlay = overlay(&screen, Duration::from_millis(10), Some(Duration::from_millis(10)));
    overlay.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || overlay.frames_drawn() >= 2));

    overlay.stop().unwrap();
    assert_eq!(overlay.state(), OverlayState::Stopped);
    assert!(!overlay.is_render_active());
    let frames = overlay.frames_drawn();

    overlay.invalidate();
    thread::sleep(Duration::from_millis(100));
    assert_eq!(overlay.frames_drawn(), frames);
    assert_eq!(screen.count() as u64, frames);
}

#[test]
fn test_auto_refresh_repaints_without_producers() {
    let screen = Screen::default();
    let mut overlay = overlay(&screen, Duration::from_millis(10), Some(Duration::from_millis(30)));
    overlay.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || overlay.frames_drawn() >= 4));
    overlay.stop().unwrap();
}

#[test]
fn test_title_and_toolbar_rendered() {
    let screen = Screen::default();
    let mut overlay = ProgressOverlay::builder()
        .output(Box::new(CaptureOutput::new(&screen)))
        .no_input()
        .title("Installing")
        .bottom_toolbar("ctrl-c to abort")
        .refresh_interval(None)
        .min_redraw_interval(Duration::from_millis(10))
        .build()
        .unwrap();
    overlay.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        let lines = screen.last();
        lines.first().map(String::as_str) == Some("Installing")
            && lines.last().map(String::as_str) == Some("ctrl-c to abort")
    }));

    overlay.set_title(Some(StyledText::plain("Done")));
    assert!(wait_until(Duration::from_secs(2), || {
        screen.last().first().map(String::as_str) == Some("Done")
    }));
    overlay.stop().unwrap();
}

struct Fragile;

impl Formatter for Fragile {
    fn format(
        &self,
        _overlay: &OverlayView<'_>,
        counter: &Counter,
        _width: u16,
    ) -> Result<StyledText, FormatError> {
        match counter.label() {
            "panics" => panic!("formatter bug"),
            "fails" => Err(FormatError::new("bad state")),
            _ => Ok(StyledText::plain("fine")),
        }
    }

    fn width(&self, _overlay: &OverlayView<'_>) -> WidthHint {
        WidthHint::exact(8)
    }
}

#[test]
fn test_formatter_failures_only_affect_their_line() {
    let screen = Screen::default();
    let mut overlay = ProgressOverlay::builder()
        .output(Box::new(CaptureOutput::new(&screen)))
        .no_input()
        .formatters(vec![
            Arc::new(Label::new()),
            Arc::new(Text::new(" ")),
            Arc::new(Fragile),
        ])
        .refresh_interval(None)
        .min_redraw_interval(Duration::from_millis(10))
        .build()
        .unwrap();
    let _a = overlay.new_counter(0..1, CounterOptions::new("panics"));
    let _b = overlay.new_counter(0..1, CounterOptions::new("ok"));
    let _c = overlay.new_counter(0..1, CounterOptions::new("fails"));
    overlay.start().unwrap();

    assert!(wait_until(Duration::from_secs(2), || overlay.frames_drawn() >= 1));
    let lines = screen.last();
    assert_eq!(lines[0], format!("panics {ERROR_PLACEHOLDER}"));
    assert_eq!(lines[1], "ok     fine");
    assert_eq!(lines[2], format!("fails  {ERROR_PLACEHOLDER}"));

    overlay.invalidate();
    assert!(wait_until(Duration::from_secs(2), || overlay.frames_drawn() >= 2));
    assert!(overlay.is_render_active());
    overlay.stop().unwrap();
    assert!(overlay.render_error().is_none());
}

#[test]
fn test_output_failure_ends_render_context_and_stop_returns() {
    let screen = Screen::default();
    let mut overlay = ProgressOverlay::builder()
        .output(Box::new(CaptureOutput::failing_after(&screen, 1)))
        .no_input()
        .refresh_interval(None)
        .min_redraw_interval(Duration::from_millis(10))
        .build()
        .unwrap();
    overlay.start().unwrap();
    assert!(wait_until(Duration::from_secs(2), || overlay.frames_drawn() == 1));

    overlay.invalidate();
    assert!(wait_until(Duration::from_secs(2), || !overlay.is_render_active()));
    let error = overlay.render_error().unwrap();
    assert!(error.contains("terminal went away"), "{error}");
    assert!(screen.finished.load(Ordering::SeqCst));

    // Producers keep working against a dead render context.
    overlay.invalidate();
    for _ in overlay.new_counter(0..3, CounterOptions::new("late")) {}

    let started = Instant::now();
    overlay.stop().unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_concurrent_producers() {
    let screen = Screen::default();
    let mut overlay = overlay(&screen, Duration::from_millis(5), None);
    overlay.start().unwrap();
    let handle = overlay.handle();

    thread::scope(|scope| {
        for worker in 0..4 {
            let handle = handle.clone();
            scope.spawn(move || {
                for _ in handle.new_counter(0..50, CounterOptions::new(format!("worker-{worker}"))) {
                    thread::sleep(Duration::from_micros(200));
                }
            });
        }
    });

    let counters = overlay.counters();
    assert_eq!(counters.len(), 4);
    for counter in &counters {
        assert!(counter.is_done());
        assert_eq!(counter.current(), 50);
        assert_eq!(counter.total(), Some(50));
    }
    assert!(wait_until(Duration::from_secs(2), || {
        screen.last_text().matches("100.0%").count() == 4
    }));
    overlay.stop().unwrap();
}

#[test]
fn test_unknown_total_counter() {
    let screen = Screen::default();
    let mut overlay = overlay(&screen, Duration::from_millis(10), None);
    overlay.start().unwrap();

    let source = (0u32..).take_while(|n| *n < 5);
    let mut items = overlay.new_counter(source, CounterOptions::new("stream"));
    let counter = Arc::clone(items.counter());
    assert_eq!(counter.total(), None);
    items.next();
    items.next();
    assert!(counter.percentage().abs() < f64::EPSILON);
    assert_eq!(counter.time_left(), None);
    assert!(wait_until(Duration::from_secs(2), || {
        let text = screen.last_text();
        text.contains("stream") && text.contains("?:??:??") && text.contains("2/  ?")
    }));

    for _ in items.by_ref() {}
    assert_eq!(counter.current(), 5);
    assert!(counter.is_done());
    drop(items);
    overlay.stop().unwrap();
}

#[test]
fn test_remove_when_done_leaves_display() {
    let screen = Screen::default();
    let mut overlay = overlay(&screen, Duration::from_millis(10), None);
    overlay.start().unwrap();

    for _ in overlay.new_counter(0..3, CounterOptions::new("kept")) {}
    for _ in overlay.new_counter(0..3, CounterOptions::new("temporary").remove_when_done()) {}

    assert_eq!(overlay.counters().len(), 1);
    assert!(wait_until(Duration::from_secs(2), || {
        let text = screen.last_text();
        text.contains("kept") && !text.contains("temporary")
    }));
    overlay.stop().unwrap();
}

/// Output whose first frame panics.
struct PanickingOutput;

impl Output for PanickingOutput {
    fn draw(&mut self, _render: &mut dyn FnMut(&mut Frame<'_>)) -> Result<()> {
        panic!("backend exploded");
    }

    fn clear(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn kind(&self) -> OutputKind {
        OutputKind::Custom("panicking".into())
    }
}

/// Input that never produces events and records when it is released.
struct IdleInput {
    detached: Arc<AtomicBool>,
}

impl Input for IdleInput {
    fn attach(&mut self) -> Result<()> {
        Ok(())
    }

    fn poll_event(&mut self, timeout: Duration) -> Result<Option<Event>> {
        thread::sleep(timeout);
        Ok(None)
    }

    fn detach(&mut self) -> Result<()> {
        self.detached.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_render_panic_releases_input_before_stop() {
    let detached = Arc::new(AtomicBool::new(false));
    let mut overlay = ProgressOverlay::builder()
        .output(Box::new(PanickingOutput))
        .input(Box::new(IdleInput {
            detached: Arc::clone(&detached),
        }))
        .refresh_interval(None)
        .build()
        .unwrap();
    overlay.start().unwrap();

    let stopped = wait_until(Duration::from_secs(2), || !overlay.is_render_active());
    assert!(stopped);
    assert!(detached.load(Ordering::SeqCst));
    let error = overlay.render_error().unwrap();
    assert!(error.contains("backend exploded"), "{error}");

    overlay.stop().unwrap();
    assert_eq!(overlay.state(), OverlayState::Stopped);
}
