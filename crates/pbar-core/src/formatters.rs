//! Built-in formatters.
//!
//! Each formatter renders one column. `default_formatters()` gives the
//! standard layout: `label  42.0% [=====>    ]  42/100  eta [0:00:07] `.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::counter::Counter;
use crate::formatter::{FormatError, Formatter, OverlayView, WidthHint};
use crate::text::StyledText;

/// Shown in place of an unknown duration.
pub const UNKNOWN_TIME: &str = "?:??:??";

/// Formats a duration as `H:MM:SS`.
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// Truncates `text` to at most `width` display columns.
fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut used = 0;
    let mut out = String::new();
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(ch);
    }
    out
}

fn max_width<F>(overlay: &OverlayView<'_>, f: F) -> usize
where
    F: Fn(&Counter) -> usize,
{
    overlay
        .counters
        .iter()
        .map(|c| f(c))
        .max()
        .unwrap_or(0)
}

/// Seconds since the epoch as a float, for animations.
fn animation_clock() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Counter label, optionally with a fixed width and suffix.
#[derive(Debug, Clone, Default)]
pub struct Label {
    pub width: Option<u16>,
    pub suffix: String,
}

impl Label {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn with_width(mut self, width: u16) -> Self {
        self.width = Some(width);
        self
    }
}

impl Formatter for Label {
    fn format(
        &self,
        _overlay: &OverlayView<'_>,
        counter: &Counter,
        width: u16,
    ) -> Result<StyledText, FormatError> {
        let text = format!("{}{}", counter.label(), self.suffix);
        Ok(StyledText::styled(
            "label",
            truncate_to_width(&text, usize::from(width)),
        ))
    }

    fn width(&self, overlay: &OverlayView<'_>) -> WidthHint {
        if let Some(width) = self.width {
            return WidthHint::Exact(width);
        }
        let widest = max_width(overlay, |c| c.label().width() + self.suffix.width());
        let widest = u16::try_from(widest).unwrap_or(u16::MAX);
        WidthHint::Preferred {
            preferred: widest,
            max: Some(widest),
        }
    }
}

/// Fixed text, e.g. separators.
#[derive(Debug, Clone)]
pub struct Text {
    text: StyledText,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: StyledText::plain(text),
        }
    }

    pub fn styled(class: &'static str, text: impl Into<String>) -> Self {
        Self {
            text: StyledText::styled(class, text),
        }
    }
}

impl Formatter for Text {
    fn format(
        &self,
        _overlay: &OverlayView<'_>,
        _counter: &Counter,
        _width: u16,
    ) -> Result<StyledText, FormatError> {
        Ok(self.text.clone())
    }

    fn width(&self, _overlay: &OverlayView<'_>) -> WidthHint {
        WidthHint::exact(self.text.width())
    }
}

/// `" 42.0%"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Percentage;

impl Formatter for Percentage {
    fn format(
        &self,
        _overlay: &OverlayView<'_>,
        counter: &Counter,
        _width: u16,
    ) -> Result<StyledText, FormatError> {
        Ok(StyledText::styled(
            "percentage",
            format!("{:>5.1}%", counter.percentage()),
        ))
    }

    fn width(&self, _overlay: &OverlayView<'_>) -> WidthHint {
        WidthHint::Exact(6)
    }
}

/// `[=====>    ]`, or a bouncing marker when the total is unknown.
#[derive(Debug, Clone)]
pub struct Bar {
    pub start: String,
    pub end: String,
    pub sym_a: char,
    pub sym_b: char,
    pub sym_c: char,
    pub unknown: char,
}

impl Default for Bar {
    fn default() -> Self {
        Self {
            start: "[".to_string(),
            end: "]".to_string(),
            sym_a: '=',
            sym_b: '>',
            sym_c: ' ',
            unknown: '#',
        }
    }
}

impl Bar {
    /// Renders with an explicit animation phase in `[0, 1)` for unknown totals.
    pub fn render(&self, counter: &Counter, width: u16, phase: f64) -> StyledText {
        let chrome = self.start.width() + self.end.width() + 1;
        let inner = usize::from(width).saturating_sub(chrome);

        let (bar_a, bar_b, bar_c) = if counter.total().is_some() {
            let filled = ((counter.percentage().min(100.0) * inner as f64) / 100.0) as usize;
            let filled = filled.min(inner);
            let head = if counter.is_done() { self.sym_a } else { self.sym_b };
            (
                self.sym_a.to_string().repeat(filled),
                head.to_string(),
                self.sym_c.to_string().repeat(inner - filled),
            )
        } else {
            let offset = ((phase.rem_euclid(1.0) * inner as f64) as usize).min(inner);
            (
                self.sym_c.to_string().repeat(offset),
                self.unknown.to_string(),
                self.sym_c.to_string().repeat(inner - offset),
            )
        };

        StyledText::new()
            .with("bar", self.start.clone())
            .with("bar-a", bar_a)
            .with("bar-b", bar_b)
            .with("bar-c", bar_c)
            .with("bar", self.end.clone())
    }
}

impl Formatter for Bar {
    fn format(
        &self,
        _overlay: &OverlayView<'_>,
        counter: &Counter,
        width: u16,
    ) -> Result<StyledText, FormatError> {
        // One full sweep every five seconds.
        let phase = (animation_clock() * 20.0 % 100.0) / 100.0;
        Ok(self.render(counter, width, phase))
    }

    fn width(&self, _overlay: &OverlayView<'_>) -> WidthHint {
        WidthHint::Fill { min: 9 }
    }
}

/// `" 42/100"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Progress;

fn total_text(counter: &Counter) -> String {
    counter
        .total()
        .map_or_else(|| "?".to_string(), |t| t.to_string())
}

impl Formatter for Progress {
    fn format(
        &self,
        overlay: &OverlayView<'_>,
        counter: &Counter,
        _width: u16,
    ) -> Result<StyledText, FormatError> {
        let digits = max_width(overlay, |c| total_text(c).len()).max(3);
        Ok(StyledText::new()
            .with("current", format!("{:>digits$}", counter.current()))
            .with("", "/")
            .with("total", format!("{:>digits$}", total_text(counter))))
    }

    fn width(&self, overlay: &OverlayView<'_>) -> WidthHint {
        let digits = max_width(overlay, |c| total_text(c).len()).max(3);
        WidthHint::exact(digits * 2 + 1)
    }
}

/// Time since the counter started.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeElapsed;

impl Formatter for TimeElapsed {
    fn format(
        &self,
        overlay: &OverlayView<'_>,
        counter: &Counter,
        _width: u16,
    ) -> Result<StyledText, FormatError> {
        let now = Instant::now();
        let widest = max_width(overlay, |c| format_duration(c.elapsed_at(now)).len());
        let text = format_duration(counter.elapsed_at(now));
        Ok(StyledText::styled(
            "time-elapsed",
            format!("{text:>widest$}"),
        ))
    }

    fn width(&self, overlay: &OverlayView<'_>) -> WidthHint {
        let now = Instant::now();
        WidthHint::exact(max_width(overlay, |c| {
            format_duration(c.elapsed_at(now)).len()
        }))
    }
}

/// Estimated time remaining, `?:??:??` when unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeLeft;

fn time_left_text(counter: &Counter, now: Instant) -> String {
    counter
        .time_left_at(now)
        .map_or_else(|| UNKNOWN_TIME.to_string(), format_duration)
}

impl Formatter for TimeLeft {
    fn format(
        &self,
        overlay: &OverlayView<'_>,
        counter: &Counter,
        _width: u16,
    ) -> Result<StyledText, FormatError> {
        let now = Instant::now();
        let widest = max_width(overlay, |c| time_left_text(c, now).len());
        Ok(StyledText::styled(
            "time-left",
            format!("{:>widest$}", time_left_text(counter, now)),
        ))
    }

    fn width(&self, overlay: &OverlayView<'_>) -> WidthHint {
        let now = Instant::now();
        WidthHint::exact(max_width(overlay, |c| time_left_text(c, now).len()))
    }
}

/// Throughput in items per second.
#[derive(Debug, Clone, Copy, Default)]
pub struct IterationsPerSecond;

fn rate_text(counter: &Counter, now: Instant) -> String {
    format!("{:.2}", counter.rate_at(now).unwrap_or(0.0))
}

impl Formatter for IterationsPerSecond {
    fn format(
        &self,
        overlay: &OverlayView<'_>,
        counter: &Counter,
        _width: u16,
    ) -> Result<StyledText, FormatError> {
        let now = Instant::now();
        let widest = max_width(overlay, |c| rate_text(c, now).len());
        Ok(StyledText::styled(
            "iterations-per-second",
            format!("{:>widest$}", rate_text(counter, now)),
        ))
    }

    fn width(&self, overlay: &OverlayView<'_>) -> WidthHint {
        let now = Instant::now();
        WidthHint::exact(max_width(overlay, |c| rate_text(c, now).len()))
    }
}

/// Single-cell spinner.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpinningWheel;

const WHEEL: [char; 4] = ['/', '-', '\\', '|'];

impl Formatter for SpinningWheel {
    fn format(
        &self,
        _overlay: &OverlayView<'_>,
        _counter: &Counter,
        _width: u16,
    ) -> Result<StyledText, FormatError> {
        let index = (animation_clock() * 3.0) as usize % WHEEL.len();
        Ok(StyledText::styled("spinning-wheel", WHEEL[index].to_string()))
    }

    fn width(&self, _overlay: &OverlayView<'_>) -> WidthHint {
        WidthHint::Exact(1)
    }
}

/// Standard column set.
pub fn default_formatters() -> Vec<Arc<dyn Formatter>> {
    vec![
        Arc::new(Label::new()),
        Arc::new(Text::new(" ")),
        Arc::new(Percentage),
        Arc::new(Text::new(" ")),
        Arc::new(Bar::default()),
        Arc::new(Text::new(" ")),
        Arc::new(Progress),
        Arc::new(Text::new(" ")),
        Arc::new(Text::styled("time-left", "eta [")),
        Arc::new(TimeLeft),
        Arc::new(Text::styled("time-left", "]")),
        Arc::new(Text::new(" ")),
    ]
}
