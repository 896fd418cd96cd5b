//! Formatter boundary.
//!
//! A formatter renders one column of the overlay: given a counter and the
//! width assigned to its column it returns styled text. Implementations are
//! supplied by callers and must not be trusted to succeed; the render context
//! isolates both `Err` returns and panics per counter.

use std::fmt;
use std::sync::Arc;

use crate::counter::Counter;
use crate::text::StyledText;

/// What a formatter sees of the overlay when sizing or rendering.
#[derive(Debug, Clone, Copy)]
pub struct OverlayView<'a> {
    pub title: Option<&'a StyledText>,
    /// All registered counters, in display order.
    pub counters: &'a [Arc<Counter>],
}

/// Size hint for a formatter column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthHint {
    /// Exactly this many columns.
    Exact(u16),
    /// Prefer `preferred` columns, never more than `max` if given.
    Preferred { preferred: u16, max: Option<u16> },
    /// Take the remaining space, at least `min` columns.
    Fill { min: u16 },
}

impl WidthHint {
    pub fn exact(width: usize) -> Self {
        WidthHint::Exact(clamp_u16(width))
    }

    pub fn preferred(width: usize) -> Self {
        WidthHint::Preferred {
            preferred: clamp_u16(width),
            max: None,
        }
    }
}

fn clamp_u16(value: usize) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

#[derive(Debug)]
pub struct FormatError {
    message: String,
}

impl FormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "format failed: {}", self.message)
    }
}

impl std::error::Error for FormatError {}

pub trait Formatter: Send + Sync {
    /// Renders `counter` for a column `width` cells wide.
    ///
    /// # Errors
    /// Returns an error if the counter cannot be rendered; the line is then
    /// replaced by an error placeholder.
    fn format(
        &self,
        overlay: &OverlayView<'_>,
        counter: &Counter,
        width: u16,
    ) -> Result<StyledText, FormatError>;

    /// Column size hint. Re-evaluated every frame.
    fn width(&self, overlay: &OverlayView<'_>) -> WidthHint;
}
