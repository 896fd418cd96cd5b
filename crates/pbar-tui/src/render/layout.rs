//! Frame layout.
//!
//! ```text
//! title             (1 row, if set)
//! counter rows      (one per counter; one column per formatter)
//! filler
//! bottom toolbar    (1 row, if set)
//! ```

use std::sync::Arc;

use pbar_core::{Counter, Formatter, OverlayView, StyledText, WidthHint};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::Line;
use ratatui::widgets::Paragraph;
use tracing::warn;

use crate::terminal::{guarded, panic_message};
use crate::theme::Theme;

/// Shown in place of a formatter's output when it fails.
pub const ERROR_PLACEHOLDER: &str = "ERROR";

/// Everything a frame shows, captured at the start of the draw.
pub(crate) struct FrameContent<'a> {
    pub title: Option<&'a StyledText>,
    pub bottom_toolbar: Option<&'a StyledText>,
    pub counters: &'a [Arc<Counter>],
}

pub(crate) fn render(
    frame: &mut Frame<'_>,
    content: &FrameContent<'_>,
    formatters: &[Arc<dyn Formatter>],
    theme: &Theme,
) {
    let rows = u16::try_from(content.counters.len()).unwrap_or(u16::MAX);
    let [title_area, counters_area, _, toolbar_area] = Layout::vertical([
        Constraint::Length(u16::from(content.title.is_some())),
        Constraint::Length(rows),
        Constraint::Fill(1),
        Constraint::Length(u16::from(content.bottom_toolbar.is_some())),
    ])
    .areas(frame.area());

    if let Some(title) = content.title {
        frame.render_widget(
            Paragraph::new(theme.line(title)).style(theme.style_for("title")),
            title_area,
        );
    }

    let view = OverlayView {
        title: content.title,
        counters: content.counters,
    };
    let hints: Vec<WidthHint> = formatters
        .iter()
        .map(|f| width_hint(f.as_ref(), &view))
        .collect();
    for (formatter, column) in formatters
        .iter()
        .zip(columns(counters_area, &hints))
    {
        let lines: Vec<Line<'static>> = content
            .counters
            .iter()
            .map(|counter| theme.line(&format_line(formatter.as_ref(), &view, counter, column.width)))
            .collect();
        frame.render_widget(Paragraph::new(lines), column);
    }

    if let Some(toolbar) = content.bottom_toolbar {
        frame.render_widget(
            Paragraph::new(theme.line(toolbar)).style(theme.style_for("bottom-toolbar")),
            toolbar_area,
        );
    }
}

fn placeholder() -> StyledText {
    StyledText::styled("error", ERROR_PLACEHOLDER)
}

/// One formatter's output for one counter; failures become the placeholder.
pub(crate) fn format_line(
    formatter: &dyn Formatter,
    view: &OverlayView<'_>,
    counter: &Counter,
    width: u16,
) -> StyledText {
    match guarded(|| formatter.format(view, counter, width)) {
        Ok(Ok(text)) => text,
        Ok(Err(err)) => {
            warn!(counter = counter.label(), error = %err, "formatter failed");
            placeholder()
        }
        Err(payload) => {
            warn!(
                counter = counter.label(),
                panic = %panic_message(payload.as_ref()),
                "formatter panicked"
            );
            placeholder()
        }
    }
}

fn width_hint(formatter: &dyn Formatter, view: &OverlayView<'_>) -> WidthHint {
    guarded(|| formatter.width(view)).unwrap_or_else(|payload| {
        warn!(panic = %panic_message(payload.as_ref()), "formatter width panicked");
        WidthHint::exact(ERROR_PLACEHOLDER.len())
    })
}

/// Column widths for `hints` across `total` cells.
///
/// Exact and preferred columns get their size; fill columns share what is
/// left, each getting at least its minimum.
pub(crate) fn column_widths(hints: &[WidthHint], total: u16) -> Vec<u16> {
    let fixed: u16 = hints
        .iter()
        .map(|hint| match *hint {
            WidthHint::Exact(w) => w,
            WidthHint::Preferred { preferred, max } => max.map_or(preferred, |m| preferred.min(m)),
            WidthHint::Fill { .. } => 0,
        })
        .fold(0, u16::saturating_add);
    let fills = hints
        .iter()
        .filter(|h| matches!(h, WidthHint::Fill { .. }))
        .count();
    let fills = u16::try_from(fills).unwrap_or(u16::MAX);
    let remaining = total.saturating_sub(fixed);
    let (share, mut extra) = if fills == 0 {
        (0, 0)
    } else {
        (remaining / fills, remaining % fills)
    };

    hints
        .iter()
        .map(|hint| match *hint {
            WidthHint::Exact(w) => w,
            WidthHint::Preferred { preferred, max } => max.map_or(preferred, |m| preferred.min(m)),
            WidthHint::Fill { min } => {
                let bonus = u16::from(extra > 0);
                extra = extra.saturating_sub(1);
                (share + bonus).max(min)
            }
        })
        .collect()
}

/// Lays columns left to right; anything past the right edge is clipped.
fn columns(area: Rect, hints: &[WidthHint]) -> Vec<Rect> {
    let mut x = area.x;
    column_widths(hints, area.width)
        .into_iter()
        .map(|width| {
            let width = width.min(area.right().saturating_sub(x));
            let rect = Rect::new(x, area.y, width, area.height);
            x = x.saturating_add(width);
            rect
        })
        .collect()
}
