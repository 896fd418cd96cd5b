//! Core pbar library: counters, the formatter boundary, config.

pub mod config;
pub mod counter;
pub mod formatter;
pub mod formatters;
pub mod interrupt;
pub mod registry;
pub mod text;

pub use counter::Counter;
pub use formatter::{FormatError, Formatter, OverlayView, WidthHint};
pub use registry::CounterRegistry;
pub use text::StyledText;
