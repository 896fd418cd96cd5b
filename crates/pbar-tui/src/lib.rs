//! Live progress overlay for the terminal.
//!
//! `ProgressOverlay` owns a render context on its own thread; producers
//! register counters and request repaints through an `OverlayHandle` from any
//! thread without ever waiting on the terminal.

pub mod controller;
pub mod handle;
pub mod input;
pub mod iter;
pub mod keys;
pub mod output;
pub mod render;
pub mod repaint;
pub mod signals;
pub mod terminal;
pub mod theme;

pub use controller::{OverlayBuilder, OverlayOptions, OverlayState, ProgressOverlay};
pub use handle::{CounterOptions, OverlayHandle};
pub use iter::CounterIter;
pub use keys::{KeyAction, KeyBindings, KeyChord};
pub use output::{Output, OutputKind, TerminalOutput};
pub use render::layout::ERROR_PLACEHOLDER;
pub use theme::Theme;
