//! Key bindings handled by the render context.
//!
//! The producer side never reads keys. While the overlay owns the terminal
//! (raw mode), Ctrl+C arrives as a key event rather than a signal, so the
//! default bindings forward it to the process explicitly.

use std::fmt;
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a key press does.
#[derive(Clone)]
pub enum KeyAction {
    /// Clear the screen and repaint everything.
    Redraw,
    /// Raise a process-level interrupt.
    Interrupt,
    /// Run a caller-supplied callback on the render context.
    Callback(Arc<dyn Fn() + Send + Sync>),
}

impl fmt::Debug for KeyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyAction::Redraw => write!(f, "Redraw"),
            KeyAction::Interrupt => write!(f, "Interrupt"),
            KeyAction::Callback(_) => write!(f, "Callback(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyChord {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyChord {
    pub const fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    pub const fn ctrl(c: char) -> Self {
        Self::new(KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn matches(&self, key: &KeyEvent) -> bool {
        let code = match key.code {
            KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
            other => other,
        };
        code == self.code && key.modifiers == self.modifiers
    }
}

/// Ordered binding list; the most recently added binding wins.
#[derive(Debug, Clone, Default)]
pub struct KeyBindings {
    bindings: Vec<(KeyChord, KeyAction)>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ctrl+L redraws, Ctrl+C interrupts.
    pub fn defaults() -> Self {
        let mut bindings = Self::new();
        bindings.bind(KeyChord::ctrl('l'), KeyAction::Redraw);
        bindings.bind(KeyChord::ctrl('c'), KeyAction::Interrupt);
        bindings
    }

    pub fn bind(&mut self, chord: KeyChord, action: KeyAction) {
        self.bindings.push((chord, action));
    }

    /// Appends `other`, so its bindings take precedence.
    pub fn extend(&mut self, other: KeyBindings) {
        self.bindings.extend(other.bindings);
    }

    /// Action for a key event. Releases and repeats are ignored.
    pub fn lookup(&self, key: &KeyEvent) -> Option<&KeyAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }
        self.bindings
            .iter()
            .rev()
            .find(|(chord, _)| chord.matches(key))
            .map(|(_, action)| action)
    }
}
