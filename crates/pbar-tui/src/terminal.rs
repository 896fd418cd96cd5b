//! Terminal state restore.
//!
//! The overlay draws inline (no alternate screen); the only modes it changes
//! are raw mode (while reading keys) and cursor visibility. Both are restored
//! on:
//! - Normal stop
//! - Panic (via the hook installed here)
//! - Second Ctrl+C (via the interrupt restore hook)

use std::any::Any;
use std::cell::Cell;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;
use std::thread;

use anyhow::{Context, Result};
use crossterm::cursor::Show;
use crossterm::execute;
use crossterm::terminal::disable_raw_mode;

/// Restores terminal state.
///
/// - Shows the cursor
/// - Disables raw mode
///
/// This function is idempotent and safe to call multiple times.
///
/// # Errors
/// Returns an error if raw mode cannot be disabled.
pub fn restore_terminal() -> Result<()> {
    let _ = execute!(io::stderr(), Show);
    disable_raw_mode().context("Failed to disable raw mode")?;
    Ok(())
}

thread_local! {
    static GUARDED: Cell<bool> = const { Cell::new(false) };
}

/// Runs `f`, catching a panic that the caller reports itself.
///
/// Panics caught here leave the terminal alone and are not printed by the
/// hook installed below.
pub(crate) fn guarded<R>(f: impl FnOnce() -> R) -> thread::Result<R> {
    let outer = GUARDED.with(|g| g.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    GUARDED.with(|g| g.set(outer));
    result
}

/// Text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Installs (once per process) a panic hook that restores the terminal
/// before printing the panic.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            if GUARDED.with(Cell::get) {
                return;
            }
            let _ = restore_terminal();
            original_hook(panic_info);
        }));
        pbar_core::interrupt::set_restore_hook(|| {
            let _ = restore_terminal();
        });
    });
}
