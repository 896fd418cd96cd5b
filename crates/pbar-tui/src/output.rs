//! Output boundary.
//!
//! The render context draws through an `Output`. Which backend is used is
//! decided once, from the host, by `create_output`; callers can replace that
//! choice process-wide with `set_default_output` (or temporarily with
//! `scoped_default_output`).

use std::io::{self, IsTerminal, Stderr, Stdout, Write, stderr, stdout};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use pbar_core::config::{Config, Destination};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::Position;
use ratatui::{Frame, Terminal, TerminalOptions, Viewport};
use tracing::debug;

/// Backend family chosen for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputKind {
    /// Escape-sequence terminal, with the `TERM` hint if known.
    Vt100 { term: Option<String> },
    /// Windows console with virtual terminal processing enabled.
    Windows10,
    /// ConEmu with ANSI support.
    ConEmu,
    /// Legacy Windows console API.
    Win32,
    /// Destination is not a terminal; nothing is drawn.
    Detached,
    /// Anything supplied by the caller.
    Custom(String),
}

/// Facts about the host that drive backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostInfo {
    pub windows: bool,
    pub vt100_enabled: bool,
    pub conemu_ansi: bool,
    pub term: Option<String>,
}

impl HostInfo {
    /// Inspects the running process. `term_hint` overrides `$TERM`.
    pub fn detect(term_hint: Option<&str>) -> Self {
        Self {
            windows: cfg!(windows),
            vt100_enabled: vt100_enabled(),
            conemu_ansi: std::env::var("ConEmuANSI").is_ok_and(|v| v == "ON"),
            term: term_hint
                .map(str::to_string)
                .or_else(|| std::env::var("TERM").ok()),
        }
    }
}

#[cfg(windows)]
fn vt100_enabled() -> bool {
    crossterm::ansi_support::supports_ansi()
}

#[cfg(not(windows))]
fn vt100_enabled() -> bool {
    true
}

pub fn select_output_kind(host: &HostInfo) -> OutputKind {
    if host.windows {
        if host.vt100_enabled {
            OutputKind::Windows10
        } else if host.conemu_ansi {
            OutputKind::ConEmu
        } else {
            OutputKind::Win32
        }
    } else {
        OutputKind::Vt100 {
            term: host.term.clone(),
        }
    }
}

pub trait Output: Send {
    /// Draws one frame.
    ///
    /// # Errors
    /// Returns an error if the terminal cannot be written.
    fn draw(&mut self, render: &mut dyn FnMut(&mut Frame<'_>)) -> Result<()>;

    /// Clears the drawing area so the next frame repaints every cell.
    ///
    /// # Errors
    /// Returns an error if the terminal cannot be written.
    fn clear(&mut self) -> Result<()>;

    /// Leaves the last frame on screen and moves the cursor below it.
    ///
    /// # Errors
    /// Returns an error if the terminal cannot be written.
    fn finish(&mut self) -> Result<()>;

    fn kind(&self) -> OutputKind;
}

/// `Output` over any ratatui backend.
pub struct TerminalOutput<B: Backend> {
    terminal: Terminal<B>,
    kind: OutputKind,
}

impl<B> TerminalOutput<B>
where
    B: Backend,
    B::Error: Send + Sync + 'static,
{
    pub fn new(terminal: Terminal<B>, kind: OutputKind) -> Self {
        Self { terminal, kind }
    }

    /// Reserves `height` rows below the cursor.
    ///
    /// # Errors
    /// Returns an error if the cursor position or size cannot be queried.
    pub fn inline(backend: B, height: u16, kind: OutputKind) -> Result<Self> {
        let terminal = Terminal::with_options(
            backend,
            TerminalOptions {
                viewport: Viewport::Inline(height),
            },
        )
        .context("Failed to create terminal")?;
        Ok(Self::new(terminal, kind))
    }

    pub fn backend(&self) -> &B {
        self.terminal.backend()
    }
}

impl<B> Output for TerminalOutput<B>
where
    B: Backend + Send,
    B::Error: Send + Sync + 'static,
{
    fn draw(&mut self, render: &mut dyn FnMut(&mut Frame<'_>)) -> Result<()> {
        self.terminal
            .draw(|frame| render(frame))
            .context("Failed to draw overlay")?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.terminal.clear().context("Failed to clear overlay")
    }

    fn finish(&mut self) -> Result<()> {
        let area = self.terminal.get_frame().area();
        self.terminal
            .set_cursor_position(Position::new(0, area.bottom().saturating_sub(1)))
            .context("Failed to move cursor")?;
        self.terminal
            .backend_mut()
            .append_lines(1)
            .context("Failed to move below overlay")?;
        self.terminal.show_cursor().context("Failed to show cursor")?;
        self.terminal
            .backend_mut()
            .flush()
            .context("Failed to flush terminal")
    }

    fn kind(&self) -> OutputKind {
        self.kind.clone()
    }
}

/// Output for a destination that is not a terminal (a pipe or a file).
///
/// Frames are accepted and dropped so producers behave the same either way.
#[derive(Debug, Default)]
pub struct DetachedOutput;

impl Output for DetachedOutput {
    fn draw(&mut self, _render: &mut dyn FnMut(&mut Frame<'_>)) -> Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn kind(&self) -> OutputKind {
        OutputKind::Detached
    }
}

/// Writer for the configured destination stream.
pub enum TermWriter {
    Stderr(Stderr),
    Stdout(Stdout),
}

impl TermWriter {
    fn is_terminal(&self) -> bool {
        match self {
            TermWriter::Stderr(w) => w.is_terminal(),
            TermWriter::Stdout(w) => w.is_terminal(),
        }
    }
}

impl Write for TermWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TermWriter::Stderr(w) => w.write(buf),
            TermWriter::Stdout(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TermWriter::Stderr(w) => w.flush(),
            TermWriter::Stdout(w) => w.flush(),
        }
    }
}

/// Builds the host-appropriate output on `destination`.
///
/// # Errors
/// Returns an error if the terminal cannot be initialized.
pub fn create_output(
    destination: Destination,
    term_hint: Option<&str>,
    height: u16,
) -> Result<Box<dyn Output>> {
    let writer = match destination {
        Destination::Stderr => TermWriter::Stderr(stderr()),
        Destination::Stdout => TermWriter::Stdout(stdout()),
    };
    if !writer.is_terminal() {
        debug!(?destination, "destination is not a terminal; overlay detached");
        return Ok(Box::new(DetachedOutput));
    }
    let kind = select_output_kind(&HostInfo::detect(term_hint));
    debug!(?kind, ?destination, "creating output");
    let output = TerminalOutput::inline(CrosstermBackend::new(writer), height, kind)?;
    Ok(Box::new(output))
}

/// Constructor used by `default_output` when overridden.
pub type OutputFactory = Arc<dyn Fn() -> Result<Box<dyn Output>> + Send + Sync>;

static DEFAULT_OUTPUT: RwLock<Option<OutputFactory>> = RwLock::new(None);

/// Replaces the process-wide default output factory, returning the previous.
/// `None` restores host detection.
pub fn set_default_output(factory: Option<OutputFactory>) -> Option<OutputFactory> {
    let mut slot = DEFAULT_OUTPUT
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    std::mem::replace(&mut *slot, factory)
}

/// Output used by overlays that were not given one explicitly.
///
/// Built on each call: from the override factory if set, else from host
/// detection with the config's destination, terminal hint and height.
///
/// # Errors
/// Returns an error if the output cannot be created.
pub fn default_output(config: &Config) -> Result<Box<dyn Output>> {
    let factory = DEFAULT_OUTPUT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    match factory {
        Some(factory) => factory(),
        None => create_output(
            config.output.destination,
            config.output.term.as_deref(),
            config.height,
        ),
    }
}

/// Restores the previous default output factory on drop.
#[must_use = "the override is removed when the guard drops"]
pub struct DefaultOutputGuard {
    previous: Option<OutputFactory>,
}

impl Drop for DefaultOutputGuard {
    fn drop(&mut self) {
        set_default_output(self.previous.take());
    }
}

/// Overrides the default output until the guard is dropped.
pub fn scoped_default_output(factory: OutputFactory) -> DefaultOutputGuard {
    DefaultOutputGuard {
        previous: set_default_output(Some(factory)),
    }
}

#[cfg(test)]
mod tests {
    use ratatui::backend::TestBackend;
    use ratatui::text::Line;

    use super::*;

    fn host(windows: bool, vt100_enabled: bool, conemu_ansi: bool) -> HostInfo {
        HostInfo {
            windows,
            vt100_enabled,
            conemu_ansi,
            term: Some("xterm".to_string()),
        }
    }

    #[test]
    fn test_selection_matrix() {
        assert_eq!(
            select_output_kind(&host(false, false, false)),
            OutputKind::Vt100 {
                term: Some("xterm".to_string())
            }
        );
        assert_eq!(
            select_output_kind(&host(true, true, true)),
            OutputKind::Windows10
        );
        assert_eq!(
            select_output_kind(&host(true, false, true)),
            OutputKind::ConEmu
        );
        assert_eq!(
            select_output_kind(&host(true, false, false)),
            OutputKind::Win32
        );
    }

    #[test]
    fn test_detached_output_accepts_frames() {
        let mut output = DetachedOutput;
        let mut called = false;
        output.draw(&mut |_| called = true).unwrap();
        output.finish().unwrap();
        assert!(!called);
        assert_eq!(output.kind(), OutputKind::Detached);
    }

    #[test]
    fn test_term_hint_overrides_env() {
        let info = HostInfo::detect(Some("vt220"));
        assert_eq!(info.term.as_deref(), Some("vt220"));
    }

    #[test]
    fn test_terminal_output_draws_into_backend() {
        let terminal = Terminal::new(TestBackend::new(10, 2)).unwrap();
        let mut output = TerminalOutput::new(terminal, OutputKind::Custom("test".into()));
        output
            .draw(&mut |frame| frame.render_widget(Line::from("hello"), frame.area()))
            .unwrap();
        let cell = output.backend().buffer().content()[0].symbol().to_string();
        assert_eq!(cell, "h");
        assert_eq!(output.kind(), OutputKind::Custom("test".into()));
    }

    // Single test touching the process-wide override.
    #[test]
    fn test_scoped_override_restores_previous() {
        let config = Config::default();
        {
            let _guard = scoped_default_output(Arc::new(|| {
                let terminal = Terminal::new(TestBackend::new(4, 1))?;
                Ok(Box::new(TerminalOutput::new(
                    terminal,
                    OutputKind::Custom("scoped".into()),
                )) as Box<dyn Output>)
            }));
            let output = default_output(&config).unwrap();
            assert_eq!(output.kind(), OutputKind::Custom("scoped".into()));
        }
        assert!(set_default_output(None).is_none());
    }
}
