//! Input boundary.
//!
//! The render context pumps an `Input` on a blocking worker and forwards
//! events to its loop. `attach`/`detach` bracket the pumping so an input can
//! switch terminal modes for exactly as long as it is read.

use std::io::{IsTerminal, stdin};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Upper bound on how long teardown waits for the input worker.
pub const INPUT_POLL: Duration = Duration::from_millis(50);

pub trait Input: Send {
    /// Prepares the input source (e.g. enables raw mode).
    ///
    /// # Errors
    /// Returns an error if the source cannot be prepared.
    fn attach(&mut self) -> Result<()>;

    /// Waits up to `timeout` for the next event.
    ///
    /// # Errors
    /// Returns an error if reading fails.
    fn poll_event(&mut self, timeout: Duration) -> Result<Option<Event>>;

    /// Undoes `attach`. Must be safe to call after a failed `attach`.
    ///
    /// # Errors
    /// Returns an error if the source cannot be restored.
    fn detach(&mut self) -> Result<()>;
}

/// Keyboard input from the controlling terminal.
#[derive(Debug, Default)]
pub struct CrosstermInput {
    raw: bool,
}

impl CrosstermInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a terminal input when stdin is a terminal.
    pub fn detect() -> Option<Self> {
        stdin().is_terminal().then(Self::new)
    }
}

impl Input for CrosstermInput {
    fn attach(&mut self) -> Result<()> {
        crate::terminal::install_panic_hook();
        enable_raw_mode().context("Failed to enable raw mode")?;
        self.raw = true;
        Ok(())
    }

    fn poll_event(&mut self, timeout: Duration) -> Result<Option<Event>> {
        if event::poll(timeout).context("Failed to poll terminal events")? {
            let event = event::read().context("Failed to read terminal event")?;
            return Ok(Some(event));
        }
        Ok(None)
    }

    fn detach(&mut self) -> Result<()> {
        if std::mem::take(&mut self.raw) {
            disable_raw_mode().context("Failed to disable raw mode")?;
        }
        Ok(())
    }
}

impl Drop for CrosstermInput {
    fn drop(&mut self) {
        let _ = self.detach();
    }
}

/// Reads `input` until `cancel` fires or the receiver goes away.
///
/// Runs on a blocking thread; returns within one poll interval of
/// cancellation.
pub(crate) fn pump(
    mut input: Box<dyn Input>,
    tx: mpsc::UnboundedSender<Event>,
    cancel: CancellationToken,
) -> Result<()> {
    input.attach()?;
    let result = (|| -> Result<()> {
        while !cancel.is_cancelled() {
            if let Some(event) = input.poll_event(INPUT_POLL)?
                && tx.send(event).is_err()
            {
                break;
            }
        }
        Ok(())
    })();
    let detached = input.detach();
    result.and(detached)
}
