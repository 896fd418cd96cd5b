//! Render context.
//!
//! Runs on its own thread with a current-thread tokio runtime. The loop
//! waits for one of: shutdown, a key event, or a repaint request. Repaints
//! are rate limited: a request that arrives sooner than the minimum redraw
//! interval after the last frame waits out the rest of the interval, and
//! everything requested meanwhile is drawn by that single frame.
//!
//! Whatever ends the loop (shutdown, an output error, a panic), the context
//! cancels its helpers, waits for them and releases the output before the
//! thread exits, so joining it never hangs.

pub mod layout;
mod refresh;

#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::Event;
use pbar_core::Formatter;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::handle::Shared;
use crate::input::{self, Input};
use crate::keys::{KeyAction, KeyBindings};
use crate::output::Output;
use crate::signals;
use crate::terminal::{guarded, panic_message};
use crate::theme::Theme;

use self::layout::FrameContent;

pub(crate) const THREAD_NAME: &str = "pbar-render";

/// What woke the loop.
enum Wake {
    Shutdown,
    Input(Event),
    Repaint,
}

pub(crate) struct RenderContext {
    pub(crate) shared: Arc<Shared>,
    pub(crate) output: Box<dyn Output>,
    pub(crate) input: Option<Box<dyn Input>>,
    pub(crate) formatters: Vec<Arc<dyn Formatter>>,
    pub(crate) theme: Theme,
    pub(crate) key_bindings: KeyBindings,
    pub(crate) min_redraw_interval: Duration,
    pub(crate) refresh_interval: Option<Duration>,
    #[cfg(unix)]
    pub(crate) resize: Option<UnixStream>,
    pub(crate) cancel: CancellationToken,
}

impl RenderContext {
    /// Starts the render thread.
    pub(crate) fn spawn(self) -> Result<JoinHandle<()>> {
        let shared = Arc::clone(&self.shared);
        shared.stats.set_active(true);
        thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || self.run())
            .inspect_err(|_| shared.stats.set_active(false))
            .context("Failed to spawn render thread")
    }

    fn run(self) {
        let shared = Arc::clone(&self.shared);
        let outcome = guarded(move || -> Result<()> {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to build render runtime")?;
            runtime.block_on(self.serve())
        });

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{e:#}")),
            Err(payload) => Some(format!(
                "render context panicked: {}",
                panic_message(payload.as_ref())
            )),
        };
        if let Some(message) = failure {
            error!(error = %message, "render context stopped");
            shared.stats.record_error(message);
        }
        shared.stats.set_active(false);
        debug!("render context exited");
    }

    async fn serve(mut self) -> Result<()> {
        let cancel = self.cancel.child_token();
        // Also fires when the loop unwinds, so the input worker lets go of
        // the terminal before the runtime waits for it.
        let _teardown = cancel.clone().drop_guard();
        let mut helpers = Vec::new();

        if let Some(period) = self.refresh_interval {
            helpers.push(tokio::spawn(refresh::auto_refresh(
                period,
                Arc::clone(&self.shared.repaint),
                cancel.clone(),
            )));
        }
        #[cfg(unix)]
        {
            if let Some(reader) = self.resize.take() {
                helpers.push(tokio::spawn(refresh::watch_resize(
                    reader,
                    Arc::clone(&self.shared.repaint),
                    cancel.clone(),
                )));
            }
        }

        let (key_tx, mut key_rx) = mpsc::unbounded_channel();
        let pump = self.input.take().map(|source| {
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || input::pump(source, key_tx, cancel))
        });

        let result = self.event_loop(&cancel, &mut key_rx).await;

        cancel.cancel();
        for helper in helpers {
            if let Err(e) = helper.await {
                warn!(error = %e, "render helper task failed");
            }
        }
        if let Some(pump) = pump {
            match pump.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(error = %format!("{e:#}"), "input stopped with error"),
                Err(e) => warn!(error = %e, "input task failed"),
            }
        }
        let finished = self.output.finish();
        result.and(finished)
    }

    async fn event_loop(
        &mut self,
        cancel: &CancellationToken,
        keys: &mut mpsc::UnboundedReceiver<Event>,
    ) -> Result<()> {
        let repaint = Arc::clone(&self.shared.repaint);
        repaint.take();
        let mut last_draw = self.draw()?;

        loop {
            let wake = tokio::select! {
                biased;
                () = cancel.cancelled() => Wake::Shutdown,
                Some(event) = keys.recv() => Wake::Input(event),
                () = repaint.wait() => Wake::Repaint,
            };

            match wake {
                Wake::Shutdown => break,
                Wake::Input(event) => {
                    if let Some(drawn) = self.handle_event(&event)? {
                        last_draw = drawn;
                    }
                }
                Wake::Repaint => {
                    let due = last_draw + self.min_redraw_interval;
                    if Instant::now() < due {
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep_until(due) => {}
                        }
                    }
                    if repaint.take() {
                        last_draw = self.draw()?;
                    }
                }
            }
        }

        // Leave the final state on screen.
        self.draw()?;
        Ok(())
    }

    /// Handles one terminal event; returns the draw time if it drew.
    fn handle_event(&mut self, event: &Event) -> Result<Option<Instant>> {
        match event {
            Event::Key(key) => match self.key_bindings.lookup(key).cloned() {
                Some(KeyAction::Redraw) => {
                    self.output.clear()?;
                    self.shared.repaint.take();
                    return self.draw().map(Some);
                }
                Some(KeyAction::Interrupt) => signals::forward_interrupt(),
                Some(KeyAction::Callback(callback)) => {
                    if let Err(payload) = guarded(|| callback()) {
                        warn!(panic = %panic_message(payload.as_ref()), "key callback panicked");
                    }
                }
                None => {}
            },
            Event::Resize(..) => self.shared.repaint.request(),
            _ => {}
        }
        Ok(None)
    }

    fn draw(&mut self) -> Result<Instant> {
        let counters = self.shared.registry.snapshot();
        let title = self.shared.title();
        let bottom_toolbar = self.shared.bottom_toolbar();
        let content = FrameContent {
            title: title.as_ref(),
            bottom_toolbar: bottom_toolbar.as_ref(),
            counters: &counters,
        };
        let formatters = &self.formatters;
        let theme = &self.theme;
        self.output
            .draw(&mut |frame| layout::render(frame, &content, formatters, theme))?;
        self.shared.stats.record_frame();
        Ok(Instant::now())
    }
}
