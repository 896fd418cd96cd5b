//! Overlay controller.
//!
//! Lifecycle: `Created -> Started -> Running -> Stopping -> Stopped`.
//! `start` launches the render context and, on the main thread only, hooks
//! terminal resizes. `stop` asks the render context to exit, puts the
//! previous resize handler back and joins the render thread; it is safe to
//! call at any point, any number of times, and runs on drop.

#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Result, bail};
use pbar_core::config::Config;
use pbar_core::formatters::default_formatters;
use pbar_core::{Counter, Formatter, StyledText};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::handle::{CounterOptions, OverlayHandle, Shared};
use crate::input::{CrosstermInput, Input};
use crate::iter::CounterIter;
use crate::keys::KeyBindings;
use crate::output::{self, Output};
use crate::render::RenderContext;
#[cfg(unix)]
use crate::signals::{self, ResizeHook};
use crate::theme::Theme;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    Created,
    Started,
    Running,
    Stopping,
    Stopped,
}

/// Timing and input behavior of an overlay.
#[derive(Debug, Clone)]
pub struct OverlayOptions {
    /// Lower bound between two frames.
    pub min_redraw_interval: Duration,
    /// Periodic repaint; `None` repaints on invalidation only.
    pub refresh_interval: Option<Duration>,
    /// Read keys from the terminal when stdin is one.
    pub enable_input: bool,
}

impl Default for OverlayOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for OverlayOptions {
    fn from(config: &Config) -> Self {
        Self {
            min_redraw_interval: config.min_redraw_interval(),
            refresh_interval: config.refresh_interval(),
            enable_input: config.enable_input,
        }
    }
}

enum InputSource {
    Detect,
    Disabled,
    Given(Box<dyn Input>),
}

/// Parts handed to the render context by `start`.
struct Pending {
    config: Config,
    formatters: Vec<Arc<dyn Formatter>>,
    theme: Theme,
    key_bindings: KeyBindings,
    output: Option<Box<dyn Output>>,
    input: InputSource,
    options: OverlayOptions,
}

pub struct OverlayBuilder {
    config: Config,
    title: Option<StyledText>,
    bottom_toolbar: Option<StyledText>,
    formatters: Option<Vec<Arc<dyn Formatter>>>,
    theme: Option<Theme>,
    key_bindings: KeyBindings,
    output: Option<Box<dyn Output>>,
    input: InputSource,
    options: Option<OverlayOptions>,
}

impl OverlayBuilder {
    fn new() -> Self {
        Self {
            config: Config::default(),
            title: None,
            bottom_toolbar: None,
            formatters: None,
            theme: None,
            key_bindings: KeyBindings::new(),
            output: None,
            input: InputSource::Detect,
            options: None,
        }
    }

    /// Takes timing, output, input and theme defaults from `config`.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn title(mut self, title: impl Into<StyledText>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn bottom_toolbar(mut self, toolbar: impl Into<StyledText>) -> Self {
        self.bottom_toolbar = Some(toolbar.into());
        self
    }

    #[must_use]
    pub fn formatters(mut self, formatters: Vec<Arc<dyn Formatter>>) -> Self {
        self.formatters = Some(formatters);
        self
    }

    #[must_use]
    pub fn theme(mut self, theme: Theme) -> Self {
        self.theme = Some(theme);
        self
    }

    /// Extra bindings, layered over the defaults.
    #[must_use]
    pub fn key_bindings(mut self, bindings: KeyBindings) -> Self {
        self.key_bindings.extend(bindings);
        self
    }

    /// Draws to `output` instead of the process default.
    #[must_use]
    pub fn output(mut self, output: Box<dyn Output>) -> Self {
        self.output = Some(output);
        self
    }

    #[must_use]
    pub fn input(mut self, input: Box<dyn Input>) -> Self {
        self.input = InputSource::Given(input);
        self
    }

    #[must_use]
    pub fn no_input(mut self) -> Self {
        self.input = InputSource::Disabled;
        self
    }

    /// Overrides the timing taken from the config.
    #[must_use]
    pub fn options(mut self, options: OverlayOptions) -> Self {
        self.options = Some(options);
        self
    }

    #[must_use]
    pub fn min_redraw_interval(mut self, interval: Duration) -> Self {
        self.options_mut().min_redraw_interval = interval;
        self
    }

    #[must_use]
    pub fn refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.options_mut().refresh_interval = interval;
        self
    }

    fn options_mut(&mut self) -> &mut OverlayOptions {
        let config = &self.config;
        self.options.get_or_insert_with(|| OverlayOptions::from(config))
    }

    /// # Errors
    /// Returns an error if the configured theme is invalid.
    pub fn build(self) -> Result<ProgressOverlay> {
        let theme = match self.theme {
            Some(theme) => theme,
            None => Theme::from_overrides(&self.config.theme)?,
        };
        let mut key_bindings = KeyBindings::defaults();
        key_bindings.extend(self.key_bindings);
        let options = self
            .options
            .unwrap_or_else(|| OverlayOptions::from(&self.config));
        let shared = Arc::new(Shared::new(self.title, self.bottom_toolbar));

        Ok(ProgressOverlay {
            handle: OverlayHandle::new(Arc::clone(&shared)),
            shared,
            state: OverlayState::Created,
            pending: Some(Pending {
                config: self.config,
                formatters: self.formatters.unwrap_or_else(default_formatters),
                theme,
                key_bindings,
                output: self.output,
                input: self.input,
                options,
            }),
            cancel: CancellationToken::new(),
            render: None,
            input_attached: false,
            #[cfg(unix)]
            resize_hook: None,
        })
    }
}

/// Multi-counter progress overlay.
pub struct ProgressOverlay {
    shared: Arc<Shared>,
    handle: OverlayHandle,
    state: OverlayState,
    pending: Option<Pending>,
    cancel: CancellationToken,
    render: Option<JoinHandle<()>>,
    input_attached: bool,
    #[cfg(unix)]
    resize_hook: Option<ResizeHook>,
}

impl ProgressOverlay {
    pub fn builder() -> OverlayBuilder {
        OverlayBuilder::new()
    }

    /// Launches the render context.
    ///
    /// # Errors
    /// Returns an error if the overlay was already started, or if the output
    /// or the render thread cannot be created. A failed start leaves the
    /// overlay stopped.
    pub fn start(&mut self) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            bail!("overlay cannot be started from state {:?}", self.state);
        };
        self.state = OverlayState::Started;
        match self.launch(pending) {
            Ok(()) => {
                self.state = OverlayState::Running;
                debug!("overlay running");
                Ok(())
            }
            Err(e) => {
                if let Err(restore) = self.release_resize_hook() {
                    warn!(
                        error = %format!("{restore:#}"),
                        "resize hook release failed after start error"
                    );
                }
                self.state = OverlayState::Stopped;
                Err(e)
            }
        }
    }

    fn launch(&mut self, pending: Pending) -> Result<()> {
        let output = match pending.output {
            Some(output) => output,
            None => output::default_output(&pending.config)?,
        };
        let input = match pending.input {
            InputSource::Given(input) => Some(input),
            InputSource::Disabled => None,
            InputSource::Detect => pending
                .options
                .enable_input
                .then(CrosstermInput::detect)
                .flatten()
                .map(|input| Box::new(input) as Box<dyn Input>),
        };

        self.input_attached = input.is_some();

        let context = RenderContext {
            shared: Arc::clone(&self.shared),
            output,
            input,
            formatters: pending.formatters,
            theme: pending.theme,
            key_bindings: pending.key_bindings,
            min_redraw_interval: pending.options.min_redraw_interval,
            refresh_interval: pending.options.refresh_interval,
            #[cfg(unix)]
            resize: self.hook_resize(),
            cancel: self.cancel.clone(),
        };
        self.render = Some(context.spawn()?);
        Ok(())
    }

    /// Installs the resize hook when running on the main thread.
    #[cfg(unix)]
    fn hook_resize(&mut self) -> Option<UnixStream> {
        if !signals::on_main_thread() {
            debug!("not on the main thread; resize hook skipped");
            return None;
        }
        match ResizeHook::install() {
            Ok(mut hook) => {
                let reader = hook.take_reader();
                self.resize_hook = Some(hook);
                reader
            }
            Err(e) => {
                warn!(error = %format!("{e:#}"), "resize hook unavailable");
                None
            }
        }
    }

    fn release_resize_hook(&mut self) -> Result<()> {
        #[cfg(unix)]
        {
            if let Some(hook) = self.resize_hook.take() {
                return hook.uninstall();
            }
        }
        Ok(())
    }

    /// Stops the overlay and waits for the render context to exit.
    ///
    /// No frame is drawn after this returns.
    ///
    /// # Errors
    /// Returns an error if the previous resize handler cannot be restored.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            OverlayState::Stopped => return Ok(()),
            OverlayState::Created => {
                self.pending = None;
                self.state = OverlayState::Stopped;
                return Ok(());
            }
            OverlayState::Started | OverlayState::Running | OverlayState::Stopping => {}
        }
        self.state = OverlayState::Stopping;
        self.cancel.cancel();
        let restored = self.release_resize_hook();
        if let Some(render) = self.render.take()
            && render.join().is_err()
        {
            error!("render thread panicked");
        }
        self.state = OverlayState::Stopped;
        debug!(frames = self.frames_drawn(), "overlay stopped");
        restored
    }

    /// Runs `f` with the overlay started, stopping it afterwards even if `f`
    /// panics.
    ///
    /// # Errors
    /// Returns an error if the overlay cannot be started or stopped.
    pub fn scope<R>(mut self, f: impl FnOnce(&OverlayHandle) -> R) -> Result<R> {
        self.start()?;
        let value = f(&self.handle);
        self.stop()?;
        Ok(value)
    }

    pub fn handle(&self) -> OverlayHandle {
        self.handle.clone()
    }

    pub fn new_counter<I>(&self, data: I, options: CounterOptions) -> CounterIter<I::IntoIter>
    where
        I: IntoIterator,
    {
        self.handle.new_counter(data, options)
    }

    pub fn invalidate(&self) {
        self.handle.invalidate();
    }

    pub fn counters(&self) -> Vec<Arc<Counter>> {
        self.handle.counters()
    }

    pub fn set_title(&self, title: Option<StyledText>) {
        self.handle.set_title(title);
    }

    pub fn set_bottom_toolbar(&self, toolbar: Option<StyledText>) {
        self.handle.set_bottom_toolbar(toolbar);
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    /// Frames drawn so far.
    pub fn frames_drawn(&self) -> u64 {
        self.shared.stats.frames()
    }

    /// Whether the render thread is still running.
    pub fn is_render_active(&self) -> bool {
        self.shared.stats.is_active()
    }

    /// Whether key events are read from the terminal: before `start`, whether
    /// the overlay will try to; afterwards, whether an input was attached.
    pub fn reads_keys(&self) -> bool {
        match &self.pending {
            Some(pending) => match pending.input {
                InputSource::Detect => pending.options.enable_input,
                InputSource::Disabled => false,
                InputSource::Given(_) => true,
            },
            None => self.input_attached,
        }
    }

    /// Why the render context stopped early, if it did.
    pub fn render_error(&self) -> Option<String> {
        self.shared.stats.last_error()
    }
}

impl Drop for ProgressOverlay {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            warn!(error = %format!("{e:#}"), "overlay stop failed during drop");
        }
    }
}
