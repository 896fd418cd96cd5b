//! `pbar demo`: simulated workers, one counter each.

use std::thread;
use std::time::Duration;

use anyhow::Result;
use pbar_core::config::Config;
use pbar_core::{StyledText, interrupt};
use pbar_tui::{CounterOptions, OverlayHandle, ProgressOverlay};
use tracing::info;

#[derive(clap::Args, Debug, Clone)]
pub struct DemoArgs {
    /// Number of concurrent counters
    #[arg(long, default_value_t = 3)]
    counters: usize,

    /// Items per counter
    #[arg(long, default_value_t = 40)]
    items: u64,

    /// Base delay per item in milliseconds
    #[arg(long, default_value_t = 50)]
    delay_ms: u64,

    /// Hide the totals, as for a stream of unknown length
    #[arg(long)]
    unknown_total: bool,

    /// Drop each counter from the display once it finishes
    #[arg(long)]
    remove_when_done: bool,

    /// Overlay title
    #[arg(long, default_value = "pbar demo")]
    title: String,
}

pub fn run(args: &DemoArgs, config: Config) -> Result<()> {
    let overlay = ProgressOverlay::builder()
        .config(config)
        .title(StyledText::styled("title", args.title.clone()))
        .bottom_toolbar(StyledText::plain("[ctrl-l] redraw  [ctrl-c] interrupt"))
        .build()?;

    overlay.scope(|handle| {
        thread::scope(|scope| {
            for index in 0..args.counters {
                let handle = handle.clone();
                scope.spawn(move || work(&handle, index, args));
            }
        });
    })?;

    interrupt::check()?;
    info!(counters = args.counters, items = args.items, "demo finished");
    Ok(())
}

fn work(handle: &OverlayHandle, index: usize, args: &DemoArgs) {
    let mut options = CounterOptions::new(format!("task {}", index + 1));
    if args.remove_when_done {
        options = options.remove_when_done();
    }
    // Staggered pace so counters finish at different times.
    let delay = Duration::from_millis(args.delay_ms * (index as u64 % 3 + 1));

    let items = args.items;
    if args.unknown_total {
        drive((0..).take_while(|n| *n < items), handle, options, delay);
    } else {
        drive(0..items, handle, options, delay);
    }
}

fn drive<I: Iterator>(items: I, handle: &OverlayHandle, options: CounterOptions, delay: Duration) {
    for _ in handle.new_counter(items, options) {
        if interrupt::is_interrupted() {
            break;
        }
        thread::sleep(delay);
    }
}
