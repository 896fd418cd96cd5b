//! `pbar count`: counts stdin lines under the overlay.

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use pbar_core::config::Config;
use pbar_core::{StyledText, interrupt};
use pbar_tui::{CounterOptions, ProgressOverlay};

pub fn run(label: &str, config: Config) -> Result<()> {
    let overlay = overlay(config)?;

    let count = overlay.scope(|handle| -> Result<u64> {
        let mut count = 0;
        for line in handle.new_counter(io::stdin().lock().lines(), CounterOptions::new(label)) {
            line.context("read stdin")?;
            count += 1;
            interrupt::check()?;
        }
        Ok(count)
    })??;

    println!("{count} {label}");
    Ok(())
}

/// Stdin carries the data, so the overlay must not read keys from it.
fn overlay(config: Config) -> Result<ProgressOverlay> {
    ProgressOverlay::builder()
        .config(config)
        .title(StyledText::styled("title", "Reading stdin"))
        .no_input()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_leaves_stdin_to_the_data() {
        let config = Config {
            enable_input: true,
            ..Config::default()
        };
        let overlay = overlay(config).unwrap();
        assert!(!overlay.reads_keys());
    }
}
