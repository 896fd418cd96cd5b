//! Log setup for the binary.
//!
//! The overlay owns the terminal while it runs, so logs go to a file:
//! `PBAR_LOG_PATH` if set, else `$PBAR_HOME/logs/pbar.log`. When the file
//! cannot be opened, logs are dropped.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use pbar_core::config::{LogConfig, paths};
use tracing_subscriber::EnvFilter;

fn log_path() -> PathBuf {
    std::env::var_os("PBAR_LOG_PATH")
        .map_or_else(|| paths::logs_dir().join("pbar.log"), PathBuf::from)
}

/// Installs the global subscriber. `RUST_LOG` overrides the configured level.
pub fn init(config: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let path = log_path();
    let file = path
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| OpenOptions::new().create(true).append(true).open(&path));

    match file {
        Ok(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        Err(_) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
}
