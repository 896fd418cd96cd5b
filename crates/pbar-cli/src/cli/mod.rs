//! CLI entry and dispatch.

use anyhow::{Context, Result};
use clap::Parser;
use pbar_core::config::Config;
use pbar_core::interrupt;

use crate::logging;

mod commands;

#[derive(Parser)]
#[command(name = "pbar")]
#[command(version)]
#[command(about = "Live multi-counter progress overlay for the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run simulated workers under the overlay
    Demo(commands::demo::DemoArgs),

    /// Count lines read from stdin while showing progress
    Count {
        /// Counter label
        #[arg(long, default_value = "lines")]
        label: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(clap::Subcommand)]
enum ConfigCommands {
    /// Show the path to the config file
    Path,
    /// Initialize a default config file (if not present)
    Init,
}

/// Loads config and sets up logging and Ctrl+C handling for overlay commands.
fn prepare() -> Result<Config> {
    let config = Config::load().context("load config")?;
    logging::init(&config.log);
    interrupt::init()?;
    Ok(config)
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Demo(args) => commands::demo::run(&args, prepare()?),
        Commands::Count { label } => commands::count::run(&label, prepare()?),
        Commands::Config { command } => match command {
            ConfigCommands::Path => {
                commands::config::path();
                Ok(())
            }
            ConfigCommands::Init => commands::config::init(),
        },
    }
}
