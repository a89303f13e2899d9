//! Command-line arguments for the market simulator.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use std::path::PathBuf;

use clap::Parser;
use market_common::net::{COMMAND_PORT, DATA_PORT, DEFAULT_TOPIC};

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// JSON file with the simulation settings. Built-in defaults otherwise.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// JSON array of `{symbol, name, price}` seeds. A built-in listing otherwise.
    #[clap(long)]
    pub instruments: Option<PathBuf>,

    /// Override the configured seconds between ticks.
    #[clap(long)]
    pub interval: Option<f64>,

    /// Disable the simulation regardless of the configuration file.
    #[clap(long)]
    pub disabled: bool,

    /// Do not start the simulation at launch; wait for a `start` command.
    #[clap(long)]
    pub paused: bool,

    /// Topic price updates are published on.
    #[clap(long, default_value = DEFAULT_TOPIC)]
    pub topic: String,

    /// Interface the network bridge binds to.
    #[clap(long, default_value = "0.0.0.0")]
    pub bind_ip: String,

    /// TCP port accepting watcher subscriptions.
    #[clap(long, default_value_t = COMMAND_PORT)]
    pub command_port: u16,

    /// UDP port updates are sent from and pings are received on.
    #[clap(long, default_value_t = DATA_PORT)]
    pub data_port: u16,

    /// Updates buffered per subscriber before it starts missing cycles.
    #[clap(long, default_value_t = 64)]
    pub subscriber_capacity: usize,

    /// Do not read operator commands from stdin.
    #[clap(long)]
    pub no_console: bool,
}
