//! Command-line arguments for the market watcher.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;
use market_common::net::DEFAULT_TOPIC;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Server IP address (IPv4 or IPv6) where the simulator is running.
    #[clap(long)]
    pub server_ip: String,

    /// Local UDP port to bind for receiving price updates.
    #[clap(long, default_value = "0")]
    pub listen_port: String,

    /// Topic to follow.
    #[clap(long, default_value = DEFAULT_TOPIC)]
    pub topic: String,
}
