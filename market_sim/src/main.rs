//! Live market price simulator.
//!
//! This binary reprices a set of instruments on a fixed interval and fans every cycle out
//! to subscribers. It wires together:
//!
//! - `SimulationController` — the start/stop/restart state machine owning the schedule.
//! - `BroadcastHub` — in-process topic fan-out each cycle is published to.
//! - the network bridge — accepts TCP subscriptions and streams updates to watchers
//!   over UDP (see `market_watch`).
//! - the operator console — `start`, `stop`, `restart`, `status`, `prices`, `quit` on stdin.
//!
//! Configuration errors abort startup. Ctrl+C or `quit` stops the schedule, waits for
//! in-flight cycles and exits.
#![warn(missing_docs)]
mod args;

use crate::args::Args;
use chrono::Utc;
use clap::Parser;
use crossbeam_channel::{Sender, unbounded};
use log::{error, info, warn};
use market_common::{MarketError, Result, SimulationConfig};
use market_sim::console::run_console;
use market_sim::net::{BridgeConfig, run_bridge};
use market_sim::store::{InMemoryInstrumentStore, load_seeds};
use market_sim::{BroadcastHub, SimulationController, StartOutcome};
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> Result<(), MarketError> {
    init_logger();
    let args = Args::parse();

    let config = load_config(&args)?;
    let store = match &args.instruments {
        Some(path) => InMemoryInstrumentStore::from_seeds(load_seeds(path)?, Utc::now()),
        None => InMemoryInstrumentStore::with_default_listing(Utc::now()),
    };
    info!("{} instruments listed", store.len()?);

    let hub = Arc::new(BroadcastHub::new(args.subscriber_capacity));
    let controller = SimulationController::builder(config, Arc::new(store), hub.clone())
        .topic(&args.topic)
        .build()?;

    let (quit_tx, quit_rx) = unbounded::<()>();
    {
        let quit_tx = quit_tx.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down simulator...");
            let _ = quit_tx.send(());
        })
        .map_err(|e| MarketError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;
    }

    let (bridge_stop_tx, bridge_stop_rx) = unbounded::<()>();
    let bridge_config = BridgeConfig {
        bind_ip: args.bind_ip.clone(),
        command_port: args.command_port,
        data_port: args.data_port,
        ping_timeout: Duration::from_secs(5),
    };
    let bridge = thread::spawn(move || {
        if let Err(e) = run_bridge(hub, bridge_config, bridge_stop_rx) {
            error!("Network bridge failed: {}", e);
        }
    });

    if args.paused {
        info!("Started paused; type `start` to begin");
    } else {
        match controller.start() {
            Ok(StartOutcome::Started) => {}
            Ok(outcome) => warn!("Simulation not started: {}", outcome),
            Err(e) => error!("Simulation not started: {}", e),
        }
    }

    if !args.no_console {
        spawn_console(controller.clone(), quit_tx);
    }

    let _ = quit_rx.recv();
    drop(bridge_stop_tx);
    if let Err(e) = controller.shutdown() {
        error!("Shutdown incomplete: {}", e);
    }
    if bridge.join().is_err() {
        warn!("Network bridge thread panicked");
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<SimulationConfig> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_path(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(interval) = args.interval {
        config.interval_seconds = interval;
    }
    if args.disabled {
        config.enabled = false;
    }
    config.validate()?;
    Ok(config)
}

fn spawn_console(controller: SimulationController, quit_tx: Sender<()>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        match run_console(&controller, stdin.lock(), io::stdout()) {
            Ok(true) => {
                let _ = quit_tx.send(());
            }
            Ok(false) => info!("Console input closed; running until Ctrl+C"),
            Err(e) => error!("Console failed: {}", e),
        }
    });
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
