//! Market Watch — a client that subscribes to the simulator's price updates and logs
//! every cycle it receives. It sends a `SUBSCRIBE` command over TCP naming the topic and
//! its UDP port, keeps the subscription alive with periodic `PING`s, and listens for
//! JSON-encoded `PriceUpdate` datagrams.
//!
//! Usage example (CLI):
//! ```bash
//! market_watch --server-ip 127.0.0.1 --listen-port 55555 --topic stock-prices
//! ```
#![warn(missing_docs)]
mod args;
mod sender;

use crate::args::Args;
use crate::sender::CommandSender;
use clap::Parser;
use log::{debug, error, info};
use market_common::command::Command;
use market_common::net::{COMMAND_PORT, DATA_PORT, addr};
use market_common::{MarketError, PriceUpdate, Result};
use std::io::ErrorKind;
use std::net::{TcpStream, UdpSocket};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

/// Largest datagram the simulator may send.
const MAX_DATAGRAM: usize = 65_507;

/// Runs a blocking loop that receives `PriceUpdate` messages from `socket` and logs them.
fn start_receiver_loop(socket: Arc<UdpSocket>, shutdown: Arc<AtomicBool>) -> Result<()> {
    info!("Price receiver running on: {}", socket.local_addr()?);
    let mut buf = vec![0u8; MAX_DATAGRAM];

    while !shutdown.load(Ordering::Relaxed) {
        match socket.recv(&mut buf) {
            Ok(size) => match serde_json::from_slice::<PriceUpdate>(&buf[..size]) {
                Ok(update) => log_update(&update),
                Err(_) => {
                    debug!("Received non-JSON message: {}", String::from_utf8_lossy(&buf[..size]));
                }
            },
            Err(e) => {
                if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut {
                    continue;
                }
                error!("Receive data error: {}", e);
                return Err(MarketError::Io(e));
            }
        }
    }
    info!("Receiver loop stopping...");
    Ok(())
}

fn log_update(update: &PriceUpdate) {
    info!("CYCLE {} ({} instruments)", update.cycle, update.instruments.len());
    for snapshot in &update.instruments {
        let change = snapshot
            .change_percent()
            .map(|pct| format!("{:+.2}%", pct))
            .unwrap_or_else(|| String::from("n/a"));
        info!(
            "  {:<6} {:>10} -> {:>10} ({})",
            snapshot.symbol, snapshot.previous_price, snapshot.current_price, change
        );
    }
}

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            info!("Ctrl+C received. Shutting down watcher...");
            shutdown.store(true, Ordering::SeqCst);
        })
        .map_err(|e| MarketError::Format(format!("Error setting Ctrl+C handler: {}", e)))?;
    }

    let server_ip = args.server_ip.trim().replace('"', "");
    let listen_port = args.listen_port.trim().replace('"', "");
    let server_command_address = addr(&server_ip, COMMAND_PORT);
    let server_udp_address = addr(&server_ip, DATA_PORT);

    let socket = Arc::new(UdpSocket::bind(format!("0.0.0.0:{}", listen_port))?);
    socket.set_read_timeout(Some(Duration::from_secs(5)))?;
    let local_addr = socket.local_addr()?;
    info!("UDP watcher listening on: {}", local_addr);

    info!("Connecting to TCP server at {}", server_command_address);
    let mut tcp_stream = TcpStream::connect(&server_command_address)
        .map_err(|e| MarketError::Format(format!("Failed to connect to server: {}", e)))?;
    let command = Command::new(
        &local_addr.ip().to_string(),
        &local_addr.port().to_string(),
        &args.topic,
    );
    CommandSender::send_command(&mut tcp_stream, &command)?;
    info!("Subscribed to '{}' on {}", args.topic, server_command_address);

    CommandSender::start_ping_thread(socket.clone(), server_udp_address, shutdown.clone());

    info!("Watcher is running. Press Ctrl+C to exit.");
    start_receiver_loop(socket, shutdown)
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
