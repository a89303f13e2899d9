//! Sending the subscription and keep-alives to the simulator.
//!
//! This module provides a small helper for encoding and sending the `Command`
//! and for running a background PING loop to keep the subscription alive.
use log::{debug, error, info};
use market_common::command::Command;
use market_common::net::PING_DATAGRAM;
use market_common::{MarketError, Result};
use std::io::{ErrorKind, Write};
use std::net::{Shutdown, TcpStream, UdpSocket};
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

/// PING interval in milliseconds used by the background thread.
const INTERVAL_MS: u64 = 2000;

/// Helper type for talking to the simulator.
pub struct CommandSender;

impl CommandSender {
    /// Write `command` as JSON and close our side of the connection.
    pub fn send_command(stream: &mut TcpStream, command: &Command) -> Result<()> {
        let payload = serde_json::to_vec(command)?;
        info!(
            "Sending command: {} udp://{}:{} topic={}",
            command.header, command.address, command.port, command.topic
        );
        stream.write_all(&payload)?;
        stream.flush()?;
        stream
            .shutdown(Shutdown::Write)
            .map_err(|e| MarketError::Format(format!("Failed to close command stream: {}", e)))?;
        Ok(())
    }

    /// Send a `PING` from `socket` to `target_addr` every few seconds until `shutdown`.
    pub fn start_ping_thread(socket: Arc<UdpSocket>, target_addr: String, shutdown: Arc<AtomicBool>) {
        info!("Ping thread started. Target: {}", target_addr);
        thread::spawn(move || {
            let interval = Duration::from_millis(INTERVAL_MS);
            while !shutdown.load(Ordering::Relaxed) {
                match socket.send_to(PING_DATAGRAM, &target_addr) {
                    Ok(_) => debug!("PING sent to {}", target_addr),
                    Err(ref e) if e.kind() == ErrorKind::ConnectionReset => {}
                    Err(e) => error!("Failed to send PING: {}", e),
                }
                thread::sleep(interval);
            }
            info!("Ping thread stopping...");
        });
    }
}
