//! UDP intake for watcher keep-alives.
use crate::net::ping_monitor::PingMonitor;
use log::{debug, error};
use market_common::net::PING_DATAGRAM;
use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::thread;

/// Lightweight UDP listener that receives `PING` datagrams from watchers
/// and refreshes them in the shared `PingMonitor`.
pub struct UdpPingListener;

impl UdpPingListener {
    /// Spawn a background thread reading datagrams from `socket`.
    pub fn start(socket: Arc<UdpSocket>, ping_monitor: Arc<Mutex<PingMonitor>>) {
        thread::spawn(move || {
            let mut buf = [0u8; 128];
            loop {
                let (size, addr) = match socket.recv_from(&mut buf) {
                    Ok(received) => received,
                    Err(e) => {
                        debug!("UDP receive error: {}", e);
                        continue;
                    }
                };
                if !buf[..size].starts_with(PING_DATAGRAM) {
                    continue;
                }
                match ping_monitor.lock() {
                    Ok(mut monitor) => {
                        if monitor.update_ping(addr) {
                            debug!("Received ping from {}", addr);
                        } else {
                            debug!("Ping from unknown watcher {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Ping monitor unavailable: {}", e);
                        break;
                    }
                }
            }
        });
    }
}
