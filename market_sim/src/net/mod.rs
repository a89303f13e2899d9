//! Network fan-out of price updates to remote watchers.
//!
//! The bridge wires together four building blocks:
//!
//! - `CommandReceiver` — accepts TCP connections carrying a JSON subscription `Command`
//!   and emits it together with the watcher's UDP `SocketAddr`.
//! - `forward_updates` — one thread per watcher, subscribed to the `BroadcastHub`, that
//!   sends each `PriceUpdate` as a JSON datagram.
//! - `UdpPingListener` — refreshes watchers in the `PingMonitor` on every `PING`.
//! - a timeout checker — evicts silent watchers once per second.
//!
//! Each watcher stream owns a stop channel that is fired by a ping timeout, by a new
//! subscription from the same address, or by the global shutdown. A stream that ends on
//! its own (send error, hub gone) reports back and is deregistered, so a watcher that
//! keeps pinging is never mistaken for one that still receives updates. Errors in one
//! stream are logged and never affect the others.
pub mod ping_monitor;
pub mod receiver;
pub mod stream;
pub mod udp_listener;

use crate::broadcast::BroadcastHub;
use crate::net::ping_monitor::PingMonitor;
use crate::net::receiver::CommandReceiver;
use crate::net::stream::spawn_forwarder;
use crate::net::udp_listener::UdpPingListener;
use crossbeam_channel::{Receiver, Sender, select, unbounded};
use log::{error, info, warn};
use market_common::Result;
use market_common::command::Command;
use market_common::net::{COMMAND_PORT, DATA_PORT, addr};
use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// How often silent watchers are looked for.
const TIMEOUT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Where the bridge listens and how patient it is with silent watchers.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Interface to bind both sockets on.
    pub bind_ip: String,
    /// TCP port for subscriptions.
    pub command_port: u16,
    /// UDP port updates are sent from and pings are received on.
    pub data_port: u16,
    /// Silence after which a watcher is dropped.
    pub ping_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_ip: String::from("0.0.0.0"),
            command_port: COMMAND_PORT,
            data_port: DATA_PORT,
            ping_timeout: Duration::from_secs(5),
        }
    }
}

/// Serve remote watchers until `shutdown_rx` fires or closes.
pub fn run_bridge(hub: Arc<BroadcastHub>, config: BridgeConfig, shutdown_rx: Receiver<()>) -> Result<()> {
    let udp_socket = Arc::new(UdpSocket::bind(addr(&config.bind_ip, config.data_port))?);
    info!("UDP socket created on: {}", udp_socket.local_addr()?);

    let ping_monitor = Arc::new(Mutex::new(PingMonitor::new(config.ping_timeout)));
    UdpPingListener::start(Arc::clone(&udp_socket), Arc::clone(&ping_monitor));

    let (timeout_tx, timeout_rx) = unbounded::<SocketAddr>();
    start_timeout_checker(Arc::clone(&ping_monitor), timeout_tx);

    let (cmd_tx, cmd_rx) = unbounded::<(Command, SocketAddr)>();
    let receiver = CommandReceiver::new(&addr(&config.bind_ip, config.command_port))?;
    thread::spawn(move || {
        if let Err(e) = receiver.receive_loop(cmd_tx) {
            error!("Receiver loop failed: {}", e);
        }
    });

    let (ended_tx, ended_rx) = unbounded::<(SocketAddr, u64)>();
    let mut streams = StreamRegistry::new(Arc::clone(&ping_monitor));
    loop {
        select! {
            recv(cmd_rx) -> msg => {
                let Ok((cmd, target)) = msg else { break };
                let subscription = match hub.subscribe(&cmd.topic) {
                    Ok(subscription) => subscription,
                    Err(e) => {
                        error!("Failed to subscribe {}: {}", target, e);
                        continue;
                    }
                };
                let (stream_id, stop_rx) = streams.open(target);
                spawn_forwarder(
                    Arc::clone(&udp_socket),
                    target,
                    stream_id,
                    subscription,
                    stop_rx,
                    ended_tx.clone(),
                );
                info!("A stream has been created for the watcher on UDP address: {}", target);
            },
            recv(timeout_rx) -> msg => if let Ok(target) = msg {
                if streams.close_silent(target) {
                    info!("Stream for {} closed: ping timeout", target);
                }
            },
            recv(ended_rx) -> msg => if let Ok((target, stream_id)) = msg {
                if streams.close_ended(target, stream_id) {
                    warn!("Stream for {} ended on its own; watcher deregistered", target);
                }
            },
            recv(shutdown_rx) -> _ => break,
        }
    }

    streams.close_all();
    info!("Network bridge stopped");
    Ok(())
}

struct ActiveStream {
    id: u64,
    stop_tx: Sender<()>,
}

/// Watcher streams currently owned by the bridge, keyed by UDP target.
struct StreamRegistry {
    streams: HashMap<SocketAddr, ActiveStream>,
    ping_monitor: Arc<Mutex<PingMonitor>>,
    next_id: u64,
}

impl StreamRegistry {
    fn new(ping_monitor: Arc<Mutex<PingMonitor>>) -> Self {
        Self {
            streams: HashMap::new(),
            ping_monitor,
            next_id: 0,
        }
    }

    /// Register a new stream for `target`, stopping the one it replaces.
    fn open(&mut self, target: SocketAddr) -> (u64, Receiver<()>) {
        self.next_id += 1;
        let (stop_tx, stop_rx) = unbounded::<()>();
        let stream = ActiveStream {
            id: self.next_id,
            stop_tx,
        };
        if let Some(previous) = self.streams.insert(target, stream) {
            let _ = previous.stop_tx.send(());
        }
        match self.ping_monitor.lock() {
            Ok(mut monitor) => monitor.register(target),
            Err(e) => error!("Ping monitor unavailable: {}", e),
        }
        (self.next_id, stop_rx)
    }

    /// Stop the stream of a watcher the ping monitor already evicted.
    fn close_silent(&mut self, target: SocketAddr) -> bool {
        match self.streams.remove(&target) {
            Some(stream) => {
                let _ = stream.stop_tx.send(());
                true
            }
            None => false,
        }
    }

    /// Deregister a stream that ended by itself. Ignored if `target` has since been
    /// given a newer stream.
    fn close_ended(&mut self, target: SocketAddr, stream_id: u64) -> bool {
        if self.streams.get(&target).is_none_or(|stream| stream.id != stream_id) {
            return false;
        }
        self.streams.remove(&target);
        match self.ping_monitor.lock() {
            Ok(mut monitor) => monitor.forget(&target),
            Err(e) => error!("Ping monitor unavailable: {}", e),
        }
        true
    }

    fn close_all(&mut self) {
        for (target, stream) in self.streams.drain() {
            if stream.stop_tx.send(()).is_err() {
                warn!("Stream for {} had already ended", target);
            }
        }
    }
}

fn start_timeout_checker(ping_monitor: Arc<Mutex<PingMonitor>>, timeout_tx: Sender<SocketAddr>) {
    thread::spawn(move || {
        loop {
            thread::sleep(TIMEOUT_CHECK_INTERVAL);
            let timed_out = match ping_monitor.lock() {
                Ok(mut monitor) => monitor.check_timeouts(),
                Err(e) => {
                    error!("Ping monitor unavailable: {}", e);
                    return;
                }
            };
            for target in timed_out {
                if timeout_tx.send(target).is_err() {
                    return;
                }
            }
        }
    });
}
