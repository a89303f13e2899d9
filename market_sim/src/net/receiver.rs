//! TCP intake for watcher subscriptions.
use crossbeam_channel::Sender;
use log::{debug, info, warn};
use market_common::command::Command;
use market_common::{MarketError, Result};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::Duration;

/// How long a connected client may take to send its command.
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// TCP intake for subscription commands.
///
/// Each connection carries one JSON `Command`. Accepted subscriptions are forwarded with
/// the UDP address updates must go to: the peer's IP and the port named in the command.
/// A malformed command only drops that connection.
pub struct CommandReceiver {
    socket: TcpListener,
}

impl CommandReceiver {
    /// Bind a new TCP receiver to `bind_addr` (e.g., `0.0.0.0:8080`).
    pub fn new(bind_addr: &str) -> Result<Self> {
        let socket = TcpListener::bind(bind_addr)?;
        Ok(Self { socket })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Blocking accept loop. Returns only when `tx` has no receiver left.
    pub fn receive_loop(self, tx: Sender<(Command, SocketAddr)>) -> Result<()> {
        info!("Subscription TCP server is started on {}", self.socket.local_addr()?);

        for stream in self.socket.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!("TCP connection error: {}", e);
                    continue;
                }
            };
            match Self::read_subscription(stream) {
                Ok((cmd, target)) => {
                    info!("Subscription to '{}' from {}", cmd.topic, target);
                    tx.send((cmd, target))
                        .map_err(|e| MarketError::ChannelSend(e.to_string()))?;
                }
                Err(e) => warn!("Rejected subscription: {}", e),
            }
        }
        Ok(())
    }

    fn read_subscription(stream: TcpStream) -> Result<(Command, SocketAddr)> {
        let peer = stream.peer_addr()?;
        debug!("client_tcp_addr: {:?}", peer);
        stream.set_read_timeout(Some(READ_TIMEOUT))?;

        let cmd = serde_json::Deserializer::from_reader(stream)
            .into_iter::<Command>()
            .next()
            .ok_or_else(|| MarketError::Format(format!("{} closed without a command", peer)))??;
        parse_target(&cmd, peer).map(|target| (cmd, target))
    }
}

/// Validate `cmd` and compute the UDP address of the watcher behind `peer`.
pub fn parse_target(cmd: &Command, peer: SocketAddr) -> Result<SocketAddr> {
    if !cmd.is_subscribe() {
        return Err(MarketError::Format(format!("unsupported command '{}'", cmd.header)));
    }
    if cmd.topic.trim().is_empty() {
        return Err(MarketError::Format(String::from("empty topic")));
    }
    let port: u16 = cmd
        .port
        .trim()
        .parse()
        .map_err(|e| MarketError::Format(format!("Invalid UDP port in command: {}", e)))?;
    Ok(SocketAddr::new(peer.ip(), port))
}
