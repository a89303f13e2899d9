//! Subscription command sent by a watch client to the simulator.
//!
//! A client opens a TCP connection to the command port and writes one JSON-encoded
//! `Command`. The server answers by streaming every `PriceUpdate` published on the
//! requested topic to the client's UDP port. Keep-alive pings are plain
//! `PING` datagrams, see [`crate::net::PING_DATAGRAM`].
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

/// Header value for subscription commands.
pub const SUBSCRIBE: &str = "SUBSCRIBE";
/// Transport kind (currently UDP).
pub const CONNECTION: &str = "udp";

/// Command payload sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Command kind. Only `SUBSCRIBE` is understood.
    pub header: String,
    /// Transport protocol name (e.g., `udp`).
    pub connection: String,
    /// Client-reported IP address. The server uses the peer address it observes.
    pub address: String,
    /// UDP port the client listens on, as a string.
    pub port: String,
    /// Broadcast topic to follow.
    pub topic: String,
}

impl Command {
    /// Creates a new subscription command.
    pub fn new(address: &str, port: &str, topic: &str) -> Self {
        Command {
            header: String::from(SUBSCRIBE),
            connection: String::from(CONNECTION),
            address: String::from(address),
            port: String::from(port),
            topic: String::from(topic),
        }
    }

    /// Whether this is a subscription request.
    pub fn is_subscribe(&self) -> bool {
        self.header.eq_ignore_ascii_case(SUBSCRIBE)
    }

    /// Build the client's UDP socket address from the fields.
    pub fn get_udp_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.address, self.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_command_survives_json() {
        let cmd = Command::new("127.0.0.1", "55555", "stock-prices");
        let bytes = serde_json::to_vec(&cmd).unwrap();
        let decoded: Command = serde_json::from_slice(&bytes).unwrap();

        assert!(decoded.is_subscribe());
        assert_eq!(decoded.topic, "stock-prices");
        assert_eq!(
            decoded.get_udp_addr().unwrap(),
            "127.0.0.1:55555".parse().unwrap()
        );
    }

    #[test]
    fn unknown_header_is_not_a_subscription() {
        let mut cmd = Command::new("127.0.0.1", "1", "t");
        cmd.header = "UNSUBSCRIBE".into();
        assert!(!cmd.is_subscribe());
    }
}
