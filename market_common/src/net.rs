//! Shared networking constants and helpers used by the simulator and the watch client.

/// TCP port for the subscription channel (client -> server).
pub const COMMAND_PORT: u16 = 8080;
/// UDP port for pings (client -> server).
pub const DATA_PORT: u16 = 8081;
/// Topic every price cycle is published on unless configured otherwise.
pub const DEFAULT_TOPIC: &str = "stock-prices";
/// Payload of a keep-alive datagram.
pub const PING_DATAGRAM: &[u8] = b"PING";

/// Helper to format an IPv4 address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}
