//! Keep-alive tracker for remote watchers.
//!
//! Each watcher is identified by the UDP address its updates are sent to. The address is
//! registered when the subscription is accepted and refreshed by every `PING` datagram
//! received from it. `check_timeouts` evicts and returns the watchers that have been
//! silent for longer than the timeout.
//!
//! Time is measured with `Instant`, so wall-clock adjustments do not matter. The monitor
//! is not synchronized; share it behind a `Mutex`.
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Tracks watcher keep-alives and reports the ones that went quiet.
pub struct PingMonitor {
    last_seen: HashMap<SocketAddr, Instant>,
    timeout: Duration,
}

impl PingMonitor {
    /// Monitor evicting watchers silent for more than `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_seen: HashMap::new(),
            timeout,
        }
    }

    /// Start tracking `addr`, or refresh it.
    pub fn register(&mut self, addr: SocketAddr) {
        self.last_seen.insert(addr, Instant::now());
    }

    /// Refresh `addr` if it is tracked. Returns false for unknown senders.
    pub fn update_ping(&mut self, addr: SocketAddr) -> bool {
        match self.last_seen.get_mut(&addr) {
            Some(seen) => {
                *seen = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Evict and return every watcher silent for longer than the timeout.
    pub fn check_timeouts(&mut self) -> Vec<SocketAddr> {
        self.expire_at(Instant::now())
    }

    /// Stop tracking `addr`.
    pub fn forget(&mut self, addr: &SocketAddr) {
        self.last_seen.remove(addr);
    }

    fn expire_at(&mut self, now: Instant) -> Vec<SocketAddr> {
        let timeout = self.timeout;
        let mut timed_out = Vec::new();
        self.last_seen.retain(|addr, seen| {
            if now.duration_since(*seen) > timeout {
                timed_out.push(*addr);
                false
            } else {
                true
            }
        });
        timed_out
    }
}
