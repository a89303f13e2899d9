//! Per-watcher forwarding of price updates.
use crossbeam_channel::{Receiver, Sender, select};
use log::{debug, error};
use market_common::Result;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::broadcast::Subscription;

/// Stream task for a single remote watcher.
///
/// Forwards every update arriving on `subscription` to `target` as one JSON datagram.
/// The task ends when `stop_rx` fires or closes, when the hub side of the subscription
/// goes away, or on the first send error (returned to the caller).
pub fn forward_updates(
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    subscription: Subscription,
    stop_rx: Receiver<()>,
) -> Result<()> {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(subscription.receiver()) -> msg => match msg {
                Ok(update) => {
                    let data = update.to_json_bytes()?;
                    socket.send_to(&data, target)?;
                }
                Err(_) => break,
            },
        }
    }
    debug!("Stream to {} ({}) closed", target, subscription.topic());
    Ok(())
}

/// Run [`forward_updates`] on its own thread and report `(target, stream_id)` on
/// `ended_tx` once it returns, whatever the reason.
pub fn spawn_forwarder(
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    stream_id: u64,
    subscription: Subscription,
    stop_rx: Receiver<()>,
    ended_tx: Sender<(SocketAddr, u64)>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        if let Err(e) = forward_updates(socket, target, subscription, stop_rx) {
            error!("Stream to {} failed: {}", target, e);
        }
        let _ = ended_tx.send((target, stream_id));
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::{BroadcastHub, Publisher};
    use crossbeam_channel::unbounded;
    use market_common::PriceUpdate;
    use std::time::Duration;

    #[test]
    fn updates_arrive_as_json_datagrams() {
        let hub = BroadcastHub::default();
        let watcher = UdpSocket::bind("127.0.0.1:0").unwrap();
        watcher.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
        let target = watcher.local_addr().unwrap();
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        let subscription = hub.subscribe("prices").unwrap();
        let (stop_tx, stop_rx) = unbounded();
        let task = std::thread::spawn(move || forward_updates(socket, target, subscription, stop_rx));

        hub.publish(
            "prices",
            Arc::new(PriceUpdate {
                cycle: 42,
                instruments: Vec::new(),
            }),
        )
        .unwrap();

        let mut buf = [0u8; 1024];
        let size = watcher.recv(&mut buf).unwrap();
        let update: PriceUpdate = serde_json::from_slice(&buf[..size]).unwrap();
        assert_eq!(update.cycle, 42);

        stop_tx.send(()).unwrap();
        assert!(task.join().unwrap().is_ok());
    }

    #[test]
    fn failed_send_reports_the_stream_as_ended() {
        let hub = BroadcastHub::default();
        let socket = Arc::new(UdpSocket::bind("127.0.0.1:0").unwrap());
        // An IPv6 destination cannot be reached from an IPv4 socket.
        let target: SocketAddr = "[::1]:9".parse().unwrap();
        let subscription = hub.subscribe("prices").unwrap();
        let (_stop_tx, stop_rx) = unbounded();
        let (ended_tx, ended_rx) = unbounded();
        let task = spawn_forwarder(socket, target, 7, subscription, stop_rx, ended_tx);

        hub.publish(
            "prices",
            Arc::new(PriceUpdate {
                cycle: 1,
                instruments: Vec::new(),
            }),
        )
        .unwrap();

        assert_eq!(ended_rx.recv_timeout(Duration::from_secs(5)), Ok((target, 7)));
        task.join().unwrap();
        let next = Arc::new(PriceUpdate {
            cycle: 2,
            instruments: Vec::new(),
        });
        assert_eq!(hub.publish("prices", next).unwrap().pruned, 1);
    }
}
