//! Outbound packet queue
//!
//! Sessions never touch a socket directly. Every datagram a session wants
//! on the wire is handed to a [`PacketSink`] injected at session
//! construction; the daemon drains the production sink onto its UDP
//! socket. This keeps the negotiation state machine synchronous and lets
//! tests capture traffic without any network setup.
//!
//! # Example
//!
//! ```
//! use ikesa::queue::{MemorySink, OutboundPacket, PacketSink};
//!
//! let sink = MemorySink::new();
//! sink.add(OutboundPacket {
//!     peer: "10.0.0.1:500".parse().unwrap(),
//!     data: vec![0x01, 0x02],
//! });
//! assert_eq!(sink.drain().len(), 1);
//! ```

use std::net::SocketAddr;
use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::warn;

/// A datagram queued for transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundPacket {
    /// Destination address
    pub peer: SocketAddr,

    /// Raw IKE message bytes
    pub data: Vec<u8>,
}

impl OutboundPacket {
    /// Create an outbound packet
    pub fn new(peer: SocketAddr, data: Vec<u8>) -> Self {
        Self { peer, data }
    }
}

/// Destination for outbound IKE messages
///
/// Append-only and fire-and-forget: `add` never blocks and never fails
/// from the caller's point of view. Delivery is the owner's concern.
pub trait PacketSink: Send + Sync {
    /// Queue a packet for transmission
    fn add(&self, packet: OutboundPacket);
}

/// Production sink backed by a tokio unbounded channel
///
/// The daemon holds the receiving half and forwards each packet to its
/// UDP socket. A send after the receiver is gone is logged and dropped;
/// the daemon is shutting down at that point anyway.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OutboundPacket>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OutboundPacket>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PacketSink for ChannelSink {
    fn add(&self, packet: OutboundPacket) {
        if self.tx.send(packet).is_err() {
            warn!("outbound queue receiver dropped, discarding packet");
        }
    }
}

/// Collecting sink for tests and in-memory handshakes
///
/// Stores every packet; `drain` hands them back in insertion order.
#[derive(Debug, Default)]
pub struct MemorySink {
    packets: Mutex<Vec<OutboundPacket>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all queued packets, oldest first
    pub fn drain(&self) -> Vec<OutboundPacket> {
        match self.packets.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => Vec::new(),
        }
    }

    /// Number of packets currently queued
    pub fn len(&self) -> usize {
        self.packets.lock().map(|g| g.len()).unwrap_or(0)
    }

    /// Whether the sink is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PacketSink for MemorySink {
    fn add(&self, packet: OutboundPacket) {
        if let Ok(mut guard) = self.packets.lock() {
            guard.push(packet);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "192.0.2.1:500".parse().expect("valid address")
    }

    #[test]
    fn test_memory_sink_collects_in_order() {
        let sink = MemorySink::new();
        sink.add(OutboundPacket::new(addr(), vec![1]));
        sink.add(OutboundPacket::new(addr(), vec![2]));

        assert_eq!(sink.len(), 2);
        let packets = sink.drain();
        assert_eq!(packets[0].data, vec![1]);
        assert_eq!(packets[1].data, vec![2]);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_memory_sink_drain_resets() {
        let sink = MemorySink::new();
        sink.add(OutboundPacket::new(addr(), vec![1, 2, 3]));

        assert_eq!(sink.drain().len(), 1);
        assert_eq!(sink.drain().len(), 0);
    }

    #[tokio::test]
    async fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new();
        sink.add(OutboundPacket::new(addr(), vec![0xAA, 0xBB]));

        let packet = rx.recv().await.expect("packet queued");
        assert_eq!(packet.peer, addr());
        assert_eq!(packet.data, vec![0xAA, 0xBB]);
    }

    #[test]
    fn test_channel_sink_survives_dropped_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);

        // Must not panic.
        sink.add(OutboundPacket::new(addr(), vec![1]));
    }

    #[test]
    fn test_sink_as_trait_object() {
        use std::sync::Arc;

        let sink = Arc::new(MemorySink::new());
        let dynamic: Arc<dyn PacketSink> = sink.clone();
        dynamic.add(OutboundPacket::new(addr(), vec![7]));

        assert_eq!(sink.len(), 1);
    }
}
