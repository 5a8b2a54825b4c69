//! UDP daemon driving IKE SA sessions
//!
//! [`IkeDaemon`] owns the socket and a session table keyed by peer
//! address. Inbound datagrams are routed to their session (a fresh
//! responder session is created for an unknown peer's IKE_SA_INIT
//! request); outbound packets flow from the sessions through a
//! [`ChannelSink`] back to the socket. Sessions never touch the socket
//! themselves.
//!
//! Any processing error is fatal for the affected SA: the session is
//! logged, counted and dropped. The daemon itself keeps running.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::sync::Notify;

use crate::config::IkeConfig;
use crate::constants::{ExchangeType, MAX_IKE_MESSAGE_SIZE};
use crate::error::{Error, Result};
use crate::logging;
use crate::message::Message;
use crate::metrics::IkeMetrics;
use crate::queue::{ChannelSink, OutboundPacket};
use crate::sa::{IkeSa, ProcessOutcome, StateKind};

/// IKE daemon: one UDP socket, many sessions.
///
/// # Example
///
/// ```rust,ignore
/// use ikesa::{config::IkeConfig, daemon::IkeDaemon};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = IkeConfig::builder()
///         .with_local_fqdn("gw.example.net")
///         .with_psk(b"pre-shared-key".to_vec())
///         .build()?;
///
///     let mut daemon = IkeDaemon::bind(config, "0.0.0.0:500".parse()?).await?;
///     daemon.initiate("203.0.113.7:500".parse()?)?;
///     daemon.run().await?;
///     Ok(())
/// }
/// ```
pub struct IkeDaemon {
    /// Shared session configuration
    config: Arc<IkeConfig>,

    /// Active sessions indexed by peer address
    sessions: HashMap<SocketAddr, IkeSa>,

    /// UDP socket for IKE traffic
    socket: UdpSocket,

    /// Local bind address
    local_addr: SocketAddr,

    /// Sink handed to every session
    sink: Arc<ChannelSink>,

    /// Receiving end of the outbound packet queue
    outbound_rx: mpsc::UnboundedReceiver<OutboundPacket>,

    /// Signal that stops [`IkeDaemon::run`]
    shutdown: Arc<Notify>,

    /// Daemon-wide counters
    metrics: IkeMetrics,
}

impl IkeDaemon {
    /// Bind the daemon to the given address
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the address
    /// cannot be bound.
    pub async fn bind(config: IkeConfig, addr: SocketAddr) -> Result<Self> {
        config.validate()?;

        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| Error::Io(e.to_string()))?;
        let local_addr = socket.local_addr().map_err(|e| Error::Io(e.to_string()))?;

        let (sink, outbound_rx) = ChannelSink::new();

        Ok(Self {
            config: Arc::new(config),
            sessions: HashMap::new(),
            socket,
            local_addr,
            sink: Arc::new(sink),
            outbound_rx,
            shutdown: Arc::new(Notify::new()),
            metrics: IkeMetrics::new(),
        })
    }

    /// The local address the daemon is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of sessions in the table
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// State of the session with `peer`, if one exists
    pub fn session_state(&self, peer: &SocketAddr) -> Option<StateKind> {
        self.sessions.get(peer).map(|sa| sa.state())
    }

    /// A handle to the daemon's counters
    pub fn metrics(&self) -> IkeMetrics {
        self.metrics.clone()
    }

    /// A handle that stops [`IkeDaemon::run`] when notified
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Open a session to `peer` and send its IKE_SA_INIT request
    ///
    /// # Errors
    ///
    /// Fails if a session with this peer already exists or building the
    /// first request fails; no session is kept in either case.
    pub fn initiate(&mut self, peer: SocketAddr) -> Result<()> {
        if self.sessions.contains_key(&peer) {
            return Err(Error::ProtocolMismatch(format!(
                "a session with {} already exists",
                peer
            )));
        }

        let mut session = IkeSa::new_initiator(self.config.clone(), peer, self.sink.clone());
        session.initiate()?;
        self.sessions.insert(peer, session);
        self.metrics.record_session_created();
        Ok(())
    }

    /// Serve until the shutdown handle is notified.
    ///
    /// Multiplexes inbound datagrams and the sessions' outbound queue
    /// over the socket. Queued packets still pending at shutdown are
    /// flushed before returning.
    pub async fn run(&mut self) -> Result<()> {
        let mut recv_buffer = vec![0u8; MAX_IKE_MESSAGE_SIZE + 1];
        let shutdown = self.shutdown.clone();

        tracing::info!(local_addr = %self.local_addr, "daemon serving");

        loop {
            tokio::select! {
                _ = shutdown.notified() => break,

                maybe_packet = self.outbound_rx.recv() => {
                    match maybe_packet {
                        Some(packet) => self.send_packet(packet).await,
                        // All sink handles dropped; cannot happen while
                        // the daemon holds one
                        None => break,
                    }
                }

                result = self.socket.recv_from(&mut recv_buffer) => {
                    match result {
                        Ok((len, peer)) => {
                            let data = recv_buffer[..len].to_vec();
                            self.handle_datagram(&data, peer);
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "socket receive failed");
                        }
                    }
                }
            }
        }

        // Flush what the sessions queued before the shutdown signal
        while let Ok(packet) = self.outbound_rx.try_recv() {
            self.send_packet(packet).await;
        }

        for (peer, _) in self.sessions.drain() {
            logging::log_session_removed(&peer.to_string(), "daemon shutdown");
            self.metrics.record_session_removed();
        }

        tracing::info!(local_addr = %self.local_addr, "daemon stopped");
        Ok(())
    }

    /// Route one datagram to its session, creating a responder session
    /// for an unknown peer's IKE_SA_INIT request.
    fn handle_datagram(&mut self, data: &[u8], peer: SocketAddr) {
        self.metrics.record_message_received(data.len());

        let message = match Message::from_datagram(data) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(%peer, error = %err, "dropping malformed datagram");
                return;
            }
        };

        if !self.sessions.contains_key(&peer) {
            // Only a fresh IKE_SA_INIT request may open a session
            let opens_session = message.header.exchange_type == ExchangeType::IkeSaInit
                && message.header.flags.is_request()
                && message.header.responder_spi == [0u8; 8];
            if !opens_session {
                tracing::warn!(%peer, "dropping message for unknown session");
                return;
            }

            let session = IkeSa::new_responder(self.config.clone(), peer, self.sink.clone());
            self.sessions.insert(peer, session);
            self.metrics.record_session_created();
        }

        let session = match self.sessions.get_mut(&peer) {
            Some(session) => session,
            None => return,
        };

        let before = session.state();
        match session.process_message(message) {
            Ok(ProcessOutcome::Retransmission) => {
                self.metrics.record_retransmission();
            }
            Ok(ProcessOutcome::Dispatched) => {
                if session.state().is_established() && !before.is_established() {
                    self.metrics.record_handshake_completed();
                }
            }
            Err(err) => {
                logging::log_handshake_failed(&peer.to_string(), &err.to_string());
                match &err {
                    Error::AuthenticationFailed(_) => self.metrics.record_authentication_failed(),
                    Error::NegotiationFailed(_) => self.metrics.record_negotiation_failed(),
                    _ => {}
                }
                if !before.is_established() {
                    self.metrics.record_handshake_failed();
                }

                // Any error is fatal for the SA
                self.sessions.remove(&peer);
                self.metrics.record_session_removed();
                logging::log_session_removed(&peer.to_string(), "handshake failure");
            }
        }
    }

    async fn send_packet(&self, packet: OutboundPacket) {
        match self.socket.send_to(&packet.data, packet.peer).await {
            Ok(sent) => self.metrics.record_message_sent(sent),
            Err(err) => {
                tracing::warn!(peer = %packet.peer, error = %err, "failed to send packet");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::constants::{IkeFlags, PayloadType};
    use crate::message::IkeHeader;

    fn test_config(name: &str) -> IkeConfig {
        IkeConfig::builder()
            .with_local_fqdn(name)
            .with_psk(&b"daemon-test-psk"[..])
            .build()
            .unwrap()
    }

    async fn test_daemon(name: &str) -> IkeDaemon {
        IkeDaemon::bind(test_config(name), "127.0.0.1:0".parse().unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_daemon_bind() {
        let daemon = test_daemon("gw.test").await;
        assert!(daemon.local_addr().port() > 0);
        assert_eq!(daemon.session_count(), 0);
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let mut config = test_config("gw.test");
        config.psk = Chunk::empty();

        let result = IkeDaemon::bind(config, "127.0.0.1:0".parse().unwrap()).await;
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_initiate_queues_init_request() {
        let mut daemon = test_daemon("gw.test").await;
        let peer: SocketAddr = "127.0.0.1:4500".parse().unwrap();

        daemon.initiate(peer).unwrap();
        assert_eq!(daemon.session_count(), 1);
        assert_eq!(daemon.session_state(&peer), Some(StateKind::InitRequested));
        assert_eq!(daemon.metrics().snapshot().sessions_created, 1);

        let packet = daemon.outbound_rx.try_recv().unwrap();
        assert_eq!(packet.peer, peer);
        let message = Message::from_datagram(&packet.data).unwrap();
        assert_eq!(message.header.exchange_type, ExchangeType::IkeSaInit);

        // A second session to the same peer is refused
        assert!(daemon.initiate(peer).is_err());
        assert_eq!(daemon.session_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_peer_non_init_dropped() {
        let mut daemon = test_daemon("gw.test").await;
        let peer: SocketAddr = "127.0.0.1:4501".parse().unwrap();

        let mut stray = Message::new(IkeHeader::new(
            [0x17; 8],
            [0x18; 8],
            PayloadType::None,
            ExchangeType::IkeAuth,
            IkeFlags::request(true),
            1,
            0,
        ));
        let data = stray.generate(None, None).unwrap();

        daemon.handle_datagram(&data, peer);
        assert_eq!(daemon.session_count(), 0);
        assert!(daemon.outbound_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_malformed_datagram_dropped() {
        let mut daemon = test_daemon("gw.test").await;
        let peer: SocketAddr = "127.0.0.1:4502".parse().unwrap();

        daemon.handle_datagram(&[0x00, 0x01, 0x02], peer);
        assert_eq!(daemon.session_count(), 0);
        assert_eq!(daemon.metrics().snapshot().messages_received, 1);
    }

    #[tokio::test]
    async fn test_daemons_establish_via_queues() {
        let mut left = test_daemon("left.test").await;
        let mut right = test_daemon("right.test").await;
        let left_addr = left.local_addr();
        let right_addr = right.local_addr();

        left.initiate(right_addr).unwrap();

        // Shuttle packets by hand instead of running the socket loops
        for _ in 0..4 {
            while let Ok(packet) = left.outbound_rx.try_recv() {
                right.handle_datagram(&packet.data, left_addr);
            }
            while let Ok(packet) = right.outbound_rx.try_recv() {
                left.handle_datagram(&packet.data, right_addr);
            }
        }

        assert_eq!(
            left.session_state(&right_addr),
            Some(StateKind::Established)
        );
        assert_eq!(
            right.session_state(&left_addr),
            Some(StateKind::AuthResponded)
        );
        assert_eq!(left.metrics().snapshot().handshakes_completed, 1);
        assert_eq!(right.metrics().snapshot().handshakes_completed, 1);
    }

    #[tokio::test]
    async fn test_duplicate_request_counts_as_retransmission() {
        let mut left = test_daemon("left.test").await;
        let mut right = test_daemon("right.test").await;
        let left_addr = left.local_addr();
        let right_addr = right.local_addr();

        left.initiate(right_addr).unwrap();
        let init_request = left.outbound_rx.try_recv().unwrap().data;

        right.handle_datagram(&init_request, left_addr);
        let first = right.outbound_rx.try_recv().unwrap().data;
        assert_eq!(right.metrics().snapshot().retransmissions, 0);

        // The same request again, as after a lost response
        right.handle_datagram(&init_request, left_addr);
        let second = right.outbound_rx.try_recv().unwrap().data;

        assert_eq!(first, second);
        assert_eq!(
            right.session_state(&left_addr),
            Some(StateKind::InitResponded)
        );
        assert_eq!(right.metrics().snapshot().retransmissions, 1);
    }

    #[tokio::test]
    async fn test_failed_session_is_torn_down() {
        let mut left = test_daemon("left.test").await;
        let mut right = IkeDaemon::bind(
            IkeConfig::builder()
                .with_local_fqdn("right.test")
                .with_psk(&b"a different secret"[..])
                .build()
                .unwrap(),
            "127.0.0.1:0".parse().unwrap(),
        )
        .await
        .unwrap();
        let left_addr = left.local_addr();
        let right_addr = right.local_addr();

        left.initiate(right_addr).unwrap();

        // Mismatched PSKs: the responder rejects the AUTH request
        for _ in 0..4 {
            while let Ok(packet) = left.outbound_rx.try_recv() {
                right.handle_datagram(&packet.data, left_addr);
            }
            while let Ok(packet) = right.outbound_rx.try_recv() {
                left.handle_datagram(&packet.data, right_addr);
            }
        }

        assert_eq!(right.session_state(&left_addr), None);
        let snapshot = right.metrics().snapshot();
        assert_eq!(snapshot.authentication_failures, 1);
        assert_eq!(snapshot.handshakes_failed, 1);
        assert_eq!(snapshot.sessions_removed, 1);
        assert_eq!(snapshot.sessions_active, 0);
    }
}
