//! Metrics for IKE negotiation
//!
//! Counters and gauges for monitoring daemon health. All metrics use
//! atomic operations for thread-safe updates and can be exported to
//! monitoring systems.
//!
//! # Example
//!
//! ```
//! use ikesa::metrics::IkeMetrics;
//!
//! let metrics = IkeMetrics::new();
//!
//! metrics.record_session_created();
//! // ... perform handshake ...
//! metrics.record_handshake_completed();
//!
//! let snapshot = metrics.snapshot();
//! println!("Sessions: {}", snapshot.sessions_created);
//! println!("Completed: {}", snapshot.handshakes_completed);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// IKE negotiation metrics
///
/// Clones share the underlying counters, so a daemon can hand a copy to
/// each worker and read a coherent total.
#[derive(Debug, Clone)]
pub struct IkeMetrics {
    /// Total sessions created (initiator and responder)
    pub sessions_created: Arc<AtomicU64>,

    /// Currently live sessions
    pub sessions_active: Arc<AtomicU64>,

    /// Sessions removed (teardown, shutdown)
    pub sessions_removed: Arc<AtomicU64>,

    /// Handshakes that reached the established state
    pub handshakes_completed: Arc<AtomicU64>,

    /// Handshakes that failed before establishing
    pub handshakes_failed: Arc<AtomicU64>,

    /// Peer authentication failures
    pub authentication_failures: Arc<AtomicU64>,

    /// Proposal negotiation failures
    pub negotiation_failures: Arc<AtomicU64>,

    /// IKE messages sent
    pub messages_sent: Arc<AtomicU64>,

    /// Bytes sent
    pub bytes_sent: Arc<AtomicU64>,

    /// IKE messages received
    pub messages_received: Arc<AtomicU64>,

    /// Bytes received
    pub bytes_received: Arc<AtomicU64>,

    /// Responses retransmitted for duplicate requests
    pub retransmissions: Arc<AtomicU64>,
}

impl IkeMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self {
            sessions_created: Arc::new(AtomicU64::new(0)),
            sessions_active: Arc::new(AtomicU64::new(0)),
            sessions_removed: Arc::new(AtomicU64::new(0)),
            handshakes_completed: Arc::new(AtomicU64::new(0)),
            handshakes_failed: Arc::new(AtomicU64::new(0)),
            authentication_failures: Arc::new(AtomicU64::new(0)),
            negotiation_failures: Arc::new(AtomicU64::new(0)),
            messages_sent: Arc::new(AtomicU64::new(0)),
            bytes_sent: Arc::new(AtomicU64::new(0)),
            messages_received: Arc::new(AtomicU64::new(0)),
            bytes_received: Arc::new(AtomicU64::new(0)),
            retransmissions: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Record session creation
    pub fn record_session_created(&self) {
        self.sessions_created.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record session removal
    pub fn record_session_removed(&self) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
        self.sessions_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record handshake completed successfully
    pub fn record_handshake_completed(&self) {
        self.handshakes_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record handshake failed
    pub fn record_handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record peer authentication failure
    pub fn record_authentication_failed(&self) {
        self.authentication_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record proposal negotiation failure
    pub fn record_negotiation_failed(&self) {
        self.negotiation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record IKE message sent
    ///
    /// # Arguments
    ///
    /// * `bytes` - Datagram size
    pub fn record_message_sent(&self, bytes: usize) {
        self.messages_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record IKE message received
    ///
    /// # Arguments
    ///
    /// * `bytes` - Datagram size
    pub fn record_message_received(&self, bytes: usize) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    /// Record a retransmitted response
    pub fn record_retransmission(&self) {
        self.retransmissions.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    ///
    /// Returns a point-in-time view of all metrics. Values may be
    /// slightly inconsistent across counters under concurrent updates.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_created: self.sessions_created.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            sessions_removed: self.sessions_removed.load(Ordering::Relaxed),
            handshakes_completed: self.handshakes_completed.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            authentication_failures: self.authentication_failures.load(Ordering::Relaxed),
            negotiation_failures: self.negotiation_failures.load(Ordering::Relaxed),
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            retransmissions: self.retransmissions.load(Ordering::Relaxed),
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.sessions_created.store(0, Ordering::Relaxed);
        self.sessions_active.store(0, Ordering::Relaxed);
        self.sessions_removed.store(0, Ordering::Relaxed);
        self.handshakes_completed.store(0, Ordering::Relaxed);
        self.handshakes_failed.store(0, Ordering::Relaxed);
        self.authentication_failures.store(0, Ordering::Relaxed);
        self.negotiation_failures.store(0, Ordering::Relaxed);
        self.messages_sent.store(0, Ordering::Relaxed);
        self.bytes_sent.store(0, Ordering::Relaxed);
        self.messages_received.store(0, Ordering::Relaxed);
        self.bytes_received.store(0, Ordering::Relaxed);
        self.retransmissions.store(0, Ordering::Relaxed);
    }
}

impl Default for IkeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time snapshot of all IKE metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Total sessions created
    pub sessions_created: u64,

    /// Currently live sessions
    pub sessions_active: u64,

    /// Sessions removed
    pub sessions_removed: u64,

    /// Handshakes completed
    pub handshakes_completed: u64,

    /// Handshakes failed
    pub handshakes_failed: u64,

    /// Authentication failures
    pub authentication_failures: u64,

    /// Negotiation failures
    pub negotiation_failures: u64,

    /// Messages sent
    pub messages_sent: u64,

    /// Bytes sent
    pub bytes_sent: u64,

    /// Messages received
    pub messages_received: u64,

    /// Bytes received
    pub bytes_received: u64,

    /// Retransmitted responses
    pub retransmissions: u64,
}

impl MetricsSnapshot {
    /// Handshake success rate over all finished handshakes (0.0 to 1.0)
    pub fn handshake_success_rate(&self) -> f64 {
        let finished = self.handshakes_completed + self.handshakes_failed;
        if finished == 0 {
            return 0.0;
        }
        self.handshakes_completed as f64 / finished as f64
    }

    /// Average sent message size in bytes
    pub fn avg_sent_message_size(&self) -> f64 {
        if self.messages_sent == 0 {
            return 0.0;
        }
        self.bytes_sent as f64 / self.messages_sent as f64
    }
}
