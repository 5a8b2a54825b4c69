//! Structured logging for IKE negotiation
//!
//! Structured, contextual events via the `tracing` framework. All
//! messages carry the fields needed to follow a single negotiation
//! through a busy daemon.
//!
//! # Log Levels
//!
//! - **TRACE**: individual message send/receive
//! - **DEBUG**: proposal selection, retransmissions
//! - **INFO**: state transitions, handshake lifecycle
//! - **WARN**: unusual but recoverable conditions
//! - **ERROR**: failed handshakes, failed authentication
//!
//! # Example
//!
//! ```no_run
//! use ikesa::logging;
//!
//! tracing_subscriber::fmt()
//!     .with_env_filter("ikesa=debug")
//!     .init();
//!
//! logging::log_state_transition(
//!     &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08],
//!     &[0; 8],
//!     "IDLE",
//!     "IKE_SA_INIT_REQUESTED",
//! );
//! ```

use tracing::{debug, error, info, trace, warn};

/// Log an IKE SA state transition
///
/// # Arguments
///
/// * `spi_i` - Initiator SPI
/// * `spi_r` - Responder SPI
/// * `old_state` - Previous state name
/// * `new_state` - New state name
pub fn log_state_transition(spi_i: &[u8], spi_r: &[u8], old_state: &str, new_state: &str) {
    info!(
        ike_spi_i = %hex::encode(spi_i),
        ike_spi_r = %hex::encode(spi_r),
        state_from = old_state,
        state_to = new_state,
        "IKE SA state transition"
    );
}

/// Log handshake start
///
/// # Arguments
///
/// * `peer_addr` - Peer IP address and port
/// * `role` - "initiator" or "responder"
pub fn log_handshake_start(peer_addr: &str, role: &str) {
    info!(
        peer = peer_addr,
        role = role,
        "IKE handshake started"
    );
}

/// Log handshake completion
///
/// # Arguments
///
/// * `peer_addr` - Peer IP address and port
/// * `duration_ms` - Time from session creation to ESTABLISHED
pub fn log_handshake_established(peer_addr: &str, duration_ms: u64) {
    info!(
        peer = peer_addr,
        duration_ms = duration_ms,
        "IKE handshake completed successfully"
    );
}

/// Log handshake failure
///
/// # Arguments
///
/// * `peer_addr` - Peer IP address and port
/// * `error` - Error message
pub fn log_handshake_failed(peer_addr: &str, error: &str) {
    error!(
        peer = peer_addr,
        error = error,
        "IKE handshake failed"
    );
}

/// Log proposal negotiation outcome
///
/// # Arguments
///
/// * `offered` - Number of proposals offered
/// * `chosen_num` - Number of the chosen proposal, or None if no match
pub fn log_proposal_negotiation(offered: usize, chosen_num: Option<u8>) {
    match chosen_num {
        Some(num) => {
            debug!(
                proposals_offered = offered,
                chosen_num = num,
                "Proposal negotiation successful"
            );
        }
        None => {
            warn!(
                proposals_offered = offered,
                "Proposal negotiation failed - no acceptable proposal"
            );
        }
    }
}

/// Log authentication success
///
/// # Arguments
///
/// * `peer_id` - Peer identity
/// * `auth_method` - Authentication method used (e.g. "PSK")
pub fn log_authentication_success(peer_id: &str, auth_method: &str) {
    info!(
        peer_id = peer_id,
        auth_method = auth_method,
        "Peer authenticated successfully"
    );
}

/// Log authentication failure
///
/// # Arguments
///
/// * `peer_id` - Peer identity
/// * `reason` - Failure reason
pub fn log_authentication_failed(peer_id: &str, reason: &str) {
    error!(
        peer_id = peer_id,
        reason = reason,
        "Peer authentication failed"
    );
}

/// Log a retransmitted response to a duplicate request
///
/// # Arguments
///
/// * `spi_i` - Initiator SPI
/// * `message_id` - Message ID of the duplicated request
pub fn log_retransmission(spi_i: &[u8], message_id: u32) {
    debug!(
        ike_spi_i = %hex::encode(spi_i),
        message_id = message_id,
        "Duplicate request, retransmitting recorded response"
    );
}

/// Log session removal
///
/// # Arguments
///
/// * `peer_addr` - Peer IP address and port
/// * `reason` - Removal reason (e.g. "shutdown", "fatal error")
pub fn log_session_removed(peer_addr: &str, reason: &str) {
    info!(
        peer = peer_addr,
        reason = reason,
        "IKE session removed"
    );
}

/// Log IKE message send
///
/// # Arguments
///
/// * `exchange` - Exchange type (e.g. "IKE_SA_INIT", "IKE_AUTH")
/// * `peer_addr` - Peer address
/// * `size_bytes` - Message size in bytes
pub fn log_message_send(exchange: &str, peer_addr: &str, size_bytes: usize) {
    trace!(
        exchange = exchange,
        peer = peer_addr,
        size_bytes = size_bytes,
        "Sending IKE message"
    );
}

/// Log IKE message receive
///
/// # Arguments
///
/// * `exchange` - Exchange type (e.g. "IKE_SA_INIT", "IKE_AUTH")
/// * `peer_addr` - Peer address
/// * `size_bytes` - Message size in bytes
pub fn log_message_recv(exchange: &str, peer_addr: &str, size_bytes: usize) {
    trace!(
        exchange = exchange,
        peer = peer_addr,
        size_bytes = size_bytes,
        "Received IKE message"
    );
}
