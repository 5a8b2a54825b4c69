//! Error types for IKE_SA negotiation.
//!
//! One unified error enum covers the whole crate. Variants fall into the
//! failure classes the state machine distinguishes: protocol mismatches
//! (wrong exchange type or direction), parse failures (the granular codec
//! variants), unsupported payloads, negotiation failures, cryptographic or
//! serialization failures, and session bookkeeping failures. Every failure
//! is returned as a value to the dispatcher; nothing here terminates the
//! process.

use std::fmt;

/// Result type for IKE operations
pub type Result<T> = std::result::Result<T, Error>;

/// IKE negotiation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Message has the wrong exchange type, direction, or arrived in a
    /// state that does not accept it
    ProtocolMismatch(String),

    /// Unsupported IKE version in the message header
    UnsupportedVersion(u8),

    /// Unknown or out-of-range exchange type
    UnsupportedExchangeType(u8),

    /// Buffer too short while decoding
    BufferTooShort {
        /// Required length
        required: usize,
        /// Available length
        available: usize,
    },

    /// Length field disagrees with the actual data
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Encoded message would exceed the protocol maximum
    MessageTooLarge(usize),

    /// Malformed payload contents
    InvalidPayload(String),

    /// Payload type not accepted in the current exchange
    UnsupportedPayload(u8),

    /// Proposal negotiation failed (zero or multiple proposals where one
    /// is required, no acceptable proposal, or unusable transform set)
    NegotiationFailed(String),

    /// Peer authentication failed
    AuthenticationFailed(String),

    /// Cryptographic operation failed (key exchange, protection, key
    /// derivation)
    CryptoFailed(String),

    /// Session bookkeeping failed (recording the last sent message)
    BookkeepingFailed(String),

    /// Configuration rejected during validation
    InvalidConfig(String),

    /// I/O error in the daemon shell
    Io(String),

    /// Internal error (should not happen)
    Internal(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ProtocolMismatch(msg) => write!(f, "Protocol mismatch: {}", msg),
            Error::UnsupportedVersion(v) => {
                write!(f, "Unsupported IKE version: 0x{:02x}", v)
            }
            Error::UnsupportedExchangeType(t) => {
                write!(f, "Unsupported exchange type: {}", t)
            }
            Error::BufferTooShort {
                required,
                available,
            } => {
                write!(
                    f,
                    "Buffer too short: need {} bytes, have {}",
                    required, available
                )
            }
            Error::InvalidLength { expected, actual } => {
                write!(f, "Invalid length: expected {}, got {}", expected, actual)
            }
            Error::MessageTooLarge(size) => {
                write!(f, "IKE message too large: {} bytes", size)
            }
            Error::InvalidPayload(msg) => write!(f, "Invalid IKE payload: {}", msg),
            Error::UnsupportedPayload(t) => {
                write!(f, "Unsupported payload type: {}", t)
            }
            Error::NegotiationFailed(msg) => {
                write!(f, "Proposal negotiation failed: {}", msg)
            }
            Error::AuthenticationFailed(msg) => {
                write!(f, "Authentication failed: {}", msg)
            }
            Error::CryptoFailed(msg) => write!(f, "Cryptographic error: {}", msg),
            Error::BookkeepingFailed(msg) => {
                write!(f, "Session bookkeeping failed: {}", msg)
            }
            Error::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

// Convert from std::io::Error
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
