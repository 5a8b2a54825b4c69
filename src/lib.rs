//! IKEv2 security association negotiation (RFC 7296).
//!
//! This crate implements the negotiation core of an IKE daemon: the
//! two-exchange handshake (IKE_SA_INIT, IKE_AUTH) that takes an IKE SA
//! from nothing to established, with proposal selection, Diffie-Hellman
//! key exchange, key derivation and pre-shared-key authentication.
//!
//! The building blocks:
//!
//! - [`message`] - IKE header and payload wire format, including the
//!   Encrypted (SK) payload
//! - [`proposal`] - SA proposals, transforms and negotiation
//! - [`crypto`] - PRF, cipher, integrity and Diffie-Hellman primitives
//! - [`sa`] - the per-session handshake state machine
//! - [`daemon`] - UDP daemon tying sessions to a socket
//!
//! # Example
//!
//! ```
//! use ikesa::config::IkeConfig;
//!
//! # fn main() -> ikesa::Result<()> {
//! let config = IkeConfig::builder()
//!     .with_local_fqdn("gw.example.net")
//!     .with_psk(b"pre-shared-key".to_vec())
//!     .build()?;
//!
//! assert_eq!(config.proposals.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Driving a full handshake requires a socket; see [`daemon::IkeDaemon`].
//!
//! # Security
//!
//! - All cryptographic operations use vetted libraries (`ring`,
//!   RustCrypto)
//! - Constant-time comparison for authentication data and keys
//! - Key material is zeroized on drop
//!
//! # References
//!
//! - [RFC 7296](https://datatracker.ietf.org/doc/html/rfc7296) - Internet Key Exchange Protocol Version 2 (IKEv2)

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod chunk;
pub mod config;
pub mod constants;
pub mod crypto;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod message;
pub mod metrics;
pub mod payload;
pub mod proposal;
pub mod queue;
pub mod sa;

pub use chunk::Chunk;
pub use config::IkeConfig;
pub use daemon::IkeDaemon;
pub use error::{Error, Result};
pub use metrics::{IkeMetrics, MetricsSnapshot};
pub use sa::{IkeSa, IkeSaId, ProcessOutcome, Role, StateKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
