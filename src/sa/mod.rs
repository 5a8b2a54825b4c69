//! IKE SA sessions and their negotiation state machine
//!
//! One [`IkeSa`] drives one security association from the first
//! IKE_SA_INIT message to the established state:
//!
//! 1. **IKE_SA_INIT**: negotiate algorithms, exchange DH values and
//!    nonces, derive the SK_* key material
//! 2. **IKE_AUTH**: exchange identities and PSK-based AUTH payloads
//!    under the freshly derived keys
//!
//! The session splits into a [`SessionCore`] holding everything that
//! outlives a single state (SPIs, keys, message bookkeeping, the
//! outbound packet sink) and an [`SaState`] holding what only the
//! current phase needs. Serialized packets leave through the injected
//! [`crate::queue::PacketSink`]; the session never touches a socket.

pub mod id;
pub mod session;
pub mod state;

pub use id::{IkeSaId, Role};
pub use session::{IkeSa, ProcessOutcome, SessionCore};
pub use state::{SaState, StateKind};
