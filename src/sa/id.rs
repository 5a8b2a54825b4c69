//! IKE SA identity
//!
//! An IKE SA is identified by the SPI pair from the message header. The
//! initiator picks its half when the first request goes out; the
//! responder's half stays zero until the peer's first reply arrives.

use rand::RngCore;

/// Which side of the negotiation this session plays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// We sent (or will send) the first IKE_SA_INIT request
    Initiator,
    /// We answer a peer's IKE_SA_INIT request
    Responder,
}

impl Role {
    /// Whether this side is the original initiator
    pub fn is_initiator(self) -> bool {
        matches!(self, Role::Initiator)
    }

    /// Role name for log records
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Initiator => "initiator",
            Role::Responder => "responder",
        }
    }
}

/// The SPI pair identifying one IKE SA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IkeSaId {
    /// SPI chosen by the initiator
    pub initiator_spi: [u8; 8],

    /// SPI chosen by the responder, zero until its first reply
    pub responder_spi: [u8; 8],
}

impl IkeSaId {
    /// Create an identifier from both halves
    pub fn new(initiator_spi: [u8; 8], responder_spi: [u8; 8]) -> Self {
        IkeSaId {
            initiator_spi,
            responder_spi,
        }
    }

    /// Generate a random non-zero SPI
    pub fn generate_spi() -> [u8; 8] {
        let mut rng = rand::thread_rng();
        let mut spi = [0u8; 8];
        loop {
            rng.fill_bytes(&mut spi);
            if spi != [0u8; 8] {
                return spi;
            }
        }
    }

    /// Whether both halves are known
    pub fn is_complete(&self) -> bool {
        self.initiator_spi != [0u8; 8] && self.responder_spi != [0u8; 8]
    }
}
