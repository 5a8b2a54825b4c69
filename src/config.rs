//! IKE daemon configuration
//!
//! Configuration for the negotiation side of the daemon: identities, the
//! pre-shared secret, and the proposal set offered or accepted during
//! IKE_SA_INIT.

use crate::chunk::Chunk;
use crate::payload::IdPayload;
use crate::proposal::{
    DhTransformId, EncrTransformId, PrfTransformId, Proposal, ProtocolId, Transform,
};
use crate::{Error, Result};

/// Bounds for the negotiation nonce length in bytes
const NONCE_LEN_MIN: usize = 16;
const NONCE_LEN_MAX: usize = 256;

/// Configuration shared by every IKE SA the daemon runs.
#[derive(Clone, Debug)]
pub struct IkeConfig {
    /// Identity asserted in IDi (as initiator) or IDr (as responder)
    pub local_id: IdPayload,

    /// Expected peer identity; `None` accepts whatever the peer asserts
    pub remote_id: Option<IdPayload>,

    /// Pre-shared key for AUTH payload computation
    pub psk: Chunk,

    /// IKE SA proposals, in preference order
    pub proposals: Vec<Proposal>,

    /// Length of generated nonces in bytes
    pub nonce_length: usize,
}

impl IkeConfig {
    /// Create builder for IKE configuration
    pub fn builder() -> IkeConfigBuilder {
        IkeConfigBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.psk.is_empty() {
            return Err(Error::InvalidConfig("PSK cannot be empty".into()));
        }
        if self.proposals.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one IKE proposal required".into(),
            ));
        }
        for proposal in &self.proposals {
            proposal.validate_for_ike().map_err(|e| {
                Error::InvalidConfig(format!("proposal {}: {}", proposal.proposal_num, e))
            })?;
        }
        if self.nonce_length < NONCE_LEN_MIN || self.nonce_length > NONCE_LEN_MAX {
            return Err(Error::InvalidConfig(format!(
                "nonce length must be between {} and {} bytes",
                NONCE_LEN_MIN, NONCE_LEN_MAX
            )));
        }
        Ok(())
    }
}

/// Builder for [`IkeConfig`]
#[derive(Default)]
pub struct IkeConfigBuilder {
    local_id: Option<IdPayload>,
    remote_id: Option<IdPayload>,
    psk: Option<Chunk>,
    proposals: Option<Vec<Proposal>>,
    nonce_length: Option<usize>,
}

impl IkeConfigBuilder {
    /// Create new configuration builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set local identity from a fully qualified domain name
    pub fn with_local_fqdn(mut self, fqdn: impl AsRef<str>) -> Self {
        self.local_id = Some(IdPayload::from_fqdn(fqdn.as_ref()));
        self
    }

    /// Set local identity from an RFC 822 email address
    pub fn with_local_email(mut self, email: impl AsRef<str>) -> Self {
        self.local_id = Some(IdPayload::from_email(email.as_ref()));
        self
    }

    /// Set local identity payload directly
    pub fn with_local_id(mut self, id: IdPayload) -> Self {
        self.local_id = Some(id);
        self
    }

    /// Set the expected remote identity
    pub fn with_remote_id(mut self, id: IdPayload) -> Self {
        self.remote_id = Some(id);
        self
    }

    /// Set pre-shared key
    pub fn with_psk(mut self, psk: impl Into<Vec<u8>>) -> Self {
        self.psk = Some(Chunk::new(psk.into()));
        self
    }

    /// Set IKE proposals
    pub fn with_proposals(mut self, proposals: Vec<Proposal>) -> Self {
        self.proposals = Some(proposals);
        self
    }

    /// Set nonce length in bytes
    pub fn with_nonce_length(mut self, length: usize) -> Self {
        self.nonce_length = Some(length);
        self
    }

    /// Build the configuration with validation
    pub fn build(self) -> Result<IkeConfig> {
        let config = IkeConfig {
            local_id: self
                .local_id
                .ok_or_else(|| Error::InvalidConfig("local identity is required".into()))?,
            remote_id: self.remote_id,
            psk: self
                .psk
                .ok_or_else(|| Error::InvalidConfig("PSK is required".into()))?,
            proposals: self.proposals.unwrap_or_else(default_proposals),
            nonce_length: self.nonce_length.unwrap_or(32),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Default proposal: AES-GCM-128, HMAC-SHA256 PRF, DH group 14
fn default_proposals() -> Vec<Proposal> {
    vec![Proposal::new(1, ProtocolId::Ike)
        .add_transform(Transform::encr(EncrTransformId::AesGcm16).with_key_length(128))
        .add_transform(Transform::prf(PrfTransformId::HmacSha256))
        .add_transform(Transform::dh(DhTransformId::Group14))]
}
