//! Proposal and transform structures for SA negotiation.
//!
//! Implements the substructures of the SA payload (RFC 7296 Section 3.3):
//!
//! ```text
//! SA Payload
//!   └── Proposal(s)
//!         └── Transform(s)
//!               └── Attribute(s)
//! ```
//!
//! Key sizes for variable-key ciphers (AES-CBC, AES-GCM) travel in the
//! KEY_LENGTH transform attribute; acceptability checks compare it along
//! with the transform id.

use crate::{Error, Result};

/// Transform Type (RFC 7296 Section 3.3.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TransformType {
    /// Encryption Algorithm (ENCR)
    Encr = 1,
    /// Pseudo-random Function (PRF)
    Prf = 2,
    /// Integrity Algorithm (INTEG)
    Integ = 3,
    /// Diffie-Hellman Group (D-H)
    Dh = 4,
}

impl TransformType {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(TransformType::Encr),
            2 => Some(TransformType::Prf),
            3 => Some(TransformType::Integ),
            4 => Some(TransformType::Dh),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Transform ID for Encryption (ENCR) algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EncrTransformId {
    /// AES-CBC (key size from the KEY_LENGTH attribute)
    AesCbc = 12,
    /// AES-GCM with 16-byte ICV (key size from the KEY_LENGTH attribute)
    AesGcm16 = 20,
    /// ChaCha20-Poly1305 (fixed 256-bit key)
    ChaCha20Poly1305 = 28,
}

impl EncrTransformId {
    /// Convert from u16
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            12 => Some(EncrTransformId::AesCbc),
            20 => Some(EncrTransformId::AesGcm16),
            28 => Some(EncrTransformId::ChaCha20Poly1305),
            _ => None,
        }
    }

    /// Convert to u16
    pub fn to_u16(self) -> u16 {
        self as u16
    }

    /// Check if this is an AEAD cipher
    pub fn is_aead(self) -> bool {
        matches!(
            self,
            EncrTransformId::AesGcm16 | EncrTransformId::ChaCha20Poly1305
        )
    }

    /// Check if this cipher takes its key size from the KEY_LENGTH attribute
    pub fn requires_key_length(self) -> bool {
        matches!(self, EncrTransformId::AesCbc | EncrTransformId::AesGcm16)
    }
}

/// Transform ID for PRF algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PrfTransformId {
    /// PRF_HMAC_SHA2_256
    HmacSha256 = 5,
    /// PRF_HMAC_SHA2_384
    HmacSha384 = 6,
    /// PRF_HMAC_SHA2_512
    HmacSha512 = 7,
}

impl PrfTransformId {
    /// Convert from u16
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            5 => Some(PrfTransformId::HmacSha256),
            6 => Some(PrfTransformId::HmacSha384),
            7 => Some(PrfTransformId::HmacSha512),
            _ => None,
        }
    }

    /// Convert to u16
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Transform ID for Integrity algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum IntegTransformId {
    /// AUTH_HMAC_SHA2_256_128 (128-bit ICV)
    HmacSha256_128 = 12,
    /// AUTH_HMAC_SHA2_384_192 (192-bit ICV)
    HmacSha384_192 = 13,
    /// AUTH_HMAC_SHA2_512_256 (256-bit ICV)
    HmacSha512_256 = 14,
}

impl IntegTransformId {
    /// Convert from u16
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            12 => Some(IntegTransformId::HmacSha256_128),
            13 => Some(IntegTransformId::HmacSha384_192),
            14 => Some(IntegTransformId::HmacSha512_256),
            _ => None,
        }
    }

    /// Convert to u16
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Transform ID for Diffie-Hellman groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum DhTransformId {
    /// 2048-bit MODP Group
    Group14 = 14,
    /// Curve25519
    Group31 = 31,
}

impl DhTransformId {
    /// Convert from u16
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            14 => Some(DhTransformId::Group14),
            31 => Some(DhTransformId::Group31),
            _ => None,
        }
    }

    /// Convert to u16
    pub fn to_u16(self) -> u16 {
        self as u16
    }
}

/// Transform attribute in TV form (RFC 7296 Section 3.3.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformAttribute {
    /// Attribute type (without the TV format bit)
    pub attr_type: u16,
    /// Attribute value
    pub value: u16,
}

impl TransformAttribute {
    /// KEY_LENGTH attribute type
    pub const KEY_LENGTH: u16 = 14;

    /// Bit marking the short (type/value) attribute format
    const TV_FORMAT: u16 = 0x8000;

    /// Key length attribute in bits
    pub fn key_length(bits: u16) -> Self {
        TransformAttribute {
            attr_type: Self::KEY_LENGTH,
            value: bits,
        }
    }
}

/// A single cryptographic algorithm choice within a proposal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    /// Transform type
    pub transform_type: TransformType,

    /// Transform ID
    pub transform_id: u16,

    /// Attributes (KEY_LENGTH for variable-key ciphers)
    pub attributes: Vec<TransformAttribute>,
}

impl Transform {
    /// Create new transform
    pub fn new(transform_type: TransformType, transform_id: u16) -> Self {
        Transform {
            transform_type,
            transform_id,
            attributes: Vec::new(),
        }
    }

    /// Create encryption transform
    pub fn encr(id: EncrTransformId) -> Self {
        Transform::new(TransformType::Encr, id.to_u16())
    }

    /// Create PRF transform
    pub fn prf(id: PrfTransformId) -> Self {
        Transform::new(TransformType::Prf, id.to_u16())
    }

    /// Create integrity transform
    pub fn integ(id: IntegTransformId) -> Self {
        Transform::new(TransformType::Integ, id.to_u16())
    }

    /// Create DH group transform
    pub fn dh(id: DhTransformId) -> Self {
        Transform::new(TransformType::Dh, id.to_u16())
    }

    /// Attach a KEY_LENGTH attribute (bits)
    pub fn with_key_length(mut self, bits: u16) -> Self {
        self.attributes.push(TransformAttribute::key_length(bits));
        self
    }

    /// The KEY_LENGTH attribute value in bits, if present
    pub fn key_length(&self) -> Option<u16> {
        self.attributes
            .iter()
            .find(|a| a.attr_type == TransformAttribute::KEY_LENGTH)
            .map(|a| a.value)
    }

    /// Check if this transform is interchangeable with another
    ///
    /// Type, id and key length must all agree.
    pub fn is_compatible_with(&self, other: &Transform) -> bool {
        self.transform_type == other.transform_type
            && self.transform_id == other.transform_id
            && self.key_length() == other.key_length()
    }

    /// Serialize transform to bytes (RFC 7296 Section 3.3.2)
    ///
    /// Format:
    /// - Byte 0: Last/More flag (0 = last, 3 = more)
    /// - Byte 1: Reserved
    /// - Bytes 2-3: Transform Length (whole substructure)
    /// - Byte 4: Transform Type
    /// - Byte 5: Reserved
    /// - Bytes 6-7: Transform ID
    /// - Bytes 8+: Attributes (if any)
    pub fn to_bytes(&self, is_last: bool) -> Vec<u8> {
        let total_len = 8 + self.attributes.len() * 4;

        let mut bytes = Vec::with_capacity(total_len);
        bytes.push(if is_last { 0 } else { 3 });
        bytes.push(0);
        bytes.extend_from_slice(&(total_len as u16).to_be_bytes());
        bytes.push(self.transform_type.to_u8());
        bytes.push(0);
        bytes.extend_from_slice(&self.transform_id.to_be_bytes());

        for attr in &self.attributes {
            let raw_type = attr.attr_type | TransformAttribute::TV_FORMAT;
            bytes.extend_from_slice(&raw_type.to_be_bytes());
            bytes.extend_from_slice(&attr.value.to_be_bytes());
        }

        bytes
    }

    /// Parse transform from bytes
    ///
    /// Returns the transform, the last/more flag, and the bytes consumed.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, bool, usize)> {
        if data.len() < 8 {
            return Err(Error::BufferTooShort {
                required: 8,
                available: data.len(),
            });
        }

        let is_last = data[0] == 0;
        let transform_len = u16::from_be_bytes([data[2], data[3]]) as usize;

        if transform_len < 8 || data.len() < transform_len {
            return Err(Error::BufferTooShort {
                required: transform_len.max(8),
                available: data.len(),
            });
        }

        let transform_type = TransformType::from_u8(data[4])
            .ok_or_else(|| Error::InvalidPayload(format!("Unknown transform type: {}", data[4])))?;
        let transform_id = u16::from_be_bytes([data[6], data[7]]);

        let mut attributes = Vec::new();
        let mut offset = 8;
        while offset < transform_len {
            if transform_len - offset < 4 {
                return Err(Error::InvalidPayload(
                    "Truncated transform attribute".into(),
                ));
            }
            let raw_type = u16::from_be_bytes([data[offset], data[offset + 1]]);
            if raw_type & TransformAttribute::TV_FORMAT != 0 {
                let value = u16::from_be_bytes([data[offset + 2], data[offset + 3]]);
                attributes.push(TransformAttribute {
                    attr_type: raw_type & !TransformAttribute::TV_FORMAT,
                    value,
                });
                offset += 4;
            } else {
                // TLV form: length field, then the value; nothing we
                // negotiate uses it, so skip the body
                let attr_len = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
                offset = offset
                    .checked_add(4 + attr_len)
                    .filter(|end| *end <= transform_len)
                    .ok_or_else(|| {
                        Error::InvalidPayload("Transform attribute overruns transform".into())
                    })?;
            }
        }

        let transform = Transform {
            transform_type,
            transform_id,
            attributes,
        };

        Ok((transform, is_last, transform_len))
    }
}

/// Protocol ID for proposals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolId {
    /// IKE SA
    Ike = 1,
}

impl ProtocolId {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ProtocolId::Ike),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// One candidate bundle of transform choices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    /// Proposal number (1-based)
    pub proposal_num: u8,

    /// Protocol ID
    pub protocol_id: ProtocolId,

    /// SPI bytes, empty in the initial IKE exchange
    pub spi: Vec<u8>,

    /// List of transforms
    pub transforms: Vec<Transform>,
}

impl Proposal {
    /// Create new proposal
    pub fn new(proposal_num: u8, protocol_id: ProtocolId) -> Self {
        Proposal {
            proposal_num,
            protocol_id,
            spi: Vec::new(),
            transforms: Vec::new(),
        }
    }

    /// Add transform to proposal
    pub fn add_transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Set SPI
    pub fn with_spi(mut self, spi: Vec<u8>) -> Self {
        self.spi = spi;
        self
    }

    /// Check if this proposal is acceptable under the configured set
    ///
    /// True when some configured proposal covers every transform offered
    /// here.
    pub fn is_acceptable(&self, configured: &[Proposal]) -> bool {
        for config in configured {
            if config.protocol_id != self.protocol_id {
                continue;
            }

            let all_match = self.transforms.iter().all(|ours| {
                config
                    .transforms
                    .iter()
                    .any(|theirs| ours.is_compatible_with(theirs))
            });

            if all_match {
                return true;
            }
        }

        false
    }

    /// Get transform by type
    pub fn get_transform(&self, transform_type: TransformType) -> Option<&Transform> {
        self.transforms
            .iter()
            .find(|t| t.transform_type == transform_type)
    }

    /// Check that this proposal can actually key an IKE SA
    ///
    /// Requires ENCR, PRF and DH transforms; a non-AEAD cipher must bring
    /// an INTEG transform, an AEAD cipher must not; variable-key ciphers
    /// must carry a KEY_LENGTH of 128 or 256 bits.
    pub fn validate_for_ike(&self) -> Result<()> {
        if self.protocol_id != ProtocolId::Ike {
            return Err(Error::NegotiationFailed(
                "proposal is not for the IKE protocol".into(),
            ));
        }

        let encr = self
            .get_transform(TransformType::Encr)
            .ok_or_else(|| Error::NegotiationFailed("proposal lacks an ENCR transform".into()))?;
        let encr_id = EncrTransformId::from_u16(encr.transform_id).ok_or_else(|| {
            Error::NegotiationFailed(format!(
                "unsupported encryption transform {}",
                encr.transform_id
            ))
        })?;

        if encr_id.requires_key_length() {
            match encr.key_length() {
                Some(128) | Some(256) => {}
                Some(bits) => {
                    return Err(Error::NegotiationFailed(format!(
                        "unsupported key length {} bits",
                        bits
                    )))
                }
                None => {
                    return Err(Error::NegotiationFailed(
                        "cipher requires a KEY_LENGTH attribute".into(),
                    ))
                }
            }
        }

        let prf = self
            .get_transform(TransformType::Prf)
            .ok_or_else(|| Error::NegotiationFailed("proposal lacks a PRF transform".into()))?;
        PrfTransformId::from_u16(prf.transform_id).ok_or_else(|| {
            Error::NegotiationFailed(format!("unsupported PRF transform {}", prf.transform_id))
        })?;

        let integ = self.get_transform(TransformType::Integ);
        if encr_id.is_aead() {
            if integ.is_some() {
                return Err(Error::NegotiationFailed(
                    "AEAD cipher must not combine with an INTEG transform".into(),
                ));
            }
        } else {
            let integ = integ.ok_or_else(|| {
                Error::NegotiationFailed("non-AEAD cipher requires an INTEG transform".into())
            })?;
            IntegTransformId::from_u16(integ.transform_id).ok_or_else(|| {
                Error::NegotiationFailed(format!(
                    "unsupported integrity transform {}",
                    integ.transform_id
                ))
            })?;
        }

        let dh = self
            .get_transform(TransformType::Dh)
            .ok_or_else(|| Error::NegotiationFailed("proposal lacks a DH transform".into()))?;
        DhTransformId::from_u16(dh.transform_id).ok_or_else(|| {
            Error::NegotiationFailed(format!("unsupported DH group {}", dh.transform_id))
        })?;

        Ok(())
    }

    /// Serialize proposal to bytes (RFC 7296 Section 3.3.1)
    ///
    /// Format:
    /// - Byte 0: Last/More flag (0 = last, 2 = more)
    /// - Byte 1: Reserved
    /// - Bytes 2-3: Proposal Length (whole substructure)
    /// - Byte 4: Proposal Number
    /// - Byte 5: Protocol ID
    /// - Byte 6: SPI Size
    /// - Byte 7: Num Transforms
    /// - Bytes 8+: SPI, then transforms
    pub fn to_bytes(&self, is_last: bool) -> Vec<u8> {
        let transform_bytes: Vec<Vec<u8>> = self
            .transforms
            .iter()
            .enumerate()
            .map(|(i, t)| t.to_bytes(i == self.transforms.len() - 1))
            .collect();
        let transforms_len: usize = transform_bytes.iter().map(|tb| tb.len()).sum();

        let spi_size = self.spi.len();
        let total_len = 8 + spi_size + transforms_len;

        let mut bytes = Vec::with_capacity(total_len);
        bytes.push(if is_last { 0 } else { 2 });
        bytes.push(0);
        bytes.extend_from_slice(&(total_len as u16).to_be_bytes());
        bytes.push(self.proposal_num);
        bytes.push(self.protocol_id.to_u8());
        bytes.push(spi_size as u8);
        bytes.push(self.transforms.len() as u8);
        bytes.extend_from_slice(&self.spi);

        for transform_byte in transform_bytes {
            bytes.extend_from_slice(&transform_byte);
        }

        bytes
    }

    /// Parse proposal from bytes
    ///
    /// Returns the proposal, the last/more flag, and the bytes consumed.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, bool, usize)> {
        if data.len() < 8 {
            return Err(Error::BufferTooShort {
                required: 8,
                available: data.len(),
            });
        }

        let is_last = data[0] == 0;
        let proposal_len = u16::from_be_bytes([data[2], data[3]]) as usize;

        if proposal_len < 8 || data.len() < proposal_len {
            return Err(Error::BufferTooShort {
                required: proposal_len.max(8),
                available: data.len(),
            });
        }

        let proposal_num = data[4];
        let protocol_id = ProtocolId::from_u8(data[5])
            .ok_or_else(|| Error::InvalidPayload(format!("Unknown protocol ID: {}", data[5])))?;
        let spi_size = data[6] as usize;
        let num_transforms = data[7] as usize;

        if proposal_len < 8 + spi_size {
            return Err(Error::BufferTooShort {
                required: 8 + spi_size,
                available: proposal_len,
            });
        }
        let spi = data[8..8 + spi_size].to_vec();

        let mut transforms = Vec::with_capacity(num_transforms);
        let mut offset = 8 + spi_size;
        for _ in 0..num_transforms {
            if offset >= proposal_len {
                return Err(Error::InvalidPayload(
                    "Transform count overruns proposal".into(),
                ));
            }
            let (transform, _, transform_len) = Transform::from_bytes(&data[offset..proposal_len])?;
            transforms.push(transform);
            offset += transform_len;
        }

        let proposal = Proposal {
            proposal_num,
            protocol_id,
            spi,
            transforms,
        };

        Ok((proposal, is_last, proposal_len))
    }
}

/// Select the first offered proposal acceptable under local policy
/// (RFC 7296 Section 2.7).
pub fn select_proposal<'a>(
    offered: &'a [Proposal],
    configured: &[Proposal],
) -> Result<&'a Proposal> {
    for proposal in offered {
        if proposal.is_acceptable(configured) {
            return Ok(proposal);
        }
    }

    Err(Error::NegotiationFailed(
        "no offered proposal matches local policy".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aead_proposal(num: u8, key_bits: u16) -> Proposal {
        Proposal::new(num, ProtocolId::Ike)
            .add_transform(Transform::encr(EncrTransformId::AesGcm16).with_key_length(key_bits))
            .add_transform(Transform::prf(PrfTransformId::HmacSha256))
            .add_transform(Transform::dh(DhTransformId::Group14))
    }

    #[test]
    fn test_transform_roundtrip_with_key_length() {
        let transform = Transform::encr(EncrTransformId::AesGcm16).with_key_length(128);
        let bytes = transform.to_bytes(true);

        let (parsed, is_last, len) = Transform::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.transform_type, TransformType::Encr);
        assert_eq!(parsed.transform_id, 20);
        assert_eq!(parsed.key_length(), Some(128));
        assert!(is_last);
        assert_eq!(len, bytes.len());
    }

    #[test]
    fn test_transform_more_flag() {
        let transform = Transform::prf(PrfTransformId::HmacSha256);
        let bytes = transform.to_bytes(false);
        assert_eq!(bytes[0], 3);

        let (_, is_last, _) = Transform::from_bytes(&bytes).unwrap();
        assert!(!is_last);
    }

    #[test]
    fn test_transform_compatibility_includes_key_length() {
        let gcm128 = Transform::encr(EncrTransformId::AesGcm16).with_key_length(128);
        let gcm128_again = Transform::encr(EncrTransformId::AesGcm16).with_key_length(128);
        let gcm256 = Transform::encr(EncrTransformId::AesGcm16).with_key_length(256);

        assert!(gcm128.is_compatible_with(&gcm128_again));
        assert!(!gcm128.is_compatible_with(&gcm256));
    }

    #[test]
    fn test_encr_transform_id() {
        assert_eq!(EncrTransformId::from_u16(20), Some(EncrTransformId::AesGcm16));
        assert!(EncrTransformId::AesGcm16.is_aead());
        assert!(!EncrTransformId::AesCbc.is_aead());
        assert!(EncrTransformId::AesCbc.requires_key_length());
        assert!(!EncrTransformId::ChaCha20Poly1305.requires_key_length());
    }

    #[test]
    fn test_proposal_roundtrip() {
        let proposal = aead_proposal(1, 128).with_spi(vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let bytes = proposal.to_bytes(true);

        let (parsed, is_last, len) = Proposal::from_bytes(&bytes).unwrap();
        assert!(is_last);
        assert_eq!(len, bytes.len());
        assert_eq!(parsed, proposal);
    }

    #[test]
    fn test_proposal_is_acceptable() {
        let offered = aead_proposal(1, 128);
        let configured = vec![aead_proposal(1, 128)];
        assert!(offered.is_acceptable(&configured));
    }

    #[test]
    fn test_proposal_key_length_mismatch_not_acceptable() {
        let offered = aead_proposal(1, 256);
        let configured = vec![aead_proposal(1, 128)];
        assert!(!offered.is_acceptable(&configured));
    }

    #[test]
    fn test_select_proposal_first_acceptable() {
        let offered = vec![aead_proposal(1, 256), aead_proposal(2, 128)];
        let configured = vec![aead_proposal(1, 128)];

        let selected = select_proposal(&offered, &configured).unwrap();
        assert_eq!(selected.proposal_num, 2);
    }

    #[test]
    fn test_select_proposal_no_match() {
        let offered = vec![aead_proposal(1, 256)];
        let configured = vec![aead_proposal(1, 128)];

        let result = select_proposal(&offered, &configured);
        assert!(matches!(result, Err(Error::NegotiationFailed(_))));
    }

    #[test]
    fn test_validate_for_ike_accepts_complete_aead() {
        assert!(aead_proposal(1, 128).validate_for_ike().is_ok());
    }

    #[test]
    fn test_validate_for_ike_rejects_missing_prf() {
        let proposal = Proposal::new(1, ProtocolId::Ike)
            .add_transform(Transform::encr(EncrTransformId::AesGcm16).with_key_length(128))
            .add_transform(Transform::dh(DhTransformId::Group14));
        assert!(matches!(
            proposal.validate_for_ike(),
            Err(Error::NegotiationFailed(_))
        ));
    }

    #[test]
    fn test_validate_for_ike_rejects_cbc_without_integ() {
        let proposal = Proposal::new(1, ProtocolId::Ike)
            .add_transform(Transform::encr(EncrTransformId::AesCbc).with_key_length(128))
            .add_transform(Transform::prf(PrfTransformId::HmacSha256))
            .add_transform(Transform::dh(DhTransformId::Group14));
        assert!(matches!(
            proposal.validate_for_ike(),
            Err(Error::NegotiationFailed(_))
        ));
    }

    #[test]
    fn test_validate_for_ike_rejects_aead_with_integ() {
        let proposal = aead_proposal(1, 128)
            .add_transform(Transform::integ(IntegTransformId::HmacSha256_128));
        assert!(matches!(
            proposal.validate_for_ike(),
            Err(Error::NegotiationFailed(_))
        ));
    }

    #[test]
    fn test_validate_for_ike_rejects_missing_key_length() {
        let proposal = Proposal::new(1, ProtocolId::Ike)
            .add_transform(Transform::encr(EncrTransformId::AesGcm16))
            .add_transform(Transform::prf(PrfTransformId::HmacSha256))
            .add_transform(Transform::dh(DhTransformId::Group14));
        assert!(matches!(
            proposal.validate_for_ike(),
            Err(Error::NegotiationFailed(_))
        ));
    }

    #[test]
    fn test_validate_for_ike_accepts_cbc_suite() {
        let proposal = Proposal::new(1, ProtocolId::Ike)
            .add_transform(Transform::encr(EncrTransformId::AesCbc).with_key_length(128))
            .add_transform(Transform::prf(PrfTransformId::HmacSha256))
            .add_transform(Transform::integ(IntegTransformId::HmacSha256_128))
            .add_transform(Transform::dh(DhTransformId::Group14));
        assert!(proposal.validate_for_ike().is_ok());
    }

    #[test]
    fn test_transform_truncated() {
        let transform = Transform::dh(DhTransformId::Group14);
        let bytes = transform.to_bytes(true);
        let result = Transform::from_bytes(&bytes[..6]);
        assert!(matches!(result, Err(Error::BufferTooShort { .. })));
    }

    #[test]
    fn test_protocol_id_conversion() {
        assert_eq!(ProtocolId::from_u8(1), Some(ProtocolId::Ike));
        assert_eq!(ProtocolId::from_u8(3), None);
        assert_eq!(ProtocolId::Ike.to_u8(), 1);
    }
}
