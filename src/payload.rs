//! IKE payload structures (RFC 7296 Section 3).
//!
//! Every payload starts with the same four-byte generic header:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! | Next Payload  |C|  RESERVED   |         Payload Length        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! The typed payloads here carry their body only; the generic header is
//! written and consumed by the message codec, which owns the next-payload
//! chaining. Payload types without a typed representation are preserved as
//! [`Payload::Unknown`] so the state machine can reject them explicitly.

use crate::constants::PayloadType;
use crate::proposal::Proposal;
use crate::{Error, Result};

/// Generic payload header (RFC 7296 Section 3.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Type of the next payload in the chain
    pub next_payload: u8,

    /// Critical bit
    pub critical: bool,

    /// Total payload length including this header
    pub length: u16,
}

impl PayloadHeader {
    /// Serialized header size in bytes
    pub const SIZE: usize = 4;

    /// Create new payload header
    pub fn new(next_payload: u8, critical: bool, length: u16) -> Self {
        PayloadHeader {
            next_payload,
            critical,
            length,
        }
    }

    /// Parse header from bytes
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::BufferTooShort {
                required: Self::SIZE,
                available: data.len(),
            });
        }

        let length = u16::from_be_bytes([data[2], data[3]]);
        if (length as usize) < Self::SIZE {
            return Err(Error::InvalidLength {
                expected: Self::SIZE,
                actual: length as usize,
            });
        }

        Ok(PayloadHeader {
            next_payload: data[0],
            critical: data[1] & 0x80 != 0,
            length,
        })
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        [
            self.next_payload,
            if self.critical { 0x80 } else { 0 },
            (self.length >> 8) as u8,
            self.length as u8,
        ]
    }

    /// Body length (total minus this header)
    pub fn data_length(&self) -> usize {
        self.length as usize - Self::SIZE
    }
}

/// Security Association payload: a list of offered or selected proposals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SaPayload {
    /// Proposals in preference order
    pub proposals: Vec<Proposal>,
}

impl SaPayload {
    /// Create SA payload from proposals
    pub fn new(proposals: Vec<Proposal>) -> Self {
        SaPayload { proposals }
    }

    /// Add a proposal
    pub fn add_proposal(mut self, proposal: Proposal) -> Self {
        self.proposals.push(proposal);
        self
    }

    /// Parse SA payload body
    pub fn from_payload_data(data: &[u8]) -> Result<Self> {
        let mut proposals = Vec::new();
        let mut offset = 0;

        while offset < data.len() {
            let (proposal, is_last, consumed) = Proposal::from_bytes(&data[offset..])?;
            proposals.push(proposal);
            offset += consumed;
            if is_last {
                break;
            }
        }

        if offset != data.len() {
            return Err(Error::InvalidPayload(
                "Trailing bytes after last proposal".into(),
            ));
        }

        Ok(SaPayload { proposals })
    }

    /// Serialize SA payload body
    pub fn to_payload_data(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (i, proposal) in self.proposals.iter().enumerate() {
            bytes.extend_from_slice(&proposal.to_bytes(i == self.proposals.len() - 1));
        }
        bytes
    }
}

/// Key Exchange payload (RFC 7296 Section 3.4)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KePayload {
    /// DH group number the key data belongs to
    pub dh_group: u16,

    /// Public key-exchange data
    pub key_data: Vec<u8>,
}

impl KePayload {
    /// Create KE payload
    pub fn new(dh_group: u16, key_data: Vec<u8>) -> Self {
        KePayload { dh_group, key_data }
    }

    /// Parse KE payload body
    pub fn from_payload_data(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::BufferTooShort {
                required: 4,
                available: data.len(),
            });
        }

        let dh_group = u16::from_be_bytes([data[0], data[1]]);
        // Bytes 2-3 are reserved
        let key_data = data[4..].to_vec();

        Ok(KePayload { dh_group, key_data })
    }

    /// Serialize KE payload body
    pub fn to_payload_data(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.key_data.len());
        bytes.extend_from_slice(&self.dh_group.to_be_bytes());
        bytes.extend_from_slice(&[0u8, 0u8]);
        bytes.extend_from_slice(&self.key_data);
        bytes
    }
}

/// Nonce payload (RFC 7296 Section 3.9)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoncePayload {
    /// Nonce bytes
    pub nonce: Vec<u8>,
}

impl NoncePayload {
    /// Minimum nonce length in bytes
    pub const MIN_LEN: usize = 16;
    /// Maximum nonce length in bytes
    pub const MAX_LEN: usize = 256;

    /// Create nonce payload, enforcing the protocol bounds
    pub fn new(nonce: Vec<u8>) -> Result<Self> {
        if nonce.len() < Self::MIN_LEN || nonce.len() > Self::MAX_LEN {
            return Err(Error::InvalidPayload(format!(
                "Nonce length {} outside {}..={}",
                nonce.len(),
                Self::MIN_LEN,
                Self::MAX_LEN
            )));
        }
        Ok(NoncePayload { nonce })
    }

    /// Parse nonce payload body
    pub fn from_payload_data(data: &[u8]) -> Result<Self> {
        NoncePayload::new(data.to_vec())
    }

    /// Serialize nonce payload body
    pub fn to_payload_data(&self) -> Vec<u8> {
        self.nonce.clone()
    }
}

/// Identification Type (RFC 7296 Section 3.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum IdType {
    /// IPv4 address
    Ipv4Addr = 1,
    /// Fully-qualified domain name
    Fqdn = 2,
    /// RFC 822 email address
    Rfc822Addr = 3,
    /// IPv6 address
    Ipv6Addr = 5,
    /// Opaque key ID
    KeyId = 11,
}

impl IdType {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(IdType::Ipv4Addr),
            2 => Some(IdType::Fqdn),
            3 => Some(IdType::Rfc822Addr),
            5 => Some(IdType::Ipv6Addr),
            11 => Some(IdType::KeyId),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Identification payload, used for both IDi and IDr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdPayload {
    /// ID type
    pub id_type: IdType,

    /// Identification data
    pub data: Vec<u8>,
}

impl IdPayload {
    /// Create new ID payload
    pub fn new(id_type: IdType, data: Vec<u8>) -> Self {
        IdPayload { id_type, data }
    }

    /// Identity from an FQDN
    pub fn from_fqdn(fqdn: &str) -> Self {
        IdPayload {
            id_type: IdType::Fqdn,
            data: fqdn.as_bytes().to_vec(),
        }
    }

    /// Identity from an email address
    pub fn from_email(email: &str) -> Self {
        IdPayload {
            id_type: IdType::Rfc822Addr,
            data: email.as_bytes().to_vec(),
        }
    }

    /// Identity from an opaque key ID
    pub fn from_key_id(key_id: &[u8]) -> Self {
        IdPayload {
            id_type: IdType::KeyId,
            data: key_id.to_vec(),
        }
    }

    /// Parse ID payload body
    pub fn from_payload_data(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::BufferTooShort {
                required: 4,
                available: data.len(),
            });
        }

        let id_type = IdType::from_u8(data[0])
            .ok_or_else(|| Error::InvalidPayload(format!("Unknown ID type: {}", data[0])))?;

        // Bytes 1-3 are reserved
        Ok(IdPayload {
            id_type,
            data: data[4..].to_vec(),
        })
    }

    /// Serialize ID payload body
    pub fn to_payload_data(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.data.len());
        bytes.push(self.id_type.to_u8());
        bytes.extend_from_slice(&[0u8, 0u8, 0u8]);
        bytes.extend_from_slice(&self.data);
        bytes
    }

    /// Identity as text where the type allows it
    pub fn as_string(&self) -> Option<String> {
        match self.id_type {
            IdType::Fqdn | IdType::Rfc822Addr => String::from_utf8(self.data.clone()).ok(),
            _ => None,
        }
    }
}

/// Authentication Method (RFC 7296 Section 3.8)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthMethod {
    /// RSA digital signature
    RsaSig = 1,
    /// Shared key message integrity code (PSK)
    SharedKeyMic = 2,
    /// DSS digital signature
    DssSig = 3,
}

impl AuthMethod {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AuthMethod::RsaSig),
            2 => Some(AuthMethod::SharedKeyMic),
            3 => Some(AuthMethod::DssSig),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Authentication payload (RFC 7296 Section 3.8)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPayload {
    /// Authentication method
    pub auth_method: AuthMethod,

    /// Authentication data
    pub auth_data: Vec<u8>,
}

impl AuthPayload {
    /// Create new AUTH payload
    pub fn new(auth_method: AuthMethod, auth_data: Vec<u8>) -> Self {
        AuthPayload {
            auth_method,
            auth_data,
        }
    }

    /// Parse AUTH payload body
    pub fn from_payload_data(data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(Error::BufferTooShort {
                required: 4,
                available: data.len(),
            });
        }

        let auth_method = AuthMethod::from_u8(data[0])
            .ok_or_else(|| Error::InvalidPayload(format!("Unknown auth method: {}", data[0])))?;

        // Bytes 1-3 are reserved
        Ok(AuthPayload {
            auth_method,
            auth_data: data[4..].to_vec(),
        })
    }

    /// Serialize AUTH payload body
    pub fn to_payload_data(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.auth_data.len());
        bytes.push(self.auth_method.to_u8());
        bytes.extend_from_slice(&[0u8, 0u8, 0u8]);
        bytes.extend_from_slice(&self.auth_data);
        bytes
    }
}

/// Encrypted and Authenticated payload (RFC 7296 Section 3.14)
///
/// Carries the protected body verbatim (IV, ciphertext and any trailing
/// ICV); the message codec splits and decrypts it with the negotiated
/// transforms. The generic header's next-payload field of an SK payload
/// names the first payload *inside* the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkPayload {
    /// Type of the first inner payload
    pub first_payload: u8,

    /// IV, ciphertext and ICV as received
    pub data: Vec<u8>,
}

impl SkPayload {
    /// Create SK payload
    pub fn new(first_payload: u8, data: Vec<u8>) -> Self {
        SkPayload {
            first_payload,
            data,
        }
    }
}

/// A typed IKE payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Security Association
    Sa(SaPayload),
    /// Key Exchange
    Ke(KePayload),
    /// Nonce
    Nonce(NoncePayload),
    /// Initiator identification
    IdInit(IdPayload),
    /// Responder identification
    IdResp(IdPayload),
    /// Authentication
    Auth(AuthPayload),
    /// Encrypted and Authenticated container
    Sk(SkPayload),
    /// Recognized wire structure, type not handled by this implementation
    Unknown {
        /// Raw payload type byte
        payload_type: u8,
        /// Raw payload body
        data: Vec<u8>,
    },
}

impl Payload {
    /// Parse one payload body of the given type
    pub fn parse(payload_type: u8, data: &[u8]) -> Result<Payload> {
        match PayloadType::from_u8(payload_type) {
            Some(PayloadType::SA) => Ok(Payload::Sa(SaPayload::from_payload_data(data)?)),
            Some(PayloadType::KE) => Ok(Payload::Ke(KePayload::from_payload_data(data)?)),
            Some(PayloadType::Nonce) => Ok(Payload::Nonce(NoncePayload::from_payload_data(data)?)),
            Some(PayloadType::IDi) => Ok(Payload::IdInit(IdPayload::from_payload_data(data)?)),
            Some(PayloadType::IDr) => Ok(Payload::IdResp(IdPayload::from_payload_data(data)?)),
            Some(PayloadType::AUTH) => Ok(Payload::Auth(AuthPayload::from_payload_data(data)?)),
            _ => Ok(Payload::Unknown {
                payload_type,
                data: data.to_vec(),
            }),
        }
    }

    /// The wire type byte of this payload
    pub fn payload_type(&self) -> u8 {
        match self {
            Payload::Sa(_) => PayloadType::SA.to_u8(),
            Payload::Ke(_) => PayloadType::KE.to_u8(),
            Payload::Nonce(_) => PayloadType::Nonce.to_u8(),
            Payload::IdInit(_) => PayloadType::IDi.to_u8(),
            Payload::IdResp(_) => PayloadType::IDr.to_u8(),
            Payload::Auth(_) => PayloadType::AUTH.to_u8(),
            Payload::Sk(_) => PayloadType::SK.to_u8(),
            Payload::Unknown { payload_type, .. } => *payload_type,
        }
    }

    /// Serialize this payload's body (without the generic header)
    pub fn to_payload_data(&self) -> Vec<u8> {
        match self {
            Payload::Sa(p) => p.to_payload_data(),
            Payload::Ke(p) => p.to_payload_data(),
            Payload::Nonce(p) => p.to_payload_data(),
            Payload::IdInit(p) | Payload::IdResp(p) => p.to_payload_data(),
            Payload::Auth(p) => p.to_payload_data(),
            Payload::Sk(p) => p.data.clone(),
            Payload::Unknown { data, .. } => data.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::{DhTransformId, EncrTransformId, PrfTransformId, ProtocolId, Transform};

    #[test]
    fn test_payload_header_parse() {
        let data = [
            33,   // Next payload (SA)
            0x80, // Critical bit set
            0, 50, // Length = 50
        ];

        let header = PayloadHeader::from_bytes(&data).unwrap();
        assert_eq!(header.next_payload, 33);
        assert!(header.critical);
        assert_eq!(header.length, 50);
        assert_eq!(header.data_length(), 46);
    }

    #[test]
    fn test_payload_header_roundtrip() {
        let header = PayloadHeader::new(PayloadType::Nonce.to_u8(), false, 100);
        let bytes = header.to_bytes();
        let parsed = PayloadHeader::from_bytes(&bytes).unwrap();
        assert_eq!(header, parsed);
    }

    #[test]
    fn test_payload_header_too_short() {
        let result = PayloadHeader::from_bytes(&[1, 2]);
        assert!(matches!(result, Err(Error::BufferTooShort { .. })));
    }

    #[test]
    fn test_payload_header_invalid_length() {
        let data = [33, 0, 0, 2]; // length 2 < minimum 4
        let result = PayloadHeader::from_bytes(&data);
        assert!(matches!(result, Err(Error::InvalidLength { .. })));
    }

    #[test]
    fn test_nonce_payload_roundtrip() {
        let nonce_data = vec![1u8; 32];
        let nonce = NoncePayload::new(nonce_data.clone()).unwrap();

        let serialized = nonce.to_payload_data();
        assert_eq!(serialized, nonce_data);

        let parsed = NoncePayload::from_payload_data(&serialized).unwrap();
        assert_eq!(parsed, nonce);
    }

    #[test]
    fn test_nonce_bounds() {
        assert!(NoncePayload::new(vec![1u8; 10]).is_err());
        assert!(NoncePayload::new(vec![1u8; 300]).is_err());
        assert!(NoncePayload::new(vec![1u8; 16]).is_ok());
        assert!(NoncePayload::new(vec![1u8; 256]).is_ok());
    }

    #[test]
    fn test_ke_payload_roundtrip() {
        let key_data = vec![0xAAu8; 32];
        let ke = KePayload::new(31, key_data.clone());

        let serialized = ke.to_payload_data();
        assert_eq!(&serialized[0..2], &31u16.to_be_bytes());
        assert_eq!(&serialized[2..4], &[0u8, 0u8]);
        assert_eq!(&serialized[4..], &key_data[..]);

        let parsed = KePayload::from_payload_data(&serialized).unwrap();
        assert_eq!(parsed, ke);
    }

    #[test]
    fn test_sa_payload_roundtrip() {
        let proposal = Proposal::new(1, ProtocolId::Ike)
            .add_transform(Transform::encr(EncrTransformId::AesGcm16).with_key_length(128))
            .add_transform(Transform::prf(PrfTransformId::HmacSha256))
            .add_transform(Transform::dh(DhTransformId::Group14));
        let sa = SaPayload::new(vec![proposal]);

        let serialized = sa.to_payload_data();
        let parsed = SaPayload::from_payload_data(&serialized).unwrap();
        assert_eq!(parsed, sa);
    }

    #[test]
    fn test_sa_payload_two_proposals() {
        let p1 = Proposal::new(1, ProtocolId::Ike)
            .add_transform(Transform::prf(PrfTransformId::HmacSha256));
        let p2 = Proposal::new(2, ProtocolId::Ike)
            .add_transform(Transform::prf(PrfTransformId::HmacSha384));
        let sa = SaPayload::new(vec![p1, p2]);

        let parsed = SaPayload::from_payload_data(&sa.to_payload_data()).unwrap();
        assert_eq!(parsed.proposals.len(), 2);
        assert_eq!(parsed.proposals[1].proposal_num, 2);
    }

    #[test]
    fn test_id_payload_forms() {
        let id = IdPayload::from_fqdn("vpn.example.net");
        assert_eq!(id.id_type, IdType::Fqdn);
        assert_eq!(id.as_string().unwrap(), "vpn.example.net");

        let id = IdPayload::from_email("gateway@example.net");
        assert_eq!(id.id_type, IdType::Rfc822Addr);

        let id = IdPayload::from_key_id(&[0x01, 0x02]);
        assert_eq!(id.id_type, IdType::KeyId);
        assert!(id.as_string().is_none());
    }

    #[test]
    fn test_id_payload_roundtrip() {
        let original = IdPayload::from_email("peer@example.net");
        let parsed = IdPayload::from_payload_data(&original.to_payload_data()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_auth_payload_roundtrip() {
        let original = AuthPayload::new(AuthMethod::SharedKeyMic, vec![0xAB; 32]);
        let parsed = AuthPayload::from_payload_data(&original.to_payload_data()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_auth_method_conversion() {
        assert_eq!(AuthMethod::from_u8(2), Some(AuthMethod::SharedKeyMic));
        assert_eq!(AuthMethod::from_u8(99), None);
        assert_eq!(AuthMethod::SharedKeyMic.to_u8(), 2);
    }

    #[test]
    fn test_payload_parse_dispatch() {
        let nonce = NoncePayload::new(vec![7u8; 24]).unwrap();
        let parsed = Payload::parse(
            PayloadType::Nonce.to_u8(),
            &nonce.to_payload_data(),
        )
        .unwrap();
        assert!(matches!(parsed, Payload::Nonce(ref n) if n.nonce == vec![7u8; 24]));
    }

    #[test]
    fn test_payload_parse_unrecognized_type() {
        let parsed = Payload::parse(38, &[1, 2, 3]).unwrap();
        match parsed {
            Payload::Unknown { payload_type, data } => {
                assert_eq!(payload_type, 38);
                assert_eq!(data, vec![1, 2, 3]);
            }
            other => panic!("Expected Unknown payload, got {:?}", other),
        }
    }

    #[test]
    fn test_payload_type_byte() {
        let nonce = Payload::Nonce(NoncePayload::new(vec![0u8; 16]).unwrap());
        assert_eq!(nonce.payload_type(), 40);

        let unknown = Payload::Unknown {
            payload_type: 43,
            data: vec![],
        };
        assert_eq!(unknown.payload_type(), 43);
    }
}
