//! IKE message structure, parsing and generation
//!
//! Implements the IKE message format defined in RFC 7296 Section 3.1: the
//! 28-byte fixed header, the chained payloads after it, and the SK
//! (Encrypted) payload that wraps the chain once keys are installed.
//!
//! Parsing happens in two stages. [`Message::from_datagram`] reads only
//! the fixed header, enough to route the datagram to a session by SPI;
//! [`Message::parse_body`] walks the payload chain, decrypting the SK
//! payload when the session supplies its keys.

use crate::constants::{
    ExchangeType, IkeFlags, PayloadType, IKE_HEADER_SIZE, IKE_VERSION, MAX_IKE_MESSAGE_SIZE,
};
use crate::crypto::{Crypter, Signer};
use crate::payload::{
    AuthPayload, IdPayload, KePayload, NoncePayload, Payload, PayloadHeader, SaPayload,
};
use crate::{Error, Result};

use rand::RngCore;

/// CBC suites pad the inner plaintext to this block size
const PAD_BLOCK_SIZE: usize = 16;

/// IKE message header (28 bytes)
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       IKE SA Initiator's SPI                  |
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                       IKE SA Responder's SPI                  |
/// |                                                               |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Next Payload | MjVer | MnVer | Exchange Type |     Flags     |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                          Message ID                           |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                            Length                             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IkeHeader {
    /// Initiator's Security Parameter Index (8 bytes)
    pub initiator_spi: [u8; 8],

    /// Responder's Security Parameter Index (zero in the IKE_SA_INIT request)
    pub responder_spi: [u8; 8],

    /// Next payload type
    pub next_payload: PayloadType,

    /// Protocol version (must be 0x20 for IKEv2)
    pub version: u8,

    /// Exchange type
    pub exchange_type: ExchangeType,

    /// Message flags
    pub flags: IkeFlags,

    /// Message ID (request/response matching, retransmission detection)
    pub message_id: u32,

    /// Total message length in bytes (including header)
    pub length: u32,
}

impl IkeHeader {
    /// Create a new IKE header
    pub fn new(
        initiator_spi: [u8; 8],
        responder_spi: [u8; 8],
        next_payload: PayloadType,
        exchange_type: ExchangeType,
        flags: IkeFlags,
        message_id: u32,
        length: u32,
    ) -> Self {
        IkeHeader {
            initiator_spi,
            responder_spi,
            next_payload,
            version: IKE_VERSION,
            exchange_type,
            flags,
            message_id,
            length,
        }
    }

    /// Parse IKE header from bytes
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Buffer is too short (< 28 bytes)
    /// - Protocol version is not 0x20
    /// - Exchange type is unknown
    /// - Message length is invalid
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < IKE_HEADER_SIZE {
            return Err(Error::BufferTooShort {
                required: IKE_HEADER_SIZE,
                available: data.len(),
            });
        }

        let mut initiator_spi = [0u8; 8];
        let mut responder_spi = [0u8; 8];
        initiator_spi.copy_from_slice(&data[0..8]);
        responder_spi.copy_from_slice(&data[8..16]);

        let next_payload = PayloadType::from_u8(data[16])
            .ok_or_else(|| Error::InvalidPayload(format!("Unknown payload type: {}", data[16])))?;

        let version = data[17];
        if version != IKE_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let exchange_type =
            ExchangeType::from_u8(data[18]).ok_or(Error::UnsupportedExchangeType(data[18]))?;

        let flags = IkeFlags::new(data[19]);

        let message_id = u32::from_be_bytes([data[20], data[21], data[22], data[23]]);
        let length = u32::from_be_bytes([data[24], data[25], data[26], data[27]]);

        if length as usize > MAX_IKE_MESSAGE_SIZE {
            return Err(Error::MessageTooLarge(length as usize));
        }

        if (length as usize) < IKE_HEADER_SIZE {
            return Err(Error::InvalidLength {
                expected: IKE_HEADER_SIZE,
                actual: length as usize,
            });
        }

        Ok(IkeHeader {
            initiator_spi,
            responder_spi,
            next_payload,
            version,
            exchange_type,
            flags,
            message_id,
            length,
        })
    }

    /// Serialize IKE header to bytes
    pub fn to_bytes(&self) -> [u8; IKE_HEADER_SIZE] {
        let mut bytes = [0u8; IKE_HEADER_SIZE];

        bytes[0..8].copy_from_slice(&self.initiator_spi);
        bytes[8..16].copy_from_slice(&self.responder_spi);
        bytes[16] = self.next_payload.to_u8();
        bytes[17] = self.version;
        bytes[18] = self.exchange_type.to_u8();
        bytes[19] = self.flags.value();
        bytes[20..24].copy_from_slice(&self.message_id.to_be_bytes());
        bytes[24..28].copy_from_slice(&self.length.to_be_bytes());

        bytes
    }
}

/// One IKE message, either received from the wire or under construction.
///
/// Outbound messages accumulate payloads and serialize once through
/// [`Message::generate`]; the resulting bytes are cached so retransmission
/// and AUTH octet construction see the exact wire image. Inbound messages
/// keep the datagram bytes and parse the chain on demand.
#[derive(Debug, Clone)]
pub struct Message {
    /// Fixed header
    pub header: IkeHeader,

    /// Parsed payloads (inner payloads for protected messages)
    payloads: Vec<Payload>,

    /// Unparsed bytes after the header, until `parse_body` consumes them
    body: Option<Vec<u8>>,

    /// Complete wire image, set on receive and after generation
    raw: Option<Vec<u8>>,
}

impl Message {
    /// Create an empty outbound message under the given header
    ///
    /// The header's next payload and length fields are filled in by
    /// [`Message::generate`].
    pub fn new(header: IkeHeader) -> Self {
        Message {
            header,
            payloads: Vec::new(),
            body: None,
            raw: None,
        }
    }

    /// Parse the fixed header of a received datagram
    ///
    /// The payload chain stays unparsed until [`Message::parse_body`];
    /// the header alone is enough to route the datagram to a session.
    pub fn from_datagram(data: &[u8]) -> Result<Self> {
        let header = IkeHeader::from_bytes(data)?;

        if header.length as usize != data.len() {
            return Err(Error::InvalidLength {
                expected: header.length as usize,
                actual: data.len(),
            });
        }

        Ok(Message {
            header,
            payloads: Vec::new(),
            body: Some(data[IKE_HEADER_SIZE..].to_vec()),
            raw: Some(data.to_vec()),
        })
    }

    /// Append a payload to an outbound message
    pub fn add_payload(&mut self, payload: Payload) {
        self.payloads.push(payload);
    }

    /// The parsed payloads
    pub fn payloads(&self) -> &[Payload] {
        &self.payloads
    }

    /// The wire image, if the message has been received or generated
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    /// First SA payload, if present
    pub fn sa_payload(&self) -> Option<&SaPayload> {
        self.payloads.iter().find_map(|p| match p {
            Payload::Sa(sa) => Some(sa),
            _ => None,
        })
    }

    /// First KE payload, if present
    pub fn ke_payload(&self) -> Option<&KePayload> {
        self.payloads.iter().find_map(|p| match p {
            Payload::Ke(ke) => Some(ke),
            _ => None,
        })
    }

    /// First nonce payload, if present
    pub fn nonce_payload(&self) -> Option<&NoncePayload> {
        self.payloads.iter().find_map(|p| match p {
            Payload::Nonce(nonce) => Some(nonce),
            _ => None,
        })
    }

    /// IDi payload, if present
    pub fn id_initiator(&self) -> Option<&IdPayload> {
        self.payloads.iter().find_map(|p| match p {
            Payload::IdInit(id) => Some(id),
            _ => None,
        })
    }

    /// IDr payload, if present
    pub fn id_responder(&self) -> Option<&IdPayload> {
        self.payloads.iter().find_map(|p| match p {
            Payload::IdResp(id) => Some(id),
            _ => None,
        })
    }

    /// AUTH payload, if present
    pub fn auth_payload(&self) -> Option<&AuthPayload> {
        self.payloads.iter().find_map(|p| match p {
            Payload::Auth(auth) => Some(auth),
            _ => None,
        })
    }

    /// Parse the payload chain of a received message
    ///
    /// Plain chains need no keys. A message carrying an SK payload needs
    /// the receiving direction's crypter, and for non-AEAD suites the
    /// signer; the SK payload must close the outer chain.
    pub fn parse_body(
        &mut self,
        crypter: Option<&Crypter>,
        signer: Option<&Signer>,
    ) -> Result<()> {
        let body = match self.body.take() {
            Some(body) => body,
            None => return Ok(()),
        };

        let mut next = self.header.next_payload.to_u8();
        let mut offset = 0;

        while next != PayloadType::None.to_u8() {
            let ph = PayloadHeader::from_bytes(&body[offset..])?;
            let total = ph.length as usize;
            if total < PayloadHeader::SIZE {
                return Err(Error::InvalidLength {
                    expected: PayloadHeader::SIZE,
                    actual: total,
                });
            }
            if offset + total > body.len() {
                return Err(Error::BufferTooShort {
                    required: offset + total,
                    available: body.len(),
                });
            }
            let data = &body[offset + PayloadHeader::SIZE..offset + total];

            if next == PayloadType::SK.to_u8() {
                offset += total;
                if offset != body.len() {
                    return Err(Error::InvalidPayload(
                        "Encrypted payload must close the message".into(),
                    ));
                }

                let crypter = crypter.ok_or_else(|| {
                    Error::ProtocolMismatch(
                        "received encrypted payload before keys were installed".into(),
                    )
                })?;
                // sk_data_start is the AAD boundary: everything before the
                // ciphertext is authenticated
                let sk_data_start = IKE_HEADER_SIZE + offset - data.len();
                let plaintext = self.decrypt_sk(data, sk_data_start, crypter, signer)?;

                let inner = parse_payload_chain(&plaintext, ph.next_payload)?;
                self.payloads.extend(inner);
                next = PayloadType::None.to_u8();
            } else {
                let payload = Payload::parse(next, data)?;
                if ph.critical && matches!(payload, Payload::Unknown { .. }) {
                    return Err(Error::UnsupportedPayload(next));
                }
                self.payloads.push(payload);
                next = ph.next_payload;
                offset += total;
            }
        }

        if offset != body.len() {
            return Err(Error::InvalidPayload(
                "Trailing bytes after payload chain".into(),
            ));
        }

        Ok(())
    }

    fn decrypt_sk(
        &self,
        sk_data: &[u8],
        sk_data_start: usize,
        crypter: &Crypter,
        signer: Option<&Signer>,
    ) -> Result<Vec<u8>> {
        let raw = self
            .raw
            .as_deref()
            .ok_or_else(|| Error::Internal("received message lacks raw bytes".into()))?;

        let iv_len = crypter.algorithm().iv_len();

        let padded = if crypter.algorithm().is_aead() {
            if sk_data.len() < iv_len + crypter.algorithm().tag_len() {
                return Err(Error::BufferTooShort {
                    required: iv_len + crypter.algorithm().tag_len(),
                    available: sk_data.len(),
                });
            }
            // Header bytes through the SK payload header are authenticated
            // as associated data
            let aad = &raw[..sk_data_start];
            let iv = &sk_data[..iv_len];
            let ciphertext = &sk_data[iv_len..];
            crypter.decrypt(iv, ciphertext, aad)?
        } else {
            let signer = signer.ok_or_else(|| {
                Error::CryptoFailed("non-AEAD suite requires an integrity signer".into())
            })?;
            let icv_len = signer.algorithm().icv_len();
            if sk_data.len() < iv_len + icv_len + PAD_BLOCK_SIZE {
                return Err(Error::BufferTooShort {
                    required: iv_len + icv_len + PAD_BLOCK_SIZE,
                    available: sk_data.len(),
                });
            }

            // Checksum covers the message from the first header octet
            // through the ciphertext
            let icv_start = raw.len() - icv_len;
            if !signer.verify(&raw[..icv_start], &raw[icv_start..]) {
                return Err(Error::CryptoFailed(
                    "message integrity check failed".into(),
                ));
            }

            let iv = &sk_data[..iv_len];
            let ciphertext = &sk_data[iv_len..sk_data.len() - icv_len];
            crypter.decrypt(iv, ciphertext, &[])?
        };

        strip_padding(padded)
    }

    /// Serialize the message to wire bytes
    ///
    /// Without a crypter the payloads are chained in the clear. With one,
    /// the chain is padded, encrypted and wrapped in an SK payload; AEAD
    /// suites authenticate the header bytes as associated data, non-AEAD
    /// suites append a truncated HMAC checksum computed by `signer`.
    ///
    /// The result is cached: repeated calls return the identical wire
    /// image, which retransmission and AUTH octet construction rely on.
    pub fn generate(
        &mut self,
        crypter: Option<&Crypter>,
        signer: Option<&Signer>,
    ) -> Result<Vec<u8>> {
        if let Some(raw) = &self.raw {
            return Ok(raw.clone());
        }

        let raw = match crypter {
            None => self.generate_plain()?,
            Some(crypter) => self.generate_protected(crypter, signer)?,
        };

        self.raw = Some(raw.clone());
        Ok(raw)
    }

    fn generate_plain(&mut self) -> Result<Vec<u8>> {
        let chained = chain_payloads(&self.payloads)?;

        let total = IKE_HEADER_SIZE + chained.len();
        if total > MAX_IKE_MESSAGE_SIZE {
            return Err(Error::MessageTooLarge(total));
        }

        self.header.next_payload = self
            .payloads
            .first()
            .and_then(|p| PayloadType::from_u8(p.payload_type()))
            .unwrap_or(PayloadType::None);
        self.header.length = total as u32;

        let mut bytes = Vec::with_capacity(total);
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&chained);
        Ok(bytes)
    }

    fn generate_protected(
        &mut self,
        crypter: &Crypter,
        signer: Option<&Signer>,
    ) -> Result<Vec<u8>> {
        let is_aead = crypter.algorithm().is_aead();
        let signer = match (is_aead, signer) {
            (true, _) => None,
            (false, Some(signer)) => Some(signer),
            (false, None) => {
                return Err(Error::CryptoFailed(
                    "non-AEAD suite requires an integrity signer".into(),
                ))
            }
        };

        let plaintext = chain_payloads(&self.payloads)?;

        // Pad to the cipher block and append the pad-length byte
        let block = if is_aead { 1 } else { PAD_BLOCK_SIZE };
        let pad_len = (block - (plaintext.len() + 1) % block) % block;
        let mut padded = plaintext;
        padded.resize(padded.len() + pad_len, 0);
        padded.push(pad_len as u8);

        let iv_len = crypter.algorithm().iv_len();
        let tag_len = crypter.algorithm().tag_len();
        let icv_len = signer.map(|s| s.algorithm().icv_len()).unwrap_or(0);

        let sk_data_len = iv_len + padded.len() + tag_len + icv_len;
        let sk_total = PayloadHeader::SIZE + sk_data_len;
        let total = IKE_HEADER_SIZE + sk_total;
        if sk_total > u16::MAX as usize || total > MAX_IKE_MESSAGE_SIZE {
            return Err(Error::MessageTooLarge(total));
        }

        // Final header and SK payload header are fixed before encryption;
        // AEAD suites authenticate exactly these bytes
        let first_inner = self
            .payloads
            .first()
            .map(|p| p.payload_type())
            .unwrap_or(PayloadType::None.to_u8());
        self.header.next_payload = PayloadType::SK;
        self.header.length = total as u32;

        let sk_header = PayloadHeader::new(first_inner, false, sk_total as u16);

        let mut bytes = Vec::with_capacity(total);
        bytes.extend_from_slice(&self.header.to_bytes());
        bytes.extend_from_slice(&sk_header.to_bytes());

        let mut iv = vec![0u8; iv_len];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = if is_aead {
            let aad = &bytes[..];
            crypter.encrypt(&iv, &padded, aad)?
        } else {
            crypter.encrypt(&iv, &padded, &[])?
        };

        bytes.extend_from_slice(&iv);
        bytes.extend_from_slice(&ciphertext);

        if let Some(signer) = signer {
            let icv = signer.sign(&bytes);
            bytes.extend_from_slice(&icv);
        }

        Ok(bytes)
    }
}

/// Serialize payloads into one chain, each header naming its successor
fn chain_payloads(payloads: &[Payload]) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    for (i, payload) in payloads.iter().enumerate() {
        let next = payloads
            .get(i + 1)
            .map(|p| p.payload_type())
            .unwrap_or(PayloadType::None.to_u8());
        let data = payload.to_payload_data();

        let total = PayloadHeader::SIZE + data.len();
        if total > u16::MAX as usize {
            return Err(Error::MessageTooLarge(IKE_HEADER_SIZE + total));
        }

        let header = PayloadHeader::new(next, false, total as u16);
        out.extend_from_slice(&header.to_bytes());
        out.extend_from_slice(&data);
    }

    Ok(out)
}

/// Parse a chain of payloads starting with type `first`
fn parse_payload_chain(data: &[u8], first: u8) -> Result<Vec<Payload>> {
    let mut payloads = Vec::new();
    let mut next = first;
    let mut offset = 0;

    while next != PayloadType::None.to_u8() {
        let ph = PayloadHeader::from_bytes(&data[offset..])?;
        let total = ph.length as usize;
        if total < PayloadHeader::SIZE {
            return Err(Error::InvalidLength {
                expected: PayloadHeader::SIZE,
                actual: total,
            });
        }
        if offset + total > data.len() {
            return Err(Error::BufferTooShort {
                required: offset + total,
                available: data.len(),
            });
        }

        let payload = Payload::parse(next, &data[offset + PayloadHeader::SIZE..offset + total])?;
        if ph.critical && matches!(payload, Payload::Unknown { .. }) {
            return Err(Error::UnsupportedPayload(next));
        }
        payloads.push(payload);

        next = ph.next_payload;
        offset += total;
    }

    if offset != data.len() {
        return Err(Error::InvalidPayload(
            "Trailing bytes after payload chain".into(),
        ));
    }

    Ok(payloads)
}

/// Strip RFC 7296 Section 3.14 padding: the last byte counts the pad
/// bytes before it
fn strip_padding(mut padded: Vec<u8>) -> Result<Vec<u8>> {
    let pad_len = match padded.last() {
        Some(&pad_len) => pad_len as usize,
        None => {
            return Err(Error::InvalidPayload(
                "Decrypted payload is empty".into(),
            ))
        }
    };

    if pad_len + 1 > padded.len() {
        return Err(Error::InvalidPayload(
            "Invalid pad length in decrypted payload".into(),
        ));
    }

    padded.truncate(padded.len() - 1 - pad_len);
    Ok(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunk;
    use crate::crypto::{CipherAlgorithm, IntegAlgorithm};
    use crate::payload::IdType;
    use crate::proposal::{
        DhTransformId, EncrTransformId, PrfTransformId, Proposal, ProtocolId, Transform,
    };

    fn test_header(exchange_type: ExchangeType, flags: IkeFlags, message_id: u32) -> IkeHeader {
        IkeHeader::new(
            [0x11; 8],
            [0x22; 8],
            PayloadType::None,
            exchange_type,
            flags,
            message_id,
            0,
        )
    }

    fn init_request_message() -> Message {
        let proposal = Proposal::new(1, ProtocolId::Ike)
            .add_transform(Transform::encr(EncrTransformId::AesGcm16).with_key_length(128))
            .add_transform(Transform::prf(PrfTransformId::HmacSha256))
            .add_transform(Transform::dh(DhTransformId::Group14));

        let mut message = Message::new(test_header(
            ExchangeType::IkeSaInit,
            IkeFlags::request(true),
            0,
        ));
        message.add_payload(Payload::Sa(SaPayload::new(vec![proposal])));
        message.add_payload(Payload::Ke(KePayload::new(14, vec![0xAB; 256])));
        message.add_payload(Payload::Nonce(NoncePayload::new(vec![0xCD; 32]).unwrap()));
        message
    }

    fn gcm_crypter() -> Crypter {
        Crypter::new(CipherAlgorithm::AesGcm128, Chunk::new(vec![0x42; 20])).unwrap()
    }

    #[test]
    fn test_header_roundtrip() {
        let header = IkeHeader::new(
            [1, 2, 3, 4, 5, 6, 7, 8],
            [9, 10, 11, 12, 13, 14, 15, 16],
            PayloadType::SA,
            ExchangeType::IkeSaInit,
            IkeFlags::request(true),
            42,
            100,
        );

        let bytes = header.to_bytes();
        let parsed = IkeHeader::from_bytes(&bytes).unwrap();

        assert_eq!(header, parsed);
    }

    #[test]
    fn test_header_rejects_wrong_version() {
        let mut data = [0u8; 28];
        data[16] = 33;
        data[17] = 0x10;
        data[18] = 34;
        data[24..28].copy_from_slice(&28u32.to_be_bytes());

        let result = IkeHeader::from_bytes(&data);
        assert!(matches!(result, Err(Error::UnsupportedVersion(0x10))));
    }

    #[test]
    fn test_header_rejects_unknown_exchange() {
        let mut data = [0u8; 28];
        data[16] = 33;
        data[17] = 0x20;
        data[18] = 99;
        data[24..28].copy_from_slice(&28u32.to_be_bytes());

        let result = IkeHeader::from_bytes(&data);
        assert!(matches!(result, Err(Error::UnsupportedExchangeType(99))));
    }

    #[test]
    fn test_header_rejects_oversize_length() {
        let mut data = [0u8; 28];
        data[16] = 33;
        data[17] = 0x20;
        data[18] = 34;
        data[24..28].copy_from_slice(&70000u32.to_be_bytes());

        let result = IkeHeader::from_bytes(&data);
        assert!(matches!(result, Err(Error::MessageTooLarge(70000))));
    }

    #[test]
    fn test_header_rejects_undersize_length() {
        let mut data = [0u8; 28];
        data[16] = 33;
        data[17] = 0x20;
        data[18] = 34;
        data[24..28].copy_from_slice(&20u32.to_be_bytes());

        let result = IkeHeader::from_bytes(&data);
        assert!(matches!(result, Err(Error::InvalidLength { .. })));
    }

    #[test]
    fn test_plain_message_roundtrip() {
        let mut message = init_request_message();
        let bytes = message.generate(None, None).unwrap();

        assert_eq!(message.header.next_payload, PayloadType::SA);
        assert_eq!(message.header.length as usize, bytes.len());

        let mut parsed = Message::from_datagram(&bytes).unwrap();
        parsed.parse_body(None, None).unwrap();

        assert_eq!(parsed.payloads().len(), 3);
        let sa = parsed.sa_payload().unwrap();
        assert_eq!(sa.proposals.len(), 1);
        assert_eq!(parsed.ke_payload().unwrap().dh_group, 14);
        assert_eq!(parsed.nonce_payload().unwrap().nonce.len(), 32);
    }

    #[test]
    fn test_datagram_length_must_match_header() {
        let mut message = init_request_message();
        let mut bytes = message.generate(None, None).unwrap();
        bytes.push(0);

        let result = Message::from_datagram(&bytes);
        assert!(matches!(result, Err(Error::InvalidLength { .. })));
    }

    #[test]
    fn test_generate_is_cached() {
        let mut message = init_request_message();
        let first = message.generate(None, None).unwrap();
        let second = message.generate(None, None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_protected_generate_is_cached() {
        let crypter = gcm_crypter();
        let mut message = Message::new(test_header(
            ExchangeType::IkeAuth,
            IkeFlags::request(true),
            1,
        ));
        message.add_payload(Payload::IdInit(IdPayload::from_fqdn("initiator.test")));

        // A second call must not re-encrypt under a fresh IV
        let first = message.generate(Some(&crypter), None).unwrap();
        let second = message.generate(Some(&crypter), None).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_protected_roundtrip_aead() {
        let crypter = gcm_crypter();

        let mut message = Message::new(test_header(
            ExchangeType::IkeAuth,
            IkeFlags::request(true),
            1,
        ));
        message.add_payload(Payload::IdInit(IdPayload::from_fqdn("initiator.test")));
        message.add_payload(Payload::Auth(AuthPayload::new(
            crate::payload::AuthMethod::SharedKeyMic,
            vec![0x77; 32],
        )));

        let bytes = message.generate(Some(&crypter), None).unwrap();

        // On the wire: header, then a single SK payload
        assert_eq!(message.header.next_payload, PayloadType::SK);

        let mut parsed = Message::from_datagram(&bytes).unwrap();
        parsed.parse_body(Some(&crypter), None).unwrap();

        assert_eq!(parsed.payloads().len(), 2);
        assert_eq!(
            parsed.id_initiator().unwrap().as_string().as_deref(),
            Some("initiator.test")
        );
        assert_eq!(parsed.auth_payload().unwrap().auth_data, vec![0x77; 32]);
    }

    #[test]
    fn test_protected_roundtrip_cbc() {
        let crypter =
            Crypter::new(CipherAlgorithm::AesCbc256, Chunk::new(vec![0x51; 32])).unwrap();
        let signer = Signer::new(IntegAlgorithm::HmacSha256_128, Chunk::new(vec![0x52; 32]))
            .unwrap();

        let mut message = Message::new(test_header(
            ExchangeType::IkeAuth,
            IkeFlags::response(false),
            1,
        ));
        message.add_payload(Payload::IdResp(IdPayload::from_fqdn("responder.test")));

        let bytes = message.generate(Some(&crypter), Some(&signer)).unwrap();

        let mut parsed = Message::from_datagram(&bytes).unwrap();
        parsed.parse_body(Some(&crypter), Some(&signer)).unwrap();

        assert_eq!(
            parsed.id_responder().unwrap().as_string().as_deref(),
            Some("responder.test")
        );
    }

    #[test]
    fn test_cbc_detects_corruption() {
        let crypter =
            Crypter::new(CipherAlgorithm::AesCbc128, Chunk::new(vec![0x61; 16])).unwrap();
        let signer = Signer::new(IntegAlgorithm::HmacSha256_128, Chunk::new(vec![0x62; 32]))
            .unwrap();

        let mut message = Message::new(test_header(
            ExchangeType::IkeAuth,
            IkeFlags::request(true),
            1,
        ));
        message.add_payload(Payload::IdInit(IdPayload::from_fqdn("initiator.test")));

        let mut bytes = message.generate(Some(&crypter), Some(&signer)).unwrap();
        let middle = bytes.len() / 2;
        bytes[middle] ^= 0xFF;

        let mut parsed = Message::from_datagram(&bytes).unwrap();
        let result = parsed.parse_body(Some(&crypter), Some(&signer));
        assert!(matches!(result, Err(Error::CryptoFailed(_))));
    }

    #[test]
    fn test_aead_binds_header() {
        let crypter = gcm_crypter();

        let mut message = Message::new(test_header(
            ExchangeType::IkeAuth,
            IkeFlags::request(true),
            1,
        ));
        message.add_payload(Payload::IdInit(IdPayload::from_fqdn("initiator.test")));

        let mut bytes = message.generate(Some(&crypter), None).unwrap();
        // Flip a message ID byte: decryption must fail even though the
        // ciphertext is untouched
        bytes[23] ^= 0x01;

        let mut parsed = Message::from_datagram(&bytes).unwrap();
        let result = parsed.parse_body(Some(&crypter), None);
        assert!(matches!(result, Err(Error::CryptoFailed(_))));
    }

    #[test]
    fn test_wrong_key_fails() {
        let crypter = gcm_crypter();
        let other =
            Crypter::new(CipherAlgorithm::AesGcm128, Chunk::new(vec![0x43; 20])).unwrap();

        let mut message = Message::new(test_header(
            ExchangeType::IkeAuth,
            IkeFlags::request(true),
            1,
        ));
        message.add_payload(Payload::IdInit(IdPayload::from_fqdn("initiator.test")));

        let bytes = message.generate(Some(&crypter), None).unwrap();

        let mut parsed = Message::from_datagram(&bytes).unwrap();
        let result = parsed.parse_body(Some(&other), None);
        assert!(matches!(result, Err(Error::CryptoFailed(_))));
    }

    #[test]
    fn test_sk_without_keys_is_rejected() {
        let crypter = gcm_crypter();

        let mut message = Message::new(test_header(
            ExchangeType::IkeAuth,
            IkeFlags::request(true),
            1,
        ));
        message.add_payload(Payload::IdInit(IdPayload::from_fqdn("initiator.test")));

        let bytes = message.generate(Some(&crypter), None).unwrap();

        let mut parsed = Message::from_datagram(&bytes).unwrap();
        let result = parsed.parse_body(None, None);
        assert!(matches!(result, Err(Error::ProtocolMismatch(_))));
    }

    #[test]
    fn test_oversized_message_rejected_at_generation() {
        let mut message = Message::new(test_header(
            ExchangeType::IkeAuth,
            IkeFlags::request(true),
            1,
        ));
        message.add_payload(Payload::IdInit(IdPayload::new(
            IdType::KeyId,
            vec![0x5A; 70_000],
        )));

        let result = message.generate(None, None);
        assert!(matches!(result, Err(Error::MessageTooLarge(_))));
    }

    #[test]
    fn test_critical_unknown_payload_rejected() {
        // Hand-built message: header, then one unknown payload (200)
        // with the critical bit set
        let mut payload = Vec::new();
        payload.extend_from_slice(&PayloadHeader::new(0, true, 8).to_bytes());
        payload.extend_from_slice(&[0xAA; 4]);

        let header = IkeHeader::new(
            [0x11; 8],
            [0x22; 8],
            PayloadType::CP,
            ExchangeType::IkeSaInit,
            IkeFlags::request(true),
            0,
            (IKE_HEADER_SIZE + 8) as u32,
        );
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend_from_slice(&payload);

        let mut parsed = Message::from_datagram(&bytes).unwrap();
        let result = parsed.parse_body(None, None);
        assert!(matches!(result, Err(Error::UnsupportedPayload(47))));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut message = init_request_message();
        let bytes = message.generate(None, None).unwrap();

        // Graft four stray bytes into the body and fix up the length
        let mut tampered = bytes.clone();
        tampered.extend_from_slice(&[0xEE; 4]);
        let new_len = (tampered.len() as u32).to_be_bytes();
        tampered[24..28].copy_from_slice(&new_len);

        let mut parsed = Message::from_datagram(&tampered).unwrap();
        let result = parsed.parse_body(None, None);
        assert!(matches!(result, Err(Error::InvalidPayload(_))));
    }

    #[test]
    fn test_empty_protected_message() {
        let crypter = gcm_crypter();

        let mut message = Message::new(test_header(
            ExchangeType::Informational,
            IkeFlags::request(true),
            2,
        ));

        let bytes = message.generate(Some(&crypter), None).unwrap();

        let mut parsed = Message::from_datagram(&bytes).unwrap();
        parsed.parse_body(Some(&crypter), None).unwrap();
        assert!(parsed.payloads().is_empty());
    }
}
