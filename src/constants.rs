//! IKEv2 protocol constants (RFC 7296).

use std::fmt;

/// IKE version 2 (major version = 2, minor version = 0)
pub const IKE_VERSION: u8 = 0x20;

/// Maximum IKE message size in bytes
pub const MAX_IKE_MESSAGE_SIZE: usize = 65535;

/// Fixed IKE header size (28 bytes)
pub const IKE_HEADER_SIZE: usize = 28;

/// Exchange Types (RFC 7296 Section 3.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExchangeType {
    /// IKE_SA_INIT exchange (34)
    IkeSaInit = 34,
    /// IKE_AUTH exchange (35)
    IkeAuth = 35,
    /// CREATE_CHILD_SA exchange (36)
    CreateChildSa = 36,
    /// INFORMATIONAL exchange (37)
    Informational = 37,
}

impl ExchangeType {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            34 => Some(ExchangeType::IkeSaInit),
            35 => Some(ExchangeType::IkeAuth),
            36 => Some(ExchangeType::CreateChildSa),
            37 => Some(ExchangeType::Informational),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeType::IkeSaInit => "IKE_SA_INIT",
            ExchangeType::IkeAuth => "IKE_AUTH",
            ExchangeType::CreateChildSa => "CREATE_CHILD_SA",
            ExchangeType::Informational => "INFORMATIONAL",
        };
        f.write_str(name)
    }
}

/// IKE message flags (RFC 7296 Section 3.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IkeFlags(u8);

impl IkeFlags {
    /// Response flag (bit 5)
    pub const RESPONSE: u8 = 0x20;
    /// Version flag (bit 4)
    pub const VERSION: u8 = 0x10;
    /// Initiator flag (bit 3)
    pub const INITIATOR: u8 = 0x08;

    /// Create flags from a raw byte, keeping only the defined bits
    pub fn new(value: u8) -> Self {
        IkeFlags(value & 0x38)
    }

    /// Flags for a request sent by the given role
    pub fn request(is_initiator: bool) -> Self {
        if is_initiator {
            IkeFlags(Self::INITIATOR)
        } else {
            IkeFlags(0)
        }
    }

    /// Flags for a response sent by the given role
    pub fn response(is_initiator: bool) -> Self {
        let mut flags = Self::RESPONSE;
        if is_initiator {
            flags |= Self::INITIATOR;
        }
        IkeFlags(flags)
    }

    /// Whether the response bit is set
    pub fn is_response(self) -> bool {
        (self.0 & Self::RESPONSE) != 0
    }

    /// Whether the response bit is clear
    pub fn is_request(self) -> bool {
        !self.is_response()
    }

    /// Whether the message was sent by the original initiator
    pub fn is_initiator(self) -> bool {
        (self.0 & Self::INITIATOR) != 0
    }

    /// Raw flag byte
    pub fn value(self) -> u8 {
        self.0
    }
}

/// Payload Types (RFC 7296 Section 3.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PayloadType {
    /// No next payload (0)
    None = 0,
    /// Security Association (33)
    SA = 33,
    /// Key Exchange (34)
    KE = 34,
    /// Identification - Initiator (35)
    IDi = 35,
    /// Identification - Responder (36)
    IDr = 36,
    /// Certificate (37)
    CERT = 37,
    /// Certificate Request (38)
    CERTREQ = 38,
    /// Authentication (39)
    AUTH = 39,
    /// Nonce (40)
    Nonce = 40,
    /// Notify (41)
    N = 41,
    /// Delete (42)
    D = 42,
    /// Vendor ID (43)
    V = 43,
    /// Traffic Selector - Initiator (44)
    TSi = 44,
    /// Traffic Selector - Responder (45)
    TSr = 45,
    /// Encrypted and Authenticated (46)
    SK = 46,
    /// Configuration (47)
    CP = 47,
    /// Extensible Authentication (48)
    EAP = 48,
}

impl PayloadType {
    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(PayloadType::None),
            33 => Some(PayloadType::SA),
            34 => Some(PayloadType::KE),
            35 => Some(PayloadType::IDi),
            36 => Some(PayloadType::IDr),
            37 => Some(PayloadType::CERT),
            38 => Some(PayloadType::CERTREQ),
            39 => Some(PayloadType::AUTH),
            40 => Some(PayloadType::Nonce),
            41 => Some(PayloadType::N),
            42 => Some(PayloadType::D),
            43 => Some(PayloadType::V),
            44 => Some(PayloadType::TSi),
            45 => Some(PayloadType::TSr),
            46 => Some(PayloadType::SK),
            47 => Some(PayloadType::CP),
            48 => Some(PayloadType::EAP),
            _ => None,
        }
    }

    /// Convert to u8
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exchange_type_conversion() {
        assert_eq!(ExchangeType::from_u8(34), Some(ExchangeType::IkeSaInit));
        assert_eq!(ExchangeType::from_u8(35), Some(ExchangeType::IkeAuth));
        assert_eq!(ExchangeType::from_u8(36), Some(ExchangeType::CreateChildSa));
        assert_eq!(ExchangeType::from_u8(37), Some(ExchangeType::Informational));
        assert_eq!(ExchangeType::from_u8(99), None);

        assert_eq!(ExchangeType::IkeSaInit.to_u8(), 34);
        assert_eq!(ExchangeType::IkeAuth.to_u8(), 35);
    }

    #[test]
    fn test_exchange_type_display() {
        assert_eq!(ExchangeType::IkeSaInit.to_string(), "IKE_SA_INIT");
        assert_eq!(ExchangeType::IkeAuth.to_string(), "IKE_AUTH");
    }

    #[test]
    fn test_ike_flags() {
        let flags = IkeFlags::request(true);
        assert!(flags.is_request());
        assert!(!flags.is_response());
        assert!(flags.is_initiator());

        let flags = IkeFlags::response(false);
        assert!(flags.is_response());
        assert!(!flags.is_initiator());

        let flags = IkeFlags::response(true);
        assert!(flags.is_response());
        assert!(flags.is_initiator());
        assert_eq!(flags.value(), IkeFlags::RESPONSE | IkeFlags::INITIATOR);
    }

    #[test]
    fn test_flags_mask_undefined_bits() {
        let flags = IkeFlags::new(0xFF);
        assert_eq!(flags.value(), 0x38);
    }

    #[test]
    fn test_payload_type_conversion() {
        assert_eq!(PayloadType::from_u8(0), Some(PayloadType::None));
        assert_eq!(PayloadType::from_u8(33), Some(PayloadType::SA));
        assert_eq!(PayloadType::from_u8(40), Some(PayloadType::Nonce));
        assert_eq!(PayloadType::from_u8(46), Some(PayloadType::SK));
        assert_eq!(PayloadType::from_u8(255), None);

        assert_eq!(PayloadType::SA.to_u8(), 33);
        assert_eq!(PayloadType::Nonce.to_u8(), 40);
    }

    #[test]
    fn test_constants() {
        assert_eq!(IKE_VERSION, 0x20);
        assert_eq!(MAX_IKE_MESSAGE_SIZE, 65535);
        assert_eq!(IKE_HEADER_SIZE, 28);
    }
}
