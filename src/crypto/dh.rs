//! Diffie-Hellman key exchange for IKE_SA_INIT
//!
//! This module implements:
//! - DH group 14: 2048-bit MODP group (RFC 3526)
//! - DH group 31: Curve25519 (RFC 8031)
//!
//! MODP public values and shared secrets are padded to the modulus
//! length as the KE payload requires. Private keys are zeroized on drop.

use crate::chunk::Chunk;
use crate::proposal::DhTransformId;
use crate::{Error, Result};

use ring::agreement::{agree_ephemeral, EphemeralPrivateKey, UnparsedPublicKey, X25519};
use ring::rand::SystemRandom;
use zeroize::Zeroize;

/// DH group 14 parameters (RFC 3526).
///
/// This is a 2048-bit MODP group.
mod modp2048 {
    use num_bigint::BigUint;
    use once_cell::sync::Lazy;

    /// Modulus length in bytes
    pub const LEN: usize = 256;

    /// Group 14 prime (2048-bit)
    pub static P: Lazy<BigUint> = Lazy::new(|| {
        BigUint::from_bytes_be(
            &hex::decode(
                "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
             29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
             EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
             E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
             EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D\
             C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F\
             83655D23DCA3AD961C62F356208552BB9ED529077096966D\
             670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
             E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9\
             DE2BCBF6955817183995497CEA956AE515D2261898FA0510\
             15728E5A8AACAA68FFFFFFFFFFFFFFFF",
            )
            .expect("Invalid hex"),
        )
    });

    /// Group 14 generator
    pub static G: Lazy<BigUint> = Lazy::new(|| BigUint::from(2u32));
}

/// DH group identifier as negotiated in the DH transform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhGroupId {
    /// Group 14, 2048-bit MODP
    Modp2048,
    /// Group 31, Curve25519
    Curve25519,
}

impl DhGroupId {
    /// Map a negotiated DH transform to a group
    pub fn from_transform(id: DhTransformId) -> Self {
        match id {
            DhTransformId::Group14 => DhGroupId::Modp2048,
            DhTransformId::Group31 => DhGroupId::Curve25519,
        }
    }

    /// Wire number of the group
    pub fn to_u16(self) -> u16 {
        match self {
            DhGroupId::Modp2048 => 14,
            DhGroupId::Curve25519 => 31,
        }
    }

    /// Length of the KE payload key exchange data in bytes
    pub fn public_len(self) -> usize {
        match self {
            DhGroupId::Modp2048 => modp2048::LEN,
            DhGroupId::Curve25519 => 32,
        }
    }
}

/// One party's half of an ephemeral Diffie-Hellman exchange.
///
/// Implementations generate a key pair at construction, expose the public
/// value for the outgoing KE payload, and complete the exchange once when
/// the peer's value arrives.
pub trait DiffieHellman: Send + Sync {
    /// The group this exchange runs in
    fn group(&self) -> DhGroupId;

    /// Public value for the KE payload, padded to the group's length
    fn public_value(&self) -> &[u8];

    /// Complete the exchange with the peer's public value
    ///
    /// Consumes the private key; a second call fails.
    fn compute_shared_secret(&mut self, peer_public: &[u8]) -> Result<Chunk>;
}

/// Create a fresh exchange for the given group
pub fn create(group: DhGroupId) -> Result<Box<dyn DiffieHellman>> {
    match group {
        DhGroupId::Modp2048 => Ok(Box::new(ModpGroup14::new())),
        DhGroupId::Curve25519 => Ok(Box::new(Curve25519::new()?)),
    }
}

/// DH group 14 exchange (2048-bit MODP).
pub struct ModpGroup14 {
    /// Private exponent x, big-endian
    private_key: Vec<u8>,
    /// Public value g^x mod p, padded to the modulus length
    public_key: Vec<u8>,
}

impl ModpGroup14 {
    /// Generate a new group 14 key pair.
    pub fn new() -> Self {
        use num_bigint::{BigUint, RandBigInt};
        use rand::thread_rng;

        let mut rng = thread_rng();

        // Random private exponent x with 1 < x < p-1
        let p_minus_one = modp2048::P.clone() - 1u32;
        let x = rng.gen_biguint_range(&BigUint::from(2u32), &p_minus_one);

        Self::from_exponent(&x)
    }

    /// Build an exchange from a fixed private exponent.
    #[cfg(test)]
    pub(crate) fn with_private(x: u64) -> Self {
        Self::from_exponent(&num_bigint::BigUint::from(x))
    }

    fn from_exponent(x: &num_bigint::BigUint) -> Self {
        let y = modp2048::G.modpow(x, &modp2048::P);

        Self {
            private_key: x.to_bytes_be(),
            public_key: to_fixed_be(&y, modp2048::LEN),
        }
    }
}

impl DiffieHellman for ModpGroup14 {
    fn group(&self) -> DhGroupId {
        DhGroupId::Modp2048
    }

    fn public_value(&self) -> &[u8] {
        &self.public_key
    }

    fn compute_shared_secret(&mut self, peer_public: &[u8]) -> Result<Chunk> {
        use num_bigint::BigUint;

        if peer_public.len() != modp2048::LEN {
            return Err(Error::InvalidLength {
                expected: modp2048::LEN,
                actual: peer_public.len(),
            });
        }

        let y_peer = BigUint::from_bytes_be(peer_public);

        // Reject degenerate peer values: require 1 < y < p-1
        let p_minus_one = modp2048::P.clone() - 1u32;
        if y_peer <= BigUint::from(1u32) || y_peer >= p_minus_one {
            return Err(Error::CryptoFailed(
                "peer DH public value out of range".to_string(),
            ));
        }

        let x = BigUint::from_bytes_be(&self.private_key);

        // K = y_peer^x mod p, padded to the modulus length
        let k = y_peer.modpow(&x, &modp2048::P);

        Ok(Chunk::new(to_fixed_be(&k, modp2048::LEN)))
    }
}

impl Default for ModpGroup14 {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ModpGroup14 {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

/// DH group 31 exchange (Curve25519).
pub struct Curve25519 {
    /// Private key, consumed by the agreement
    private_key: Option<EphemeralPrivateKey>,
    /// Public value (32 bytes)
    public_key: [u8; 32],
}

impl Curve25519 {
    /// Generate a new Curve25519 key pair.
    pub fn new() -> Result<Self> {
        let rng = SystemRandom::new();
        let private_key = EphemeralPrivateKey::generate(&X25519, &rng)
            .map_err(|_| Error::CryptoFailed("failed to generate Curve25519 key".to_string()))?;

        let public_key = private_key
            .compute_public_key()
            .map_err(|_| Error::CryptoFailed("failed to compute Curve25519 public key".to_string()))?;

        let mut public_key_bytes = [0u8; 32];
        public_key_bytes.copy_from_slice(public_key.as_ref());

        Ok(Self {
            private_key: Some(private_key),
            public_key: public_key_bytes,
        })
    }
}

impl DiffieHellman for Curve25519 {
    fn group(&self) -> DhGroupId {
        DhGroupId::Curve25519
    }

    fn public_value(&self) -> &[u8] {
        &self.public_key
    }

    fn compute_shared_secret(&mut self, peer_public: &[u8]) -> Result<Chunk> {
        if peer_public.len() != 32 {
            return Err(Error::InvalidLength {
                expected: 32,
                actual: peer_public.len(),
            });
        }

        let private_key = self
            .private_key
            .take()
            .ok_or_else(|| Error::CryptoFailed("key agreement already completed".to_string()))?;

        let peer_public_key = UnparsedPublicKey::new(&X25519, peer_public);

        agree_ephemeral(private_key, &peer_public_key, |key_material| {
            Chunk::from_slice(key_material)
        })
        .map_err(|_| Error::CryptoFailed("Curve25519 key agreement failed".to_string()))
    }
}

/// Big-endian encoding left-padded with zeros to `len` bytes
fn to_fixed_be(n: &num_bigint::BigUint, len: usize) -> Vec<u8> {
    let bytes = n.to_bytes_be();
    let mut out = vec![0u8; len];
    out[len - bytes.len()..].copy_from_slice(&bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group14_key_exchange() {
        let mut a = ModpGroup14::new();
        let mut b = ModpGroup14::new();

        let a_public = a.public_value().to_vec();
        let b_public = b.public_value().to_vec();

        let a_secret = a.compute_shared_secret(&b_public).unwrap();
        let b_secret = b.compute_shared_secret(&a_public).unwrap();

        assert_eq!(a_secret, b_secret);
        assert_eq!(a_secret.len(), 256);
    }

    #[test]
    fn test_group14_fixed_exponents() {
        // g^(6*15) from both directions
        let mut a = ModpGroup14::with_private(6);
        let mut b = ModpGroup14::with_private(15);

        let a_public = a.public_value().to_vec();
        let b_public = b.public_value().to_vec();

        let a_secret = a.compute_shared_secret(&b_public).unwrap();
        let b_secret = b.compute_shared_secret(&a_public).unwrap();
        assert_eq!(a_secret, b_secret);
    }

    #[test]
    fn test_group14_public_value_padded() {
        let exchange = ModpGroup14::new();
        assert_eq!(exchange.public_value().len(), 256);
    }

    #[test]
    fn test_group14_rejects_degenerate_peer_values() {
        let mut exchange = ModpGroup14::new();

        let one = to_fixed_be(&num_bigint::BigUint::from(1u32), 256);
        assert!(exchange.compute_shared_secret(&one).is_err());

        let zero = vec![0u8; 256];
        assert!(exchange.compute_shared_secret(&zero).is_err());

        let p_minus_one = modp2048::P.clone() - 1u32;
        let encoded = to_fixed_be(&p_minus_one, 256);
        assert!(exchange.compute_shared_secret(&encoded).is_err());
    }

    #[test]
    fn test_group14_rejects_wrong_length() {
        let mut exchange = ModpGroup14::new();
        let result = exchange.compute_shared_secret(&[0x02; 64]);
        assert!(matches!(
            result,
            Err(Error::InvalidLength {
                expected: 256,
                actual: 64
            })
        ));
    }

    #[test]
    fn test_curve25519_key_exchange() {
        let mut a = Curve25519::new().unwrap();
        let mut b = Curve25519::new().unwrap();

        let a_public = a.public_value().to_vec();
        let b_public = b.public_value().to_vec();

        let a_secret = a.compute_shared_secret(&b_public).unwrap();
        let b_secret = b.compute_shared_secret(&a_public).unwrap();

        assert_eq!(a_secret, b_secret);
        assert_eq!(a_secret.len(), 32);
    }

    #[test]
    fn test_curve25519_single_use() {
        let mut a = Curve25519::new().unwrap();
        let b = Curve25519::new().unwrap();
        let b_public = b.public_value().to_vec();

        a.compute_shared_secret(&b_public).unwrap();
        let second = a.compute_shared_secret(&b_public);
        assert!(matches!(second, Err(Error::CryptoFailed(_))));
    }

    #[test]
    fn test_create_by_group() {
        let modp = create(DhGroupId::Modp2048).unwrap();
        assert_eq!(modp.group(), DhGroupId::Modp2048);
        assert_eq!(modp.public_value().len(), 256);

        let curve = create(DhGroupId::Curve25519).unwrap();
        assert_eq!(curve.group(), DhGroupId::Curve25519);
        assert_eq!(curve.public_value().len(), 32);
    }

    #[test]
    fn test_group_parameters() {
        assert_eq!(DhGroupId::Modp2048.to_u16(), 14);
        assert_eq!(DhGroupId::Curve25519.to_u16(), 31);
        assert_eq!(DhGroupId::from_transform(DhTransformId::Group14), DhGroupId::Modp2048);
    }
}
