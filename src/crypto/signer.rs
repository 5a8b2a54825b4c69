//! Message integrity for non-AEAD cipher suites
//!
//! When AES-CBC is negotiated the SK payload carries a truncated HMAC
//! checksum over the whole message; AEAD suites carry no separate ICV.

use crate::chunk::Chunk;
use crate::proposal::IntegTransformId;
use crate::{Error, Result};

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};
use subtle::ConstantTimeEq;

/// Integrity algorithm (RFC 4868 truncated HMAC variants)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegAlgorithm {
    /// AUTH_HMAC_SHA2_256_128
    HmacSha256_128,
    /// AUTH_HMAC_SHA2_384_192
    HmacSha384_192,
    /// AUTH_HMAC_SHA2_512_256
    HmacSha512_256,
}

impl IntegAlgorithm {
    /// Map a negotiated INTEG transform to an algorithm
    pub fn from_transform(id: IntegTransformId) -> Self {
        match id {
            IntegTransformId::HmacSha256_128 => IntegAlgorithm::HmacSha256_128,
            IntegTransformId::HmacSha384_192 => IntegAlgorithm::HmacSha384_192,
            IntegTransformId::HmacSha512_256 => IntegAlgorithm::HmacSha512_256,
        }
    }

    /// Key length in bytes
    pub fn key_len(self) -> usize {
        match self {
            IntegAlgorithm::HmacSha256_128 => 32,
            IntegAlgorithm::HmacSha384_192 => 48,
            IntegAlgorithm::HmacSha512_256 => 64,
        }
    }

    /// Truncated checksum length in bytes
    pub fn icv_len(self) -> usize {
        match self {
            IntegAlgorithm::HmacSha256_128 => 16,
            IntegAlgorithm::HmacSha384_192 => 24,
            IntegAlgorithm::HmacSha512_256 => 32,
        }
    }
}

/// A keyed integrity signer for one direction of an IKE SA.
#[derive(Debug, Clone)]
pub struct Signer {
    algorithm: IntegAlgorithm,
    key: Chunk,
}

impl Signer {
    /// Create a signer, validating the key length
    pub fn new(algorithm: IntegAlgorithm, key: Chunk) -> Result<Self> {
        if key.len() != algorithm.key_len() {
            return Err(Error::CryptoFailed(format!(
                "integrity key must be {} bytes, got {}",
                algorithm.key_len(),
                key.len()
            )));
        }
        Ok(Signer { algorithm, key })
    }

    /// The integrity algorithm
    pub fn algorithm(&self) -> IntegAlgorithm {
        self.algorithm
    }

    /// Compute the truncated checksum over `data`
    pub fn sign(&self, data: &[u8]) -> Vec<u8> {
        let key = self.key.as_slice();
        let mut digest = match self.algorithm {
            IntegAlgorithm::HmacSha256_128 => {
                let mut mac =
                    Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            IntegAlgorithm::HmacSha384_192 => {
                let mut mac =
                    Hmac::<Sha384>::new_from_slice(key).expect("HMAC can take key of any size");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            IntegAlgorithm::HmacSha512_256 => {
                let mut mac =
                    Hmac::<Sha512>::new_from_slice(key).expect("HMAC can take key of any size");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
        };
        digest.truncate(self.algorithm.icv_len());
        digest
    }

    /// Verify a received checksum in constant time
    pub fn verify(&self, data: &[u8], icv: &[u8]) -> bool {
        if icv.len() != self.algorithm.icv_len() {
            return false;
        }
        let expected = self.sign(data);
        expected.ct_eq(icv).into()
    }
}
