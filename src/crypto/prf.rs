//! Pseudo-random functions and IKE key derivation
//!
//! Implements the negotiated PRF transforms and the RFC 7296 §2.13/§2.14
//! key expansion that turns the DH shared secret and nonces into the
//! seven SK_* keys of an IKE SA.

use crate::chunk::Chunk;
use crate::proposal::PrfTransformId;
use crate::Result;

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

/// PRF algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrfAlgorithm {
    /// HMAC-SHA2-256
    HmacSha256,
    /// HMAC-SHA2-384
    HmacSha384,
    /// HMAC-SHA2-512
    HmacSha512,
}

impl PrfAlgorithm {
    /// Map a negotiated PRF transform to an algorithm
    pub fn from_transform(id: PrfTransformId) -> Self {
        match id {
            PrfTransformId::HmacSha256 => PrfAlgorithm::HmacSha256,
            PrfTransformId::HmacSha384 => PrfAlgorithm::HmacSha384,
            PrfTransformId::HmacSha512 => PrfAlgorithm::HmacSha512,
        }
    }

    /// Get PRF output length in bytes
    pub fn output_len(self) -> usize {
        match self {
            PrfAlgorithm::HmacSha256 => 32,
            PrfAlgorithm::HmacSha384 => 48,
            PrfAlgorithm::HmacSha512 => 64,
        }
    }

    /// Compute prf(key, data)
    pub fn compute(self, key: &[u8], data: &[u8]) -> Vec<u8> {
        match self {
            PrfAlgorithm::HmacSha256 => {
                let mut mac =
                    Hmac::<Sha256>::new_from_slice(key).expect("HMAC can take key of any size");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            PrfAlgorithm::HmacSha384 => {
                let mut mac =
                    Hmac::<Sha384>::new_from_slice(key).expect("HMAC can take key of any size");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
            PrfAlgorithm::HmacSha512 => {
                let mut mac =
                    Hmac::<Sha512>::new_from_slice(key).expect("HMAC can take key of any size");
                mac.update(data);
                mac.finalize().into_bytes().to_vec()
            }
        }
    }

    /// Compute prf+ (key expansion function)
    ///
    /// Defined in RFC 7296 Section 2.13:
    /// ```text
    /// prf+ (K,S) = T1 | T2 | T3 | T4 | ...
    ///
    /// where:
    /// T1 = prf (K, S | 0x01)
    /// T2 = prf (K, T1 | S | 0x02)
    /// T3 = prf (K, T2 | S | 0x03)
    /// ...
    /// ```
    pub fn prf_plus(self, key: &[u8], seed: &[u8], output_len: usize) -> Vec<u8> {
        let mut output = Vec::with_capacity(output_len);
        let mut t = Vec::new();
        let mut counter: u8 = 1;

        while output.len() < output_len {
            // T(i) = prf(K, T(i-1) | S | counter)
            let mut input = Vec::with_capacity(t.len() + seed.len() + 1);
            input.extend_from_slice(&t);
            input.extend_from_slice(seed);
            input.push(counter);

            t = self.compute(key, &input);
            output.extend_from_slice(&t);

            counter += 1;
        }

        output.truncate(output_len);
        output
    }
}

/// The SK_* keys of one IKE SA, derived from SKEYSEED
///
/// All keys zeroize on drop.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    /// SK_d - key for deriving Child SA keys
    pub sk_d: Chunk,
    /// SK_ai - initiator's integrity key
    pub sk_ai: Chunk,
    /// SK_ar - responder's integrity key
    pub sk_ar: Chunk,
    /// SK_ei - initiator's encryption key
    pub sk_ei: Chunk,
    /// SK_er - responder's encryption key
    pub sk_er: Chunk,
    /// SK_pi - initiator's AUTH payload key
    pub sk_pi: Chunk,
    /// SK_pr - responder's AUTH payload key
    pub sk_pr: Chunk,
}

impl KeyMaterial {
    /// Derive IKE SA key material
    ///
    /// Implements RFC 7296 Section 2.14:
    /// ```text
    /// SKEYSEED = prf(Ni | Nr, g^ir)
    ///
    /// {SK_d | SK_ai | SK_ar | SK_ei | SK_er | SK_pi | SK_pr}
    ///     = prf+ (SKEYSEED, Ni | Nr | SPIi | SPIr)
    /// ```
    #[allow(clippy::too_many_arguments)]
    pub fn derive(
        prf_alg: PrfAlgorithm,
        nonce_i: &[u8],
        nonce_r: &[u8],
        shared_secret: &[u8],
        spi_i: &[u8; 8],
        spi_r: &[u8; 8],
        encr_key_len: usize,
        integ_key_len: usize,
    ) -> Result<Self> {
        // SKEYSEED = prf(Ni | Nr, g^ir)
        let mut prf_key = Vec::with_capacity(nonce_i.len() + nonce_r.len());
        prf_key.extend_from_slice(nonce_i);
        prf_key.extend_from_slice(nonce_r);

        let skeyseed = prf_alg.compute(&prf_key, shared_secret);

        // Seed for prf+: Ni | Nr | SPIi | SPIr
        let mut seed = Vec::new();
        seed.extend_from_slice(nonce_i);
        seed.extend_from_slice(nonce_r);
        seed.extend_from_slice(spi_i);
        seed.extend_from_slice(spi_r);

        let prf_len = prf_alg.output_len();
        let total_len = prf_len // SK_d
            + integ_key_len * 2 // SK_ai | SK_ar
            + encr_key_len * 2 // SK_ei | SK_er
            + prf_len * 2; // SK_pi | SK_pr

        let keymat = prf_alg.prf_plus(&skeyseed, &seed, total_len);

        let mut offset = 0;
        let mut next = |len: usize| {
            let chunk = Chunk::from_slice(&keymat[offset..offset + len]);
            offset += len;
            chunk
        };

        Ok(KeyMaterial {
            sk_d: next(prf_len),
            sk_ai: next(integ_key_len),
            sk_ar: next(integ_key_len),
            sk_ei: next(encr_key_len),
            sk_er: next(encr_key_len),
            sk_pi: next(prf_len),
            sk_pr: next(prf_len),
        })
    }
}
