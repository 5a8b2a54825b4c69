//! Cryptographic operations for IKE SA negotiation
//!
//! This module provides the primitives the exchanges run on:
//! - Diffie-Hellman key exchange (MODP group 14, Curve25519)
//! - PRF and the RFC 7296 key derivation
//! - SK payload ciphers (AES-CBC, AES-GCM, ChaCha20-Poly1305)
//! - truncated-HMAC integrity for non-AEAD suites

pub mod cipher;
pub mod dh;
pub mod prf;
pub mod signer;

pub use cipher::{CipherAlgorithm, Crypter};
pub use dh::{DhGroupId, DiffieHellman};
pub use prf::{KeyMaterial, PrfAlgorithm};
pub use signer::{IntegAlgorithm, Signer};

use crate::proposal::{
    DhTransformId, EncrTransformId, IntegTransformId, PrfTransformId, Proposal, TransformType,
};
use crate::{Error, Result};

/// The concrete algorithms selected by one accepted proposal.
///
/// Built once when the SA payloads have been matched; everything the SA
/// encrypts, signs, or derives afterwards comes from this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformSet {
    /// Encryption algorithm for SK payloads
    pub encr: CipherAlgorithm,
    /// Integrity algorithm, present only for non-AEAD suites
    pub integ: Option<IntegAlgorithm>,
    /// PRF for key derivation and AUTH computation
    pub prf: PrfAlgorithm,
    /// DH group for IKE_SA_INIT key exchange
    pub dh_group: DhGroupId,
}

impl TransformSet {
    /// Resolve an accepted proposal into concrete algorithms
    ///
    /// Fails with a negotiation error when any transform carries an
    /// identifier or key length this implementation does not support, or
    /// when the combination is incoherent (AEAD with an integrity
    /// transform, or a non-AEAD cipher without one).
    pub fn from_proposal(proposal: &Proposal) -> Result<Self> {
        let encr_transform = proposal
            .get_transform(TransformType::Encr)
            .ok_or_else(|| Error::NegotiationFailed("proposal lacks ENCR transform".into()))?;
        let encr_id = EncrTransformId::from_u16(encr_transform.transform_id).ok_or_else(|| {
            Error::NegotiationFailed(format!(
                "unsupported ENCR transform {}",
                encr_transform.transform_id
            ))
        })?;
        let encr = CipherAlgorithm::from_transform(encr_id, encr_transform.key_length())?;

        let prf_transform = proposal
            .get_transform(TransformType::Prf)
            .ok_or_else(|| Error::NegotiationFailed("proposal lacks PRF transform".into()))?;
        let prf_id = PrfTransformId::from_u16(prf_transform.transform_id).ok_or_else(|| {
            Error::NegotiationFailed(format!(
                "unsupported PRF transform {}",
                prf_transform.transform_id
            ))
        })?;
        let prf = PrfAlgorithm::from_transform(prf_id);

        let integ = match proposal.get_transform(TransformType::Integ) {
            Some(transform) => {
                let integ_id = IntegTransformId::from_u16(transform.transform_id).ok_or_else(
                    || {
                        Error::NegotiationFailed(format!(
                            "unsupported INTEG transform {}",
                            transform.transform_id
                        ))
                    },
                )?;
                Some(IntegAlgorithm::from_transform(integ_id))
            }
            None => None,
        };

        if encr.is_aead() && integ.is_some() {
            return Err(Error::NegotiationFailed(
                "AEAD cipher combined with an integrity transform".into(),
            ));
        }
        if !encr.is_aead() && integ.is_none() {
            return Err(Error::NegotiationFailed(
                "non-AEAD cipher requires an integrity transform".into(),
            ));
        }

        let dh_transform = proposal
            .get_transform(TransformType::Dh)
            .ok_or_else(|| Error::NegotiationFailed("proposal lacks DH transform".into()))?;
        let dh_id = DhTransformId::from_u16(dh_transform.transform_id).ok_or_else(|| {
            Error::NegotiationFailed(format!(
                "unsupported DH transform {}",
                dh_transform.transform_id
            ))
        })?;
        let dh_group = DhGroupId::from_transform(dh_id);

        Ok(TransformSet {
            encr,
            integ,
            prf,
            dh_group,
        })
    }

    /// Integrity key length in bytes (zero for AEAD suites)
    pub fn integ_key_len(&self) -> usize {
        self.integ.map(|alg| alg.key_len()).unwrap_or(0)
    }
}
