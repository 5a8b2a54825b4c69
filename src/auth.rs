//! Pre-shared key authentication
//!
//! Implements the AUTH payload computation from RFC 7296 Section 2.15.

use crate::crypto::PrfAlgorithm;
use crate::payload::{AuthMethod, AuthPayload};
use crate::{Error, Result};

use subtle::ConstantTimeEq;

/// Key pad for IKEv2 (RFC 7296 Section 2.15)
const KEY_PAD_IKEV2: &[u8] = b"Key Pad for IKEv2";

/// Compute the AUTH payload for PSK authentication
///
/// ```text
/// AUTH = prf(prf(Shared Secret, "Key Pad for IKEv2"), <SignedOctets>)
/// ```
///
/// The inner prf is keyed with the pre-shared secret; the padded key it
/// produces signs the octets of the party being authenticated.
pub fn compute_psk_auth(prf_alg: PrfAlgorithm, psk: &[u8], signed_octets: &[u8]) -> AuthPayload {
    let padded_key = prf_alg.compute(psk, KEY_PAD_IKEV2);
    let auth_data = prf_alg.compute(&padded_key, signed_octets);

    AuthPayload::new(AuthMethod::SharedKeyMic, auth_data)
}

/// Verify a received AUTH payload against the shared secret
pub fn verify_psk_auth(
    prf_alg: PrfAlgorithm,
    psk: &[u8],
    signed_octets: &[u8],
    received_auth: &AuthPayload,
) -> Result<()> {
    if received_auth.auth_method != AuthMethod::SharedKeyMic {
        return Err(Error::AuthenticationFailed(format!(
            "expected PSK auth, got {:?}",
            received_auth.auth_method
        )));
    }

    let expected = compute_psk_auth(prf_alg, psk, signed_octets);

    if expected.auth_data.len() != received_auth.auth_data.len() {
        return Err(Error::AuthenticationFailed(
            "AUTH data length mismatch".to_string(),
        ));
    }

    let matches: bool = expected
        .auth_data
        .ct_eq(&received_auth.auth_data)
        .into();
    if !matches {
        return Err(Error::AuthenticationFailed(
            "AUTH verification failed".to_string(),
        ));
    }

    Ok(())
}

/// Construct initiator signed octets (RFC 7296 Section 2.15)
///
/// ```text
/// InitiatorSignedOctets = RealMessage1 | NonceRData | prf(SK_pi, IDi')
/// ```
///
/// `real_message1` is the complete IKE_SA_INIT request as sent on the
/// wire; `id_i_data` is the IDi payload body without the generic payload
/// header.
pub fn construct_initiator_signed_octets(
    prf_alg: PrfAlgorithm,
    real_message1: &[u8],
    nonce_r: &[u8],
    sk_pi: &[u8],
    id_i_data: &[u8],
) -> Vec<u8> {
    let id_hash = prf_alg.compute(sk_pi, id_i_data);

    let mut signed_octets =
        Vec::with_capacity(real_message1.len() + nonce_r.len() + id_hash.len());
    signed_octets.extend_from_slice(real_message1);
    signed_octets.extend_from_slice(nonce_r);
    signed_octets.extend_from_slice(&id_hash);

    signed_octets
}

/// Construct responder signed octets (RFC 7296 Section 2.15)
///
/// ```text
/// ResponderSignedOctets = RealMessage2 | NonceIData | prf(SK_pr, IDr')
/// ```
pub fn construct_responder_signed_octets(
    prf_alg: PrfAlgorithm,
    real_message2: &[u8],
    nonce_i: &[u8],
    sk_pr: &[u8],
    id_r_data: &[u8],
) -> Vec<u8> {
    let id_hash = prf_alg.compute(sk_pr, id_r_data);

    let mut signed_octets =
        Vec::with_capacity(real_message2.len() + nonce_i.len() + id_hash.len());
    signed_octets.extend_from_slice(real_message2);
    signed_octets.extend_from_slice(nonce_i);
    signed_octets.extend_from_slice(&id_hash);

    signed_octets
}
