//! SK payload encryption.
//!
//! Covers the negotiated ENCR transforms: AES-CBC (paired with a separate
//! integrity signer) and the AEAD ciphers AES-GCM and ChaCha20-Poly1305
//! (tag appended to the ciphertext, IKE header bytes as associated data).

use crate::chunk::Chunk;
use crate::proposal::EncrTransformId;
use crate::{Error, Result};

use aes::{Aes128, Aes256};
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes128Gcm, Aes256Gcm, Nonce as AesGcmNonce,
};
use cbc::{Decryptor, Encryptor};
use cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};

type Aes128CbcEnc = Encryptor<Aes128>;
type Aes128CbcDec = Decryptor<Aes128>;
type Aes256CbcEnc = Encryptor<Aes256>;
type Aes256CbcDec = Decryptor<Aes256>;

/// Cipher algorithm for SK payload protection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    /// AES-CBC with 128-bit key (requires a separate integrity signer)
    AesCbc128,
    /// AES-CBC with 256-bit key (requires a separate integrity signer)
    AesCbc256,
    /// AES-GCM with 128-bit key (AEAD)
    AesGcm128,
    /// AES-GCM with 256-bit key (AEAD)
    AesGcm256,
    /// ChaCha20-Poly1305 (AEAD)
    ChaCha20Poly1305,
}

impl CipherAlgorithm {
    /// Map a negotiated ENCR transform to a cipher
    pub fn from_transform(id: EncrTransformId, key_bits: Option<u16>) -> Result<Self> {
        match (id, key_bits) {
            (EncrTransformId::AesCbc, Some(128)) => Ok(CipherAlgorithm::AesCbc128),
            (EncrTransformId::AesCbc, Some(256)) => Ok(CipherAlgorithm::AesCbc256),
            (EncrTransformId::AesGcm16, Some(128)) => Ok(CipherAlgorithm::AesGcm128),
            (EncrTransformId::AesGcm16, Some(256)) => Ok(CipherAlgorithm::AesGcm256),
            (EncrTransformId::ChaCha20Poly1305, None) => Ok(CipherAlgorithm::ChaCha20Poly1305),
            _ => Err(Error::NegotiationFailed(format!(
                "unusable cipher: transform {} with key length {:?}",
                id.to_u16(),
                key_bits
            ))),
        }
    }

    /// Key length in bytes
    pub fn key_len(self) -> usize {
        match self {
            CipherAlgorithm::AesCbc128 | CipherAlgorithm::AesGcm128 => 16,
            CipherAlgorithm::AesCbc256
            | CipherAlgorithm::AesGcm256
            | CipherAlgorithm::ChaCha20Poly1305 => 32,
        }
    }

    /// Nonce salt length in bytes, drawn from keying material
    ///
    /// RFC 4106 (GCM) and RFC 7634 (ChaCha20-Poly1305) fix the first
    /// four nonce bytes per SA instead of carrying them on the wire.
    pub fn salt_len(self) -> usize {
        match self {
            CipherAlgorithm::AesCbc128 | CipherAlgorithm::AesCbc256 => 0,
            CipherAlgorithm::AesGcm128
            | CipherAlgorithm::AesGcm256
            | CipherAlgorithm::ChaCha20Poly1305 => 4,
        }
    }

    /// Bytes of keying material the cipher consumes: the key itself
    /// followed by the nonce salt for AEAD suites
    pub fn keymat_len(self) -> usize {
        self.key_len() + self.salt_len()
    }

    /// IV length in bytes as carried on the wire
    pub fn iv_len(self) -> usize {
        match self {
            // CBC uses a full-block IV
            CipherAlgorithm::AesCbc128 | CipherAlgorithm::AesCbc256 => 16,
            // AEAD suites send an 8-byte explicit IV; the salt
            // completes the 12-byte nonce
            CipherAlgorithm::AesGcm128
            | CipherAlgorithm::AesGcm256
            | CipherAlgorithm::ChaCha20Poly1305 => 8,
        }
    }

    /// Authentication tag length in bytes (zero for non-AEAD ciphers)
    pub fn tag_len(self) -> usize {
        if self.is_aead() {
            16
        } else {
            0
        }
    }

    /// Check if this is an AEAD cipher
    pub fn is_aead(self) -> bool {
        matches!(
            self,
            CipherAlgorithm::AesGcm128
                | CipherAlgorithm::AesGcm256
                | CipherAlgorithm::ChaCha20Poly1305
        )
    }
}

/// A keyed cipher for one direction of an IKE SA.
///
/// AEAD suites are keyed with the cipher key followed by the 4-byte
/// nonce salt, both drawn from the SK_e keying material as RFC 5282
/// Section 7.1 lays it out.
#[derive(Debug, Clone)]
pub struct Crypter {
    algorithm: CipherAlgorithm,
    keymat: Chunk,
}

impl Crypter {
    /// Create a crypter, validating the keying material length
    pub fn new(algorithm: CipherAlgorithm, keymat: Chunk) -> Result<Self> {
        if keymat.len() != algorithm.keymat_len() {
            return Err(Error::CryptoFailed(format!(
                "cipher keying material must be {} bytes, got {}",
                algorithm.keymat_len(),
                keymat.len()
            )));
        }
        Ok(Crypter { algorithm, keymat })
    }

    /// The cipher algorithm
    pub fn algorithm(&self) -> CipherAlgorithm {
        self.algorithm
    }

    fn cipher_key(&self) -> &[u8] {
        &self.keymat.as_slice()[..self.algorithm.key_len()]
    }

    fn salt(&self) -> &[u8] {
        &self.keymat.as_slice()[self.algorithm.key_len()..]
    }

    /// Encrypt one SK payload body
    ///
    /// For AEAD ciphers the tag is appended to the returned ciphertext and
    /// `aad` is authenticated; for CBC the plaintext must already be
    /// block-aligned and `aad` is ignored (integrity comes from the
    /// signer).
    pub fn encrypt(&self, iv: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if iv.len() != self.algorithm.iv_len() {
            return Err(Error::CryptoFailed(format!(
                "IV must be {} bytes, got {}",
                self.algorithm.iv_len(),
                iv.len()
            )));
        }

        let key = self.cipher_key();
        match self.algorithm {
            CipherAlgorithm::AesCbc128 => {
                check_block_aligned(plaintext.len())?;
                let enc = Aes128CbcEnc::new_from_slices(key, iv)
                    .map_err(|_| Error::CryptoFailed("failed to key AES-CBC".into()))?;
                Ok(enc.encrypt_padded_vec_mut::<NoPadding>(plaintext))
            }
            CipherAlgorithm::AesCbc256 => {
                check_block_aligned(plaintext.len())?;
                let enc = Aes256CbcEnc::new_from_slices(key, iv)
                    .map_err(|_| Error::CryptoFailed("failed to key AES-CBC".into()))?;
                Ok(enc.encrypt_padded_vec_mut::<NoPadding>(plaintext))
            }
            CipherAlgorithm::AesGcm128 => {
                let cipher = Aes128Gcm::new_from_slice(key)
                    .map_err(|_| Error::CryptoFailed("failed to key AES-GCM".into()))?;
                let nonce_bytes = aead_nonce(self.salt(), iv);
                let nonce = AesGcmNonce::from_slice(&nonce_bytes);
                cipher
                    .encrypt(nonce, Payload { msg: plaintext, aad })
                    .map_err(|_| Error::CryptoFailed("AES-GCM encryption failed".into()))
            }
            CipherAlgorithm::AesGcm256 => {
                let cipher = Aes256Gcm::new_from_slice(key)
                    .map_err(|_| Error::CryptoFailed("failed to key AES-GCM".into()))?;
                let nonce_bytes = aead_nonce(self.salt(), iv);
                let nonce = AesGcmNonce::from_slice(&nonce_bytes);
                cipher
                    .encrypt(nonce, Payload { msg: plaintext, aad })
                    .map_err(|_| Error::CryptoFailed("AES-GCM encryption failed".into()))
            }
            CipherAlgorithm::ChaCha20Poly1305 => {
                let cipher = chacha20poly1305::ChaCha20Poly1305::new_from_slice(key)
                    .map_err(|_| Error::CryptoFailed("failed to key ChaCha20".into()))?;
                let nonce_bytes = aead_nonce(self.salt(), iv);
                let nonce = chacha20poly1305::Nonce::from_slice(&nonce_bytes);
                cipher
                    .encrypt(nonce, Payload { msg: plaintext, aad })
                    .map_err(|_| Error::CryptoFailed("ChaCha20-Poly1305 encryption failed".into()))
            }
        }
    }

    /// Decrypt one SK payload body
    ///
    /// For AEAD ciphers the ciphertext carries the tag and `aad` must match
    /// the sender's; authentication failure surfaces as a crypto error.
    pub fn decrypt(&self, iv: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
        if iv.len() != self.algorithm.iv_len() {
            return Err(Error::CryptoFailed(format!(
                "IV must be {} bytes, got {}",
                self.algorithm.iv_len(),
                iv.len()
            )));
        }
        if ciphertext.len() < self.algorithm.tag_len() {
            return Err(Error::BufferTooShort {
                required: self.algorithm.tag_len(),
                available: ciphertext.len(),
            });
        }

        let key = self.cipher_key();
        match self.algorithm {
            CipherAlgorithm::AesCbc128 => {
                check_block_aligned(ciphertext.len())?;
                let dec = Aes128CbcDec::new_from_slices(key, iv)
                    .map_err(|_| Error::CryptoFailed("failed to key AES-CBC".into()))?;
                dec.decrypt_padded_vec_mut::<NoPadding>(ciphertext)
                    .map_err(|_| Error::CryptoFailed("AES-CBC decryption failed".into()))
            }
            CipherAlgorithm::AesCbc256 => {
                check_block_aligned(ciphertext.len())?;
                let dec = Aes256CbcDec::new_from_slices(key, iv)
                    .map_err(|_| Error::CryptoFailed("failed to key AES-CBC".into()))?;
                dec.decrypt_padded_vec_mut::<NoPadding>(ciphertext)
                    .map_err(|_| Error::CryptoFailed("AES-CBC decryption failed".into()))
            }
            CipherAlgorithm::AesGcm128 => {
                let cipher = Aes128Gcm::new_from_slice(key)
                    .map_err(|_| Error::CryptoFailed("failed to key AES-GCM".into()))?;
                let nonce_bytes = aead_nonce(self.salt(), iv);
                let nonce = AesGcmNonce::from_slice(&nonce_bytes);
                cipher
                    .decrypt(nonce, Payload { msg: ciphertext, aad })
                    .map_err(|_| Error::CryptoFailed("AES-GCM decryption failed".into()))
            }
            CipherAlgorithm::AesGcm256 => {
                let cipher = Aes256Gcm::new_from_slice(key)
                    .map_err(|_| Error::CryptoFailed("failed to key AES-GCM".into()))?;
                let nonce_bytes = aead_nonce(self.salt(), iv);
                let nonce = AesGcmNonce::from_slice(&nonce_bytes);
                cipher
                    .decrypt(nonce, Payload { msg: ciphertext, aad })
                    .map_err(|_| Error::CryptoFailed("AES-GCM decryption failed".into()))
            }
            CipherAlgorithm::ChaCha20Poly1305 => {
                let cipher = chacha20poly1305::ChaCha20Poly1305::new_from_slice(key)
                    .map_err(|_| Error::CryptoFailed("failed to key ChaCha20".into()))?;
                let nonce_bytes = aead_nonce(self.salt(), iv);
                let nonce = chacha20poly1305::Nonce::from_slice(&nonce_bytes);
                cipher
                    .decrypt(nonce, Payload { msg: ciphertext, aad })
                    .map_err(|_| Error::CryptoFailed("ChaCha20-Poly1305 decryption failed".into()))
            }
        }
    }
}

/// Assemble the 12-byte AEAD nonce: the per-SA salt from keying
/// material, then the 8-byte explicit IV from the wire
fn aead_nonce(salt: &[u8], iv: &[u8]) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[..4].copy_from_slice(salt);
    nonce[4..].copy_from_slice(iv);
    nonce
}

fn check_block_aligned(len: usize) -> Result<()> {
    if len % 16 != 0 {
        return Err(Error::CryptoFailed(format!(
            "CBC data length {} is not block-aligned",
            len
        )));
    }
    Ok(())
}
