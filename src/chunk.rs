//! Owned byte buffers for payload data and secrets.
//!
//! Nonces, shared secrets and derived keys all travel as [`Chunk`]s. The
//! type owns its bytes exclusively: overwriting goes through [`Chunk::replace`],
//! which consumes the previous buffer, and handing a buffer onward goes
//! through [`Chunk::take`], which leaves an empty chunk behind. Dropping a
//! chunk wipes its contents. An empty chunk holds no allocation.

use std::fmt;

use rand::RngCore;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

/// An owned, wipe-on-drop byte buffer.
#[derive(Clone, Default)]
pub struct Chunk {
    data: Vec<u8>,
}

impl Chunk {
    /// An empty chunk (no allocation).
    pub const fn empty() -> Self {
        Chunk { data: Vec::new() }
    }

    /// Take ownership of a byte vector.
    pub fn new(data: Vec<u8>) -> Self {
        Chunk { data }
    }

    /// Copy a slice into a new chunk.
    pub fn from_slice(data: &[u8]) -> Self {
        Chunk {
            data: data.to_vec(),
        }
    }

    /// A chunk of `len` random bytes.
    pub fn random(len: usize) -> Self {
        let mut data = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut data);
        Chunk { data }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the chunk holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the contents.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Copy the contents out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.clone()
    }

    /// Overwrite with `new`, consuming (and wiping) the previous buffer.
    pub fn replace(&mut self, new: Chunk) {
        let old = std::mem::replace(self, new);
        drop(old);
    }

    /// Move the contents out, leaving this chunk empty.
    pub fn take(&mut self) -> Chunk {
        std::mem::take(self)
    }
}

impl AsRef<[u8]> for Chunk {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(data: Vec<u8>) -> Self {
        Chunk { data }
    }
}

impl From<&[u8]> for Chunk {
    fn from(data: &[u8]) -> Self {
        Chunk::from_slice(data)
    }
}

// Comparison is constant-time; chunks frequently hold key material.
impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.data.ct_eq(&other.data).into()
    }
}

impl Eq for Chunk {}

// Contents stay out of logs; only the length is shown.
impl fmt::Debug for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Chunk({} bytes)", self.data.len())
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        self.data.zeroize();
    }
}
