//! Hash functions used for execution identities and cache keys.

use sha2::{Digest, Sha256};

const FNV32_OFFSET_BASIS: u32 = 2_166_136_261;
const FNV32_PRIME: u32 = 16_777_619;

/// Incremental 32-bit FNV-1 hasher (multiply, then xor).
///
/// Feeding several byte slices is equivalent to hashing their concatenation.
#[derive(Debug, Clone, Copy)]
pub struct Fnv1Hasher32 {
    state: u32,
}

impl Default for Fnv1Hasher32 {
    fn default() -> Self {
        Self { state: FNV32_OFFSET_BASIS }
    }
}

impl Fnv1Hasher32 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.state = self.state.wrapping_mul(FNV32_PRIME) ^ u32::from(*byte);
        }
    }

    pub fn finish(&self) -> u32 {
        self.state
    }
}

/// One-shot FNV-1 32-bit hash.
pub fn fnv1_32(bytes: &[u8]) -> u32 {
    let mut hasher = Fnv1Hasher32::new();
    hasher.write(bytes);
    hasher.finish()
}

/// Lowercase hex SHA-256 of canonical argument bytes, used as the cache key.
pub fn argument_digest(canonical: &[u8]) -> String {
    hex::encode(Sha256::digest(canonical))
}
