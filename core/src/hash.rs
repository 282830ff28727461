//! Hash primitives used throughout the wire formats: double-SHA256,
//! RIPEMD160∘SHA256 ("hash160"), HMAC-SHA256 (for RFC 6979), and the
//! MurmurHash3 seed family used by Bloom filters.

use hmac::{Hmac, Mac};
use ripemd::Ripemd160;
use sha2::{Digest, Sha256};
use std::io::Cursor;

/// SHA-256 applied twice, as used for tx ids, block hashes, and checksums.
pub fn dsha256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

/// RIPEMD160(SHA256(data)), Bitcoin's "hash160".
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    let mut out = [0u8; 20];
    out.copy_from_slice(&ripe);
    out
}

/// Plain single SHA-256, used by `OP_SHA256` and P2WSH script-hash checks.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(data));
    out
}

/// HMAC-SHA256(key, message), the primitive RFC 6979 is built from.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts any key length");
    mac.update(message);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

/// MurmurHash3 (x86, 32-bit) seeded hash, used by [`crate::bloom::BloomFilter`].
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    murmur3::murmur3_32(&mut Cursor::new(data), seed).expect("reading from a Vec cannot fail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsha256_of_empty_matches_verack_checksum() {
        // The `verack` message has an empty payload; its well-known wire
        // checksum is the first four bytes of dsha256(b"").
        let h = dsha256(b"");
        assert_eq!(hex::encode(&h[..4]), "5df6e0e2");
    }

    #[test]
    fn hash160_is_ripemd_of_sha256() {
        let h = hash160(b"hello");
        assert_eq!(h.len(), 20);
    }
}
