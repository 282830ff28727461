//! Block headers: the 80-byte codec, proof-of-work checking, difficulty,
//! version-bit signaling, and retargeting.

use crate::encoding::ReadExt;
use crate::error::{Error, Result};
use crate::hash::dsha256;
use num_bigint::BigUint;
use num_traits::Zero;
use std::io::Read;

/// Two weeks in seconds, the retarget period's target timespan.
pub const TWO_WEEKS: u32 = 60 * 60 * 24 * 14;

/// An 80-byte Bitcoin block header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    /// Previous block hash, internal (little-endian) byte order.
    pub prev_block: [u8; 32],
    /// Merkle root, internal (little-endian) byte order.
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub bits: [u8; 4],
    pub nonce: [u8; 4],
}

impl BlockHeader {
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let version = reader.read_u32_le()?;
        let mut prev_block = [0u8; 32];
        prev_block.copy_from_slice(&reader.read_reversed(32)?);
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&reader.read_reversed(32)?);
        let timestamp = reader.read_u32_le()?;
        let bits: [u8; 4] = reader.read_exact_vec(4)?.try_into().unwrap();
        let nonce: [u8; 4] = reader.read_exact_vec(4)?.try_into().unwrap();
        Ok(BlockHeader { version, prev_block, merkle_root, timestamp, bits, nonce })
    }

    pub fn serialize(&self) -> [u8; 80] {
        let mut out = [0u8; 80];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        let mut prev = self.prev_block;
        prev.reverse();
        out[4..36].copy_from_slice(&prev);
        let mut merkle = self.merkle_root;
        merkle.reverse();
        out[36..68].copy_from_slice(&merkle);
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits);
        out[76..80].copy_from_slice(&self.nonce);
        out
    }

    /// Display-order (big-endian) block hash: dsha256 of the serialized
    /// header, byte-reversed.
    pub fn hash(&self) -> [u8; 32] {
        let mut h = dsha256(&self.serialize());
        h.reverse();
        h
    }

    /// BIP9 version-bit signaling: top three bits are `001`.
    pub fn bip9(&self) -> bool {
        self.version >> 29 == 0b001
    }

    /// BIP91 signaling: bit 4 set.
    pub fn bip91(&self) -> bool {
        (self.version >> 4) & 1 == 1
    }

    /// BIP141 (segwit) signaling: bit 1 set.
    pub fn bip141(&self) -> bool {
        (self.version >> 1) & 1 == 1
    }

    /// Converts `bits`' compact representation into the full 256-bit target.
    pub fn target(&self) -> BigUint {
        bits_to_target(&self.bits)
    }

    /// `difficulty = (0xffff * 256^(0x1d - 3)) / target`, relative to the
    /// genesis block's minimum difficulty target.
    pub fn difficulty(&self) -> BigUint {
        let lowest = bits_to_target(&[0xff, 0xff, 0x00, 0x1d]);
        let target = self.target();
        if target.is_zero() {
            return BigUint::zero();
        }
        lowest / target
    }

    /// Checks the header's proof-of-work: dsha256(header) as a
    /// little-endian integer must be strictly less than the target.
    pub fn check_pow(&self) -> bool {
        let h = dsha256(&self.serialize());
        let proof = BigUint::from_bytes_le(&h);
        proof < self.target()
    }
}

/// Decodes a 4-byte compact `bits` field (`coeff_le(3) ‖ exponent(1)`) into
/// a full target: `target = coeff * 256^(exponent - 3)`.
pub fn bits_to_target(bits: &[u8; 4]) -> BigUint {
    let exponent = bits[3] as u32;
    let coefficient = BigUint::from_bytes_le(&bits[0..3]);
    coefficient * BigUint::from(256u32).pow(exponent.saturating_sub(3))
}

/// Encodes a target back into the compact `bits` representation.
pub fn target_to_bits(target: &BigUint) -> [u8; 4] {
    let mut raw = target.to_bytes_be();
    // strip leading zero bytes
    while raw.first() == Some(&0) {
        raw.remove(0);
    }
    let (exponent, coefficient) = if raw.first().map_or(false, |&b| b & 0x80 != 0) {
        let mut padded = vec![0u8];
        padded.extend_from_slice(&raw[..raw.len().min(2)]);
        ((raw.len() + 1) as u32, padded)
    } else {
        let mut c = raw.clone();
        c.truncate(3);
        (raw.len() as u32, c)
    };
    let mut coeff_le = coefficient;
    coeff_le.reverse();
    coeff_le.resize(3, 0);
    [coeff_le[0], coeff_le[1], coeff_le[2], exponent as u8]
}

/// Retargets difficulty over a 2016-block window: clamps the observed
/// timespan to `[TWO_WEEKS/4, TWO_WEEKS*4]`, then scales the previous
/// target proportionally.
pub fn calculate_new_bits(previous_bits: &[u8; 4], time_differential: u32) -> [u8; 4] {
    let clamped = time_differential
        .max(TWO_WEEKS / 4)
        .min(TWO_WEEKS * 4);
    let previous_target = bits_to_target(previous_bits);
    let new_target = previous_target * BigUint::from(clamped) / BigUint::from(TWO_WEEKS);
    target_to_bits(&new_target)
}

impl TryFrom<&[u8]> for BlockHeader {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 80 {
            return Err(Error::Other("block header must be exactly 80 bytes"));
        }
        BlockHeader::parse(&mut std::io::Cursor::new(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 0x20000002,
            prev_block: [0x11u8; 32],
            merkle_root: [0x22u8; 32],
            timestamp: 1_500_000_000,
            bits: [0xe9, 0x3c, 0x01, 0x18],
            nonce: [0xAB, 0xCD, 0xEF, 0x01],
        }
    }

    #[test]
    fn header_round_trips_through_parse_and_serialize() {
        let header = sample_header();
        let bytes = header.serialize();
        let parsed = BlockHeader::parse(&mut Cursor::new(bytes.to_vec())).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn bip_signaling_flags_read_the_expected_version_bits() {
        // version 0x20000002: top 3 bits are 001 (BIP9), bit 1 set (BIP141).
        let header = sample_header();
        assert!(header.bip9());
        assert!(header.bip141());
        assert!(!header.bip91());
    }

    #[test]
    fn bits_to_target_and_back_round_trips() {
        let bits = [0xe9, 0x3c, 0x01, 0x18];
        let target = bits_to_target(&bits);
        let back = target_to_bits(&target);
        assert_eq!(back, bits);
    }

    #[test]
    fn difficulty_of_the_minimum_target_is_one() {
        let header = BlockHeader { bits: [0xff, 0xff, 0x00, 0x1d], ..sample_header() };
        assert_eq!(header.difficulty(), BigUint::from(1u32));
    }

    #[test]
    fn check_pow_rejects_a_header_against_the_minimum_difficulty_target() {
        // The minimum-difficulty target is astronomically easy to beat in
        // theory but this header's hash is essentially random relative to
        // it, so asserting false here would be flaky either way; instead
        // check that an impossibly small target is always rejected.
        let mut header = sample_header();
        header.bits = [0x00, 0x00, 0x00, 0x03]; // target == 0
        assert!(!header.check_pow());
    }

    #[test]
    fn retarget_clamps_extreme_timespans() {
        let bits = [0xe9, 0x3c, 0x01, 0x18];
        let huge = calculate_new_bits(&bits, TWO_WEEKS * 100);
        let clamped_at_4x = calculate_new_bits(&bits, TWO_WEEKS * 4);
        assert_eq!(huge, clamped_at_4x);
    }

    #[test]
    fn literal_mainnet_header_hashes_and_signals_as_expected() {
        let raw = hex::decode(
            "020000208ec39428b17323fa0ddec8e887b4a7c53b8c0a0a220cfd00000000000000000\
             05b0750fce0a889502d40508d39576821155e9c9e3f5c3157f961db38fd8b25be1e77a7\
             59e93c0118a4ffd71d",
        )
        .unwrap();
        let header = BlockHeader::parse(&mut Cursor::new(raw.clone())).unwrap();
        assert_eq!(header.serialize().to_vec(), raw);
        assert_eq!(hex::encode(header.hash()), "0000000000000000007e9e4c586439b0cdbe13b1370bdd9435d76a644d047523");
        assert_eq!(
            header.target(),
            BigUint::parse_bytes(b"13CE9000000000000000000000000000000000000000000", 16).unwrap()
        );
        assert_eq!(header.difficulty(), BigUint::from(888171856257u64));
        assert!(header.bip9());
        assert!(!header.bip91());
        assert!(header.bip141());
    }
}
