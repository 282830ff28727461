//! Merkle root computation and BIP37 partial merkle tree reconstruction.

use crate::encoding::{bytes_to_bit_field, ReadExt};
use crate::error::{Error, Result};
use crate::hash::dsha256;
use std::io::Read;

/// `dSHA256(h1 ‖ h2)`, the parent of two adjacent merkle nodes.
pub fn merkle_parent(h1: &[u8; 32], h2: &[u8; 32]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(h1);
    buf.extend_from_slice(h2);
    dsha256(&buf)
}

/// Pairs up one level of hashes into their parents, duplicating the last
/// hash if the level has odd length.
pub fn merkle_parent_level(level: &[[u8; 32]]) -> Vec<[u8; 32]> {
    let mut padded = level.to_vec();
    if padded.len() % 2 == 1 {
        padded.push(*padded.last().unwrap());
    }
    padded.chunks(2).map(|pair| merkle_parent(&pair[0], &pair[1])).collect()
}

/// Reduces a full list of leaf hashes to a single merkle root.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = merkle_parent_level(&level);
    }
    level[0]
}

fn ceil_div(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

fn tree_height(total: u32) -> u32 {
    let mut height = 0;
    while (1u64 << height) < total as u64 {
        height += 1;
    }
    height
}

fn nodes_at_depth(total: u32, max_depth: u32, depth: u32) -> u32 {
    ceil_div(total, 1u32 << (max_depth - depth))
}

/// Drives the recursive-descent BIP37 reconstruction described in
/// [`MerkleBlock::is_valid`], walking the flag-bit and hash streams with a
/// shared cursor.
struct Reconstruction<'a> {
    total: u32,
    max_depth: u32,
    flags: &'a [u8],
    flag_idx: usize,
    hashes: &'a [[u8; 32]],
    hash_idx: usize,
}

impl<'a> Reconstruction<'a> {
    fn visit(&mut self, depth: u32, index: u32) -> Result<[u8; 32]> {
        if depth == self.max_depth {
            // at a leaf the flag bit is consumed but carries no branching
            // information.
            self.take_flag()?;
            return self.take_hash();
        }

        let bit = self.take_flag()?;
        if bit == 0 {
            return self.take_hash();
        }

        let left = self.visit(depth + 1, index * 2)?;
        let right_count = nodes_at_depth(self.total, self.max_depth, depth + 1);
        let right = if index * 2 + 1 < right_count {
            self.visit(depth + 1, index * 2 + 1)?
        } else {
            left
        };
        Ok(merkle_parent(&left, &right))
    }

    fn take_flag(&mut self) -> Result<u8> {
        let bit = *self.flags.get(self.flag_idx).ok_or(Error::ProofMalformed)?;
        self.flag_idx += 1;
        Ok(bit)
    }

    fn take_hash(&mut self) -> Result<[u8; 32]> {
        let h = *self.hashes.get(self.hash_idx).ok_or(Error::ProofMalformed)?;
        self.hash_idx += 1;
        Ok(h)
    }
}

/// A BIP37 `merkleblock` message: a block header plus a partial merkle
/// tree proving a subset of transactions' inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleBlock {
    pub version: u32,
    pub prev_block: [u8; 32],
    pub merkle_root: [u8; 32],
    pub timestamp: u32,
    pub bits: [u8; 4],
    pub nonce: [u8; 4],
    pub total: u32,
    pub hashes: Vec<[u8; 32]>,
    pub flags: Vec<u8>,
}

impl MerkleBlock {
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let version = reader.read_u32_le()?;
        let mut prev_block = [0u8; 32];
        prev_block.copy_from_slice(&reader.read_reversed(32)?);
        let mut merkle_root = [0u8; 32];
        merkle_root.copy_from_slice(&reader.read_reversed(32)?);
        let timestamp = reader.read_u32_le()?;
        let bits: [u8; 4] = reader.read_exact_vec(4)?.try_into().unwrap();
        let nonce: [u8; 4] = reader.read_exact_vec(4)?.try_into().unwrap();
        let total = reader.read_u32_le()?;

        let num_hashes = reader.read_varint()?;
        let mut hashes = Vec::with_capacity(num_hashes as usize);
        for _ in 0..num_hashes {
            let mut h = [0u8; 32];
            h.copy_from_slice(&reader.read_reversed(32)?);
            hashes.push(h);
        }

        let flags_len = reader.read_varint()? as usize;
        let flags_bytes = reader.read_exact_vec(flags_len)?;

        Ok(MerkleBlock {
            version,
            prev_block,
            merkle_root,
            timestamp,
            bits,
            nonce,
            total,
            hashes,
            flags: flags_bytes,
        })
    }

    /// Reconstructs the partial merkle tree and checks it proves the
    /// claimed root. Fails with [`Error::ProofMalformed`] if the flag or
    /// hash streams are not fully (and only) consumed, or if the computed
    /// root does not match.
    pub fn is_valid(&self) -> Result<bool> {
        let bits = bytes_to_bit_field(&self.flags);
        let max_depth = tree_height(self.total);

        // The merkle computation itself works on internal (wire) byte
        // order; only the final root is reversed into display order.
        let mut wire_hashes: Vec<[u8; 32]> = self.hashes.clone();
        for h in wire_hashes.iter_mut() {
            h.reverse();
        }

        let mut recon = Reconstruction {
            total: self.total,
            max_depth,
            flags: &bits,
            flag_idx: 0,
            hashes: &wire_hashes,
            hash_idx: 0,
        };
        let mut computed_root = recon.visit(0, 0)?;

        if recon.flag_idx != bits.len() || recon.hash_idx != wire_hashes.len() {
            return Err(Error::ProofMalformed);
        }

        computed_root.reverse();
        Ok(computed_root == self.merkle_root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn merkle_root_of_a_single_leaf_is_itself() {
        let leaf = [0x42u8; 32];
        assert_eq!(merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn merkle_root_duplicates_the_last_leaf_on_odd_levels() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let c = [3u8; 32];
        let manual_level = merkle_parent_level(&[a, b, c]);
        assert_eq!(manual_level.len(), 2);
        assert_eq!(manual_level[1], merkle_parent(&c, &c));
        assert_eq!(merkle_root(&[a, b, c]), merkle_parent(&manual_level[0], &manual_level[1]));
    }

    #[test]
    fn partial_tree_with_all_flags_set_reconstructs_full_root() {
        // A 4-leaf tree where every flag bit is 1 (every branch explored)
        // degenerates to supplying all four leaves and recomputing the
        // ordinary root.
        let leaves = [[1u8; 32], [2u8; 32], [3u8; 32], [4u8; 32]];
        let root = merkle_root(&leaves);

        let mut display_root = root;
        display_root.reverse();
        let mut wire_leaves = leaves;
        for h in wire_leaves.iter_mut() {
            h.reverse();
        }

        let block = MerkleBlock {
            version: 1,
            prev_block: [0; 32],
            merkle_root: display_root,
            timestamp: 0,
            bits: [0; 4],
            nonce: [0; 4],
            total: 4,
            hashes: wire_leaves.to_vec(),
            // 1 bit for the root, 1 for each of the two depth-1 nodes, and
            // 1 (ignored) bit for each of the four leaves.
            flags: vec![1, 1, 1, 1, 1, 1, 1],
        };
        assert!(block.is_valid().unwrap());
    }

    #[test]
    fn literal_bip37_fixture_reconstructs_the_expected_root() {
        let raw = hex::decode(
            "00000020df3b053dc46f162a9b00c7f0d5124e2676d47bbe7c5d0793a50000000000000\
             0ef445fef2ed495c275892206ca533e7411907971013ab83e3b47bd0d692d14d4dc7c83\
             5b67d8001ac157e670bf0d00000aba412a0d1480e370173072c9562becffe87aa661c1e\
             4a6dbc305d38ec5dc088a7cf92e6458aca7b32edae818f9c2c98c37e06bf72ae0ce8064\
             9a38655ee1e27d34d9421d940b16732f24b94023e9d572a7f9ab8023434a4feb532d2a\
             dfc8c2c2158785d1bd04eb99df2e86c54bc13e139862897217400def5d72c280222c4c\
             baee7261831e1550dbb8fa82853e9fe506fc5fda3f7b919d8fe74b6282f92763cef8e6\
             25f977af7c8619c32a369b832bc2d051ecd9c73c51e76370ceabd4f25097c256597fa8\
             98d404ed53425de608ac6bfe426f6e2bb457f1c554866eb69dcb8d6bf6f880e9a59b3c\
             d053e6c7060eeacaacf4dac6697dac20e4bd3f38a2ea2543d1ab7953e3430790a9f81e\
             1c67f5b58c825acf46bd02848384eebe9af917274cdfbb1a28a5d58a23a17977def0de\
             10d644258d9c54f886d47d293a411cb6226103b55635",
        )
        .unwrap();
        let block = MerkleBlock::parse(&mut Cursor::new(raw)).unwrap();
        assert_eq!(block.total, 3471);
        assert_eq!(block.hashes.len(), 10);
        assert_eq!(hex::encode(block.flags.clone()), "b55635");
        assert_eq!(
            hex::encode({
                let mut r = block.merkle_root;
                r.reverse();
                r
            }),
            "ef445fef2ed495c275892206ca533e7411907971013ab83e3b47bd0d692d14d4"
        );
        assert!(block.is_valid().unwrap());
    }

    #[test]
    fn tampered_root_fails_validation() {
        let leaves = [[1u8; 32], [2u8; 32]];
        let mut wire_leaves = leaves;
        for h in wire_leaves.iter_mut() {
            h.reverse();
        }
        let block = MerkleBlock {
            version: 1,
            prev_block: [0; 32],
            merkle_root: [0xFF; 32],
            timestamp: 0,
            bits: [0; 4],
            nonce: [0; 4],
            total: 2,
            hashes: wire_leaves.to_vec(),
            // 1 bit for the root, plus 1 (ignored) bit per leaf.
            flags: vec![1, 1, 1],
        };
        assert!(!block.is_valid().unwrap());
    }
}
