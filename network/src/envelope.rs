//! The network envelope: magic bytes, a fixed-width command name, and a
//! checksummed payload, wrapping every message exchanged with a peer.

use crate::error::{Error, Result};
use bitcoin_core::encoding::ReadExt;
use bitcoin_core::hash::dsha256;
use bitcoin_core::params::Params;
use std::io::{Read, Write};

/// A parsed network envelope: a command name and its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEnvelope {
    pub command: [u8; 12],
    pub payload: Vec<u8>,
    pub magic: [u8; 4],
}

impl NetworkEnvelope {
    pub fn new(command: &[u8], payload: Vec<u8>, params: &Params) -> Self {
        let mut cmd = [0u8; 12];
        cmd[..command.len()].copy_from_slice(command);
        NetworkEnvelope { command: cmd, payload, magic: params.network_magic }
    }

    pub fn command_str(&self) -> String {
        let end = self.command.iter().position(|&b| b == 0).unwrap_or(12);
        String::from_utf8_lossy(&self.command[..end]).into_owned()
    }

    /// Serializes the full envelope: magic, padded command, LE payload
    /// length, 4-byte checksum, then the payload itself.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.magic);
        out.extend_from_slice(&self.command);
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        let checksum = dsha256(&self.payload);
        out.extend_from_slice(&checksum[..4]);
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.serialize())?;
        Ok(())
    }

    /// Parses one envelope off `reader`, validating the network magic and
    /// the payload checksum.
    pub fn parse<R: Read>(reader: &mut R, params: &Params) -> Result<Self> {
        let magic: [u8; 4] = reader.read_exact_vec(4).map_err(|_| Error::ShortRead)?.try_into().unwrap();
        if magic != params.network_magic {
            return Err(Error::BadMagic);
        }
        let command: [u8; 12] = reader.read_exact_vec(12).map_err(|_| Error::ShortRead)?.try_into().unwrap();
        let length = reader.read_u32_le().map_err(|_| Error::ShortRead)?;
        let checksum = reader.read_exact_vec(4).map_err(|_| Error::ShortRead)?;
        let payload = reader.read_exact_vec(length as usize).map_err(|_| Error::ShortRead)?;

        let expected = dsha256(&payload);
        if expected[..4] != checksum[..] {
            return Err(Error::BadChecksum);
        }

        Ok(NetworkEnvelope { command, payload, magic })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn envelope_round_trips() {
        let params = Params::mainnet();
        let env = NetworkEnvelope::new(b"verack", Vec::new(), &params);
        let bytes = env.serialize();
        let parsed = NetworkEnvelope::parse(&mut Cursor::new(bytes), &params).unwrap();
        assert_eq!(parsed.command_str(), "verack");
        assert!(parsed.payload.is_empty());
    }

    #[test]
    fn verack_checksum_matches_the_well_known_value() {
        let params = Params::mainnet();
        let env = NetworkEnvelope::new(b"verack", Vec::new(), &params);
        let bytes = env.serialize();
        assert_eq!(hex::encode(&bytes[20..24]), "5df6e0e2");
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let env = NetworkEnvelope::new(b"verack", Vec::new(), &Params::mainnet());
        let bytes = env.serialize();
        assert!(NetworkEnvelope::parse(&mut Cursor::new(bytes), &Params::testnet()).is_err());
    }

    #[test]
    fn corrupted_checksum_is_rejected() {
        let env = NetworkEnvelope::new(b"ping", vec![1, 2, 3, 4], &Params::mainnet());
        let mut bytes = env.serialize();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        assert!(NetworkEnvelope::parse(&mut Cursor::new(bytes), &Params::mainnet()).is_err());
    }
}
