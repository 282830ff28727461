//! `getheaders`: requests up to 2000 block headers starting after a given
//! block locator.

use super::Message;
use crate::error::{Error, Result};
use bitcoin_core::encoding::ReadExt;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetHeadersMessage {
    pub version: u32,
    /// Block hash to start after, internal (little-endian) byte order.
    pub start_block: [u8; 32],
    /// All-zero unless requesting a specific stopping point.
    pub end_block: [u8; 32],
}

impl GetHeadersMessage {
    pub fn new(start_block: [u8; 32]) -> Self {
        GetHeadersMessage { version: 70015, start_block, end_block: [0u8; 32] }
    }
}

impl Message for GetHeadersMessage {
    const COMMAND: &'static [u8] = b"getheaders";

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&bitcoin_core::encoding::encode_varint(1));
        let mut start = self.start_block;
        start.reverse();
        out.extend_from_slice(&start);
        let mut end = self.end_block;
        end.reverse();
        out.extend_from_slice(&end);
        out
    }

    fn parse(payload: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(payload);
        let version =
            u32::from_le_bytes(cur.read_exact_vec(4).map_err(|_| Error::ShortRead)?.try_into().unwrap());
        let num_hashes = cur.read_varint().map_err(|_| Error::ShortRead)?;
        if num_hashes != 1 {
            return Err(Error::Other("getheaders must request exactly one locator hash"));
        }
        let mut start_block = [0u8; 32];
        start_block.copy_from_slice(&cur.read_reversed(32).map_err(|_| Error::ShortRead)?);
        let mut end_block = [0u8; 32];
        end_block.copy_from_slice(&cur.read_reversed(32).map_err(|_| Error::ShortRead)?);
        Ok(GetHeadersMessage { version, start_block, end_block })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getheaders_round_trips() {
        let msg = GetHeadersMessage::new([0x42u8; 32]);
        let bytes = msg.serialize();
        let parsed = GetHeadersMessage::parse(&bytes).unwrap();
        assert_eq!(parsed, msg);
    }
}
