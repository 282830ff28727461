//! `getdata`: requests full objects (transactions, blocks, filtered
//! blocks) by type and hash.

use super::Message;
use crate::error::{Error, Result};
use bitcoin_core::encoding::ReadExt;
use std::io::Cursor;

pub const TX_DATA_TYPE: u32 = 1;
pub const BLOCK_DATA_TYPE: u32 = 2;
pub const FILTERED_BLOCK_DATA_TYPE: u32 = 3;
pub const COMPACT_BLOCK_DATA_TYPE: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetDataMessage {
    /// `(type, identifier)` pairs; `identifier` is internal byte order.
    pub data: Vec<(u32, [u8; 32])>,
}

impl GetDataMessage {
    pub fn new() -> Self {
        GetDataMessage { data: Vec::new() }
    }

    pub fn add(&mut self, data_type: u32, identifier: [u8; 32]) {
        self.data.push((data_type, identifier));
    }
}

impl Default for GetDataMessage {
    fn default() -> Self {
        Self::new()
    }
}

impl Message for GetDataMessage {
    const COMMAND: &'static [u8] = b"getdata";

    fn serialize(&self) -> Vec<u8> {
        let mut out = bitcoin_core::encoding::encode_varint(self.data.len() as u64);
        for (data_type, identifier) in &self.data {
            out.extend_from_slice(&data_type.to_le_bytes());
            let mut id = *identifier;
            id.reverse();
            out.extend_from_slice(&id);
        }
        out
    }

    fn parse(payload: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(payload);
        let count = cur.read_varint().map_err(|_| Error::ShortRead)?;
        let mut data = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let data_type =
                u32::from_le_bytes(cur.read_exact_vec(4).map_err(|_| Error::ShortRead)?.try_into().unwrap());
            let mut identifier = [0u8; 32];
            identifier.copy_from_slice(&cur.read_reversed(32).map_err(|_| Error::ShortRead)?);
            data.push((data_type, identifier));
        }
        Ok(GetDataMessage { data })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn getdata_round_trips_mixed_types() {
        let mut msg = GetDataMessage::new();
        msg.add(TX_DATA_TYPE, [0x01; 32]);
        msg.add(FILTERED_BLOCK_DATA_TYPE, [0x02; 32]);
        let bytes = msg.serialize();
        let parsed = GetDataMessage::parse(&bytes).unwrap();
        assert_eq!(parsed, msg);
    }
}
