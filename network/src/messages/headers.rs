//! `headers`: a batch of block headers sent in response to `getheaders`.

use super::Message;
use crate::error::{Error, Result};
use bitcoin_core::block::BlockHeader;
use bitcoin_core::encoding::ReadExt;
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadersMessage {
    pub headers: Vec<BlockHeader>,
}

impl Message for HeadersMessage {
    const COMMAND: &'static [u8] = b"headers";

    fn serialize(&self) -> Vec<u8> {
        let mut out = bitcoin_core::encoding::encode_varint(self.headers.len() as u64);
        for header in &self.headers {
            out.extend_from_slice(&header.serialize());
            // zero transactions follow every header in a `headers` message.
            out.push(0);
        }
        out
    }

    fn parse(payload: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(payload);
        let count = cur.read_varint().map_err(|_| Error::ShortRead)?;
        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let header = BlockHeader::parse(&mut cur).map_err(Error::Core)?;
            let num_txs = cur.read_varint().map_err(|_| Error::ShortRead)?;
            if num_txs != 0 {
                return Err(Error::Other("headers message must carry zero transactions per header"));
            }
            headers.push(header);
        }
        Ok(HeadersMessage { headers })
    }
}
