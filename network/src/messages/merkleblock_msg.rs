//! The `merkleblock` message: a thin [`Message`] wrapper over
//! `bitcoin_core::merkle::MerkleBlock`.

use super::Message;
use crate::error::Result;
use bitcoin_core::merkle::MerkleBlock;
use std::io::Cursor;

pub struct MerkleBlockMessage(pub MerkleBlock);

impl Message for MerkleBlockMessage {
    const COMMAND: &'static [u8] = b"merkleblock";

    fn serialize(&self) -> Vec<u8> {
        // Only inbound `merkleblock` messages are needed by this library's
        // node client; re-serialization is not exercised on the wire.
        unimplemented!("merkleblock is only ever received, never sent")
    }

    fn parse(payload: &[u8]) -> Result<Self> {
        let block = MerkleBlock::parse(&mut Cursor::new(payload))?;
        Ok(MerkleBlockMessage(block))
    }
}
