//! The `filterload` message: installs a Bloom filter on a peer connection
//! so it only relays matching transactions and `merkleblock` proofs.

use super::Message;
use crate::error::Result;
use bitcoin_core::bloom::BloomFilter;

pub struct FilterLoadMessage {
    pub filter: BloomFilter,
    pub flag: u8,
}

impl Message for FilterLoadMessage {
    const COMMAND: &'static [u8] = b"filterload";

    fn serialize(&self) -> Vec<u8> {
        self.filter.filterload(self.flag)
    }

    fn parse(_payload: &[u8]) -> Result<Self> {
        // Only ever sent by this library's node client, never received.
        unimplemented!("filterload is only ever sent, never received")
    }
}
