//! `ping`/`pong`: keepalive messages carrying a matching 8-byte nonce.

use super::Message;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingMessage {
    pub nonce: u64,
}

impl Message for PingMessage {
    const COMMAND: &'static [u8] = b"ping";

    fn serialize(&self) -> Vec<u8> {
        self.nonce.to_le_bytes().to_vec()
    }

    fn parse(payload: &[u8]) -> Result<Self> {
        let bytes: [u8; 8] = payload.try_into().map_err(|_| Error::ShortRead)?;
        Ok(PingMessage { nonce: u64::from_le_bytes(bytes) })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PongMessage {
    pub nonce: u64,
}

impl Message for PongMessage {
    const COMMAND: &'static [u8] = b"pong";

    fn serialize(&self) -> Vec<u8> {
        self.nonce.to_le_bytes().to_vec()
    }

    fn parse(payload: &[u8]) -> Result<Self> {
        let bytes: [u8; 8] = payload.try_into().map_err(|_| Error::ShortRead)?;
        Ok(PongMessage { nonce: u64::from_le_bytes(bytes) })
    }
}

impl From<PingMessage> for PongMessage {
    fn from(ping: PingMessage) -> Self {
        PongMessage { nonce: ping.nonce }
    }
}
