//! The `verack` message: empty payload, acknowledges a received `version`.

use super::Message;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VerAckMessage;

impl Message for VerAckMessage {
    const COMMAND: &'static [u8] = b"verack";

    fn serialize(&self) -> Vec<u8> {
        Vec::new()
    }

    fn parse(_payload: &[u8]) -> Result<Self> {
        Ok(VerAckMessage)
    }
}
