//! The `version` message: the first message sent on every connection,
//! announcing protocol version, services, and peer addresses.

use super::Message;
use crate::error::{Error, Result};
use bitcoin_core::encoding::ReadExt;
use std::io::Cursor;

const DEFAULT_USER_AGENT: &[u8] = b"/bitcoin-core-rs:0.1/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMessage {
    pub version: i32,
    pub services: u64,
    pub timestamp: i64,
    pub receiver_services: u64,
    pub receiver_ip: [u8; 4],
    pub receiver_port: u16,
    pub sender_services: u64,
    pub sender_ip: [u8; 4],
    pub sender_port: u16,
    pub nonce: u64,
    pub user_agent: Vec<u8>,
    pub latest_block: i32,
    pub relay: bool,
}

impl VersionMessage {
    /// Builds an outgoing version message for the given peer address and a
    /// caller-supplied timestamp/nonce (kept out of this constructor so the
    /// message stays reproducible in tests; callers reach for
    /// `std::time::SystemTime` and `rand` themselves).
    pub fn new(receiver_ip: [u8; 4], receiver_port: u16, timestamp: i64, nonce: u64) -> Self {
        VersionMessage {
            version: 70015,
            services: 0,
            timestamp,
            receiver_services: 0,
            receiver_ip,
            receiver_port,
            sender_services: 0,
            sender_ip: [0, 0, 0, 0],
            sender_port: 8333,
            nonce,
            user_agent: DEFAULT_USER_AGENT.to_vec(),
            latest_block: 0,
            relay: false,
        }
    }

    fn serialize_ip(ip: &[u8; 4]) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[10] = 0xff;
        out[11] = 0xff;
        out[12..16].copy_from_slice(ip);
        out
    }
}

impl Message for VersionMessage {
    const COMMAND: &'static [u8] = b"version";

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.services.to_le_bytes());
        out.extend_from_slice(&self.timestamp.to_le_bytes());
        out.extend_from_slice(&self.receiver_services.to_le_bytes());
        out.extend_from_slice(&Self::serialize_ip(&self.receiver_ip));
        out.extend_from_slice(&self.receiver_port.to_be_bytes());
        out.extend_from_slice(&self.sender_services.to_le_bytes());
        out.extend_from_slice(&Self::serialize_ip(&self.sender_ip));
        out.extend_from_slice(&self.sender_port.to_be_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out.extend_from_slice(&bitcoin_core::encoding::encode_varint(self.user_agent.len() as u64));
        out.extend_from_slice(&self.user_agent);
        out.extend_from_slice(&self.latest_block.to_le_bytes());
        out.push(if self.relay { 1 } else { 0 });
        out
    }

    fn parse(payload: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(payload);
        let version = i32::from_le_bytes(cur.read_exact_vec(4).map_err(|_| Error::ShortRead)?.try_into().unwrap());
        let services = u64::from_le_bytes(cur.read_exact_vec(8).map_err(|_| Error::ShortRead)?.try_into().unwrap());
        let timestamp = cur.read_i64_le().map_err(|_| Error::ShortRead)?;
        let receiver_services =
            u64::from_le_bytes(cur.read_exact_vec(8).map_err(|_| Error::ShortRead)?.try_into().unwrap());
        let receiver_full_ip = cur.read_exact_vec(16).map_err(|_| Error::ShortRead)?;
        let mut receiver_ip = [0u8; 4];
        receiver_ip.copy_from_slice(&receiver_full_ip[12..16]);
        let receiver_port =
            u16::from_be_bytes(cur.read_exact_vec(2).map_err(|_| Error::ShortRead)?.try_into().unwrap());
        let sender_services =
            u64::from_le_bytes(cur.read_exact_vec(8).map_err(|_| Error::ShortRead)?.try_into().unwrap());
        let sender_full_ip = cur.read_exact_vec(16).map_err(|_| Error::ShortRead)?;
        let mut sender_ip = [0u8; 4];
        sender_ip.copy_from_slice(&sender_full_ip[12..16]);
        let sender_port = u16::from_be_bytes(cur.read_exact_vec(2).map_err(|_| Error::ShortRead)?.try_into().unwrap());
        let nonce = u64::from_le_bytes(cur.read_exact_vec(8).map_err(|_| Error::ShortRead)?.try_into().unwrap());
        let agent_len = cur.read_varint().map_err(|_| Error::ShortRead)?;
        let user_agent = cur.read_exact_vec(agent_len as usize).map_err(|_| Error::ShortRead)?;
        let latest_block =
            i32::from_le_bytes(cur.read_exact_vec(4).map_err(|_| Error::ShortRead)?.try_into().unwrap());
        let relay = cur.read_exact_vec(1).map_err(|_| Error::ShortRead)?[0] != 0;

        Ok(VersionMessage {
            version,
            services,
            timestamp,
            receiver_services,
            receiver_ip,
            receiver_port,
            sender_services,
            sender_ip,
            sender_port,
            nonce,
            user_agent,
            latest_block,
            relay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_message_round_trips() {
        let msg = VersionMessage::new([127, 0, 0, 1], 8333, 1_650_000_000, 0xDEADBEEF);
        let bytes = msg.serialize();
        let parsed = VersionMessage::parse(&bytes).unwrap();
        assert_eq!(parsed, msg);
    }
}
