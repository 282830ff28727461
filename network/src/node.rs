//! A synchronous TCP peer connection: the handshake, and a generic
//! `wait_for` loop that answers bookkeeping messages transparently while
//! waiting for one of a set of requested message types.

use crate::envelope::NetworkEnvelope;
use crate::error::{Error, Result};
use crate::messages::ping_pong::{PingMessage, PongMessage};
use crate::messages::verack::VerAckMessage;
use crate::messages::version::VersionMessage;
use crate::messages::Message;
use bitcoin_core::params::Params;
use std::io::{BufReader, Write};
use std::net::TcpStream;

/// A connection to one Bitcoin peer.
pub struct SimpleNode {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    params: Params,
}

impl SimpleNode {
    pub fn connect(host: &str, port: u16, params: Params) -> Result<Self> {
        let stream = TcpStream::connect((host, port))?;
        let reader = BufReader::new(stream.try_clone()?);
        log::info!("connected to peer {host}:{port}");
        Ok(SimpleNode { stream, reader, params })
    }

    pub fn send<M: Message>(&mut self, message: &M) -> Result<()> {
        let envelope = NetworkEnvelope::new(M::COMMAND, message.serialize(), &self.params);
        log::debug!("-> {}", envelope.command_str());
        envelope.write_to(&mut self.stream)?;
        self.stream.flush()?;
        Ok(())
    }

    fn read_envelope(&mut self) -> Result<NetworkEnvelope> {
        let env = NetworkEnvelope::parse(&mut self.reader, &self.params)?;
        log::debug!("<- {}", env.command_str());
        Ok(env)
    }

    /// Sends a `version` message and waits for the peer's `verack`,
    /// transparently replying to the peer's own `version` with `verack`
    /// and to any `ping` with a matching `pong` along the way.
    pub fn handshake(&mut self, version: VersionMessage) -> Result<()> {
        self.send(&version)?;
        loop {
            let env = self.read_envelope()?;
            match env.command_str().as_str() {
                "version" => self.send(&VerAckMessage)?,
                "verack" => return Ok(()),
                "ping" => {
                    let ping = PingMessage::parse(&env.payload)?;
                    self.send(&PongMessage::from(ping))?;
                }
                _ => {}
            }
        }
    }

    /// Reads envelopes until one matches a command in `commands`,
    /// answering `ping`/`version` bookkeeping messages along the way.
    pub fn wait_for(&mut self, commands: &[&[u8]]) -> Result<NetworkEnvelope> {
        loop {
            let env = self.read_envelope()?;
            match env.command_str().as_str() {
                "version" => self.send(&VerAckMessage)?,
                "ping" => {
                    let ping = PingMessage::parse(&env.payload)?;
                    self.send(&PongMessage::from(ping))?;
                }
                _ => {}
            }
            if commands.iter().any(|c| trimmed(c) == env.command_str()) {
                return Ok(env);
            }
        }
    }
}

fn trimmed(command: &[u8]) -> String {
    let end = command.iter().position(|&b| b == 0).unwrap_or(command.len());
    String::from_utf8_lossy(&command[..end]).into_owned()
}
