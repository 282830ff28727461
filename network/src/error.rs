//! Error types for the **bitcoin-net** crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("envelope magic did not match the expected network")]
    BadMagic,

    #[error("envelope payload checksum did not match")]
    BadChecksum,

    #[error("stream ended before the expected number of bytes was read")]
    ShortRead,

    #[error("peer did not send the expected message within the handshake")]
    HandshakeFailed,

    #[error("fetched transaction id did not match the requested txid")]
    TxIdMismatch,

    #[error(transparent)]
    Core(#[from] bitcoin_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(&'static str),
}

pub type Result<T> = core::result::Result<T, Error>;
