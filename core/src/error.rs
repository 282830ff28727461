//! Error types for the **bitcoin-core** crate.
//!
//! All fallible operations return [`crate::Result`], an alias for
//! `core::result::Result<T, Error>`. The enum is intentionally flat: lower
//! level errors (bad hex, malformed streams) are mapped into one of these
//! variants before bubbling up to callers.

use thiserror::Error;

/// Core crate error type.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    /// A field or curve operand did not have the expected prime/curve.
    #[error("operand belongs to a different field")]
    OutOfField,

    /// A point's coordinates do not satisfy the curve equation.
    #[error("point is not on the curve")]
    NotOnCurve,

    /// A DER-encoded signature was malformed, had the wrong markers, or had
    /// a length mismatch.
    #[error("bad signature encoding")]
    BadSignature,

    /// A serialized script had a length mismatch or an overlong data push.
    #[error("malformed script")]
    BadScript,

    /// Base58Check decoding failed its checksum.
    #[error("bad address checksum")]
    BadAddress,

    /// A partial merkle tree's flag bits or hash stream were not fully
    /// consumed, or the reconstructed root did not match.
    #[error("malformed merkle proof")]
    ProofMalformed,

    /// A sighash type this library does not implement was requested.
    #[error("unsupported sighash type")]
    SighashUnsupported,

    /// A byte stream ended before the expected number of bytes was read.
    #[error("short read while parsing")]
    ShortRead,

    /// Catch-all for errors surfaced from outside the crate's own types.
    #[error("{0}")]
    Other(&'static str),
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
