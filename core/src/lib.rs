//! `bitcoin-core`: pure, I/O-free Bitcoin protocol primitives — secp256k1
//! ECC/ECDSA, Script, transactions, block headers, merkle proofs, and
//! Bloom filters.
//!
//! Everything here is deterministic and allocation-bounded; networking and
//! HTTP live in the sibling `bitcoin-net` crate.

pub mod block;
pub mod bloom;
pub mod encoding;
pub mod error;
pub mod field;
pub mod hash;
pub mod merkle;
pub mod params;
pub mod point;
pub mod privatekey;
pub mod script;
pub mod signature;
pub mod tx;

pub use error::{Error, Result};
pub use params::Params;
