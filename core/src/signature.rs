//! ECDSA signatures and their DER encoding.

use crate::error::{Error, Result};
use num_bigint::BigUint;

/// An ECDSA signature `(r, s)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    r: BigUint,
    s: BigUint,
}

impl Signature {
    pub fn new(r: BigUint, s: BigUint) -> Self {
        Signature { r, s }
    }

    pub fn r(&self) -> &BigUint {
        &self.r
    }

    pub fn s(&self) -> &BigUint {
        &self.s
    }

    /// DER-encodes the signature: `0x30 <len> 0x02 <rlen> <r> 0x02 <slen> <s>`,
    /// each integer prefixed with a `0x00` pad byte whenever its high bit is
    /// set (so it is never mistaken for a negative two's-complement value).
    pub fn der(&self) -> Vec<u8> {
        let r_bytes = der_integer_bytes(&self.r);
        let s_bytes = der_integer_bytes(&self.s);

        let mut body = Vec::new();
        body.push(0x02);
        body.push(r_bytes.len() as u8);
        body.extend_from_slice(&r_bytes);
        body.push(0x02);
        body.push(s_bytes.len() as u8);
        body.extend_from_slice(&s_bytes);

        let mut out = Vec::new();
        out.push(0x30);
        out.push(body.len() as u8);
        out.extend_from_slice(&body);
        out
    }

    /// Parses a DER-encoded signature.
    pub fn parse(der_bin: &[u8]) -> Result<Self> {
        let mut cur = der_bin;
        take(&mut cur, 1).filter(|b| b[0] == 0x30).ok_or(Error::BadSignature)?;
        let length = *take(&mut cur, 1).ok_or(Error::BadSignature)?.first().unwrap();
        if length as usize != cur.len() {
            return Err(Error::BadSignature);
        }

        take(&mut cur, 1).filter(|b| b[0] == 0x02).ok_or(Error::BadSignature)?;
        let rlen = *take(&mut cur, 1).ok_or(Error::BadSignature)?.first().unwrap() as usize;
        let r_bytes = take(&mut cur, rlen).ok_or(Error::BadSignature)?;
        let r = BigUint::from_bytes_be(r_bytes);

        take(&mut cur, 1).filter(|b| b[0] == 0x02).ok_or(Error::BadSignature)?;
        let slen = *take(&mut cur, 1).ok_or(Error::BadSignature)?.first().unwrap() as usize;
        let s_bytes = take(&mut cur, slen).ok_or(Error::BadSignature)?;
        let s = BigUint::from_bytes_be(s_bytes);

        if !cur.is_empty() {
            return Err(Error::BadSignature);
        }

        Ok(Signature { r, s })
    }
}

/// Big-endian bytes of `n` with a leading `0x00` pad if the top bit is set.
fn der_integer_bytes(n: &BigUint) -> Vec<u8> {
    let mut bytes = n.to_bytes_be();
    if bytes.is_empty() {
        bytes.push(0);
    }
    if bytes[0] & 0x80 != 0 {
        let mut padded = vec![0u8];
        padded.extend_from_slice(&bytes);
        padded
    } else {
        bytes
    }
}

fn take<'a>(cur: &mut &'a [u8], n: usize) -> Option<&'a [u8]> {
    if cur.len() < n {
        return None;
    }
    let (head, tail) = cur.split_at(n);
    *cur = tail;
    Some(head)
}
