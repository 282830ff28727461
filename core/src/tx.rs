//! Transactions: legacy and segwit codec, sighash computation, and input
//! verification against a caller-supplied previous-output lookup.

use crate::encoding::ReadExt;
use crate::error::{Error, Result};
use crate::hash::dsha256;
use crate::script::Script;
use num_bigint::BigUint;
use std::io::{Cursor, Read};

/// A single transaction input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxIn {
    /// Previous tx id in internal (little-endian) byte order.
    pub prev_tx: [u8; 32],
    pub prev_index: u32,
    pub script_sig: Script,
    pub sequence: u32,
}

impl TxIn {
    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut prev_tx = [0u8; 32];
        prev_tx.copy_from_slice(&reader.read_reversed(32)?);
        let prev_index = reader.read_u32_le()?;
        let script_sig = Script::parse(reader)?;
        let sequence = reader.read_u32_le()?;
        Ok(TxIn { prev_tx, prev_index, script_sig, sequence })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut prev_tx_le = self.prev_tx;
        prev_tx_le.reverse();
        out.extend_from_slice(&prev_tx_le);
        out.extend_from_slice(&self.prev_index.to_le_bytes());
        out.extend_from_slice(&self.script_sig.serialize());
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out
    }
}

/// A single transaction output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOut {
    pub amount: u64,
    pub script_pubkey: Script,
}

impl TxOut {
    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let amount = u64::from_le_bytes(reader.read_exact_vec(8)?.try_into().unwrap());
        let script_pubkey = Script::parse(reader)?;
        Ok(TxOut { amount, script_pubkey })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.amount.to_le_bytes());
        out.extend_from_slice(&self.script_pubkey.serialize());
        out
    }
}

/// Looks up the [`TxOut`] a `TxIn` spends, by previous txid (internal byte
/// order) and output index. Kept abstract so this crate stays free of
/// network I/O; `bitcoin-net`'s transaction fetcher implements this.
pub trait PrevoutLookup {
    fn lookup(&self, prev_tx: &[u8; 32], prev_index: u32) -> Option<TxOut>;
}

impl<F: Fn(&[u8; 32], u32) -> Option<TxOut>> PrevoutLookup for F {
    fn lookup(&self, prev_tx: &[u8; 32], prev_index: u32) -> Option<TxOut> {
        self(prev_tx, prev_index)
    }
}

const SIGHASH_ALL: u32 = 1;

/// A Bitcoin transaction, legacy or segwit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
    pub locktime: u32,
    pub segwit: bool,
    /// One witness stack per input; empty when `!segwit` or an input has
    /// no witness data.
    pub witnesses: Vec<Vec<Vec<u8>>>,
}

impl Transaction {
    /// Parses either a legacy or segwit-marked transaction, detected by
    /// the `00 01` marker/flag pair following the version field.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let version = reader.read_u32_le()?;
        let mut lookahead = reader.read_exact_vec(1)?;
        let segwit = lookahead[0] == 0x00;
        if segwit {
            let flag = reader.read_exact_vec(1)?[0];
            if flag != 0x01 {
                return Err(Error::Other("unsupported segwit flag"));
            }
            lookahead = reader.read_exact_vec(1)?;
        }

        let num_inputs = read_varint_with_first_byte(reader, lookahead[0])?;
        let mut tx_ins = Vec::with_capacity(num_inputs as usize);
        for _ in 0..num_inputs {
            tx_ins.push(TxIn::parse(reader)?);
        }

        let num_outputs = reader.read_varint()?;
        let mut tx_outs = Vec::with_capacity(num_outputs as usize);
        for _ in 0..num_outputs {
            tx_outs.push(TxOut::parse(reader)?);
        }

        let mut witnesses = vec![Vec::new(); tx_ins.len()];
        if segwit {
            for witness in witnesses.iter_mut() {
                let count = reader.read_varint()?;
                for _ in 0..count {
                    let len = reader.read_varint()? as usize;
                    witness.push(reader.read_exact_vec(len)?);
                }
            }
        }

        let locktime = reader.read_u32_le()?;
        Ok(Transaction { version, tx_ins, tx_outs, locktime, segwit, witnesses })
    }

    /// Serializes the transaction, including the segwit marker/flag and
    /// witness stacks when `self.segwit`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        if self.segwit {
            out.push(0x00);
            out.push(0x01);
        }
        out.extend_from_slice(&crate::encoding::encode_varint(self.tx_ins.len() as u64));
        for tx_in in &self.tx_ins {
            out.extend_from_slice(&tx_in.serialize());
        }
        out.extend_from_slice(&crate::encoding::encode_varint(self.tx_outs.len() as u64));
        for tx_out in &self.tx_outs {
            out.extend_from_slice(&tx_out.serialize());
        }
        if self.segwit {
            for witness in &self.witnesses {
                out.extend_from_slice(&crate::encoding::encode_varint(witness.len() as u64));
                for item in witness {
                    out.extend_from_slice(&crate::encoding::encode_varint(item.len() as u64));
                    out.extend_from_slice(item);
                }
            }
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }

    /// The legacy serialization (no marker/flag/witness), used as the
    /// input to the txid hash regardless of `segwit`.
    fn serialize_legacy(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&crate::encoding::encode_varint(self.tx_ins.len() as u64));
        for tx_in in &self.tx_ins {
            out.extend_from_slice(&tx_in.serialize());
        }
        out.extend_from_slice(&crate::encoding::encode_varint(self.tx_outs.len() as u64));
        for tx_out in &self.tx_outs {
            out.extend_from_slice(&tx_out.serialize());
        }
        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }

    /// Display-order (big-endian hex) transaction id.
    pub fn id(&self) -> String {
        let mut h = dsha256(&self.serialize_legacy());
        h.reverse();
        hex::encode(h)
    }

    /// Legacy SIGHASH_ALL sighash for `input_index`: every scriptSig is
    /// blanked except the input being signed, which is replaced by the
    /// prevout's scriptPubKey.
    pub fn sighash_legacy(&self, input_index: usize, script_pubkey: &Script) -> BigUint {
        let mut modified = self.clone();
        modified.segwit = false;
        modified.witnesses.clear();
        for (i, tx_in) in modified.tx_ins.iter_mut().enumerate() {
            tx_in.script_sig = if i == input_index {
                script_pubkey.clone()
            } else {
                Script::new(Vec::new())
            };
        }
        let mut payload = modified.serialize_legacy();
        payload.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
        BigUint::from_bytes_be(&dsha256(&payload))
    }

    fn hash_prevouts(&self) -> [u8; 32] {
        let mut buf = Vec::new();
        for tx_in in &self.tx_ins {
            let mut prev = tx_in.prev_tx;
            prev.reverse();
            buf.extend_from_slice(&prev);
            buf.extend_from_slice(&tx_in.prev_index.to_le_bytes());
        }
        dsha256(&buf)
    }

    fn hash_sequence(&self) -> [u8; 32] {
        let mut buf = Vec::new();
        for tx_in in &self.tx_ins {
            buf.extend_from_slice(&tx_in.sequence.to_le_bytes());
        }
        dsha256(&buf)
    }

    fn hash_outputs(&self) -> [u8; 32] {
        let mut buf = Vec::new();
        for tx_out in &self.tx_outs {
            buf.extend_from_slice(&tx_out.serialize());
        }
        dsha256(&buf)
    }

    /// BIP143 sighash for a witness v0 input. `script_code` is the scriptCode
    /// for the input (the P2PKH-equivalent script for P2WPKH, or the witness
    /// script itself for P2WSH).
    pub fn sighash_bip143(&self, input_index: usize, script_code: &Script, amount: u64) -> BigUint {
        let tx_in = &self.tx_ins[input_index];
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.version.to_le_bytes());
        buf.extend_from_slice(&self.hash_prevouts());
        buf.extend_from_slice(&self.hash_sequence());
        let mut prev = tx_in.prev_tx;
        prev.reverse();
        buf.extend_from_slice(&prev);
        buf.extend_from_slice(&tx_in.prev_index.to_le_bytes());
        buf.extend_from_slice(&script_code.serialize());
        buf.extend_from_slice(&amount.to_le_bytes());
        buf.extend_from_slice(&tx_in.sequence.to_le_bytes());
        buf.extend_from_slice(&self.hash_outputs());
        buf.extend_from_slice(&self.locktime.to_le_bytes());
        buf.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
        BigUint::from_bytes_be(&dsha256(&buf))
    }

    /// Verifies one input against a prevout lookup: resolves P2SH/P2WPKH/
    /// P2WSH, computes the correct sighash, and runs the combined script
    /// through the interpreter.
    pub fn verify_input(&self, input_index: usize, prevouts: &impl PrevoutLookup) -> Result<bool> {
        let tx_in = &self.tx_ins[input_index];
        let prevout = prevouts
            .lookup(&tx_in.prev_tx, tx_in.prev_index)
            .ok_or(Error::Other("prevout not found"))?;
        let witness = self.witnesses.get(input_index).cloned().unwrap_or_default();

        let mut script_pubkey = prevout.script_pubkey.clone();
        let mut redeem_witness_script: Option<Script> = None;

        if script_pubkey.is_p2sh() {
            let redeem_bytes = match tx_in.script_sig.cmds().last() {
                Some(crate::script::Command::Data(d)) => d.clone(),
                _ => return Ok(false),
            };
            let mut with_len = crate::encoding::encode_varint(redeem_bytes.len() as u64);
            with_len.extend_from_slice(&redeem_bytes);
            let redeem = Script::parse(&mut Cursor::new(with_len))?;
            if redeem.is_p2wpkh() || redeem.is_p2wsh() {
                script_pubkey = redeem.clone();
            } else {
                redeem_witness_script = Some(redeem);
            }
        }

        if script_pubkey.is_p2wpkh() {
            let h160 = match script_pubkey.cmds().get(1) {
                Some(crate::script::Command::Data(h)) => h.clone(),
                _ => return Ok(false),
            };
            let script_code = Script::p2pkh(&h160);
            let z = self.sighash_bip143(input_index, &script_code, prevout.amount);
            return Ok(script_code.evaluate(&z, &witness));
        }

        if script_pubkey.is_p2wsh() {
            let witness_script_bytes = match witness.last() {
                Some(w) => w.clone(),
                None => return Ok(false),
            };
            let mut with_len = crate::encoding::encode_varint(witness_script_bytes.len() as u64);
            with_len.extend_from_slice(&witness_script_bytes);
            let witness_script = Script::parse(&mut Cursor::new(with_len))?;
            let z = self.sighash_bip143(input_index, &witness_script, prevout.amount);
            let combined = tx_in.script_sig.append(&witness_script);
            return Ok(combined.evaluate(&z, &witness));
        }

        let z = self.sighash_legacy(input_index, &prevout.script_pubkey);
        let combined = if let Some(redeem) = &redeem_witness_script {
            tx_in.script_sig.append(redeem)
        } else {
            tx_in.script_sig.append(&prevout.script_pubkey)
        };
        Ok(combined.evaluate(&z, &witness))
    }
}

/// `read_varint` assuming the first byte has already been read (used after
/// peeking at the segwit marker position).
fn read_varint_with_first_byte<R: Read>(reader: &mut R, first: u8) -> Result<u64> {
    let value = match first {
        0xFD => u16::from_le_bytes(reader.read_exact_vec(2)?.try_into().unwrap()) as u64,
        0xFE => u32::from_le_bytes(reader.read_exact_vec(4)?.try_into().unwrap()) as u64,
        0xFF => u64::from_le_bytes(reader.read_exact_vec(8)?.try_into().unwrap()),
        small => small as u64,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::privatekey::PrivateKey;
    use std::collections::HashMap;

    fn simple_tx_out(amount: u64, h160: &[u8]) -> TxOut {
        TxOut { amount, script_pubkey: Script::p2pkh(h160) }
    }

    #[test]
    fn legacy_p2pkh_transaction_verifies_against_prevout_map() {
        let pk = PrivateKey::new(BigUint::from(777u64));
        let h160 = crate::hash::hash160(&pk.point().sec(true));

        let prev_txid = [0xAAu8; 32];
        let prevout = simple_tx_out(5000, &h160);

        let mut tx = Transaction {
            version: 1,
            tx_ins: vec![TxIn {
                prev_tx: prev_txid,
                prev_index: 0,
                script_sig: Script::new(Vec::new()),
                sequence: 0xFFFFFFFF,
            }],
            tx_outs: vec![simple_tx_out(4000, &h160)],
            locktime: 0,
            segwit: false,
            witnesses: vec![Vec::new()],
        };

        let z = tx.sighash_legacy(0, &prevout.script_pubkey);
        let sig = pk.sign(&z);
        let mut sig_der = sig.der();
        sig_der.push(0x01);
        tx.tx_ins[0].script_sig = Script::new(vec![
            crate::script::Command::Data(sig_der),
            crate::script::Command::Data(pk.point().sec(true)),
        ]);

        let mut map: HashMap<([u8; 32], u32), TxOut> = HashMap::new();
        map.insert((prev_txid, 0), prevout);
        let lookup = |txid: &[u8; 32], idx: u32| map.get(&(*txid, idx)).cloned();

        assert!(tx.verify_input(0, &lookup).unwrap());
    }

    #[test]
    fn transaction_serialize_parse_round_trips() {
        let pk = PrivateKey::new(BigUint::from(1u64));
        let h160 = crate::hash::hash160(&pk.point().sec(true));
        let tx = Transaction {
            version: 1,
            tx_ins: vec![TxIn {
                prev_tx: [0x01; 32],
                prev_index: 1,
                script_sig: Script::new(Vec::new()),
                sequence: 0xFFFFFFFF,
            }],
            tx_outs: vec![simple_tx_out(1000, &h160)],
            locktime: 0,
            segwit: false,
            witnesses: vec![Vec::new()],
        };
        let bytes = tx.serialize();
        let parsed = Transaction::parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed.version, tx.version);
        assert_eq!(parsed.tx_outs, tx.tx_outs);
    }
}
