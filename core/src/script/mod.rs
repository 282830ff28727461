//! Bitcoin Script: parsing, serialization, and the stack-machine
//! interpreter, including the BIP16/BIP141 witness handoffs.

pub mod opcodes;

use crate::encoding::ReadExt;
use crate::error::{Error, Result};
use num_bigint::BigUint;
use std::io::{Cursor, Read};

const OP_PUSHDATA1: u8 = 0x4C;
const OP_PUSHDATA2: u8 = 0x4D;

/// One element of a script: either a single opcode byte or a data push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Op(u8),
    Data(Vec<u8>),
}

/// A sequence of [`Command`]s, Script's unit of scriptSig/scriptPubKey/
/// redeem/witness script.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Script(pub Vec<Command>);

impl Script {
    pub fn new(cmds: Vec<Command>) -> Self {
        Script(cmds)
    }

    pub fn cmds(&self) -> &[Command] {
        &self.0
    }

    /// Parses a length-prefixed script from a byte stream: a varint total
    /// length, followed by that many bytes of opcodes/pushes.
    pub fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let length = reader.read_varint()? as usize;
        let raw = reader.read_exact_vec(length)?;
        let mut cur = Cursor::new(raw);
        let mut cmds = Vec::new();
        let mut consumed = 0usize;
        while consumed < length {
            let opcode = cur.read_exact_vec(1)?[0];
            consumed += 1;
            match opcode {
                1..=75 => {
                    let data = cur.read_exact_vec(opcode as usize)?;
                    consumed += opcode as usize;
                    cmds.push(Command::Data(data));
                }
                OP_PUSHDATA1 => {
                    let n = cur.read_exact_vec(1)?[0] as usize;
                    let data = cur.read_exact_vec(n)?;
                    consumed += 1 + n;
                    cmds.push(Command::Data(data));
                }
                OP_PUSHDATA2 => {
                    let n = u16::from_le_bytes(cur.read_exact_vec(2)?.try_into().unwrap()) as usize;
                    let data = cur.read_exact_vec(n)?;
                    consumed += 2 + n;
                    cmds.push(Command::Data(data));
                }
                op => cmds.push(Command::Op(op)),
            }
        }
        if consumed != length {
            return Err(Error::BadScript);
        }
        Ok(Script(cmds))
    }

    pub(crate) fn raw_serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for cmd in &self.0 {
            match cmd {
                Command::Op(op) => out.push(*op),
                Command::Data(data) => {
                    let len = data.len();
                    if len <= 75 {
                        out.push(len as u8);
                    } else if len <= 255 {
                        out.push(OP_PUSHDATA1);
                        out.push(len as u8);
                    } else if len <= 520 {
                        out.push(OP_PUSHDATA2);
                        out.extend_from_slice(&(len as u16).to_le_bytes());
                    } else {
                        // Oversized pushes cannot be serialized; callers
                        // should never construct one.
                        continue;
                    }
                    out.extend_from_slice(data);
                }
            }
        }
        out
    }

    /// Serializes with the leading varint length prefix.
    pub fn serialize(&self) -> Vec<u8> {
        let raw = self.raw_serialize();
        let mut out = crate::encoding::encode_varint(raw.len() as u64);
        out.extend_from_slice(&raw);
        out
    }

    /// Concatenates `self`'s commands followed by `other`'s, as used to
    /// build `scriptSig ‖ scriptPubKey` before evaluation.
    pub fn append(&self, other: &Script) -> Script {
        let mut cmds = self.0.clone();
        cmds.extend(other.0.iter().cloned());
        Script(cmds)
    }

    pub fn is_p2pkh(&self) -> bool {
        matches!(
            self.0.as_slice(),
            [Command::Op(0x76), Command::Op(0xA9), Command::Data(h), Command::Op(0x88), Command::Op(0xAC)]
            if h.len() == 20
        )
    }

    pub fn is_p2sh(&self) -> bool {
        matches!(
            self.0.as_slice(),
            [Command::Op(0xA9), Command::Data(h), Command::Op(0x87)] if h.len() == 20
        )
    }

    pub fn is_p2wpkh(&self) -> bool {
        matches!(
            self.0.as_slice(),
            [Command::Op(0x00), Command::Data(h)] if h.len() == 20
        )
    }

    pub fn is_p2wsh(&self) -> bool {
        matches!(
            self.0.as_slice(),
            [Command::Op(0x00), Command::Data(h)] if h.len() == 32
        )
    }

    /// Builds a standard P2PKH scriptPubKey for the given hash160.
    pub fn p2pkh(h160: &[u8]) -> Self {
        Script(vec![
            Command::Op(0x76),
            Command::Op(0xA9),
            Command::Data(h160.to_vec()),
            Command::Op(0x88),
            Command::Op(0xAC),
        ])
    }

    /// Builds a standard P2SH scriptPubKey for the given script hash160.
    pub fn p2sh(h160: &[u8]) -> Self {
        Script(vec![Command::Op(0xA9), Command::Data(h160.to_vec()), Command::Op(0x87)])
    }

    /// Runs the interpreter over this script's commands with sighash `z`
    /// and an optional witness stack (for segwit inputs; pass an empty
    /// slice for legacy inputs).
    pub fn evaluate(&self, z: &BigUint, witness: &[Vec<u8>]) -> bool {
        let mut cmds: Vec<Command> = self.0.clone();
        let mut stack: Vec<Vec<u8>> = Vec::new();
        let mut altstack: Vec<Vec<u8>> = Vec::new();
        cmds.reverse(); // use as a stack: pop() takes the front of the queue

        while let Some(cmd) = cmds.pop() {
            match cmd {
                Command::Data(data) => {
                    stack.push(data.clone());

                    // BIP16 P2SH unwrap: OP_HASH160 <20-byte> OP_EQUAL next.
                    if cmds.len() >= 3 {
                        let next_three_match = matches!(cmds[cmds.len() - 1], Command::Op(0xA9))
                            && matches!(&cmds[cmds.len() - 2], Command::Data(h) if h.len() == 20)
                            && matches!(cmds[cmds.len() - 3], Command::Op(0x87));
                        if next_three_match {
                            cmds.pop(); // OP_HASH160
                            let h160 = match cmds.pop() {
                                Some(Command::Data(h)) => h,
                                _ => return false,
                            };
                            cmds.pop(); // OP_EQUAL

                            if !opcodes::op_hash160(&mut stack) {
                                return false;
                            }
                            stack.push(h160);
                            if !opcodes::op_equal(&mut stack) {
                                return false;
                            }
                            if !opcodes::op_verify(&mut stack) {
                                return false;
                            }

                            let redeem_script = match Script::parse(&mut Cursor::new({
                                let mut with_len = crate::encoding::encode_varint(data.len() as u64);
                                with_len.extend_from_slice(&data);
                                with_len
                            })) {
                                Ok(s) => s,
                                Err(_) => return false,
                            };
                            let mut new_cmds = redeem_script.0;
                            new_cmds.reverse();
                            cmds.extend(new_cmds);
                        }
                    }
                }
                Command::Op(op) => {
                    if opcodes::is_conditional(op) {
                        if !eval_conditional(op, &mut stack, &mut cmds) {
                            return false;
                        }
                        continue;
                    }
                    if opcodes::is_alt_stack_op(op) {
                        let ok = if op == 107 {
                            opcodes::op_toaltstack(&mut stack, &mut altstack)
                        } else {
                            opcodes::op_fromaltstack(&mut stack, &mut altstack)
                        };
                        if !ok {
                            return false;
                        }
                        continue;
                    }
                    if opcodes::is_checksig_family(op) {
                        let ok = match op {
                            172 => opcodes::op_checksig(&mut stack, z),
                            173 => opcodes::op_checksigverify(&mut stack, z),
                            174 => opcodes::op_checkmultisig(&mut stack, z),
                            175 => opcodes::op_checkmultisigverify(&mut stack, z),
                            _ => unreachable!(),
                        };
                        if !ok {
                            return false;
                        }
                        continue;
                    }
                    if !opcodes::dispatch(op, &mut stack) {
                        return false;
                    }

                    // BIP141 P2WPKH witness handoff.
                    if stack.len() == 2 && stack[0].is_empty() && stack[1].len() == 20 {
                        let h160 = stack.pop().unwrap();
                        stack.pop(); // empty marker
                        for item in witness {
                            stack.push(item.clone());
                        }
                        let p2pkh = Script::p2pkh(&h160);
                        let mut new_cmds = p2pkh.0;
                        new_cmds.reverse();
                        cmds.extend(new_cmds);
                    }
                    // BIP141 P2WSH witness handoff.
                    else if stack.len() == 2 && stack[0].is_empty() && stack[1].len() == 32 {
                        let script_hash = stack.pop().unwrap();
                        stack.pop();
                        if witness.is_empty() {
                            return false;
                        }
                        for item in &witness[..witness.len() - 1] {
                            stack.push(item.clone());
                        }
                        let witness_script_bytes = &witness[witness.len() - 1];
                        let computed = crate::hash::sha256(witness_script_bytes);
                        if computed.to_vec() != script_hash {
                            return false;
                        }
                        let witness_script = match Script::parse(&mut Cursor::new({
                            let mut with_len =
                                crate::encoding::encode_varint(witness_script_bytes.len() as u64);
                            with_len.extend_from_slice(witness_script_bytes);
                            with_len
                        })) {
                            Ok(s) => s,
                            Err(_) => return false,
                        };
                        let mut new_cmds = witness_script.0;
                        new_cmds.reverse();
                        cmds.extend(new_cmds);
                    }
                }
            }
        }

        match stack.last() {
            Some(top) => !top.iter().all(|&b| b == 0),
            None => false,
        }
    }
}

/// Handles `OP_IF`/`OP_NOTIF` by consuming the true/false branches out of
/// the remaining command queue, honoring a single `OP_ELSE` and requiring
/// a matching `OP_ENDIF`.
fn eval_conditional(op: u8, stack: &mut Vec<Vec<u8>>, cmds: &mut Vec<Command>) -> bool {
    let condition = match stack.pop() {
        Some(v) => !v.iter().all(|&b| b == 0),
        None => return false,
    };
    let take_true_branch = if op == 99 { condition } else { !condition };

    let mut true_branch = Vec::new();
    let mut false_branch = Vec::new();
    let mut depth = 1;
    let mut in_false_branch = false;

    while let Some(cmd) = cmds.pop() {
        match &cmd {
            Command::Op(99) | Command::Op(100) => {
                depth += 1;
                (if in_false_branch { &mut false_branch } else { &mut true_branch }).push(cmd);
            }
            Command::Op(103) if depth == 1 => {
                in_false_branch = true;
            }
            Command::Op(104) if depth == 1 => {
                depth -= 1;
                break;
            }
            Command::Op(104) => {
                depth -= 1;
                (if in_false_branch { &mut false_branch } else { &mut true_branch }).push(cmd);
            }
            _ => {
                (if in_false_branch { &mut false_branch } else { &mut true_branch }).push(cmd);
            }
        }
    }
    if depth != 0 {
        return false; // unmatched OP_IF/OP_NOTIF
    }

    let chosen = if take_true_branch { true_branch } else { false_branch };
    let mut chosen = chosen;
    chosen.reverse();
    cmds.extend(chosen);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash160;
    use crate::privatekey::PrivateKey;
    use std::io::Cursor;

    #[test]
    fn serialize_parse_round_trips_a_p2pkh_script() {
        let h160 = [0x11u8; 20];
        let script = Script::p2pkh(&h160);
        let bytes = script.serialize();
        let parsed = Script::parse(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(parsed, script);
        assert!(parsed.is_p2pkh());
    }

    #[test]
    fn p2pkh_script_evaluates_true_with_valid_signature() {
        let pk = PrivateKey::new(BigUint::from(8675309u64));
        let z = BigUint::from(999u64);
        let sig = pk.sign(&z);
        let mut sig_der = sig.der();
        sig_der.push(0x01);
        let pubkey_sec = pk.point().sec(true);

        let script_sig = Script(vec![Command::Data(sig_der), Command::Data(pubkey_sec.clone())]);
        let h160 = hash160(&pubkey_sec);
        let script_pubkey = Script::p2pkh(&h160);
        let combined = script_sig.append(&script_pubkey);

        assert!(combined.evaluate(&z, &[]));
    }

    #[test]
    fn p2pkh_script_fails_with_wrong_key() {
        let pk = PrivateKey::new(BigUint::from(1u64));
        let other = PrivateKey::new(BigUint::from(2u64));
        let z = BigUint::from(999u64);
        let sig = pk.sign(&z);
        let mut sig_der = sig.der();
        sig_der.push(0x01);

        let script_sig = Script(vec![Command::Data(sig_der), Command::Data(pk.point().sec(true))]);
        let h160 = hash160(&other.point().sec(true));
        let script_pubkey = Script::p2pkh(&h160);
        let combined = script_sig.append(&script_pubkey);

        assert!(!combined.evaluate(&z, &[]));
    }

    #[test]
    fn op_if_selects_the_correct_branch() {
        // OP_1 OP_IF OP_2 OP_ELSE OP_3 OP_ENDIF -> leaves 2 on the stack.
        let script = Script(vec![
            Command::Op(81), // OP_1 (true)
            Command::Op(99), // OP_IF
            Command::Op(82), // OP_2
            Command::Op(103), // OP_ELSE
            Command::Op(83), // OP_3
            Command::Op(104), // OP_ENDIF
        ]);
        assert!(script.evaluate(&BigUint::from(0u64), &[]));
    }

    #[test]
    fn p2sh_script_unwraps_redeem_script() {
        // A 1-of-1 multisig redeem script wrapped in P2SH.
        let pk = PrivateKey::new(BigUint::from(4242u64));
        let z = BigUint::from(1u64);
        let pubkey = pk.point().sec(true);
        let redeem = Script(vec![
            Command::Op(81), // OP_1
            Command::Data(pubkey.clone()),
            Command::Op(81), // OP_1
            Command::Op(174), // OP_CHECKMULTISIG
        ]);
        let redeem_bytes = redeem.raw_serialize();
        let redeem_hash = hash160(&redeem_bytes);
        let script_pubkey = Script::p2sh(&redeem_hash);

        let sig = pk.sign(&z);
        let mut sig_der = sig.der();
        sig_der.push(0x01);
        let script_sig = Script(vec![
            Command::Data(Vec::new()), // CHECKMULTISIG dummy element
            Command::Data(sig_der),
            Command::Data(redeem_bytes),
        ]);
        let combined = script_sig.append(&script_pubkey);
        assert!(combined.evaluate(&z, &[]));
    }
}
