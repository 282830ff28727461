//! Individual opcode implementations, grouped by the calling convention the
//! interpreter in [`super`] invokes them with. Every opcode returns `bool`;
//! `false` aborts evaluation exactly like any other failure (there is no
//! separate "unimplemented opcode" error — this mirrors §7's flat error
//! list, where a bad script is just `Error::BadScript`).

use super::Command;
use crate::hash::{dsha256, hash160, sha256};
use crate::point::S256Point;
use crate::signature::Signature;
use num_bigint::BigUint;
use sha1::Sha1;
use sha2::Digest;

type Stack = Vec<Vec<u8>>;

/// Encodes a small signed integer the way Script does: little-endian,
/// minimal length, with the sign carried in the top bit of the last byte.
pub fn encode_num(n: i64) -> Vec<u8> {
    if n == 0 {
        return Vec::new();
    }
    let negative = n < 0;
    let mut abs = n.unsigned_abs();
    let mut out = Vec::new();
    while abs > 0 {
        out.push((abs & 0xff) as u8);
        abs >>= 8;
    }
    if out.last().map_or(false, |&b| b & 0x80 != 0) {
        out.push(if negative { 0x80 } else { 0x00 });
    } else if negative {
        *out.last_mut().unwrap() |= 0x80;
    }
    out
}

/// Decodes a Script-encoded number (little-endian, sign in the top bit of
/// the last byte, empty means zero).
pub fn decode_num(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let negative = bytes[bytes.len() - 1] & 0x80 != 0;
    let mut result: i64 = 0;
    for (i, &b) in bytes.iter().enumerate() {
        let b = if i == bytes.len() - 1 { b & 0x7f } else { b };
        result |= (b as i64) << (8 * i);
    }
    if negative {
        -result
    } else {
        result
    }
}

fn is_truthy(bytes: &[u8]) -> bool {
    !bytes.iter().all(|&b| b == 0)
}

fn pop(stack: &mut Stack) -> Option<Vec<u8>> {
    stack.pop()
}

// ---- constants ----

pub fn op_0(stack: &mut Stack) -> bool {
    stack.push(Vec::new());
    true
}

pub fn op_1negate(stack: &mut Stack) -> bool {
    stack.push(encode_num(-1));
    true
}

pub fn op_n(stack: &mut Stack, n: i64) -> bool {
    stack.push(encode_num(n));
    true
}

// ---- flow control (OP_NOP/VERIFY/RETURN; IF/NOTIF/ELSE/ENDIF live in mod.rs) ----

pub fn op_nop(_stack: &mut Stack) -> bool {
    true
}

pub fn op_verify(stack: &mut Stack) -> bool {
    match pop(stack) {
        Some(v) => is_truthy(&v),
        None => false,
    }
}

pub fn op_return(_stack: &mut Stack) -> bool {
    false
}

// ---- alt stack ----

pub fn op_toaltstack(stack: &mut Stack, altstack: &mut Stack) -> bool {
    match pop(stack) {
        Some(v) => {
            altstack.push(v);
            true
        }
        None => false,
    }
}

pub fn op_fromaltstack(stack: &mut Stack, altstack: &mut Stack) -> bool {
    match pop(altstack) {
        Some(v) => {
            stack.push(v);
            true
        }
        None => false,
    }
}

// ---- stack manipulation ----

pub fn op_ifdup(stack: &mut Stack) -> bool {
    match stack.last() {
        Some(top) if is_truthy(top) => {
            stack.push(top.clone());
            true
        }
        Some(_) => true,
        None => false,
    }
}

pub fn op_depth(stack: &mut Stack) -> bool {
    let n = stack.len() as i64;
    stack.push(encode_num(n));
    true
}

pub fn op_drop(stack: &mut Stack) -> bool {
    pop(stack).is_some()
}

pub fn op_dup(stack: &mut Stack) -> bool {
    match stack.last() {
        Some(top) => {
            stack.push(top.clone());
            true
        }
        None => false,
    }
}

pub fn op_nip(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let top = stack.pop().unwrap();
    stack.pop();
    stack.push(top);
    true
}

pub fn op_over(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let item = stack[stack.len() - 2].clone();
    stack.push(item);
    true
}

pub fn op_pick(stack: &mut Stack) -> bool {
    let n = match pop(stack) {
        Some(v) => decode_num(&v),
        None => return false,
    };
    if n < 0 || n as usize >= stack.len() {
        return false;
    }
    let item = stack[stack.len() - 1 - n as usize].clone();
    stack.push(item);
    true
}

pub fn op_roll(stack: &mut Stack) -> bool {
    let n = match pop(stack) {
        Some(v) => decode_num(&v),
        None => return false,
    };
    if n < 0 || n as usize >= stack.len() {
        return false;
    }
    let idx = stack.len() - 1 - n as usize;
    let item = stack.remove(idx);
    stack.push(item);
    true
}

pub fn op_rot(stack: &mut Stack) -> bool {
    if stack.len() < 3 {
        return false;
    }
    let idx = stack.len() - 3;
    let item = stack.remove(idx);
    stack.push(item);
    true
}

pub fn op_swap(stack: &mut Stack) -> bool {
    let len = stack.len();
    if len < 2 {
        return false;
    }
    stack.swap(len - 1, len - 2);
    true
}

pub fn op_tuck(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let top = stack[stack.len() - 1].clone();
    let idx = stack.len() - 2;
    stack.insert(idx, top);
    true
}

pub fn op_2drop(stack: &mut Stack) -> bool {
    pop(stack).is_some() && pop(stack).is_some()
}

pub fn op_2dup(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let (a, b) = (stack[stack.len() - 2].clone(), stack[stack.len() - 1].clone());
    stack.push(a);
    stack.push(b);
    true
}

pub fn op_3dup(stack: &mut Stack) -> bool {
    if stack.len() < 3 {
        return false;
    }
    let len = stack.len();
    let items: Vec<_> = stack[len - 3..].to_vec();
    stack.extend(items);
    true
}

pub fn op_2over(stack: &mut Stack) -> bool {
    if stack.len() < 4 {
        return false;
    }
    let len = stack.len();
    let items = vec![stack[len - 4].clone(), stack[len - 3].clone()];
    stack.extend(items);
    true
}

pub fn op_2rot(stack: &mut Stack) -> bool {
    if stack.len() < 6 {
        return false;
    }
    let idx = stack.len() - 6;
    let a = stack.remove(idx);
    let b = stack.remove(idx);
    stack.push(a);
    stack.push(b);
    true
}

pub fn op_2swap(stack: &mut Stack) -> bool {
    let len = stack.len();
    if len < 4 {
        return false;
    }
    stack.swap(len - 4, len - 2);
    stack.swap(len - 3, len - 1);
    true
}

// ---- splice ----

pub fn op_size(stack: &mut Stack) -> bool {
    match stack.last() {
        Some(top) => {
            let len = top.len() as i64;
            stack.push(encode_num(len));
            true
        }
        None => false,
    }
}

// ---- bitwise / equality ----

pub fn op_equal(stack: &mut Stack) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let a = pop(stack).unwrap();
    let b = pop(stack).unwrap();
    stack.push(encode_num(if a == b { 1 } else { 0 }));
    true
}

pub fn op_equalverify(stack: &mut Stack) -> bool {
    op_equal(stack) && op_verify(stack)
}

// ---- arithmetic ----

fn unary(stack: &mut Stack, f: impl Fn(i64) -> i64) -> bool {
    match pop(stack) {
        Some(v) => {
            stack.push(encode_num(f(decode_num(&v))));
            true
        }
        None => false,
    }
}

fn binary(stack: &mut Stack, f: impl Fn(i64, i64) -> i64) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let b = decode_num(&pop(stack).unwrap());
    let a = decode_num(&pop(stack).unwrap());
    stack.push(encode_num(f(a, b)));
    true
}

pub fn op_1add(stack: &mut Stack) -> bool {
    unary(stack, |n| n + 1)
}

pub fn op_1sub(stack: &mut Stack) -> bool {
    unary(stack, |n| n - 1)
}

pub fn op_negate(stack: &mut Stack) -> bool {
    unary(stack, |n| -n)
}

pub fn op_abs(stack: &mut Stack) -> bool {
    unary(stack, |n| n.abs())
}

pub fn op_not(stack: &mut Stack) -> bool {
    unary(stack, |n| if n == 0 { 1 } else { 0 })
}

pub fn op_0notequal(stack: &mut Stack) -> bool {
    unary(stack, |n| if n != 0 { 1 } else { 0 })
}

pub fn op_add(stack: &mut Stack) -> bool {
    binary(stack, |a, b| a + b)
}

pub fn op_sub(stack: &mut Stack) -> bool {
    binary(stack, |a, b| a - b)
}

pub fn op_booland(stack: &mut Stack) -> bool {
    binary(stack, |a, b| if a != 0 && b != 0 { 1 } else { 0 })
}

pub fn op_boolor(stack: &mut Stack) -> bool {
    binary(stack, |a, b| if a != 0 || b != 0 { 1 } else { 0 })
}

pub fn op_numequal(stack: &mut Stack) -> bool {
    binary(stack, |a, b| if a == b { 1 } else { 0 })
}

pub fn op_numequalverify(stack: &mut Stack) -> bool {
    op_numequal(stack) && op_verify(stack)
}

pub fn op_numnotequal(stack: &mut Stack) -> bool {
    binary(stack, |a, b| if a != b { 1 } else { 0 })
}

pub fn op_lessthan(stack: &mut Stack) -> bool {
    binary(stack, |a, b| if a < b { 1 } else { 0 })
}

pub fn op_greaterthan(stack: &mut Stack) -> bool {
    binary(stack, |a, b| if a > b { 1 } else { 0 })
}

pub fn op_lessthanorequal(stack: &mut Stack) -> bool {
    binary(stack, |a, b| if a <= b { 1 } else { 0 })
}

pub fn op_greaterthanorequal(stack: &mut Stack) -> bool {
    binary(stack, |a, b| if a >= b { 1 } else { 0 })
}

pub fn op_min(stack: &mut Stack) -> bool {
    binary(stack, |a, b| a.min(b))
}

pub fn op_max(stack: &mut Stack) -> bool {
    binary(stack, |a, b| a.max(b))
}

pub fn op_within(stack: &mut Stack) -> bool {
    if stack.len() < 3 {
        return false;
    }
    let max = decode_num(&pop(stack).unwrap());
    let min = decode_num(&pop(stack).unwrap());
    let x = decode_num(&pop(stack).unwrap());
    stack.push(encode_num(if x >= min && x < max { 1 } else { 0 }));
    true
}

// ---- crypto ----

pub fn op_ripemd160(stack: &mut Stack) -> bool {
    match pop(stack) {
        Some(v) => {
            use ripemd::Ripemd160;
            stack.push(Ripemd160::digest(v).to_vec());
            true
        }
        None => false,
    }
}

pub fn op_sha1(stack: &mut Stack) -> bool {
    match pop(stack) {
        Some(v) => {
            stack.push(Sha1::digest(v).to_vec());
            true
        }
        None => false,
    }
}

pub fn op_sha256(stack: &mut Stack) -> bool {
    match pop(stack) {
        Some(v) => {
            stack.push(sha256(&v).to_vec());
            true
        }
        None => false,
    }
}

pub fn op_hash160(stack: &mut Stack) -> bool {
    match pop(stack) {
        Some(v) => {
            stack.push(hash160(&v).to_vec());
            true
        }
        None => false,
    }
}

pub fn op_hash256(stack: &mut Stack) -> bool {
    match pop(stack) {
        Some(v) => {
            stack.push(dsha256(&v).to_vec());
            true
        }
        None => false,
    }
}

pub fn op_checksig(stack: &mut Stack, z: &BigUint) -> bool {
    if stack.len() < 2 {
        return false;
    }
    let pubkey_bytes = pop(stack).unwrap();
    let sig_bytes = pop(stack).unwrap();
    let ok = verify_one(&pubkey_bytes, &sig_bytes, z);
    stack.push(encode_num(if ok { 1 } else { 0 }));
    true
}

pub fn op_checksigverify(stack: &mut Stack, z: &BigUint) -> bool {
    op_checksig(stack, z) && op_verify(stack)
}

/// `OP_CHECKMULTISIG`: pops `n` pubkeys, `m` signatures, and checks each
/// signature matches some pubkey in order. Preserves the historical
/// off-by-one bug where one extra stack element (meant for a multisig
/// argument Script never had) is popped and discarded.
pub fn op_checkmultisig(stack: &mut Stack, z: &BigUint) -> bool {
    let n = match pop(stack) {
        Some(v) => decode_num(&v),
        None => return false,
    };
    if n < 0 || (n as usize) > stack.len() {
        return false;
    }
    let n = n as usize;
    let mut pubkeys = Vec::with_capacity(n);
    for _ in 0..n {
        pubkeys.push(pop(stack).unwrap());
    }
    let m = match pop(stack) {
        Some(v) => decode_num(&v),
        None => return false,
    };
    if m < 0 || (m as usize) > stack.len() {
        return false;
    }
    let m = m as usize;
    let mut sigs = Vec::with_capacity(m);
    for _ in 0..m {
        sigs.push(pop(stack).unwrap());
    }
    // off-by-one dummy element
    if pop(stack).is_none() {
        return false;
    }

    let mut pubkey_idx = 0;
    for sig in &sigs {
        let mut matched = false;
        while pubkey_idx < pubkeys.len() {
            let candidate = &pubkeys[pubkey_idx];
            pubkey_idx += 1;
            if verify_one(candidate, sig, z) {
                matched = true;
                break;
            }
        }
        if !matched {
            stack.push(encode_num(0));
            return true;
        }
    }
    stack.push(encode_num(1));
    true
}

pub fn op_checkmultisigverify(stack: &mut Stack, z: &BigUint) -> bool {
    op_checkmultisig(stack, z) && op_verify(stack)
}

fn verify_one(pubkey_bytes: &[u8], sig_bytes: &[u8], z: &BigUint) -> bool {
    let point = match S256Point::parse(pubkey_bytes) {
        Ok(p) => p,
        Err(_) => return false,
    };
    // strip the trailing sighash-type byte DER signatures carry on the wire
    let der = if sig_bytes.is_empty() { sig_bytes } else { &sig_bytes[..sig_bytes.len() - 1] };
    match Signature::parse(der) {
        Ok(sig) => point.verify(z, &sig),
        Err(_) => false,
    }
}

/// Decodes one opcode byte's dispatch into the remaining command queue, for
/// `OP_IF`/`OP_NOTIF` branch skipping. Returns `true` if `op` is an opcode
/// that starts a conditional so [`super::Script::evaluate`] can special-case
/// flow control there.
pub fn is_conditional(op: u8) -> bool {
    op == 99 || op == 100
}

pub fn is_alt_stack_op(op: u8) -> bool {
    op == 107 || op == 108
}

pub fn is_checksig_family(op: u8) -> bool {
    matches!(op, 172 | 173 | 174 | 175)
}

/// Dispatches the "plain" opcodes (everything except `IF`/`NOTIF`, alt-stack
/// ops, and the checksig family, which the interpreter handles directly
/// because they need extra context beyond the main stack).
pub fn dispatch(op: u8, stack: &mut Stack) -> bool {
    match op {
        0 => op_0(stack),
        79 => op_1negate(stack),
        81..=96 => op_n(stack, (op - 80) as i64),
        97 | 176..=185 => op_nop(stack), // OP_NOP and reserved OP_NOP1..10
        105 => op_verify(stack),
        106 => op_return(stack),
        115 => op_ifdup(stack),
        116 => op_depth(stack),
        117 => op_drop(stack),
        118 => op_dup(stack),
        119 => op_nip(stack),
        120 => op_over(stack),
        121 => op_pick(stack),
        122 => op_roll(stack),
        123 => op_rot(stack),
        124 => op_swap(stack),
        125 => op_tuck(stack),
        109 => op_2drop(stack),
        110 => op_2dup(stack),
        111 => op_3dup(stack),
        112 => op_2over(stack),
        113 => op_2rot(stack),
        114 => op_2swap(stack),
        130 => op_size(stack),
        135 => op_equal(stack),
        136 => op_equalverify(stack),
        139 => op_1add(stack),
        140 => op_1sub(stack),
        143 => op_negate(stack),
        144 => op_abs(stack),
        145 => op_not(stack),
        146 => op_0notequal(stack),
        147 => op_add(stack),
        148 => op_sub(stack),
        154 => op_booland(stack),
        155 => op_boolor(stack),
        156 => op_numequal(stack),
        157 => op_numequalverify(stack),
        158 => op_numnotequal(stack),
        159 => op_lessthan(stack),
        160 => op_greaterthan(stack),
        161 => op_lessthanorequal(stack),
        162 => op_greaterthanorequal(stack),
        163 => op_min(stack),
        164 => op_max(stack),
        165 => op_within(stack),
        166 => op_ripemd160(stack),
        167 => op_sha1(stack),
        168 => op_sha256(stack),
        169 => op_hash160(stack),
        170 => op_hash256(stack),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_encoding_round_trips_including_negatives() {
        for n in [-500i64, -1, 0, 1, 127, 128, 255, 1000, 70000] {
            assert_eq!(decode_num(&encode_num(n)), n, "n={n}");
        }
    }

    #[test]
    fn op_add_adds_two_numbers() {
        let mut stack = vec![encode_num(4), encode_num(5)];
        assert!(op_add(&mut stack));
        assert_eq!(decode_num(&stack[0]), 9);
    }

    #[test]
    fn op_equal_compares_byte_strings() {
        let mut stack = vec![b"abc".to_vec(), b"abc".to_vec()];
        assert!(op_equal(&mut stack));
        assert_eq!(decode_num(&stack[0]), 1);
    }

    #[test]
    fn op_hash160_matches_hash_module() {
        let mut stack = vec![b"hello".to_vec()];
        assert!(op_hash160(&mut stack));
        assert_eq!(stack[0], hash160(b"hello").to_vec());
    }

    #[test]
    fn op_checkmultisig_consumes_the_dummy_element() {
        let pk = crate::privatekey::PrivateKey::new(BigUint::from(42u64));
        let z = BigUint::from(7u64);
        let sig = pk.sign(&z);
        let mut sig_der = sig.der();
        sig_der.push(0x01);
        let pubkey = pk.point().sec(true);

        let mut stack = vec![
            Vec::new(), // dummy element
            sig_der,
            encode_num(1),
            pubkey,
            encode_num(1),
        ];
        assert!(op_checkmultisig(&mut stack, &z));
        assert_eq!(decode_num(&stack[0]), 1);
    }
}
