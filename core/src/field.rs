//! Finite-field arithmetic: a generic `FieldElement` plus the secp256k1
//! specialization `S256Field`.
//!
//! The source this is ported from overloads `+`, `-`, `*`, `**`, `/` directly
//! on the element type and carries the prime as an instance field checked at
//! run time. Here the prime is still carried on the value (Rust has no
//! compile-time modulus without const generics heavier than this crate
//! needs), but the operators are replaced with named, fallible methods so a
//! cross-field operation is a `Result::Err(Error::OutOfField)` rather than a
//! silently wrong answer.

use crate::error::{Error, Result};
use num_bigint::BigUint;
use num_traits::{One, Zero};

/// An element of `Z/pZ` for some prime `p`, always kept reduced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldElement {
    num: BigUint,
    prime: BigUint,
}

impl FieldElement {
    /// Builds a field element, reducing `num` modulo `prime` so the
    /// "always reduced" invariant holds regardless of the input.
    pub fn new(num: BigUint, prime: BigUint) -> Self {
        let num = num % &prime;
        FieldElement { num, prime }
    }

    pub fn num(&self) -> &BigUint {
        &self.num
    }

    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    fn same_field(&self, other: &Self) -> Result<()> {
        if self.prime != other.prime {
            Err(Error::OutOfField)
        } else {
            Ok(())
        }
    }

    pub fn add(&self, other: &Self) -> Result<Self> {
        self.same_field(other)?;
        Ok(FieldElement::new(&self.num + &other.num, self.prime.clone()))
    }

    pub fn sub(&self, other: &Self) -> Result<Self> {
        self.same_field(other)?;
        // BigUint has no negative values; add `prime` before subtracting so
        // the intermediate never underflows.
        let lhs = &self.num + &self.prime;
        Ok(FieldElement::new(lhs - &other.num, self.prime.clone()))
    }

    pub fn mul(&self, other: &Self) -> Result<Self> {
        self.same_field(other)?;
        Ok(FieldElement::new(&self.num * &other.num, self.prime.clone()))
    }

    /// Raises `self` to a non-negative power modulo the field's prime.
    pub fn pow(&self, exponent: &BigUint) -> Self {
        FieldElement::new(self.num.modpow(exponent, &self.prime), self.prime.clone())
    }

    /// Multiplicative inverse via Fermat's little theorem: `a^(p-2) mod p`.
    pub fn inv(&self) -> Self {
        self.pow(&(&self.prime - BigUint::from(2u32)))
    }

    pub fn div(&self, other: &Self) -> Result<Self> {
        self.same_field(other)?;
        self.mul(&other.inv())
    }

    pub fn is_zero(&self) -> bool {
        self.num.is_zero()
    }
}

/// secp256k1's prime field, `p = 2^256 - 2^32 - 977`.
pub fn s256_prime() -> BigUint {
    BigUint::from(2u32).pow(256)
        - BigUint::from(2u32).pow(32)
        - BigUint::from(977u32)
}

/// A [`FieldElement`] specialized to the secp256k1 prime, with the extra
/// `sqrt` operation valid because `p ≡ 3 (mod 4)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct S256Field(FieldElement);

impl S256Field {
    pub fn new(num: BigUint) -> Self {
        S256Field(FieldElement::new(num, s256_prime()))
    }

    pub fn from_u64(num: u64) -> Self {
        Self::new(BigUint::from(num))
    }

    pub fn num(&self) -> &BigUint {
        self.0.num()
    }

    pub fn add(&self, other: &Self) -> Self {
        S256Field(self.0.add(&other.0).expect("same prime by construction"))
    }

    pub fn sub(&self, other: &Self) -> Self {
        S256Field(self.0.sub(&other.0).expect("same prime by construction"))
    }

    pub fn mul(&self, other: &Self) -> Self {
        S256Field(self.0.mul(&other.0).expect("same prime by construction"))
    }

    pub fn pow(&self, exponent: &BigUint) -> Self {
        S256Field(self.0.pow(exponent))
    }

    pub fn inv(&self) -> Self {
        S256Field(self.0.inv())
    }

    pub fn div(&self, other: &Self) -> Self {
        S256Field(self.0.div(&other.0).expect("same prime by construction"))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `self^((p+1)/4)`, a square root of `self` whenever one exists (valid
    /// because secp256k1's prime is `3 mod 4`).
    pub fn sqrt(&self) -> Self {
        let exponent = (s256_prime() + BigUint::one()) / BigUint::from(4u32);
        self.pow(&exponent)
    }

    pub fn is_even(&self) -> bool {
        self.num() % BigUint::from(2u32) == BigUint::zero()
    }

    /// `p - num`, the additive inverse, used when flipping SEC-parse parity.
    pub fn negate(&self) -> Self {
        S256Field::new(s256_prime() - self.num())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fe(num: u64, prime: u64) -> FieldElement {
        FieldElement::new(BigUint::from(num), BigUint::from(prime))
    }

    #[test]
    fn addition_wraps_modulo_prime() {
        let a = fe(7, 13);
        let b = fe(12, 13);
        let sum = a.add(&b).unwrap();
        assert_eq!(*sum.num(), BigUint::from(6u32));
    }

    #[test]
    fn subtraction_never_underflows() {
        let a = fe(3, 13);
        let b = fe(12, 13);
        let diff = a.sub(&b).unwrap();
        assert_eq!(*diff.num(), BigUint::from(4u32));
    }

    #[test]
    fn division_is_inverse_of_multiplication() {
        let a = fe(3, 31);
        let b = fe(24, 31);
        let quotient = a.div(&b).unwrap();
        let back = quotient.mul(&b).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn cross_prime_operations_fail() {
        let a = fe(1, 13);
        let b = fe(1, 17);
        assert_eq!(a.add(&b), Err(Error::OutOfField));
    }

    #[test]
    fn s256_sqrt_of_a_perfect_square_squares_back_to_it() {
        let a = S256Field::from_u64(9);
        let root = a.sqrt();
        let squared = root.mul(&root);
        assert_eq!(squared, a);
    }
}
