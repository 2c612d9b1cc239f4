//! The design philosophy underlying `dlog_table` is to keep the arithmetic small and exact.
//! Every residue lives in a `u64` and is below `2^32`, so every product fits in
//! a `u64` without widening, and nothing is ever reduced lazily.
//!
//! Residue ring arithmetic.
//!
//! This module provides arithmetic in the ring of integers modulo `p`.  The
//! [`ResidueRing`](struct.ResidueRing.html) type encapsulates the modulus and
//! exposes reduction, multiplication and exponentiation.  Unlike a prime
//! field the modulus may be any integer in `[2, 2^32]`, so there is no
//! inversion: powers of two moduli, the default, have zero divisors.

use crate::error::TableError;

/// Largest modulus a table may be built for.
///
/// Exponents run up to `p - 2`, so with this bound every residue and every
/// exponent fits in a `u32`.
pub const MAX_MODULUS: u64 = 1 << 32;

/// The ring of integers modulo `p`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResidueRing {
    p: u64,
}

impl ResidueRing {
    /// Creates the ring for modulus `p`.
    ///
    /// Fails with [`TableError::InvalidModulus`] unless `2 <= p <= 2^32`.
    pub fn new(p: u64) -> Result<Self, TableError> {
        if !(2..=MAX_MODULUS).contains(&p) {
            return Err(TableError::InvalidModulus(p));
        }
        Ok(ResidueRing { p })
    }

    /// Returns the modulus of the ring.
    #[inline]
    pub fn modulus(&self) -> u64 {
        self.p
    }

    /// Returns the last exponent enumerated for this modulus, `p - 2`.
    #[inline]
    pub fn last_exponent(&self) -> u64 {
        self.p - 2
    }

    /// Reduces `a` into `[0, p)`.
    #[inline]
    pub fn reduce(&self, a: u64) -> u64 {
        a % self.p
    }

    /// Multiplies two residues.
    ///
    /// Both operands are reduced first; with `p <= 2^32` the product of two
    /// reduced residues is at most `(2^32 - 1)^2`, which fits in a `u64`.
    #[inline]
    pub fn mul(&self, a: u64, b: u64) -> u64 {
        (self.reduce(a) * self.reduce(b)) % self.p
    }

    /// Exponentiates `a` by `e` modulo `p` using square-and-multiply.
    ///
    /// `pow(a, 0)` is `1 mod p` for every `a`, including zero.
    #[inline]
    pub fn pow(&self, a: u64, mut e: u64) -> u64 {
        let mut a = self.reduce(a);
        let mut result = 1 % self.p;
        while e > 0 {
            if e & 1 == 1 {
                result = self.mul(result, a);
            }
            a = self.mul(a, a);
            e >>= 1;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::{ResidueRing, MAX_MODULUS};
    use crate::TableError;
    use proptest::prelude::*;

    fn naive_pow(a: u64, e: u64, p: u64) -> u64 {
        let mut acc: u128 = 1 % p as u128;
        for _ in 0..e {
            acc = acc * (a as u128 % p as u128) % p as u128;
        }
        acc as u64
    }

    #[test]
    fn test_rejects_out_of_range_moduli() {
        assert!(matches!(ResidueRing::new(0), Err(TableError::InvalidModulus(0))));
        assert!(matches!(ResidueRing::new(1), Err(TableError::InvalidModulus(1))));
        assert!(ResidueRing::new(MAX_MODULUS + 1).is_err());
        assert!(ResidueRing::new(2).is_ok());
        assert!(ResidueRing::new(MAX_MODULUS).is_ok());
    }

    #[test]
    fn test_pow_of_two_modulo_two_to_the_32() {
        let ring = ResidueRing::new(MAX_MODULUS).unwrap();
        assert_eq!(ring.pow(2, 0), 1);
        assert_eq!(ring.pow(2, 31), 1 << 31);
        assert_eq!(ring.pow(2, 32), 0);
        assert_eq!(ring.pow(2, MAX_MODULUS - 2), 0);
    }

    #[test]
    fn test_mul_does_not_overflow_near_modulus() {
        let ring = ResidueRing::new(MAX_MODULUS).unwrap();
        let top = MAX_MODULUS - 1;
        // (-1)^2 = 1
        assert_eq!(ring.mul(top, top), 1);
        assert_eq!(ring.mul(u64::MAX, u64::MAX), 1);
        assert_eq!(ring.pow(top, 3), top);
    }

    #[test]
    fn test_zero_to_the_zero_is_one() {
        let ring = ResidueRing::new(16).unwrap();
        assert_eq!(ring.pow(0, 0), 1);
        assert_eq!(ring.pow(0, 5), 0);
        let two = ResidueRing::new(2).unwrap();
        assert_eq!(two.pow(2, 0), 1);
    }

    proptest! {
        #[test]
        fn prop_mul_matches_widened_product(
            a in any::<u64>(),
            b in any::<u64>(),
            p in 2u64..=MAX_MODULUS,
        ) {
            let ring = ResidueRing::new(p).unwrap();
            let wide = (a as u128 % p as u128) * (b as u128 % p as u128) % p as u128;
            prop_assert_eq!(ring.mul(a, b), wide as u64);
            prop_assert!(ring.mul(a, b) < p);
        }

        #[test]
        fn prop_pow_matches_repeated_multiplication(
            a in any::<u64>(),
            e in 0u64..512,
            p in 2u64..=MAX_MODULUS,
        ) {
            let ring = ResidueRing::new(p).unwrap();
            prop_assert_eq!(ring.pow(a, e), naive_pow(a, e, p));
        }

        #[test]
        fn prop_pow_adds_exponents(
            a in any::<u64>(),
            e1 in any::<u32>(),
            e2 in any::<u32>(),
            p in 2u64..=MAX_MODULUS,
        ) {
            let ring = ResidueRing::new(p).unwrap();
            let lhs = ring.pow(a, e1 as u64 + e2 as u64);
            let rhs = ring.mul(ring.pow(a, e1 as u64), ring.pow(a, e2 as u64));
            prop_assert_eq!(lhs, rhs);
        }
    }
}
