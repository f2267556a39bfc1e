//! Random `BigUint` generation, used only by tests and benchmarks.
//!
//! This is *not* the out-of-scope "random message generation" campaign
//! infrastructure named in spec.md §1/§6 (that's an external driver that
//! picks messages, signs them, and writes a CSV row per signature). This
//! module only has to produce uniformly-distributed operands so the test
//! suite can exercise the arithmetic core and the attack without hand-picked
//! vectors for everything, the same role the teacher's own `bigrand.rs`
//! plays for `num-bigint-dig`'s test suite.

use num_integer::Integer;
use rand::Rng;
use smallvec::SmallVec;

use crate::big_digit::BigDigit;
use crate::biguint::BigUint;

/// Extension trait mirroring the teacher's `RandBigInt`, trimmed to the one
/// operation this crate's tests need.
pub trait RandBigUint {
    /// A uniformly random `BigUint` of exactly `bit_size` bits (bit
    /// `bit_size - 1` always set, so the result's `num_bits()` is exactly
    /// `bit_size`, or `0` if `bit_size == 0`).
    fn gen_biguint(&mut self, bit_size: u32) -> BigUint;

    /// A uniformly random `BigUint` in `[0, bound)`. Panics if `bound` is
    /// zero, same precondition the teacher's `gen_biguint_below` documents.
    fn gen_biguint_below(&mut self, bound: &BigUint) -> BigUint;
}

impl<R: Rng + ?Sized> RandBigUint for R {
    fn gen_biguint(&mut self, bit_size: u32) -> BigUint {
        if bit_size == 0 {
            return BigUint::zero();
        }
        let (digits, rem) = (bit_size as usize).div_rem(&32);
        let n_digits = digits + (rem > 0) as usize;
        let mut data: SmallVec<[BigDigit; 32]> = SmallVec::from_elem(0, n_digits);
        for d in data.iter_mut() {
            *d = self.gen();
        }
        let top = n_digits - 1;
        let top_bits = if rem == 0 { 32 } else { rem as u32 };
        // Force the top bit on so the result has exactly `bit_size` bits,
        // and mask off anything generated above it.
        data[top] &= u32::MAX >> (32 - top_bits);
        data[top] |= 1 << (top_bits - 1);
        BigUint::from_digits(data)
    }

    fn gen_biguint_below(&mut self, bound: &BigUint) -> BigUint {
        assert!(!bound.is_zero(), "gen_biguint_below: bound must be nonzero");
        let bits = bound.num_bits();
        loop {
            let candidate = self.gen_biguint(bits);
            if &candidate < bound {
                return candidate;
            }
        }
    }
}
