//! Constant-time helpers shared by `PowerLadder` and `MontgomeryContext`'s
//! constant-time reduction path.
//!
//! Grounded in the `subtle`-based patterns used throughout the
//! constant-time RSA/bignum code in the retrieval pack (`kaidokert-RSA`'s
//! `zeroize`+`subtle` combination, `aumetra-crypto-bigint`'s
//! `ConditionallySelectable` digit masking): select on a `subtle::Choice`
//! using a branch-free digit mask, never an `if`.

use subtle::{Choice, ConditionallySelectable};

use crate::biguint::BigUint;

/// `if choice { a } else { b }`, without branching on `choice`.
///
/// Operates digit-by-digit over the longer of the two operands (shorter one
/// is treated as zero-padded), which keeps the memory access pattern
/// independent of which operand is selected — only the *value* of `choice`
/// varies the output.
pub fn select_biguint(choice: bool, a: &BigUint, b: &BigUint) -> BigUint {
    let choice = Choice::from(choice as u8);
    let n = a.digits().len().max(b.digits().len());
    let mut out = smallvec::SmallVec::<[u32; 32]>::from_elem(0, n);
    for i in 0..n {
        let da = a.digits().get(i).copied().unwrap_or(0);
        let db = b.digits().get(i).copied().unwrap_or(0);
        out[i] = u32::conditional_select(&db, &da, choice);
    }
    BigUint::from_digits(out)
}

/// Branch-free conditional swap of `(r0, r1)`, the building block
/// `PowerLadder` uses to turn spec.md §4.3.2's `if b == 0 { .. } else { .. }`
/// into data-independent control flow: swap in if `bit` is set, do the same
/// pair of Montgomery operations either way, swap back out.
pub fn conditional_swap(bit: bool, r0: &mut BigUint, r1: &mut BigUint) {
    let choice = Choice::from(bit as u8);
    let n = r0.digits().len().max(r1.digits().len());
    let mut d0 = smallvec::SmallVec::<[u32; 32]>::from_elem(0, n);
    let mut d1 = smallvec::SmallVec::<[u32; 32]>::from_elem(0, n);
    for i in 0..n {
        let a = r0.digits().get(i).copied().unwrap_or(0);
        let b = r1.digits().get(i).copied().unwrap_or(0);
        let (new_a, new_b) = (
            u32::conditional_select(&a, &b, choice),
            u32::conditional_select(&b, &a, choice),
        );
        d0[i] = new_a;
        d1[i] = new_b;
    }
    *r0 = BigUint::from_digits(d0);
    *r1 = BigUint::from_digits(d1);
}
