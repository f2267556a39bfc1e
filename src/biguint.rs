//! Fixed-width-in-spirit, arbitrary-precision-in-practice unsigned integer.
//!
//! `BigUint` stores its digits in a `SmallVec` sized to hold a ~1024-bit
//! value inline (32 `u32` digits), so ordinary RSA-scale arithmetic never
//! touches the heap — the same trick the teacher crate uses, generalized
//! from a fixed template width to a digit vector per Design Note 9.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use num_traits::{One, Zero};
use smallvec::SmallVec;
use zeroize::Zeroize;

use crate::algorithms;
use crate::big_digit::{self, BigDigit};
use crate::error::{Error, Result};

/// Inline capacity, in 32-bit digits: 32 digits = 1024 bits, the crate's
/// design target (see spec.md §1).
const INLINE_DIGITS: usize = 32;

/// An arbitrary-precision unsigned integer, little-endian digit order.
///
/// Value semantics throughout: every operation takes or returns owned
/// `BigUint`s, there is no sharing between instances. Digits are always kept
/// trimmed of leading (most significant) zero digits so that `cmp`,
/// equality and `num_bits` are simple to reason about; the zero value is the
/// empty digit vector.
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct BigUint {
    data: SmallVec<[BigDigit; INLINE_DIGITS]>,
}

impl fmt::Debug for BigUint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BigUint({})", self)
    }
}

impl Zeroize for BigUint {
    fn zeroize(&mut self) {
        for d in self.data.iter_mut() {
            d.zeroize();
        }
        self.data.truncate(0);
    }
}

impl BigUint {
    /// The zero value.
    pub fn zero() -> Self {
        BigUint {
            data: SmallVec::new(),
        }
    }

    /// Construct from little-endian digits, trimming leading zero digits.
    pub fn from_digits(mut data: SmallVec<[BigDigit; INLINE_DIGITS]>) -> Self {
        while data.last() == Some(&0) {
            data.pop();
        }
        BigUint { data }
    }

    /// Digits of `self`, little-endian, with no trailing zero digit.
    pub fn digits(&self) -> &[BigDigit] {
        &self.data
    }

    pub fn is_zero(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_even(&self) -> bool {
        self.data.first().copied().unwrap_or(0) & 1 == 0
    }

    pub fn is_odd(&self) -> bool {
        !self.is_even()
    }

    /// Index of the highest set bit, plus one; `0` if `self` is zero. This
    /// is `num_bits` from the contract table in spec.md §4.1.
    pub fn num_bits(&self) -> u32 {
        match self.data.last() {
            None => 0,
            Some(&top) => (self.data.len() as u32 - 1) * big_digit::BITS + (big_digit::BITS - top.leading_zeros()),
        }
    }

    /// The value of bit `i` (`0` = least significant). Bits beyond
    /// `num_bits` are `false`.
    pub fn bit(&self, i: u32) -> bool {
        let word = i / big_digit::BITS;
        let offset = i % big_digit::BITS;
        match self.data.get(word as usize) {
            Some(&w) => (w >> offset) & 1 == 1,
            None => false,
        }
    }

    /// Sets bit `i`, growing the digit vector if necessary.
    pub fn set_bit(&mut self, i: u32) {
        let word = (i / big_digit::BITS) as usize;
        let offset = i % big_digit::BITS;
        if word >= self.data.len() {
            self.data.resize(word + 1, 0);
        }
        self.data[word] |= 1 << offset;
    }

    /// Clears bit `i`; a no-op if `i` is already unset or beyond `num_bits`.
    pub fn clear_bit(&mut self, i: u32) {
        let word = (i / big_digit::BITS) as usize;
        let offset = i % big_digit::BITS;
        if let Some(w) = self.data.get_mut(word) {
            *w &= !(1 << offset);
        }
        self.trim();
    }

    fn trim(&mut self) {
        while self.data.last() == Some(&0) {
            self.data.pop();
        }
    }

    /// `self << bits`.
    pub fn shl(&self, bits: u32) -> Self {
        if self.is_zero() || bits == 0 {
            return self.clone();
        }
        let digit_shift = (bits / big_digit::BITS) as usize;
        let bit_shift = bits % big_digit::BITS;

        let mut data: SmallVec<[BigDigit; INLINE_DIGITS]> =
            SmallVec::from_elem(0, digit_shift);
        data.extend_from_slice(&self.data);
        let carry = algorithms::shl_bits_assign(&mut data[digit_shift..], bit_shift);
        if carry != 0 {
            data.push(carry);
        }
        BigUint::from_digits(data)
    }

    /// `self >> bits`.
    pub fn shr(&self, bits: u32) -> Self {
        let digit_shift = (bits / big_digit::BITS) as usize;
        if digit_shift >= self.data.len() {
            return BigUint::zero();
        }
        let bit_shift = bits % big_digit::BITS;
        let mut data: SmallVec<[BigDigit; INLINE_DIGITS]> =
            SmallVec::from_slice(&self.data[digit_shift..]);
        algorithms::shr_bits_assign(&mut data, bit_shift);
        BigUint::from_digits(data)
    }

    /// `self mod 2^bits`, i.e. the low `bits` bits of `self`. Used by the
    /// Montgomery product's low-half extraction (`t mod r`, `m mod r` in
    /// spec.md §4.2), which is cheaper than a general divmod since `r` is
    /// always a power of two here.
    pub fn low_bits(&self, bits: u32) -> BigUint {
        let n_digits = (bits / big_digit::BITS) as usize;
        let rem_bits = bits % big_digit::BITS;
        let take = n_digits + (rem_bits > 0) as usize;
        if take >= self.data.len() {
            return self.clone();
        }
        let mut data: SmallVec<[BigDigit; INLINE_DIGITS]> =
            SmallVec::from_slice(&self.data[..take]);
        if rem_bits > 0 {
            let mask: BigDigit = (1u64 << rem_bits) as BigDigit - 1;
            if let Some(top) = data.last_mut() {
                *top &= mask;
            }
        }
        BigUint::from_digits(data)
    }

    /// `(self + other, carry_out)`, per the `add` entry of spec.md §4.1's
    /// contract table. `carry_out` is always 0 or 1.
    pub fn add_with_carry(&self, other: &BigUint, carry_in: bool) -> (BigUint, bool) {
        let n = self.data.len().max(other.data.len());
        let mut data: SmallVec<[BigDigit; INLINE_DIGITS]> = SmallVec::from_elem(0, n);
        data[..self.data.len()].copy_from_slice(&self.data);
        let c1 = algorithms::add_assign(&mut data, &other.data);
        let c2 = if carry_in {
            algorithms::add_assign(&mut data, &[1])
        } else {
            0
        };
        (BigUint::from_digits(data), (c1 | c2) != 0)
    }

    /// `(self - other, borrow_out)`. `borrow_out = 1` means `other > self`
    /// and `self - other` wrapped modulo `2^(N*w)`.
    pub fn sub_with_borrow(&self, other: &BigUint, borrow_in: bool) -> (BigUint, bool) {
        let n = self.data.len().max(other.data.len());
        let mut data: SmallVec<[BigDigit; INLINE_DIGITS]> = SmallVec::from_elem(0, n);
        data[..self.data.len()].copy_from_slice(&self.data);
        let b1 = algorithms::sub_assign(&mut data, &other.data);
        let b2 = if borrow_in {
            algorithms::sub_assign(&mut data, &[1])
        } else {
            0
        };
        (BigUint::from_digits(data), (b1 | b2) != 0)
    }

    /// Exact (non-truncating) addition. Unlike [`BigUint::add_with_carry`],
    /// which implements spec.md §4.1's fixed-width `add` contract entry and
    /// discards the overflow bit, this grows the result to hold the true
    /// sum — the operation the rest of this crate (Montgomery reduction,
    /// decimal parsing, modular inverse) actually needs.
    pub fn add(&self, other: &BigUint) -> BigUint {
        let (sum, carry_out) = self.add_with_carry(other, false);
        if carry_out {
            let mut data = sum.data.clone();
            data.push(1);
            BigUint::from_digits(data)
        } else {
            sum
        }
    }

    /// `self - other`, or `None` if `other > self` (callers that want the
    /// wraparound/borrow instead should use [`BigUint::sub_with_borrow`]).
    pub fn checked_sub(&self, other: &BigUint) -> Option<BigUint> {
        if other > self {
            return None;
        }
        Some(self.sub_with_borrow(other, false).0)
    }

    /// Full double-width product, `len(a)+len(b)` digits before trimming.
    pub fn mul(&self, other: &BigUint) -> BigUint {
        if self.is_zero() || other.is_zero() {
            return BigUint::zero();
        }
        BigUint::from_digits(SmallVec::from_vec(algorithms::mul_to(
            &self.data,
            &other.data,
        )))
    }

    /// `(quotient, remainder)` such that `self = quotient * divisor +
    /// remainder` and `0 <= remainder < divisor`. Fails with
    /// [`Error::DivByZero`] when `divisor` is zero, mirroring the `divmod`
    /// entry of spec.md §4.1's contract table.
    pub fn div_rem(&self, divisor: &BigUint) -> Result<(BigUint, BigUint)> {
        if divisor.is_zero() {
            return Err(Error::DivByZero);
        }
        let (q, r) = algorithms::div_rem_digits(&self.data, &divisor.data);
        Ok((
            BigUint::from_digits(SmallVec::from_vec(q)),
            BigUint::from_digits(SmallVec::from_vec(r)),
        ))
    }

    /// `self mod modulus`. Fails with [`Error::DivByZero`] when `modulus` is
    /// zero.
    pub fn rem(&self, modulus: &BigUint) -> Result<BigUint> {
        Ok(self.div_rem(modulus)?.1)
    }

    pub fn cmp(&self, other: &BigUint) -> Ordering {
        algorithms::cmp_slice(&self.data, &other.data)
    }

    pub fn to_u64(&self) -> Option<u64> {
        match self.data.len() {
            0 => Some(0),
            1 => Some(self.data[0] as u64),
            2 => Some(big_digit::join(self.data[1], self.data[0])),
            _ => None,
        }
    }

    pub fn from_u64(v: u64) -> Self {
        let (hi, lo) = big_digit::split(v);
        let mut data: SmallVec<[BigDigit; INLINE_DIGITS]> = SmallVec::new();
        data.push(lo);
        data.push(hi);
        BigUint::from_digits(data)
    }

    pub fn from_u32(v: u32) -> Self {
        BigUint::from_u64(v as u64)
    }

    /// Extended binary-like GCD used by key construction and the
    /// `n'`-derivation precondition check. Returns `gcd(self, other)`.
    pub fn gcd(&self, other: &BigUint) -> BigUint {
        let (mut a, mut b) = (self.clone(), other.clone());
        while !b.is_zero() {
            let r = a.div_rem(&b).expect("b checked nonzero by loop guard").1;
            a = b;
            b = r;
        }
        a
    }

    /// Modular inverse of `self` modulo `modulus`, via the extended
    /// Euclidean algorithm over signed residues, reduced back into
    /// `[0, modulus)`. `None` if `self` and `modulus` are not coprime.
    pub fn mod_inverse(&self, modulus: &BigUint) -> Option<BigUint> {
        // Signed extended Euclid on (value, sign) pairs, since BigUint
        // itself has no sign. `r0 = modulus`, `r1 = self mod modulus`.
        let (mut r0, mut r1) = (modulus.clone(), self.rem(modulus).ok()?);
        let (mut s0, mut s1): (Signed, Signed) = (Signed::zero(), Signed::one());

        while !r1.is_zero() {
            let (q, r2) = r0.div_rem(&r1).expect("r1 checked nonzero by loop guard");
            let s2 = s0.sub(&s1.mul(&q));
            r0 = r1;
            r1 = r2;
            s0 = s1;
            s1 = s2;
        }

        if r0 != BigUint::from_u32(1) {
            return None; // not coprime
        }

        Some(s0.reduce_mod(modulus))
    }
}

/// A minimal signed-magnitude helper, private to this module, used only to
/// carry the (possibly negative) Bezout coefficient through extended Euclid.
#[derive(Clone)]
struct Signed {
    negative: bool,
    magnitude: BigUint,
}

impl Signed {
    fn zero() -> Self {
        Signed {
            negative: false,
            magnitude: BigUint::zero(),
        }
    }

    fn one() -> Self {
        Signed {
            negative: false,
            magnitude: BigUint::from_u32(1),
        }
    }

    fn sub(&self, other: &Signed) -> Signed {
        // self - other == self + (-other)
        let neg_other = Signed {
            negative: !other.negative,
            magnitude: other.magnitude.clone(),
        };
        self.add(&neg_other)
    }

    fn add(&self, other: &Signed) -> Signed {
        if self.negative == other.negative {
            Signed {
                negative: self.negative,
                magnitude: self.magnitude.add(&other.magnitude),
            }
        } else if self.magnitude >= other.magnitude {
            Signed {
                negative: self.negative,
                magnitude: self
                    .magnitude
                    .checked_sub(&other.magnitude)
                    .expect("magnitude comparison checked above"),
            }
        } else {
            Signed {
                negative: other.negative,
                magnitude: other
                    .magnitude
                    .checked_sub(&self.magnitude)
                    .expect("magnitude comparison checked above"),
            }
        }
    }

    fn mul(&self, other: &BigUint) -> Signed {
        Signed {
            negative: self.negative && !other.is_zero(),
            magnitude: self.magnitude.mul(other),
        }
    }

    fn reduce_mod(&self, modulus: &BigUint) -> BigUint {
        let r = self
            .magnitude
            .rem(modulus)
            .expect("modulus checked nonzero by caller");
        if self.negative && !r.is_zero() {
            modulus.checked_sub(&r).expect("r < modulus by rem's postcondition")
        } else {
            r
        }
    }
}

impl PartialOrd for BigUint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BigUint {
    fn cmp(&self, other: &Self) -> Ordering {
        BigUint::cmp(self, other)
    }
}

impl Zero for BigUint {
    fn zero() -> Self {
        BigUint::zero()
    }
    fn is_zero(&self) -> bool {
        BigUint::is_zero(self)
    }
}

impl One for BigUint {
    fn one() -> Self {
        BigUint::from_u32(1)
    }
}

impl core::ops::Add for &BigUint {
    type Output = BigUint;
    fn add(self, rhs: &BigUint) -> BigUint {
        self.add(rhs)
    }
}

impl core::ops::Mul for &BigUint {
    type Output = BigUint;
    fn mul(self, rhs: &BigUint) -> BigUint {
        BigUint::mul(self, rhs)
    }
}

/// Decimal `Display`, used for the CSV `message` column and for rendering
/// recovered keys. Implemented via repeated division by `10^9`, the
/// standard bigint-to-decimal technique (the teacher's own `bigint`/`biguint`
/// modules expose the equivalent as `to_str_radix`).
impl fmt::Display for BigUint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return write!(f, "0");
        }
        const CHUNK: u64 = 1_000_000_000;
        let base = BigUint::from_u64(CHUNK);
        let mut chunks = Vec::new();
        let mut cur = self.clone();
        while !cur.is_zero() {
            let (q, r) = cur.div_rem(&base).expect("constant base is nonzero");
            chunks.push(r.to_u64().unwrap_or(0));
            cur = q;
        }
        let mut iter = chunks.iter().rev();
        write!(f, "{}", iter.next().unwrap())?;
        for chunk in iter {
            write!(f, "{:09}", chunk)?;
        }
        Ok(())
    }
}

/// Parse error for [`BigUint::from_str`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseBigUintError;

impl fmt::Display for ParseBigUintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid decimal big integer")
    }
}

impl std::error::Error for ParseBigUintError {}

impl FromStr for BigUint {
    type Err = ParseBigUintError;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseBigUintError);
        }
        let ten = BigUint::from_u32(10);
        let mut acc = BigUint::zero();
        for b in s.bytes() {
            let digit = BigUint::from_u32((b - b'0') as u32);
            acc = acc.mul(&ten).add(&digit);
        }
        Ok(acc)
    }
}
