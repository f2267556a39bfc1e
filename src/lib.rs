//! Textbook RSA signing behind three swappable modular-exponentiation
//! cores — one leaky, one deliberately more leaky, one hardened — plus an
//! offline timing side-channel attack that recovers the private exponent
//! from signing-time measurements alone.
//!
//! Module map:
//!
//! - [`big_digit`] / [`algorithms`] / [`biguint`]: the multi-precision
//!   integer engine (`BigUint`) everything else is built on.
//! - [`monty`]: Montgomery reduction, in both variable-time and
//!   constant-time flavors.
//! - [`ctutil`]: the branch-free selection primitives `PowerLadder` and the
//!   constant-time Montgomery product are built from.
//! - [`exp`]: the three exponentiation cores (`ModExp`, `ModExpSleep`,
//!   `PowerLadder`).
//! - [`rsa`]: key construction and the `Signer` wrapper.
//! - [`samples`]: the `TimingSample` record and its CSV row format.
//! - [`attack`]: the bit-recovery timing attack.
//! - [`error`]: the shared error type.
//!
//! `bigrand` (random `BigUint` generation for tests and benches) is gated
//! behind the `rand` feature, on by default.

pub mod algorithms;
pub mod attack;
pub mod big_digit;
pub mod biguint;
pub mod ctutil;
pub mod error;
pub mod exp;
pub mod monty;
pub mod rsa;
pub mod samples;

#[cfg(feature = "rand")]
pub mod bigrand;

pub use biguint::BigUint;
pub use error::{Error, Result};
pub use exp::ExpVariant;
pub use rsa::{RsaKey, Signer};
pub use samples::TimingSample;
