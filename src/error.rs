//! Error kinds shared by the arithmetic core, the signer and the attack.
//!
//! Every variant here corresponds to one of the error kinds named in the
//! design: the big-integer engine never aborts (it reports carry/borrow
//! out-of-band), but everything built on top of it — Montgomery context
//! construction, key construction, the attack loop — fails fast with one of
//! these.

use thiserror::Error;

/// Domain errors produced by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
    /// Montgomery reduction requires an odd modulus.
    #[error("modulus must be odd, got an even (or zero) modulus")]
    InvalidModulus,

    /// `BigUint::divmod` was called with a zero divisor.
    #[error("division by zero")]
    DivByZero,

    /// The public exponent has no inverse modulo φ(n).
    #[error("public exponent is not invertible modulo phi(n)")]
    NonInvertible,

    /// A fixed-width arithmetic operation exceeded its configured width.
    #[error("operand width exceeded the configured word budget")]
    Overflow,

    /// A round of the timing attack didn't have enough samples to classify.
    #[error("fewer than the minimum required samples were available to classify this bit")]
    InsufficientSamples,

    /// A CSV-style data row failed to parse.
    #[error("malformed input row: {0}")]
    MalformedInput(&'static str),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;
