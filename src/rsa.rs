//! Textbook RSA key construction and signing (spec.md §3's `RsaKey`, §4.3's
//! `Signer`).
//!
//! No padding, no key generation, no production hardening — by design
//! (spec.md §1 Non-goals). Primes are supplied by the caller; this module's
//! job is just `(p, q, e) -> (n, d)` and dispatching `M^d mod n` /
//! `M^e mod n` through whichever [`ExpVariant`] the caller picked.

use std::time::{Duration, Instant};

use tracing::{debug, error};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::biguint::BigUint;
use crate::error::{Error, Result};
use crate::exp::{self, ExpVariant};
use crate::monty::MontgomeryContext;
use crate::samples::TimingSample;

/// `{p, q, n = p*q, phi = (p-1)(q-1), e, d = e^-1 mod phi}` (spec.md §3).
///
/// The private fields zeroize on drop, the same hygiene the RSA crates in
/// the retrieval pack (`kaidokert-RSA`, `tofn`) apply to key material.
#[derive(Debug, Clone, PartialEq)]
pub struct RsaKey {
    p: BigUint,
    q: BigUint,
    n: BigUint,
    phi: BigUint,
    e: BigUint,
    d: BigUint,
}

impl Drop for RsaKey {
    fn drop(&mut self) {
        self.p.zeroize();
        self.q.zeroize();
        self.phi.zeroize();
        self.d.zeroize();
    }
}

impl ZeroizeOnDrop for RsaKey {}

impl RsaKey {
    /// Builds a key from externally-supplied primes and a public exponent.
    ///
    /// Fails with [`Error::InvalidModulus`] if either prime is even (so
    /// `n = p*q` would be even too — Montgomery reduction requires an odd
    /// modulus), and with [`Error::NonInvertible`] if `e` has no inverse
    /// modulo `phi = (p-1)(q-1)`.
    pub fn new(p: BigUint, q: BigUint, e: BigUint) -> Result<Self> {
        if p.is_even() || q.is_even() {
            error!("rejected key construction: an even prime factor would make n even");
            return Err(Error::InvalidModulus);
        }

        let n = p.mul(&q);
        let p_minus_1 = p.checked_sub(&BigUint::from_u32(1)).ok_or(Error::InvalidModulus)?;
        let q_minus_1 = q.checked_sub(&BigUint::from_u32(1)).ok_or(Error::InvalidModulus)?;
        let phi = p_minus_1.mul(&q_minus_1);

        let d = e.mod_inverse(&phi).ok_or_else(|| {
            error!("public exponent has no inverse modulo phi(n)");
            Error::NonInvertible
        })?;

        debug!(bits = n.num_bits(), "constructed RSA key");
        Ok(RsaKey { p, q, n, phi, e, d })
    }

    pub fn n(&self) -> &BigUint {
        &self.n
    }
    pub fn phi(&self) -> &BigUint {
        &self.phi
    }
    pub fn e(&self) -> &BigUint {
        &self.e
    }
    /// The private exponent. Exposed read-only for tests and for the
    /// attack's verifier (`e*d' == 1 mod phi`); not serialized, not logged.
    pub fn d(&self) -> &BigUint {
        &self.d
    }
}

/// Binds an [`RsaKey`] to one [`ExpVariant`] for its whole lifetime
/// (spec.md §4.3.3: "the selection is immutable for the lifetime of the
/// signer").
pub struct Signer {
    key: RsaKey,
    variant: ExpVariant,
    ctx: MontgomeryContext,
}

impl Signer {
    pub fn new(key: RsaKey, variant: ExpVariant) -> Result<Self> {
        let ctx = MontgomeryContext::new(key.n())?;
        Ok(Signer { key, variant, ctx })
    }

    pub fn key(&self) -> &RsaKey {
        &self.key
    }

    pub fn variant(&self) -> ExpVariant {
        self.variant
    }

    pub fn montgomery_context(&self) -> &MontgomeryContext {
        &self.ctx
    }

    /// `s = M^d mod n`, using this signer's configured exponentiation core.
    pub fn sign(&self, m: &BigUint) -> BigUint {
        exp::exponentiate(self.variant, &self.ctx, m, &self.key.d)
    }

    /// `s = M^d mod n`, timed around the exponentiation call only (spec.md
    /// §9: "measurements are taken around the exponentiation call only,
    /// excluding message generation and I/O"). Returns a ready-to-record
    /// [`TimingSample`] for the attack to consume.
    pub fn sign_timed(&self, m: &BigUint) -> (BigUint, TimingSample) {
        let start = Instant::now();
        let signature = self.sign(m);
        let duration = start.elapsed();
        (signature.clone(), TimingSample::new(m.clone(), duration))
    }

    /// Verification always uses the public exponent `e`, which is not
    /// secret, so there is nothing to defend here: `ModExp` (the plain,
    /// fast core) is used regardless of `self.variant`.
    pub fn verify(&self, signature: &BigUint) -> BigUint {
        exp::mod_exp(&self.ctx, signature, &self.key.e)
    }
}

/// Verifies a recovered private exponent against the public key, per
/// spec.md §6's attack-CLI success criterion: `e * d' == 1 mod phi(n)`.
pub fn verify_recovered_exponent(e: &BigUint, d_prime: &BigUint, phi: &BigUint) -> bool {
    e.mul(d_prime).rem(phi).map(|r| r == BigUint::from_u32(1)).unwrap_or(false)
}

/// Convenience used only by tests/benches that want a throwaway key without
/// threading a `Duration` through every call site.
#[cfg(test)]
pub(crate) fn plain_sleep(micros: u64) -> ExpVariant {
    ExpVariant::PlainSleep(Duration::from_micros(micros))
}
