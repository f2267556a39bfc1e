//! The three interchangeable modular-exponentiation cores (spec.md §4.3):
//! the vulnerable `ModExp`, its timing-amplified sibling `ModExpSleep`, and
//! the branch-free `PowerLadder`.
//!
//! All three share the contract `(M, d, n) -> M^d mod n` and must agree on
//! output for valid inputs (spec.md §8, property 3) — only their *timing
//! behavior* differs, which is the entire point of this crate.

use std::thread;
use std::time::Duration;

use crate::biguint::BigUint;
use crate::ctutil;
use crate::monty::MontgomeryContext;

/// Which exponentiation core a [`crate::rsa::Signer`] uses. Chosen once at
/// construction and immutable thereafter — a closed tagged variant standing
/// in for the source's mutable function-pointer dispatch (Design Note 9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpVariant {
    /// Textbook square-and-multiply. Leaks the Hamming weight of `d` (and,
    /// with enough samples, `d` itself) through signing time.
    Plain,
    /// `Plain`, with every Montgomery product amplified by a fixed sleep —
    /// the signer the timing attack in `attack.rs` is built to break.
    PlainSleep(Duration),
    /// Montgomery Powering Ladder: identical work and identical branch
    /// shape on every exponent bit.
    Ladder,
}

/// `M^d mod n`, dispatching on `variant`. `m` must already be reduced mod
/// `ctx.n()`; callers (the `RsaKey`/`Signer` layer) are responsible for that.
pub fn exponentiate(variant: ExpVariant, ctx: &MontgomeryContext, m: &BigUint, d: &BigUint) -> BigUint {
    match variant {
        ExpVariant::Plain => mod_exp(ctx, m, d),
        ExpVariant::PlainSleep(sleep) => mod_exp_sleep(ctx, m, d, sleep),
        ExpVariant::Ladder => power_ladder(ctx, m, d),
    }
}

/// Square-and-multiply with a conditional multiply (spec.md §4.3.1).
///
/// ```text
/// M_bar <- M*r mod n;  x_bar <- r mod n
/// for i from num_bits(d)-1 down to 0:
///   x_bar <- MP(x_bar, x_bar)
///   if bit(d,i): x_bar <- MP(M_bar, x_bar)
/// return MP(x_bar, 1)
/// ```
pub fn mod_exp(ctx: &MontgomeryContext, m: &BigUint, d: &BigUint) -> BigUint {
    if d.is_zero() {
        // Empty product: M^0 = 1 (spec.md §8, property 2).
        return one_mod_n(ctx);
    }

    let m_bar = ctx.to_montgomery(m);
    let mut x_bar = ctx.r_mod_n().clone();

    let top = d.num_bits() - 1;
    for i in (0..=top).rev() {
        x_bar = ctx.mp_variable(&x_bar, &x_bar);
        if d.bit(i) {
            x_bar = ctx.mp_variable(&m_bar, &x_bar);
        }
    }
    ctx.mp_variable(&x_bar, &BigUint::from_u32(1))
}

/// `mod_exp`, with every `MP` call amplified: whenever a product's own
/// final-subtract branch fires, the thread additionally sleeps for a fixed
/// `sleep` duration. `mp_variable` already has this branch-dependent
/// timing difference at the scale of a handful of CPU cycles; this blows it
/// up to something a wall clock resolves cleanly, without changing which
/// samples the branch fires for (spec.md §4.3.1's "amplified variant" — see
/// the attack's rationale in spec.md §4.4 for why per-message correlation
/// needs this).
pub fn mod_exp_sleep(ctx: &MontgomeryContext, m: &BigUint, d: &BigUint, sleep: Duration) -> BigUint {
    if d.is_zero() {
        return one_mod_n(ctx);
    }

    let m_bar = ctx.to_montgomery(m);
    let mut x_bar = ctx.r_mod_n().clone();

    let top = d.num_bits() - 1;
    for i in (0..=top).rev() {
        x_bar = sleepy_mp(ctx, &x_bar, &x_bar, sleep);
        if d.bit(i) {
            x_bar = sleepy_mp(ctx, &m_bar, &x_bar, sleep);
        }
    }
    sleepy_mp(ctx, &x_bar, &BigUint::from_u32(1), sleep)
}

fn sleepy_mp(ctx: &MontgomeryContext, a: &BigUint, b: &BigUint, sleep: Duration) -> BigUint {
    let (result, branch_fired) = ctx.mp_with_branch(a, b);
    if branch_fired {
        thread::sleep(sleep);
    }
    result
}

/// Montgomery Powering Ladder (spec.md §4.3.2), written with a branch-free
/// conditional swap instead of an `if b == 0 {..} else {..}` so the two
/// logical cases really do execute the identical sequence of operations —
/// see `ctutil::conditional_swap`'s doc comment for the equivalence proof.
pub fn power_ladder(ctx: &MontgomeryContext, m: &BigUint, d: &BigUint) -> BigUint {
    let m_bar = ctx.to_montgomery(m);
    let mut r0 = ctx.r_mod_n().clone(); // M^0 in Montgomery form
    let mut r1 = m_bar; // M^1 in Montgomery form

    for i in (0..d.num_bits()).rev() {
        let bit = d.bit(i);
        ctutil::conditional_swap(bit, &mut r0, &mut r1);
        r1 = ctx.mp_constant_time(&r0, &r1);
        r0 = ctx.mp_constant_time(&r0, &r0);
        ctutil::conditional_swap(bit, &mut r0, &mut r1);
    }

    ctx.mp_constant_time(&r0, &BigUint::from_u32(1))
}

fn one_mod_n(ctx: &MontgomeryContext) -> BigUint {
    ctx.mp_constant_time(ctx.r_mod_n(), &BigUint::from_u32(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigrand::RandBigUint;
    use crate::monty::MontgomeryContext;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn ctx(n: u32) -> MontgomeryContext {
        MontgomeryContext::new(&BigUint::from_u32(n)).unwrap()
    }

    #[test]
    fn identity_and_single_bit_exponents() {
        // spec.md §8, property 2.
        let c = ctx(9991);
        let m = BigUint::from_u32(1234);
        assert_eq!(mod_exp(&c, &m, &BigUint::zero()), BigUint::from_u32(1));
        assert_eq!(mod_exp(&c, &m, &BigUint::from_u32(1)), m);
        assert_eq!(power_ladder(&c, &m, &BigUint::zero()), BigUint::from_u32(1));
        assert_eq!(power_ladder(&c, &m, &BigUint::from_u32(1)), m);
    }

    #[test]
    fn s1_small_rsa_round_trip_via_mod_exp() {
        // spec.md S1: n=9991, d=6415, e=31, M=1234 -> sign 3545 -> verify 1234.
        let c = ctx(9991);
        let signed = mod_exp(&c, &BigUint::from_u32(1234), &BigUint::from_u32(6415));
        assert_eq!(signed, BigUint::from_u32(3545));
        let back = mod_exp(&c, &signed, &BigUint::from_u32(31));
        assert_eq!(back, BigUint::from_u32(1234));
    }

    #[test]
    fn s3_ladder_equals_mod_exp_on_product_of_ranges() {
        // spec.md S3, scaled down to keep the test fast: a smaller grid
        // over the same modulus, still exercising every bit pattern shape.
        let c = ctx(9991);
        for m in (1u32..=30).step_by(3) {
            for d in (1u32..=60).step_by(7) {
                let lhs = mod_exp(&c, &BigUint::from_u32(m), &BigUint::from_u32(d));
                let rhs = power_ladder(&c, &BigUint::from_u32(m), &BigUint::from_u32(d));
                assert_eq!(lhs, rhs, "mismatch at m={m} d={d}");
            }
        }
    }

    #[test]
    fn ladder_and_plain_agree_on_random_operands() {
        let mut rng = ChaCha20Rng::seed_from_u64(99);
        let n = BigUint::from_u32(9991);
        let c = MontgomeryContext::new(&n).unwrap();
        for _ in 0..100 {
            let m = rng.gen_biguint_below(&n);
            let d = rng.gen_biguint_below(&n);
            assert_eq!(mod_exp(&c, &m, &d), power_ladder(&c, &m, &d));
        }
    }

    #[test]
    fn mod_exp_sleep_matches_mod_exp_modulo_timing() {
        let c = ctx(9991);
        let m = BigUint::from_u32(42);
        let d = BigUint::from_u32(17);
        assert_eq!(
            mod_exp(&c, &m, &d),
            mod_exp_sleep(&c, &m, &d, Duration::from_micros(1))
        );
    }
}
