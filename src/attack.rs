//! Timing side-channel attack (spec.md §4.4): recovers a private RSA
//! exponent, bit by bit, from a batch of `(message, signing duration)`
//! samples observed from a `ModExpSleep`-based signer.
//!
//! This is a simplified form of Kocher's 1996 timing attack: each round
//! hypothesizes the next bit of `d` is `1`, partitions the samples by
//! whether that hypothesis's extra Montgomery product would hit the
//! final-subtract branch, and checks whether the two partitions' mean
//! observed durations diverge by more than a threshold.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::biguint::BigUint;
use crate::error::{Error, Result};
use crate::monty::MontgomeryContext;
use crate::samples::TimingSample;

/// Tunables for one attack run.
#[derive(Debug, Clone, Copy)]
pub struct AttackConfig {
    /// `μ_A − μ_B` (nanoseconds) must exceed this to call a round's bit `1`
    /// — "typically the known per-iteration sleep duration" (spec.md §4.4).
    pub threshold_ns: i64,
    /// Minimum samples required in *each* hypothesis class per round before
    /// a bit can be called; below this the round aborts with
    /// [`Error::InsufficientSamples`] (spec.md §4.4's "implementation-chosen
    /// floor, e.g., 500 per class").
    pub min_samples_per_class: usize,
    /// Number of rounds to run. `None` defaults to `num_bits(n)`, which
    /// bounds `num_bits(phi(n))` from above for any valid RSA modulus and
    /// so is a safe stand-in when the caller doesn't know `phi(n)` (spec.md
    /// §4.4: "runs for num_bits(φ(n)) rounds, or stops early when a
    /// user-supplied bound is reached").
    pub max_rounds: Option<u32>,
}

impl AttackConfig {
    pub fn new(threshold_ns: i64) -> Self {
        AttackConfig {
            threshold_ns,
            min_samples_per_class: 500,
            max_rounds: None,
        }
    }
}

/// The record spec.md §3 calls `AttackState`: the samples an attack run was
/// given, and the bits it has recovered so far, most-significant first.
#[derive(Debug, Clone, PartialEq)]
pub struct AttackState {
    n: BigUint,
    samples: Vec<TimingSample>,
    recovered_bits: Vec<u8>,
    threshold_ns: i64,
}

impl AttackState {
    pub fn n(&self) -> &BigUint {
        &self.n
    }

    pub fn samples(&self) -> &[TimingSample] {
        &self.samples
    }

    /// Recovered bits, most significant first. Grows by exactly one entry
    /// per completed round.
    pub fn recovered_bits(&self) -> &[u8] {
        &self.recovered_bits
    }

    pub fn threshold_ns(&self) -> i64 {
        self.threshold_ns
    }

    /// Assembles `recovered_bits` into the recovered exponent `d'`.
    pub fn recovered_exponent(&self) -> BigUint {
        let one = BigUint::from_u32(1);
        let mut d = BigUint::zero();
        for &bit in &self.recovered_bits {
            d = d.shl(1);
            if bit == 1 {
                d = d.add(&one);
            }
        }
        d
    }
}

/// Runs the bit-recovery attack against `samples`, all observed from one
/// `ModExpSleep` signer under public modulus `ctx.n()`.
///
/// `cancel` is polled once per round; setting it surfaces the bits
/// recovered so far without error (spec.md §5: cancellation needs no
/// cleanup). Recovery success is not verified here — spec.md §4.4 puts that
/// on an external check (e.g. `e·d' ≡ 1 mod φ`, see
/// [`crate::rsa::verify_recovered_exponent`]).
pub fn recover_exponent(
    ctx: &MontgomeryContext,
    samples: &[TimingSample],
    config: &AttackConfig,
    cancel: &AtomicBool,
) -> Result<AttackState> {
    let rounds = config.max_rounds.unwrap_or_else(|| ctx.n().num_bits());

    // M̄ᵢ and the per-sample simulated state x̄ᵢ, replayed forward one round
    // at a time as bits are decided (spec.md §4.4's "simulate the signer up
    // to the current unknown bit using the bits recovered so far").
    let m_bars: Vec<BigUint> = samples.iter().map(|s| ctx.to_montgomery(&s.message)).collect();
    let mut states: Vec<BigUint> = vec![ctx.r_mod_n().clone(); samples.len()];
    let mut recovered_bits: Vec<u8> = Vec::with_capacity(rounds as usize);

    for round in 0..rounds {
        if cancel.load(Ordering::Relaxed) {
            debug!(round, "attack cancelled, returning partial recovery");
            break;
        }

        // The square is unconditional every iteration; only the following
        // multiply depends on the bit under investigation.
        let squared: Vec<BigUint> = states.iter().map(|s| ctx.mp_variable(s, s)).collect();

        let mut class_a: Vec<i64> = Vec::new(); // hypothesized branch fires
        let mut class_b: Vec<i64> = Vec::new(); // hypothesized branch doesn't
        let mut extras: Vec<BigUint> = Vec::with_capacity(samples.len());

        for (i, sq) in squared.iter().enumerate() {
            let (extra, branch_fired) = ctx.mp_with_branch(&m_bars[i], sq);
            let duration_ns = samples[i].duration.as_nanos() as i64;
            if branch_fired {
                class_a.push(duration_ns);
            } else {
                class_b.push(duration_ns);
            }
            extras.push(extra);
        }

        if class_a.len() < config.min_samples_per_class || class_b.len() < config.min_samples_per_class {
            warn!(
                round,
                class_a = class_a.len(),
                class_b = class_b.len(),
                floor = config.min_samples_per_class,
                "insufficient samples to classify this round"
            );
            return Err(Error::InsufficientSamples);
        }

        let mean_a = mean(&class_a);
        let mean_b = mean(&class_b);
        let bit = u8::from(mean_a - mean_b > config.threshold_ns as f64);
        debug!(round, mean_a, mean_b, bit, "round classified");
        recovered_bits.push(bit);

        for i in 0..samples.len() {
            states[i] = if bit == 1 { extras[i].clone() } else { squared[i].clone() };
        }
    }

    Ok(AttackState {
        n: ctx.n().clone(),
        samples: samples.to_vec(),
        recovered_bits,
        threshold_ns: config.threshold_ns,
    })
}

fn mean(xs: &[i64]) -> f64 {
    xs.iter().sum::<i64>() as f64 / xs.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsa::{verify_recovered_exponent, RsaKey};
    use std::time::Duration;

    /// Replays the real `ModExpSleep` trace for one message against the
    /// true exponent, but instead of actually sleeping, accumulates
    /// `alpha_ns` for every branch-fire — the noiseless duration model of
    /// spec.md §8, property 8 ("duration = α·(operations executed)"),
    /// applied to this crate's actual per-branch amplification rule. Lets
    /// the attack be exercised deterministically, without depending on OS
    /// scheduler jitter or real sleep durations in a test.
    fn noiseless_duration(ctx: &MontgomeryContext, m: &BigUint, d: &BigUint, alpha_ns: i64) -> Duration {
        let m_bar = ctx.to_montgomery(m);
        let mut x_bar = ctx.r_mod_n().clone();
        let mut fires: i64 = 0;

        let top = d.num_bits().saturating_sub(1);
        for i in (0..=top).rev() {
            let (squared, branch) = ctx.mp_with_branch(&x_bar, &x_bar);
            fires += branch as i64;
            x_bar = squared;
            if d.bit(i) {
                let (extra, branch) = ctx.mp_with_branch(&m_bar, &x_bar);
                fires += branch as i64;
                x_bar = extra;
            }
        }

        Duration::from_nanos((fires * alpha_ns) as u64)
    }

    #[test]
    fn s4_attack_recovers_small_rsa_exponent_from_noiseless_samples() {
        // spec.md S4, scaled down to a 13-bit exponent and a noiseless
        // synthetic timing model instead of 10,000 real sleeping samples.
        let key = RsaKey::new(BigUint::from_u32(97), BigUint::from_u32(103), BigUint::from_u32(31)).unwrap();
        let ctx = MontgomeryContext::new(key.n()).unwrap();
        let d = key.d().clone();
        let alpha_ns = 1_000;

        // Exhaustive over the message space keeps the test deterministic
        // without needing an RNG dependency in this module.
        let samples: Vec<TimingSample> = (1u32..key.n().to_u64().unwrap() as u32)
            .step_by(3)
            .map(|m| {
                let m = BigUint::from_u32(m);
                let duration = noiseless_duration(&ctx, &m, &d, alpha_ns);
                TimingSample::new(m, duration)
            })
            .collect();

        let config = AttackConfig {
            threshold_ns: alpha_ns / 4,
            min_samples_per_class: 50,
            max_rounds: Some(d.num_bits()),
        };
        let cancel = AtomicBool::new(false);
        let state = recover_exponent(&ctx, &samples, &config, &cancel).unwrap();

        let recovered = state.recovered_exponent();
        assert_eq!(recovered, d);
        assert!(verify_recovered_exponent(key.e(), &recovered, key.phi()));
    }

    #[test]
    fn insufficient_samples_aborts_the_round() {
        let key = RsaKey::new(BigUint::from_u32(97), BigUint::from_u32(103), BigUint::from_u32(31)).unwrap();
        let ctx = MontgomeryContext::new(key.n()).unwrap();
        let samples = vec![
            TimingSample::new(BigUint::from_u32(1234), Duration::from_nanos(1000)),
            TimingSample::new(BigUint::from_u32(4321), Duration::from_nanos(2000)),
        ];
        let config = AttackConfig::new(100);
        let cancel = AtomicBool::new(false);
        assert_eq!(recover_exponent(&ctx, &samples, &config, &cancel), Err(Error::InsufficientSamples));
    }

    #[test]
    fn cancellation_surfaces_partial_recovery_without_error() {
        let key = RsaKey::new(BigUint::from_u32(97), BigUint::from_u32(103), BigUint::from_u32(31)).unwrap();
        let ctx = MontgomeryContext::new(key.n()).unwrap();
        let d = key.d().clone();
        let alpha_ns = 1_000;
        let samples: Vec<TimingSample> = (1u32..9990).step_by(3)
            .map(|m| {
                let m = BigUint::from_u32(m);
                let duration = noiseless_duration(&ctx, &m, &d, alpha_ns);
                TimingSample::new(m, duration)
            })
            .collect();

        let config = AttackConfig {
            threshold_ns: alpha_ns / 4,
            min_samples_per_class: 50,
            max_rounds: Some(d.num_bits()),
        };
        let cancel = AtomicBool::new(true);
        let state = recover_exponent(&ctx, &samples, &config, &cancel).unwrap();
        assert!(state.recovered_bits().is_empty());
    }

    #[test]
    fn recovered_exponent_assembles_bits_msb_first() {
        let key = RsaKey::new(BigUint::from_u32(97), BigUint::from_u32(103), BigUint::from_u32(31)).unwrap();
        let ctx = MontgomeryContext::new(key.n()).unwrap();
        let state = AttackState {
            n: key.n().clone(),
            samples: Vec::new(),
            recovered_bits: vec![1, 1, 0, 0, 1],
            threshold_ns: 0,
        };
        assert_eq!(state.recovered_exponent(), BigUint::from_u32(0b11001));
        let _ = ctx;
    }
}
