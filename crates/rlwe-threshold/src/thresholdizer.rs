//! Shamir secret-sharing over the ring, and its combiner.
//!
//! Per-coefficient Horner evaluation and Lagrange-interpolation reconstruct
//! a `t`-out-of-`N` sharing of the collective secret, using
//! [`rlwe_core::ring::scalar_mul`] and [`rlwe_core::ring::scalar_mul_rowwise`]
//! for the per-coefficient and per-RNS-prime ring arithmetic respectively.

use std::collections::HashSet;
use std::sync::Arc;

use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};

use rlwe_core::errors::Error as CoreError;
use rlwe_core::params::RlweParameters;
use rlwe_core::ring;
use rlwe_core::shares::ShamirShare;
use rlwe_core::SecretKey;

use crate::errors::Result;

/// The public configuration of a `t`-out-of-`N` Shamir sharing: the
/// reconstruction threshold and every party's public evaluation point.
#[derive(Debug, Clone)]
pub struct ShamirParams {
    threshold: usize,
    points: Vec<u64>,
}

impl ShamirParams {
    /// Validate a threshold and a set of public points: points must be
    /// nonzero, pairwise distinct, and at least as numerous as the
    /// threshold.
    pub fn try_new(threshold: usize, points: Vec<u64>) -> Result<Self> {
        if threshold == 0 || threshold > points.len() {
            return Err(CoreError::InvalidParameters(format!(
                "Shamir threshold {threshold} is invalid for {} points",
                points.len()
            ))
            .into());
        }
        let mut seen = HashSet::with_capacity(points.len());
        for &p in &points {
            if p == 0 {
                return Err(CoreError::InvalidShamirPoint(
                    "Shamir points must be nonzero".to_string(),
                )
                .into());
            }
            if !seen.insert(p) {
                return Err(CoreError::InvalidShamirPoint(format!(
                    "duplicate Shamir point {p}"
                ))
                .into());
            }
        }
        Ok(Self { threshold, points })
    }

    /// The reconstruction threshold `t`.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Every party's public evaluation point, indexed by party id.
    pub fn points(&self) -> &[u64] {
        &self.points
    }
}

/// A party's Shamir share-generation state: a degree-`(t-1)` polynomial
/// over the ring with constant term equal to this party's secret key
/// share.
pub struct Thresholdizer {
    par: Arc<RlweParameters>,
    level: usize,
    // coeffs[0] is the constant term (the secret); coeffs[k] for k >= 1 are
    // uniform random polynomials over QP.
    coeffs: Vec<fhe_math::rq::Poly>,
}

impl Thresholdizer {
    /// Sample a fresh degree-`(t-1)` sharing polynomial for `sk_share`.
    pub fn new<R: RngCore + CryptoRng>(
        sk_share: &SecretKey,
        params: &ShamirParams,
        level: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let par = sk_share.par.clone();
        let ctx = par.ctx_at_level(level)?;
        let mut coeffs = Vec::with_capacity(params.threshold());
        coeffs.push(sk_share.poly_ntt(level)?);
        for _ in 1..params.threshold() {
            coeffs.push(ring::sample_uniform(ctx, rng));
        }
        Ok(Self { par, level, coeffs })
    }

    /// Evaluate this party's sharing polynomial at another party's public
    /// point `x_j`, via Horner's method.
    pub fn share_for(&self, x_j: u64) -> Result<ShamirShare> {
        let x = BigUint::from(x_j);
        let mut iter = self.coeffs.iter().rev();
        let mut acc = iter
            .next()
            .expect("a Shamir sharing polynomial has at least one coefficient")
            .clone();
        for c in iter {
            acc = ring::scalar_mul(&x, &acc);
            acc += c;
        }
        Ok(ShamirShare { poly: acc })
    }

    /// This party's ring context, exposed so callers can validate incoming
    /// shares before aggregating them.
    pub fn par(&self) -> &Arc<RlweParameters> {
        &self.par
    }

    /// The level this sharing was generated at.
    pub fn level(&self) -> usize {
        self.level
    }
}

/// A finalized `t`-out-of-`N` Shamir sharing of the collective secret held
/// by one active party, combined against a chosen active set.
pub struct Combiner {
    par: Arc<RlweParameters>,
    level: usize,
}

impl Combiner {
    /// Build a combiner for the given parameters and level.
    pub fn new(par: &Arc<RlweParameters>, level: usize) -> Self {
        Self {
            par: par.clone(),
            level,
        }
    }

    /// Combine this party's aggregated Shamir share `tsk_j` (see
    /// [`Thresholdizer::share_for`] aggregated across every party) into its
    /// additive contribution toward reconstructing the collective secret,
    /// given the active set's public points and this party's own point
    /// `x_j`.
    ///
    /// `λ_j = ∏_{k∈A, k≠j} x_k / (x_k - x_j)`, computed per RNS prime; any
    /// prime for which `(x_k - x_j)` fails to invert surfaces as
    /// `InvalidShamirPoint`.
    pub fn combine(&self, active_points: &[u64], x_j: u64, tsk_j: &ShamirShare) -> Result<ShamirShare> {
        let ctx = self.par.ctx_at_level(self.level)?;
        let moduli = ctx.moduli();
        let mut row_weights = vec![1u64; moduli.len()];
        for &x_k in active_points {
            if x_k == x_j {
                continue;
            }
            for (row, &q) in moduli.iter().enumerate() {
                let diff = sub_mod(x_k, x_j, q);
                let inv = ring::mod_inverse(diff, q).ok_or_else(|| {
                    CoreError::InvalidShamirPoint(format!(
                        "(x_{x_k} - x_{x_j}) is not invertible modulo prime {q}"
                    ))
                })?;
                let term = mul_mod(x_k % q, inv, q);
                row_weights[row] = mul_mod(row_weights[row], term, q);
            }
        }
        let poly = ring::scalar_mul_rowwise(&row_weights, &tsk_j.poly, ctx)?;
        Ok(ShamirShare { poly })
    }
}

fn sub_mod(a: u64, b: u64, modulus: u64) -> u64 {
    let a = a % modulus;
    let b = b % modulus;
    if a >= b {
        a - b
    } else {
        modulus - (b - a)
    }
}

fn mul_mod(a: u64, b: u64, modulus: u64) -> u64 {
    ((a as u128 * b as u128) % modulus as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;
    use rlwe_core::params::{NoiseDistribution, RingType};
    use rlwe_core::shares::Share;

    fn test_params() -> Arc<RlweParameters> {
        Arc::new(
            RlweParameters::try_new(
                10,
                vec![0x3fffffff000001, 0x3ffffffef4001],
                vec![],
                0,
                NoiseDistribution::Ternary {
                    hamming_weight: None,
                    probability: None,
                },
                NoiseDistribution::DiscreteGaussian { sigma: 3.2 },
                RingType::Standard,
                None,
                None,
            )
            .unwrap(),
        )
    }

    struct Aggregator;
    impl Aggregator {
        fn fold(mut shares: Vec<ShamirShare>) -> ShamirShare {
            let mut acc = shares.remove(0);
            for sh in shares {
                acc.add_assign(&sh).unwrap();
            }
            acc
        }
    }

    #[test]
    fn shamir_params_rejects_duplicate_points() {
        assert!(ShamirParams::try_new(2, vec![1, 2, 2]).is_err());
    }

    #[test]
    fn shamir_params_rejects_zero_point() {
        assert!(ShamirParams::try_new(2, vec![0, 1, 2]).is_err());
    }

    #[test]
    fn three_of_five_combine_reconstructs_collective_secret() {
        const N: usize = 5;
        const T: usize = 3;
        let par = test_params();
        let mut rng = thread_rng();
        let points: Vec<u64> = (1..=N as u64).collect();
        let params = ShamirParams::try_new(T, points.clone()).unwrap();

        let sk_shares: Vec<SecretKey> = (0..N).map(|_| SecretKey::random(&par, &mut rng)).collect();
        let thresholdizers: Vec<_> = sk_shares
            .iter()
            .map(|sk| Thresholdizer::new(sk, &params, 0, &mut rng).unwrap())
            .collect();

        // Party j's aggregated share: the sum of every party i's evaluation
        // at x_j.
        let tsk: Vec<ShamirShare> = points
            .iter()
            .map(|&x_j| {
                let incoming: Vec<_> = thresholdizers
                    .iter()
                    .map(|th| th.share_for(x_j).unwrap())
                    .collect();
                Aggregator::fold(incoming)
            })
            .collect();

        // Reference: the true collective secret, summed directly.
        let degree = par.degree();
        let mut collective_coeffs = vec![0i64; degree];
        for sk in &sk_shares {
            for (c, s) in collective_coeffs.iter_mut().zip(sk.coeffs().iter()) {
                *c += s;
            }
        }
        let collective_sk = SecretKey::from_coeffs(&par, collective_coeffs).unwrap();
        let collective_poly = collective_sk.poly_ntt(0).unwrap();

        let active_idx = [0usize, 2, 3];
        let active_points: Vec<u64> = active_idx.iter().map(|&i| points[i]).collect();
        let combiner = Combiner::new(&par, 0);
        let additive_shares: Vec<ShamirShare> = active_idx
            .iter()
            .map(|&i| {
                combiner
                    .combine(&active_points, points[i], &tsk[i])
                    .unwrap()
            })
            .collect();
        let reconstructed = Aggregator::fold(additive_shares);

        assert_eq!(reconstructed.poly.coefficients(), collective_poly.coefficients());
    }

    #[test]
    fn combine_rejects_non_invertible_difference() {
        let par = test_params();
        let ctx = par.ctx_at_level(0).unwrap();
        let q0 = ctx.moduli()[0];
        let combiner = Combiner::new(&par, 0);
        let mut rng = thread_rng();
        let tsk = ShamirShare {
            poly: ring::sample_uniform(ctx, &mut rng),
        };
        // x_k - x_j == q0 is congruent to 0 mod q0, so the inversion fails.
        let x_j = 1u64;
        let x_k = q0 + 1;
        assert!(combiner.combine(&[x_k], x_j, &tsk).is_err());
    }
}
