//! Common reference string and sampler registry.
//!
//! Deterministic sampling of the reference polynomials shared across the
//! multiparty protocols: a single uniform CRP for CKG, and a full
//! `(decompRNS, decompPw2)` matrix of uniform polynomials over `QP` for
//! RKG/GKG/EKG.

use std::sync::Arc;

use fhe_math::rq::{Context, Poly, Representation};
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::errors::Result;
use crate::params::RlweParameters;

/// Derive a deterministic per-protocol PRNG from an opaque seed, so that any
/// number of parties sampling from the same seed draw identical CRPs.
pub fn prng_from_seed(seed: &[u8; 32]) -> ChaCha20Rng {
    ChaCha20Rng::from_seed(*seed)
}

/// Sample a single uniform CRP polynomial at the given level, as used by
/// CKG.
pub fn sample_crp<R: RngCore + CryptoRng>(ctx: &Context, rng: &mut R) -> Poly {
    Poly::random(ctx, Representation::Ntt, rng)
}

/// Sample a CRP vector with one polynomial per remaining modulus at the
/// given level — used directly by CKG, and as the base case of the gadget
/// matrix below when `decompPw2 == 1`.
pub fn sample_crp_vec<R: RngCore + CryptoRng>(
    par: &Arc<RlweParameters>,
    level: usize,
    rng: &mut R,
) -> Result<Vec<Poly>> {
    let ctx = par.ctx_at_level(level)?;
    Ok((0..par.decomp_rns(level))
        .map(|_| sample_crp(ctx, rng))
        .collect())
}

/// Sample the full gadget CRP matrix indexed by `(i in [0, decompRNS), j in
/// [0, decompPw2))`, row-major, for RKG/GKG/EKG.
pub fn sample_crp_matrix<R: RngCore + CryptoRng>(
    par: &Arc<RlweParameters>,
    level: usize,
    rng: &mut R,
) -> Result<Vec<Poly>> {
    let ctx = par.ctx_at_level(level)?;
    let cells = par.decomp_rns(level) * par.decomp_pw2();
    Ok((0..cells).map(|_| sample_crp(ctx, rng)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{NoiseDistribution, RingType};

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

    #[test]
    fn same_seed_yields_identical_crp() {
        let par = test_params();
        let seed = [7u8; 32];
        let mut rng_a = prng_from_seed(&seed);
        let mut rng_b = prng_from_seed(&seed);
        let a = sample_crp_matrix(&par, 0, &mut rng_a).unwrap();
        let b = sample_crp_matrix(&par, 0, &mut rng_b).unwrap();
        assert_eq!(a.len(), b.len());
        for (pa, pb) in a.iter().zip(b.iter()) {
            assert_eq!(pa.coefficients(), pb.coefficients());
        }
    }

    #[test]
    fn crp_vec_matches_decomp_rns() {
        let par = test_params();
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(42);
        let crp = sample_crp_vec(&par, 0, &mut rng).unwrap();
        assert_eq!(crp.len(), par.decomp_rns(0));
    }
}
