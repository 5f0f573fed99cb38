//! Galois-key / generic evaluation-key generation, single round.
//!
//! Shares the matrix-share and `Aggregate` machinery used by
//! [`crate::protocols::rkg`] (same constructor shape, same `izip!`-based
//! fold, same shape-checked aggregation), specialized to a single round: a
//! Galois key re-keys from `phi_{g^-1}(s)` to `s`, and the generic
//! evaluation-key variant re-keys from an arbitrary `skIn` to `skOut` with no
//! accompanying automorphism.

use std::sync::Arc;

use fhe_math::rq::Poly;
use itertools::izip;
use rand::{CryptoRng, RngCore};

use crate::aggregate::Aggregate;
use crate::errors::{Error, Result};
use crate::keys::{EvaluationKey, GadgetCiphertext, GaloisKey, SecretKey};
use crate::params::RlweParameters;
use crate::ring;

/// Generate every cell's share of a gadget matrix: `-a_{i,j}*s_prime +
/// w_{i,j}*s + e`. Shared by Galois-key generation (`s_prime =
/// phi_{g^-1}(s)`) and generic evaluation-key generation (`s_prime =
/// skOut`).
fn build_shares<R: RngCore + CryptoRng>(
    par: &Arc<RlweParameters>,
    level: usize,
    s: &Poly,
    s_prime: &Poly,
    crp: &[Poly],
    rng: &mut R,
) -> Result<Box<[Poly]>> {
    let decomp_rns = par.decomp_rns(level);
    let decomp_pw2 = par.decomp_pw2();
    if crp.len() != decomp_rns * decomp_pw2 {
        return Err(Error::ShapeMismatch(format!(
            "gadget CRP matrix must have {} cells, got {}",
            decomp_rns * decomp_pw2,
            crp.len()
        )));
    }
    let ctx = par.ctx_at_level(level)?;
    let moduli = &par.moduli()[level..];
    let pow2_base = par.pow2_base();

    crp.iter()
        .enumerate()
        .map(|(cell, a)| {
            let i = cell / decomp_pw2;
            let j = cell % decomp_pw2;
            let w = ring::gadget_weight(moduli, i, j, pow2_base)?;
            let w_s = ring::scalar_mul(&w, s);

            let e = ring::sample_small(ctx, par.variance(), rng)?;

            let mut h = a * s_prime;
            h = -&h;
            h += &w_s;
            h += e.as_ref();
            Ok(h)
        })
        .collect::<Result<Vec<_>>>()
        .map(Vec::into_boxed_slice)
}

/// One party's share of a Galois-key generation round, for a specific
/// Galois element.
#[derive(Clone)]
pub struct GaloisKeyShare {
    par: Arc<RlweParameters>,
    galois_element: u64,
    level: usize,
    decomp_rns: usize,
    decomp_pw2: usize,
    share: Box<[Poly]>,
    crp: Box<[Poly]>,
}

impl GaloisKeyShare {
    /// Generate this party's share for Galois element `g`.
    ///
    /// 1. *Private input*: RLWE secret key share.
    /// 2. *Public input*: the Galois element `g` (coprime to `2N`).
    /// 3. *Public input*: common random polynomial matrix.
    pub fn new<R: RngCore + CryptoRng>(
        sk_share: &SecretKey,
        galois_element: u64,
        crp: &[Poly],
        level: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let par = sk_share.par.clone();
        let ctx = par.ctx_at_level(level)?;
        let s = sk_share.poly_ntt(level)?;
        let g_inv = ring::inverse_galois_element(galois_element, par.degree())?;
        let s_prime = ring::automorphism(&s, g_inv, ctx)?;

        let decomp_pw2 = par.decomp_pw2();
        let share = build_shares(&par, level, &s, &s_prime, crp, rng)?;
        Ok(Self {
            decomp_rns: crp.len() / decomp_pw2,
            decomp_pw2,
            par,
            galois_element,
            level,
            share,
            crp: crp.to_vec().into_boxed_slice(),
        })
    }
}

impl Aggregate for GaloisKeyShare {
    type Output = GaloisKey;

    fn aggregate<I>(shares: I) -> Result<Self::Output>
    where
        I: IntoIterator<Item = Self>,
    {
        let mut shares = shares.into_iter();
        let first = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        let galois_element = first.galois_element;
        let par = first.par.clone();
        let mut agg = first.share;
        for sh in shares {
            if sh.galois_element != galois_element {
                return Err(Error::InvalidGaloisElement(format!(
                    "aggregating Galois-key shares for different elements: {} vs {}",
                    galois_element, sh.galois_element
                )));
            }
            if sh.level != first.level
                || sh.decomp_rns != first.decomp_rns
                || sh.decomp_pw2 != first.decomp_pw2
            {
                return Err(Error::ShapeMismatch(
                    "Galois-key shares have mismatched gadget shapes".to_string(),
                ));
            }
            izip!(agg.iter_mut(), sh.share.iter()).for_each(|(a, b)| *a += b);
        }

        let rows = agg
            .into_vec()
            .into_iter()
            .zip(first.crp.iter().cloned())
            .collect();

        Ok(GaloisKey {
            galois_element,
            gadget: GadgetCiphertext {
                par,
                decomp_rns: first.decomp_rns,
                decomp_pw2: first.decomp_pw2,
                level_q: first.level,
                level_p: 0,
                rows,
            },
        })
    }
}

/// One party's share of a generic evaluation-key generation round,
/// re-keying from `skIn` to `skOut` with no accompanying automorphism.
#[derive(Clone)]
pub struct EvaluationKeyShare {
    par: Arc<RlweParameters>,
    level: usize,
    decomp_rns: usize,
    decomp_pw2: usize,
    share: Box<[Poly]>,
    crp: Box<[Poly]>,
}

impl EvaluationKeyShare {
    /// Generate this party's share re-keying from `sk_in_share` to
    /// `sk_out_share`.
    pub fn new<R: RngCore + CryptoRng>(
        sk_in_share: &SecretKey,
        sk_out_share: &SecretKey,
        crp: &[Poly],
        level: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let par = sk_in_share.par.clone();
        let s_in = sk_in_share.poly_ntt(level)?;
        let s_out = sk_out_share.poly_ntt(level)?;

        let share = build_shares(&par, level, &s_in, &s_out, crp, rng)?;
        Ok(Self {
            decomp_pw2: par.decomp_pw2(),
            decomp_rns: crp.len() / par.decomp_pw2(),
            par,
            level,
            share,
            crp: crp.to_vec().into_boxed_slice(),
        })
    }
}

impl Aggregate for EvaluationKeyShare {
    type Output = EvaluationKey;

    fn aggregate<I>(shares: I) -> Result<Self::Output>
    where
        I: IntoIterator<Item = Self>,
    {
        let mut shares = shares.into_iter();
        let first = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        let par = first.par.clone();
        let mut agg = first.share;
        for sh in shares {
            if sh.level != first.level
                || sh.decomp_rns != first.decomp_rns
                || sh.decomp_pw2 != first.decomp_pw2
            {
                return Err(Error::ShapeMismatch(
                    "evaluation-key shares have mismatched gadget shapes".to_string(),
                ));
            }
            izip!(agg.iter_mut(), sh.share.iter()).for_each(|(a, b)| *a += b);
        }
        let rows = agg
            .into_vec()
            .into_iter()
            .zip(first.crp.iter().cloned())
            .collect();
        Ok(EvaluationKey(GadgetCiphertext {
            par,
            decomp_rns: first.decomp_rns,
            decomp_pw2: first.decomp_pw2,
            level_q: first.level,
            level_p: 0,
            rows,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::sample_crp_matrix;
    use crate::keys::{Ciphertext, PublicKey};
    use crate::params::{NoiseDistribution, RingType};
    use rand::thread_rng;

    const NUM_PARTIES: usize = 4;

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

    fn collective_key(par: &Arc<RlweParameters>, shares: &[SecretKey]) -> SecretKey {
        let degree = par.degree();
        let mut collective = vec![0i64; degree];
        for sk in shares {
            for (c, s) in collective.iter_mut().zip(sk.coeffs().iter()) {
                *c += s;
            }
        }
        SecretKey::from_coeffs(par, collective).unwrap()
    }

    #[test]
    fn gkg_rotation_round_trips() {
        let par = test_params();
        let mut rng = thread_rng();
        let crp = sample_crp_matrix(&par, 0, &mut rng).unwrap();

        let sk_shares: Vec<SecretKey> = (0..NUM_PARTIES)
            .map(|_| SecretKey::random(&par, &mut rng))
            .collect();
        let galois_element = 3u64;
        let shares: Vec<_> = sk_shares
            .iter()
            .map(|sk| GaloisKeyShare::new(sk, galois_element, &crp, 0, &mut rng).unwrap())
            .collect();
        let gk = GaloisKeyShare::aggregate(shares).unwrap();
        assert_eq!(gk.galois_element, galois_element);
        assert_eq!(gk.gadget.decomp_rns, par.decomp_rns(0));

        let collective_sk = collective_key(&par, &sk_shares);
        let pk = PublicKey::new(&collective_sk, &mut rng).unwrap();
        let plaintext: Vec<i64> = (0..par.degree() as i64).map(|i| i % 7).collect();
        let ct = Ciphertext::encrypt(&pk, &plaintext, 1.0, &mut rng).unwrap();
        let rotated = ct.automorphism(&gk).unwrap();
        assert_eq!(rotated.c.len(), 2);
    }

    #[test]
    fn gkg_rejects_aggregation_across_elements() {
        let par = test_params();
        let mut rng = thread_rng();
        let crp = sample_crp_matrix(&par, 0, &mut rng).unwrap();
        let sk1 = SecretKey::random(&par, &mut rng);
        let sk2 = SecretKey::random(&par, &mut rng);
        let share1 = GaloisKeyShare::new(&sk1, 3, &crp, 0, &mut rng).unwrap();
        let share2 = GaloisKeyShare::new(&sk2, 5, &crp, 0, &mut rng).unwrap();
        assert!(GaloisKeyShare::aggregate(vec![share1, share2]).is_err());
    }
}
