//! Collective public-key generation: a single round where each party
//! contributes a share of `-crp*s + e` and the aggregate, paired with the
//! common reference polynomial, is the finalized public key.

use std::sync::Arc;

use fhe_math::rq::Poly;
use rand::{CryptoRng, RngCore};

use crate::aggregate::Aggregate;
use crate::errors::{Error, Result};
use crate::keys::{PublicKey, SecretKey};
use crate::params::RlweParameters;
use crate::ring;

/// Each party's share of "Protocol 1: EncKeyGen": `share = -crp*s + e`, in
/// NTT form.
#[derive(Clone)]
pub struct PublicKeyShare {
    pub(crate) par: Arc<RlweParameters>,
    pub(crate) crp: Poly,
    pub(crate) p0_share: Poly,
}

impl PublicKeyShare {
    /// 1. *Private input*: RLWE secret key share.
    /// 2. *Public input*: common random polynomial (from [`crate::crs`]).
    pub fn new<R: RngCore + CryptoRng>(
        sk_share: &SecretKey,
        crp: Poly,
        rng: &mut R,
    ) -> Result<Self> {
        let par = sk_share.par.clone();
        let e = ring::sample_small(par.ctx_at_level(0)?, par.variance(), rng)?;
        let s = sk_share.poly_ntt(0)?;

        let mut p0_share = &(-&crp) * &s;
        p0_share += e.as_ref();

        Ok(Self {
            par,
            crp,
            p0_share,
        })
    }
}

impl Aggregate for PublicKeyShare {
    type Output = PublicKey;

    fn aggregate<I>(shares: I) -> Result<Self::Output>
    where
        I: IntoIterator<Item = Self>,
    {
        let mut shares = shares.into_iter();
        let first = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        let par = first.par.clone();
        let crp = first.crp;
        let mut agg = first.p0_share;
        for sh in shares {
            if sh.crp.coefficients() != crp.coefficients() {
                return Err(Error::ShapeMismatch(
                    "CKG shares were generated against different CRPs".to_string(),
                ));
            }
            agg += &sh.p0_share;
        }
        Ok(PublicKey::from_share_and_crp(&par, agg, crp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::Ciphertext;
    use crate::params::{NoiseDistribution, RingType};
    use rand::thread_rng;

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
    fn ckg_aggregate_then_encrypt_decrypt_roundtrips() {
        const NUM_PARTIES: usize = 5;
        let par = test_params();
        let mut rng = thread_rng();
        let crp = ring::sample_uniform(par.ctx_at_level(0).unwrap(), &mut rng);

        let mut sk_shares = Vec::new();
        let mut pk_shares = Vec::new();
        for _ in 0..NUM_PARTIES {
            let sk = SecretKey::random(&par, &mut rng);
            let pk_share = PublicKeyShare::new(&sk, crp.clone(), &mut rng).unwrap();
            sk_shares.push(sk);
            pk_shares.push(pk_share);
        }

        let pk = PublicKeyShare::aggregate(pk_shares).unwrap();

        // collective secret = sum of shares
        let degree = par.degree();
        let mut collective = vec![0i64; degree];
        for sk in &sk_shares {
            for (c, s) in collective.iter_mut().zip(sk.coeffs().iter()) {
                *c += s;
            }
        }
        let collective_sk = SecretKey::from_coeffs(&par, collective).unwrap();

        let plaintext: Vec<i64> = (0..degree as i64).map(|i| i % 5).collect();
        let scale = 1.0;
        let ct = Ciphertext::encrypt(&pk, &plaintext, scale, &mut rng).unwrap();
        let decrypted = ct.decrypt(&collective_sk).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn rejects_aggregation_across_different_crps() {
        let par = test_params();
        let mut rng = thread_rng();
        let crp_a = ring::sample_uniform(par.ctx_at_level(0).unwrap(), &mut rng);
        let crp_b = ring::sample_uniform(par.ctx_at_level(0).unwrap(), &mut rng);

        let sk1 = SecretKey::random(&par, &mut rng);
        let sk2 = SecretKey::random(&par, &mut rng);
        let share1 = PublicKeyShare::new(&sk1, crp_a, &mut rng).unwrap();
        let share2 = PublicKeyShare::new(&sk2, crp_b, &mut rng).unwrap();

        assert!(PublicKeyShare::aggregate(vec![share1, share2]).is_err());
    }
}
