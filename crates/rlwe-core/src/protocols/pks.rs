//! Public key-switching, single round: re-encrypts a ciphertext held under a
//! collective secret to an arbitrary public key.
//!
//! Each party samples fresh encryption randomness against the target public
//! key and masks its share with the parameters' dedicated smudging
//! distribution, drawn wide enough to statistically hide the aggregate of
//! every party's fresh-encryption noise.

use std::sync::Arc;

use fhe_math::rq::Poly;
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::aggregate::Aggregate;
use crate::errors::{Error, Result};
use crate::keys::{Ciphertext, PublicKey, SecretKey};
use crate::params::RlweParameters;
use crate::ring;

/// Each party's share of "Protocol 4: PubKeySwitch": re-key a ciphertext to
/// a new (possibly freshly, possibly collectively generated) public key
/// without reconstructing any secret key.
#[derive(Clone)]
pub struct PublicKeySwitchShare {
    par: Arc<RlweParameters>,
    level: usize,
    c0: Poly,
    h0_share: Poly,
    h1_share: Poly,
}

impl PublicKeySwitchShare {
    /// 1. *Private input*: this party's share of the ciphertext's current
    ///    collective secret key.
    /// 2. *Public input*: the output public key (fresh or multiparty).
    /// 3. *Public input*: the ciphertext being switched.
    pub fn new<R: RngCore + CryptoRng>(
        sk_share: &SecretKey,
        output_pk: &PublicKey,
        ct: &Ciphertext,
        rng: &mut R,
    ) -> Result<Self> {
        if ct.c.len() != 2 {
            return Err(Error::ShapeMismatch(
                "public key-switching expects a degree-1 ciphertext".to_string(),
            ));
        }
        let par = sk_share.par.clone();
        let ctx = par.ctx_at_level(ct.level)?;

        let s = Zeroizing::new(sk_share.poly_ntt(ct.level)?);
        let u = ring::sample_small(ctx, par.variance(), rng)?;
        let e0 = ring::sample_small(ctx, par.smudging_variance(), rng)?;
        let e1 = ring::sample_small(ctx, par.smudging_variance(), rng)?;

        let mut h0 = &output_pk.b * u.as_ref();
        let s_c1 = s.as_ref() * &ct.c[1];
        h0 += &s_c1;
        h0 += e0.as_ref();

        let mut h1 = &output_pk.a * u.as_ref();
        h1 += e1.as_ref();

        Ok(Self {
            par,
            level: ct.level,
            c0: ct.c[0].clone(),
            h0_share: h0,
            h1_share: h1,
        })
    }
}

impl Aggregate for PublicKeySwitchShare {
    type Output = Ciphertext;

    fn aggregate<I>(shares: I) -> Result<Self::Output>
    where
        I: IntoIterator<Item = Self>,
    {
        let mut shares = shares.into_iter();
        let share = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        let mut h0 = share.h0_share;
        let mut h1 = share.h1_share;
        for sh in shares {
            if sh.level != share.level {
                return Err(Error::ShapeMismatch(format!(
                    "key-switch shares at different levels: {} vs {}",
                    share.level, sh.level
                )));
            }
            h0 += &sh.h0_share;
            h1 += &sh.h1_share;
        }

        let mut c0 = share.c0;
        c0 += &h0;

        Ciphertext::new(vec![c0, h1], &share.par, share.level, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{NoiseDistribution, RingType};
    use crate::protocols::ckg::PublicKeyShare;
    use rand::thread_rng;

    const NUM_PARTIES: usize = 5;

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
    fn encrypt_keyswitch_decrypt() {
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
        let pk_in = PublicKeyShare::aggregate(pk_shares).unwrap();

        let plaintext: Vec<i64> = (0..par.degree() as i64).map(|i| i % 11).collect();
        let ct1 = Ciphertext::encrypt(&pk_in, &plaintext, 1.0, &mut rng).unwrap();

        let sk_out = SecretKey::random(&par, &mut rng);
        let pk_out = PublicKey::new(&sk_out, &mut rng).unwrap();

        let shares: Vec<_> = sk_shares
            .iter()
            .map(|sk| PublicKeySwitchShare::new(sk, &pk_out, &ct1, &mut rng).unwrap())
            .collect();
        let ct2 = PublicKeySwitchShare::aggregate(shares).unwrap();

        let decrypted = ct2.decrypt(&sk_out).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn rejects_shares_at_mismatched_levels() {
        let par = test_params();
        let mut rng = thread_rng();
        let crp = ring::sample_uniform(par.ctx_at_level(0).unwrap(), &mut rng);
        let sk_in = SecretKey::random(&par, &mut rng);
        let pk_share = PublicKeyShare::new(&sk_in, crp, &mut rng).unwrap();
        let pk_in = PublicKeyShare::aggregate(vec![pk_share]).unwrap();

        let plaintext: Vec<i64> = (0..par.degree() as i64).map(|i| i % 3).collect();
        let ct1 = Ciphertext::encrypt(&pk_in, &plaintext, 1.0, &mut rng).unwrap();
        let sk_out = SecretKey::random(&par, &mut rng);
        let pk_out = PublicKey::new(&sk_out, &mut rng).unwrap();

        let mut share_a = PublicKeySwitchShare::new(&sk_in, &pk_out, &ct1, &mut rng).unwrap();
        let share_b = PublicKeySwitchShare::new(&sk_in, &pk_out, &ct1, &mut rng).unwrap();
        share_a.level = 1;
        assert!(PublicKeySwitchShare::aggregate(vec![share_a, share_b]).is_err());
    }
}
