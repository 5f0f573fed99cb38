//! Collective key-switching, single round: re-encrypts a ciphertext from one
//! collectively-held secret to another.
//!
//! Follows the per-party share/aggregate style used throughout
//! [`crate::protocols::ckg`] and [`crate::protocols::pks`]: each party shares
//! `c1*(s_i - s'_i) + e_smudge`, and the aggregate is added onto `c0` while
//! `c1` is carried through unchanged.

use std::sync::Arc;

use fhe_math::rq::{Poly, Representation};
use rand::{CryptoRng, RngCore};

use crate::aggregate::Aggregate;
use crate::errors::{Error, Result};
use crate::keys::{Ciphertext, SecretKey};
use crate::params::RlweParameters;
use crate::ring;

/// Each party's share of a collective key-switch from the current collective
/// secret to a new collective secret, both additively shared: `share_i =
/// (skIn_i - skOut_i)*c1 + e_smdg`.
#[derive(Clone)]
pub struct SecretKeySwitchShare {
    par: Arc<RlweParameters>,
    level: usize,
    poly: Poly,
}

impl SecretKeySwitchShare {
    /// 1. *Private input*: this party's shares of the input and output
    ///    collective secret keys.
    /// 2. *Public input*: `c1`, the second component of the ciphertext being
    ///    switched.
    pub fn new<R: RngCore + CryptoRng>(
        sk_in_share: &SecretKey,
        sk_out_share: &SecretKey,
        c1: &Poly,
        level: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let par = sk_in_share.par.clone();
        let ctx = par.ctx_at_level(level)?;
        let s_in = sk_in_share.poly_ntt(level)?;
        let s_out = sk_out_share.poly_ntt(level)?;
        let mut delta = s_in;
        delta += &(-&s_out);

        let mut poly = c1 * &delta;
        let smudging = ring::sample_small(ctx, par.smudging_variance(), rng)?;
        poly += smudging.as_ref();

        Ok(Self { par, level, poly })
    }
}

impl Aggregate for SecretKeySwitchShare {
    type Output = Poly;

    /// The aggregate is the additive correction term `Σ share_i`; callers
    /// add it to `c0` to complete the switch.
    fn aggregate<I>(shares: I) -> Result<Self::Output>
    where
        I: IntoIterator<Item = Self>,
    {
        let mut shares = shares.into_iter();
        let first = shares.next().ok_or(Error::TooFewValues(0, 1))?;
        let mut acc = first.poly;
        for sh in shares {
            if sh.level != first.level {
                return Err(Error::ShapeMismatch(format!(
                    "key-switch shares at different levels: {} vs {}",
                    first.level, sh.level
                )));
            }
            acc += &sh.poly;
        }
        Ok(acc)
    }
}

/// Apply a finalized collective key-switch correction term to a degree-1
/// ciphertext, producing a ciphertext decryptable under the new collective
/// secret key while keeping `c1` unchanged: the output ciphertext is
/// `(c0 + Σshare_i, c1)`.
pub fn apply_key_switch(ct: &Ciphertext, correction: &Poly) -> Result<Ciphertext> {
    if ct.c.len() != 2 {
        return Err(Error::ShapeMismatch(
            "collective key-switching expects a degree-1 ciphertext".to_string(),
        ));
    }
    if correction.representation() != Representation::Ntt || !ct.is_ntt {
        return Err(Error::ShapeMismatch(
            "collective key-switching expects NTT-form polynomials".to_string(),
        ));
    }
    let mut c0 = ct.c[0].clone();
    c0 += correction;
    Ciphertext::new(vec![c0, ct.c[1].clone()], &ct.par, ct.level, ct.scale)
}
