//! RLWE keys and ciphertexts — the contract the multiparty protocols and the
//! PS evaluator are built against.
//!
//! These are deliberately minimal: no scheme-specific encoder, bootstrapping,
//! or homomorphic DFT. What lives here is exactly enough
//! encrypt/decrypt/add/multiply/rotate/automorphism/rescale to let the
//! protocols in [`crate::protocols`] and the evaluator in `rlwe-polyeval` run
//! end to end against a real (if small) RLWE instance rather than a mock.

use std::sync::Arc;

use fhe_math::rq::{Poly, Representation};
use rand::distributions::{Distribution, Uniform};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::errors::{Error, Result};
use crate::params::{NoiseDistribution, RlweParameters};
use crate::ring;

/// A party's secret key: a ternary polynomial, kept in coefficient
/// (power-basis) form and converted to NTT on demand.
#[derive(Clone)]
pub struct SecretKey {
    pub par: Arc<RlweParameters>,
    pub(crate) coeffs: Box<[i64]>,
}

impl SecretKey {
    /// Sample a fresh ternary secret key.
    pub fn random<R: RngCore + CryptoRng>(par: &Arc<RlweParameters>, rng: &mut R) -> Self {
        let degree = par.degree();
        let coeffs = match par.noise_distribution() {
            NoiseDistribution::Ternary {
                hamming_weight: Some(h),
                ..
            } => sample_fixed_weight_ternary(degree, h, rng),
            NoiseDistribution::Ternary {
                probability: Some(p),
                ..
            } => sample_prob_ternary(degree, p, rng),
            _ => sample_prob_ternary(degree, 2.0 / 3.0, rng),
        };
        Self {
            par: par.clone(),
            coeffs: coeffs.into_boxed_slice(),
        }
    }

    /// Construct a secret key from explicit ternary coefficients (used by
    /// threshold reconstruction, where the "secret key" is really an
    /// additive share of the collective secret).
    pub fn from_coeffs(par: &Arc<RlweParameters>, coeffs: Vec<i64>) -> Result<Self> {
        if coeffs.len() != par.degree() {
            return Err(Error::ShapeMismatch(format!(
                "secret key needs {} coefficients, got {}",
                par.degree(),
                coeffs.len()
            )));
        }
        Ok(Self {
            par: par.clone(),
            coeffs: coeffs.into_boxed_slice(),
        })
    }

    /// This key's coefficients as an NTT-form polynomial at the given level.
    pub fn poly_ntt(&self, level: usize) -> Result<Poly> {
        let ctx = self.par.ctx_at_level(level)?;
        ring::poly_from_coeffs(&self.coeffs, ctx)
    }

    /// Raw ternary coefficients, exposed for protocols (RKG/GKG/CKS/Shamir)
    /// that need to combine secret shares arithmetically before converting
    /// to `Poly`.
    pub fn coeffs(&self) -> &[i64] {
        &self.coeffs
    }
}

fn sample_fixed_weight_ternary<R: RngCore + CryptoRng>(
    degree: usize,
    hamming_weight: usize,
    rng: &mut R,
) -> Vec<i64> {
    let mut coeffs = vec![0i64; degree];
    let idx_dist = Uniform::from(0..degree);
    let mut placed = 0;
    while placed < hamming_weight.min(degree) {
        let idx = idx_dist.sample(rng);
        if coeffs[idx] == 0 {
            coeffs[idx] = if rng.next_u32() % 2 == 0 { 1 } else { -1 };
            placed += 1;
        }
    }
    coeffs
}

fn sample_prob_ternary<R: RngCore + CryptoRng>(
    degree: usize,
    probability: f64,
    rng: &mut R,
) -> Vec<i64> {
    (0..degree)
        .map(|_| {
            let r: f64 = rng.next_u32() as f64 / u32::MAX as f64;
            if r < probability / 2.0 {
                -1
            } else if r < probability {
                1
            } else {
                0
            }
        })
        .collect()
}

/// A public key `(b, a)` with `b = -a*s + e`, derived from a CKG aggregate
/// plus the CRP.
#[derive(Clone)]
pub struct PublicKey {
    pub par: Arc<RlweParameters>,
    pub b: Poly,
    pub a: Poly,
}

impl PublicKey {
    /// Directly generate a (non-multiparty) public key for a given secret
    /// key, used to key-switch *to* in tests and as the PKS target.
    pub fn new<R: RngCore + CryptoRng>(sk: &SecretKey, rng: &mut R) -> Result<Self> {
        let ctx = sk.par.ctx_at_level(0)?;
        let a = ring::sample_uniform(ctx, rng);
        let s = sk.poly_ntt(0)?;
        let e = ring::sample_small(ctx, sk.par.variance(), rng)?;
        let mut b = &(-&a) * &s;
        b += e.as_ref();
        Ok(Self {
            par: sk.par.clone(),
            b,
            a,
        })
    }

    /// Build a public key directly from an aggregated CKG share and the CRP
    /// used to produce it: the final public key is `(sum of shares, crp)`.
    pub fn from_share_and_crp(par: &Arc<RlweParameters>, share: Poly, crp: Poly) -> Self {
        Self {
            par: par.clone(),
            b: share,
            a: crp,
        }
    }
}

/// A ciphertext: `{c0, c1[, c2]}` at some level, tagged with scale and NTT
/// flag.
#[derive(Clone)]
pub struct Ciphertext {
    pub par: Arc<RlweParameters>,
    pub c: Vec<Poly>,
    pub level: usize,
    pub scale: f64,
    pub is_ntt: bool,
}

impl Ciphertext {
    /// Construct a ciphertext from its component polynomials.
    pub fn new(c: Vec<Poly>, par: &Arc<RlweParameters>, level: usize, scale: f64) -> Result<Self> {
        if c.is_empty() {
            return Err(Error::ShapeMismatch(
                "a ciphertext needs at least one polynomial".to_string(),
            ));
        }
        let is_ntt = c[0].representation() == Representation::Ntt;
        Ok(Self {
            par: par.clone(),
            c,
            level,
            scale,
            is_ntt,
        })
    }

    /// Encrypt a vector of plaintext coefficients under `pk`, at level 0 and
    /// the given scale.
    pub fn encrypt<R: RngCore + CryptoRng>(
        pk: &PublicKey,
        plaintext: &[i64],
        scale: f64,
        rng: &mut R,
    ) -> Result<Self> {
        let par = &pk.par;
        let ctx = par.ctx_at_level(0)?;
        let m = ring::poly_from_coeffs(plaintext, ctx)?;
        let u = ring::sample_small(ctx, par.variance(), rng)?;
        let e0 = ring::sample_small(ctx, par.variance(), rng)?;
        let e1 = ring::sample_small(ctx, par.variance(), rng)?;

        let mut c0 = &pk.b * u.as_ref();
        c0 += e0.as_ref();
        c0 += &m;

        let mut c1 = &pk.a * u.as_ref();
        c1 += e1.as_ref();

        Self::new(vec![c0, c1], par, 0, scale)
    }

    /// Decrypt under `sk`, returning the recovered plaintext coefficients
    /// scaled down by the ciphertext's tracked `scale` and rounded.
    pub fn decrypt(&self, sk: &SecretKey) -> Result<Vec<i64>> {
        if self.c.len() < 2 {
            return Err(Error::ShapeMismatch(
                "cannot decrypt a ciphertext with fewer than 2 components".to_string(),
            ));
        }
        let s = sk.poly_ntt(self.level)?;
        let mut acc = self.c[0].clone();
        let mut s_pow = s.clone();
        for ci in &self.c[1..] {
            let term = ci * &s_pow;
            acc += &term;
            s_pow = &s_pow * &s;
        }
        acc.change_representation(Representation::PowerBasis);
        let ctx = self.par.ctx_at_level(self.level)?;
        let coeffs = center_lift(&acc, ctx);
        Ok(coeffs
            .into_iter()
            .map(|v| (v as f64 / self.scale).round() as i64)
            .collect())
    }

    /// Homomorphic addition.
    pub fn add(&self, rhs: &Self) -> Result<Self> {
        shape_check(self, rhs)?;
        let c = self
            .c
            .iter()
            .zip(rhs.c.iter())
            .map(|(a, b)| a + b)
            .collect();
        Self::new(c, &self.par, self.level, self.scale + rhs.scale)
    }

    /// Tensor (degree-raising) homomorphic multiplication, without
    /// relinearization. Caller relinearizes via [`GadgetCiphertext`]
    /// afterwards if a degree-2 ciphertext is required.
    pub fn multiply(&self, rhs: &Self) -> Result<Self> {
        if self.level != rhs.level {
            return Err(Error::ShapeMismatch(
                "multiplying ciphertexts at different levels".to_string(),
            ));
        }
        let mut c: Vec<Option<Poly>> = vec![None; self.c.len() + rhs.c.len() - 1];
        for (i, a) in self.c.iter().enumerate() {
            for (j, b) in rhs.c.iter().enumerate() {
                let term = a * b;
                match &mut c[i + j] {
                    Some(acc) => *acc += &term,
                    slot @ None => *slot = Some(term),
                }
            }
        }
        let c = c
            .into_iter()
            .map(|p| p.expect("every output digit receives at least one term"))
            .collect();
        Self::new(c, &self.par, self.level, self.scale * rhs.scale)
    }

    /// Relinearize a degree-2 ciphertext `(c0, c1, c2)` back to degree 1
    /// using the given gadget key, by RNS-decomposing `c2` and applying the
    /// gadget's key-switching matrix.
    pub fn relinearize(&self, rk: &GadgetCiphertext) -> Result<Self> {
        if self.c.len() != 3 {
            return Err(Error::ShapeMismatch(format!(
                "relinearize expects a degree-2 ciphertext (3 polynomials), got {}",
                self.c.len()
            )));
        }
        rk.check_shape(self.par.decomp_rns(self.level), self.par.decomp_pw2(), self.level)?;
        let ctx = self.par.ctx_at_level(self.level)?;
        let (d0, d1) = rk.apply(&self.c[2], ctx)?;
        let mut c0 = self.c[0].clone();
        c0 += &d0;
        let mut c1 = self.c[1].clone();
        c1 += &d1;
        Self::new(vec![c0, c1], &self.par, self.level, self.scale)
    }

    /// Apply a Galois automorphism (slot rotation) using the corresponding
    /// Galois key; re-keys the rotated ciphertext back under the original
    /// secret via the key's gadget matrix.
    pub fn automorphism(&self, gk: &GaloisKey) -> Result<Self> {
        if self.c.len() != 2 {
            return Err(Error::ShapeMismatch(
                "automorphism expects a degree-1 ciphertext".to_string(),
            ));
        }
        let ctx = self.par.ctx_at_level(self.level)?;
        let c0_rot = ring::automorphism(&self.c[0], gk.galois_element, ctx)?;
        let c1_rot = ring::automorphism(&self.c[1], gk.galois_element, ctx)?;
        gk.gadget
            .check_shape(self.par.decomp_rns(self.level), self.par.decomp_pw2(), self.level)?;
        let (d0, d1) = gk.gadget.apply(&c1_rot, ctx)?;
        let mut c0 = c0_rot;
        c0 += &d0;
        Self::new(vec![c0, d1], &self.par, self.level, self.scale)
    }

    /// Multiply every component by an integer scalar (rounded from `value`),
    /// reduced modulo each RNS prime, and retag the result with
    /// `target_scale`. Used by the Paterson-Stockmeyer evaluator's baby
    /// steps to fold a plaintext coefficient into a power-basis ciphertext
    /// without a full ciphertext-ciphertext tensor product.
    pub fn mul_scalar_f64(&self, value: f64, target_scale: f64) -> Result<Self> {
        let ctx = self.par.ctx_at_level(self.level)?;
        let moduli = ctx.moduli();
        let as_i128 = value.round() as i128;
        let rows: Vec<u64> = moduli
            .iter()
            .map(|&q| as_i128.rem_euclid(q as i128) as u64)
            .collect();
        let c = self
            .c
            .iter()
            .map(|p| ring::scalar_mul_rowwise(&rows, p, ctx))
            .collect::<Result<Vec<_>>>()?;
        Self::new(c, &self.par, self.level, target_scale)
    }

    /// Add an integer constant (rounded from `value`) to this ciphertext's
    /// `c0` component, used by the PS evaluator's baby steps for a
    /// fragment's constant term.
    pub fn add_plain_constant(&self, value: f64) -> Result<Self> {
        let ctx = self.par.ctx_at_level(self.level)?;
        let mut coeffs = vec![0i64; ctx.degree()];
        coeffs[0] = value.round() as i64;
        let m = ring::poly_from_coeffs(&coeffs, ctx)?;
        let mut c = self.c.clone();
        c[0] += &m;
        Self::new(c, &self.par, self.level, self.scale)
    }

    /// Multiply by a per-coefficient plaintext vector (one value per slot,
    /// `values[i]` landing at coefficient index `i`) and retag the result
    /// with `target_scale`. The per-slot analogue of [`Self::mul_scalar_f64`]
    /// used by the PS evaluator's vector baby steps, where each slot's
    /// polynomial may contribute a different coefficient at the same power.
    pub fn mul_plain_coeffs(&self, values: &[i64], target_scale: f64) -> Result<Self> {
        let ctx = self.par.ctx_at_level(self.level)?;
        let m = ring::poly_from_coeffs(values, ctx)?;
        let c = self.c.iter().map(|p| p * &m).collect();
        Self::new(c, &self.par, self.level, target_scale)
    }

    /// Add a per-coefficient plaintext vector (one value per slot) to this
    /// ciphertext's `c0` component, the per-slot analogue of
    /// [`Self::add_plain_constant`] used by the PS evaluator's vector baby
    /// steps for a fragment's constant term.
    pub fn add_plain_coeffs(&self, values: &[i64]) -> Result<Self> {
        let ctx = self.par.ctx_at_level(self.level)?;
        let m = ring::poly_from_coeffs(values, ctx)?;
        let mut c = self.c.clone();
        c[0] += &m;
        Self::new(c, &self.par, self.level, self.scale)
    }

    /// Override the tracked scale, used when the PS evaluator stamps a
    /// simulator-computed scale onto a real intermediate.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Rescale by dropping the top modulus in the chain, dividing the scale
    /// accordingly (non-scale-invariant mode). BGV-style scale-invariant
    /// rescaling is a no-op on `scale`, performed via the PS simulator's
    /// capability object instead (see `rlwe-polyeval`); this method always
    /// performs the scale-non-invariant (CKKS-style) rule.
    pub fn rescale(&self) -> Result<Self> {
        if self.level >= self.par.max_level() {
            return Err(Error::InsufficientLevels {
                needed: self.level + 1,
                available: self.par.max_level(),
            });
        }
        let q_top = self.par.moduli()[self.level];
        let new_level = self.level + 1;
        let old_ctx = self.par.ctx_at_level(self.level)?;
        let new_ctx = self.par.ctx_at_level(new_level)?;
        let c = self
            .c
            .iter()
            .map(|p| mod_switch_down(p, old_ctx, new_ctx))
            .collect::<Result<Vec<_>>>()?;
        Self::new(c, &self.par, new_level, self.scale / q_top as f64)
    }
}

fn shape_check(a: &Ciphertext, b: &Ciphertext) -> Result<()> {
    if a.level != b.level || a.c.len() != b.c.len() || a.is_ntt != b.is_ntt {
        return Err(Error::ShapeMismatch(format!(
            "ciphertexts differ: levels ({}, {}), lengths ({}, {})",
            a.level,
            b.level,
            a.c.len(),
            b.c.len()
        )));
    }
    Ok(())
}

fn center_lift(p: &Poly, ctx: &fhe_math::rq::Context) -> Vec<i64> {
    let moduli = ctx.moduli();
    let q0 = moduli[0];
    let coeffs = p.coefficients();
    (0..ctx.degree())
        .map(|col| {
            let v = coeffs[[0, col]];
            if v > q0 / 2 {
                v as i64 - q0 as i64
            } else {
                v as i64
            }
        })
        .collect()
}

fn mod_switch_down(
    p: &Poly,
    old_ctx: &fhe_math::rq::Context,
    new_ctx: &fhe_math::rq::Context,
) -> Result<Poly> {
    let was_ntt = p.representation() == Representation::Ntt;
    let mut power = p.clone();
    if was_ntt {
        power.change_representation(Representation::PowerBasis);
    }
    let mut truncated = Poly::try_convert_from(
        center_lift(&power, old_ctx).as_slice(),
        new_ctx,
        false,
        Representation::PowerBasis,
    )
    .map_err(|e| Error::DefaultError(format!("mod-switch conversion: {e}")))?;
    if was_ntt {
        truncated.change_representation(Representation::Ntt);
    }
    Ok(truncated)
}

/// A gadget ciphertext: a flat row-major matrix `M[i*decompPw2+j]` of
/// polynomial pairs, used as the common shape for relinearization keys,
/// Galois keys, and generic evaluation keys.
#[derive(Clone)]
pub struct GadgetCiphertext {
    pub par: Arc<RlweParameters>,
    pub decomp_rns: usize,
    pub decomp_pw2: usize,
    pub level_q: usize,
    pub level_p: usize,
    /// Row-major `decompRNS * decompPw2` cells, each `(c0, c1)`.
    pub rows: Vec<(Poly, Poly)>,
}

impl GadgetCiphertext {
    /// Validate this gadget's shape against an expected `(decompRNS,
    /// decompPw2, levelQ)`. `ShapeMismatch` is the only error variant this
    /// returns.
    pub fn check_shape(&self, decomp_rns: usize, decomp_pw2: usize, level_q: usize) -> Result<()> {
        if self.decomp_rns != decomp_rns || self.decomp_pw2 != decomp_pw2 || self.level_q != level_q
        {
            return Err(Error::ShapeMismatch(format!(
                "gadget ciphertext shape ({}, {}, {}) does not match expected ({}, {}, {})",
                self.decomp_rns, self.decomp_pw2, self.level_q, decomp_rns, decomp_pw2, level_q
            )));
        }
        Ok(())
    }

    /// Apply this gadget's key-switching matrix to a polynomial `c2`,
    /// RNS-decomposing `c2` into `decompRNS` digits (power-of-two
    /// decomposition collapses to one digit per RNS digit when `decompPw2 ==
    /// 1`) and returning `(sum_i c2_i * M[i][0], sum_i c2_i * M[i][1])`.
    pub fn apply(&self, c2: &Poly, ctx: &fhe_math::rq::Context) -> Result<(Poly, Poly)> {
        let digits = rns_decompose(c2, self.decomp_rns, ctx)?;
        let mut acc0: Option<Poly> = None;
        let mut acc1: Option<Poly> = None;
        for (i, digit) in digits.iter().enumerate() {
            for j in 0..self.decomp_pw2 {
                let (m0, m1) = &self.rows[i * self.decomp_pw2 + j];
                let t0 = digit * m0;
                let t1 = digit * m1;
                match &mut acc0 {
                    Some(acc) => *acc += &t0,
                    slot @ None => *slot = Some(t0),
                }
                match &mut acc1 {
                    Some(acc) => *acc += &t1,
                    slot @ None => *slot = Some(t1),
                }
            }
        }
        Ok((
            acc0.expect("gadget ciphertext has at least one decomposition digit"),
            acc1.expect("gadget ciphertext has at least one decomposition digit"),
        ))
    }
}

/// Decompose `p` into `count` RNS digits: digit `i` keeps only the `i`-th
/// modulus's residue (all others zeroed), the standard RNS gadget
/// decomposition used for key-switching.
fn rns_decompose(p: &Poly, count: usize, ctx: &fhe_math::rq::Context) -> Result<Vec<Poly>> {
    let was_ntt = p.representation() == Representation::Ntt;
    let mut power = p.clone();
    if was_ntt {
        power.change_representation(Representation::PowerBasis);
    }
    let degree = ctx.degree();
    let num_moduli = ctx.moduli().len().min(count);
    let mut digits = Vec::with_capacity(num_moduli);
    for i in 0..num_moduli {
        let mut digit = power.clone();
        {
            let mut coeffs = digit.coefficients_mut();
            for row in 0..ctx.moduli().len() {
                if row != i {
                    for col in 0..degree {
                        coeffs[[row, col]] = 0;
                    }
                }
            }
        }
        if was_ntt {
            digit.change_representation(Representation::Ntt);
        }
        digits.push(digit);
    }
    Ok(digits)
}

/// A finalized relinearization key: a gadget ciphertext for `s^2` (spec
/// §3.2/§4.4).
#[derive(Clone)]
pub struct RelinearizationKey(pub GadgetCiphertext);

/// A finalized Galois (rotation) key for a specific Galois element (spec
/// §3.2/§4.5).
#[derive(Clone)]
pub struct GaloisKey {
    pub galois_element: u64,
    pub gadget: GadgetCiphertext,
}

/// A finalized generic evaluation key, re-keying from `skIn` to `skOut`
/// without an accompanying automorphism.
#[derive(Clone)]
pub struct EvaluationKey(pub GadgetCiphertext);

impl Zeroize for SecretKey {
    fn zeroize(&mut self) {
        self.coeffs.iter_mut().for_each(|c| *c = 0);
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.zeroize();
    }
}
