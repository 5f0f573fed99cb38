//! The Paterson-Stockmeyer evaluator: the real counterpart to
//! [`crate::simulator::Simulator`] — decomposes a polynomial into flat
//! baby-step chunks, evaluates each against the shared power basis, then
//! merges them pairwise (the giant-step loop) until one ciphertext remains.
//!
//! This ring facade has no scheme-specific encoder, so `Ciphertext::encrypt`
//! embeds plaintext coefficients directly rather than pre-multiplying by a
//! fixed-point scale. Consequently this evaluator does not perform a physical
//! rescale between steps — there is no real encoder to make a floating-point
//! scale meaningful against the RNS modulus chain — and tracks `(level,
//! scale)` purely as simulator-driven bookkeeping, stamped onto each
//! intermediate via [`rlwe_core::keys::Ciphertext::with_scale`]. The
//! underlying ring arithmetic (exact, not fixed-point) is unaffected, so
//! evaluation of integer-coefficient polynomials is exact end to end.

use std::sync::Arc;

use rlwe_core::errors::Error as CoreError;
use rlwe_core::keys::{Ciphertext, RelinearizationKey};
use rlwe_core::params::RlweParameters;

use crate::capability::{EvalCapability, SimOperand};
use crate::errors::Result;
use crate::polynomial::{Basis, Polynomial, PolynomialVector};
use crate::power_basis::PowerBasis;
use crate::simulator::Simulator;

/// The per-evaluation state machine. Transitions are sequential and
/// one-way; an error at any state aborts the evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalState {
    /// No work has started yet.
    Fresh,
    /// The power basis has been seeded with `X^1`.
    PowerBasisBuilt,
    /// The polynomial has been split into flat baby-step fragments.
    PsDecomposed,
    /// Every baby-step fragment has been evaluated into a ciphertext.
    BabyStepsEvaluated,
    /// The giant-step merge loop is folding baby-step results pairwise.
    GiantStepsLooping,
    /// One ciphertext remains; evaluation is complete.
    Finalized,
}

/// Evaluates a [`Polynomial`] against a ciphertext using the
/// Paterson-Stockmeyer decomposition, dispatching level/scale bookkeeping
/// through an [`EvalCapability`].
pub struct PsEvaluator<C> {
    par: Arc<RlweParameters>,
    sim: Simulator<C>,
    scale_precision_bits: u32,
    state: std::cell::Cell<EvalState>,
}

impl<C: EvalCapability> PsEvaluator<C> {
    /// Default relative-error tolerance for the scale-mismatch check, in
    /// bits of precision (`scalePrecision - 12` bits of relative error).
    const DEFAULT_SCALE_PRECISION_BITS: u32 = 30;

    /// Build an evaluator for the given parameters and scheme capability.
    pub fn new(par: Arc<RlweParameters>, capability: C) -> Self {
        Self {
            sim: Simulator::new(par.clone(), capability),
            par,
            scale_precision_bits: Self::DEFAULT_SCALE_PRECISION_BITS,
            state: std::cell::Cell::new(EvalState::Fresh),
        }
    }

    /// Override the scale-precision tolerance used by the scale-mismatch
    /// check.
    pub fn with_scale_precision_bits(mut self, bits: u32) -> Self {
        self.scale_precision_bits = bits;
        self
    }

    /// The state this evaluator's last [`Self::evaluate`] call left it in.
    pub fn state(&self) -> EvalState {
        self.state.get()
    }

    /// Evaluate `poly` at `x`, producing a ciphertext encrypting
    /// `poly(decrypt(x))` (exactly, for integer-coefficient polynomials;
    /// approximately for fractional ones, to the extent the caller's own
    /// fixed-point pre-scaling of plaintext coefficients supports it).
    pub fn evaluate(
        &self,
        x: &Ciphertext,
        poly: &Polynomial,
        rk: &RelinearizationKey,
    ) -> Result<Ciphertext> {
        self.state.set(EvalState::Fresh);

        let degree = poly.degree();
        let depth = self.sim.polynomial_depth(degree);
        let available = x.par.max_level().saturating_sub(x.level);
        if available < depth {
            return Err(CoreError::InsufficientLevels {
                needed: depth,
                available,
            }
            .into());
        }

        let mut basis = PowerBasis::try_new(self.par.clone(), x.clone(), poly.basis())?;
        self.state.set(EvalState::PowerBasisBuilt);

        let s = baby_step_threshold(degree);
        let chunks = chunk_into_baby_steps(poly, s);
        self.state.set(EvalState::PsDecomposed);

        let input = SimOperand {
            level: x.level,
            scale: x.scale,
        };

        let mut results = Vec::with_capacity(chunks.len());
        let mut metas = Vec::with_capacity(chunks.len());
        let mut leads = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let ct = self.eval_baby_step(chunk, &mut basis, rk)?;
            let meta = self.sim.update_baby_step(chunk.lead, input);
            results.push(ct.with_scale(meta.scale));
            metas.push(meta);
            leads.push(chunk.lead);
        }
        self.state.set(EvalState::BabyStepsEvaluated);

        self.state.set(EvalState::GiantStepsLooping);
        let (result, meta) = self.merge_baby_steps(results, metas, leads, s, &mut basis, rk)?;

        let expected = self.simulate_full(poly, s, x.scale, input);
        self.check_scale(expected.scale, meta.scale)?;

        self.state.set(EvalState::Finalized);
        Ok(result)
    }

    /// Evaluate `pv` at `x`, routing each slot of the plaintext through its
    /// own mapped polynomial (unmapped slots decode to zero). The baby/giant
    /// step structure is shared across every mapped polynomial — a slot's
    /// polynomial contributes only its own coefficients at each shared power
    /// of `x`, via [`rlwe_core::keys::Ciphertext::mul_plain_coeffs`] and
    /// [`rlwe_core::keys::Ciphertext::add_plain_coeffs`] in place of the
    /// scalar path's `mul_scalar_f64`/`add_plain_constant`.
    pub fn evaluate_vector(
        &self,
        x: &Ciphertext,
        pv: &PolynomialVector,
        rk: &RelinearizationKey,
    ) -> Result<Ciphertext> {
        self.state.set(EvalState::Fresh);

        if pv.mapping().len() != x.par.degree() {
            return Err(CoreError::ShapeMismatch(format!(
                "polynomial vector has {} slots, ciphertext ring has degree {}",
                pv.mapping().len(),
                x.par.degree()
            ))
            .into());
        }

        let degree = pv.max_degree();
        let depth = self.sim.polynomial_depth(degree);
        let available = x.par.max_level().saturating_sub(x.level);
        if available < depth {
            return Err(CoreError::InsufficientLevels {
                needed: depth,
                available,
            }
            .into());
        }

        let basis_kind = pv
            .polynomials()
            .first()
            .map(Polynomial::basis)
            .unwrap_or(Basis::Monomial);
        let mut basis = PowerBasis::try_new(self.par.clone(), x.clone(), basis_kind)?;
        self.state.set(EvalState::PowerBasisBuilt);

        let s = baby_step_threshold(degree);
        let layout = chunk_layout(degree, s);
        self.state.set(EvalState::PsDecomposed);

        let input = SimOperand {
            level: x.level,
            scale: x.scale,
        };

        let mut results = Vec::with_capacity(layout.len());
        let mut metas = Vec::with_capacity(layout.len());
        let mut leads = Vec::with_capacity(layout.len());
        for &(start, len, lead) in &layout {
            let ct = self.eval_baby_step_vector(pv, start, len, &mut basis, rk)?;
            let meta = self.sim.update_baby_step(lead, input);
            results.push(ct.with_scale(meta.scale));
            metas.push(meta);
            leads.push(lead);
        }
        self.state.set(EvalState::BabyStepsEvaluated);

        self.state.set(EvalState::GiantStepsLooping);
        let (result, meta) = self.merge_baby_steps(results, metas, leads, s, &mut basis, rk)?;

        let layout_leads: Vec<bool> = layout.iter().map(|&(_, _, lead)| lead).collect();
        let expected = self.simulate_full_from_leads(&layout_leads, s, x.scale, input);
        self.check_scale(expected.scale, meta.scale)?;

        self.state.set(EvalState::Finalized);
        Ok(result)
    }

    /// The vector analogue of [`Self::eval_baby_step`]: evaluates the
    /// fragment `[start, start+len)` of every mapped polynomial at once,
    /// gathering each slot's coefficient at every shared power of `x`.
    fn eval_baby_step_vector(
        &self,
        pv: &PolynomialVector,
        start: usize,
        len: usize,
        basis: &mut PowerBasis,
        rk: &RelinearizationKey,
    ) -> Result<Ciphertext> {
        let num_slots = pv.mapping().len();
        let local_degree = len - 1;

        let mut acc: Option<Ciphertext> = None;
        for k in 1..=local_degree.max(1) {
            if k > local_degree {
                break;
            }
            let mut coeffs = vec![0i64; num_slots];
            let mut any_nonzero = false;
            for (slot, poly_idx) in pv.mapping().iter().enumerate() {
                if let Some(pi) = poly_idx {
                    let c = pv.polynomials()[*pi].coeff(start + k);
                    if c != 0.0 {
                        coeffs[slot] = c.round() as i64;
                        any_nonzero = true;
                    }
                }
            }
            if !any_nonzero {
                continue;
            }
            let power_ct = basis.power(k, rk)?.clone();
            let term = power_ct.mul_plain_coeffs(&coeffs, power_ct.scale)?;
            acc = Some(match acc {
                Some(a) => a.add(&term)?,
                None => term,
            });
        }

        let base = match acc {
            Some(a) => a,
            None => {
                let zeros = vec![0i64; num_slots];
                basis.power(1, rk)?.clone().mul_plain_coeffs(&zeros, 0.0)?
            }
        };

        let mut constants = vec![0i64; num_slots];
        let mut any_constant = false;
        for (slot, poly_idx) in pv.mapping().iter().enumerate() {
            if let Some(pi) = poly_idx {
                let c = pv.polynomials()[*pi].coeff(start);
                if c != 0.0 {
                    constants[slot] = c.round() as i64;
                    any_constant = true;
                }
            }
        }
        if any_constant {
            base.add_plain_coeffs(&constants)
        } else {
            Ok(base)
        }
    }

    /// Evaluate a single baby-step fragment (degree `< s`) as `Σ c_k X^k`,
    /// skipping the unused parity when the fragment is known even or odd.
    fn eval_baby_step(
        &self,
        fragment: &Polynomial,
        basis: &mut PowerBasis,
        rk: &RelinearizationKey,
    ) -> Result<Ciphertext> {
        let degree = fragment.degree();
        let even_only = fragment.is_even();
        let odd_only = fragment.is_odd();

        let mut acc: Option<Ciphertext> = None;
        for k in 1..=degree.max(1) {
            if k > degree {
                break;
            }
            if even_only && k % 2 == 1 {
                continue;
            }
            if odd_only && k % 2 == 0 {
                continue;
            }
            let c = fragment.coeff(k);
            if c == 0.0 {
                continue;
            }
            let power_ct = basis.power(k, rk)?.clone();
            let term = power_ct.mul_scalar_f64(c, power_ct.scale)?;
            acc = Some(match acc {
                Some(a) => a.add(&term)?,
                None => term,
            });
        }

        let base = match acc {
            Some(a) => a,
            None => basis.power(1, rk)?.clone().mul_scalar_f64(0.0, 0.0)?,
        };

        let constant = fragment.coeff(0);
        if constant != 0.0 {
            base.add_plain_constant(constant)
        } else {
            Ok(base)
        }
    }

    /// The giant-step loop: repeatedly combine adjacent baby-step results
    /// `combined = babyStep_i + babyStep_{i+1} * X^{2^k}` until one ciphertext
    /// remains. An unpaired final entry is carried forward unchanged, bumped
    /// to match the previous one's degree.
    fn merge_baby_steps(
        &self,
        mut results: Vec<Ciphertext>,
        mut metas: Vec<SimOperand>,
        mut leads: Vec<bool>,
        s: usize,
        basis: &mut PowerBasis,
        rk: &RelinearizationKey,
    ) -> Result<(Ciphertext, SimOperand)> {
        let mut step = 1usize;
        while results.len() > 1 {
            let mut next_results = Vec::with_capacity(results.len().div_ceil(2));
            let mut next_metas = Vec::with_capacity(results.len().div_ceil(2));
            let mut next_leads = Vec::with_capacity(results.len().div_ceil(2));

            let x_pow = basis.power(step * s, rk)?.clone();

            let mut i = 0;
            while i < results.len() {
                if i + 1 < results.len() {
                    let mut raised = results[i + 1].multiply(&x_pow)?;
                    if raised.c.len() > 2 {
                        raised = raised.relinearize(&rk.0)?;
                    }
                    let combined = raised.add(&results[i])?;
                    let lead = leads[i + 1];
                    let meta = self.sim.update_giant_step(lead, metas[i], x_pow.scale);
                    next_results.push(combined.with_scale(meta.scale));
                    next_metas.push(meta);
                    next_leads.push(lead);
                    i += 2;
                } else {
                    next_results.push(results[i].clone());
                    next_metas.push(metas[i]);
                    next_leads.push(leads[i]);
                    i += 1;
                }
            }

            results = next_results;
            metas = next_metas;
            leads = next_leads;
            step *= 2;
        }

        let result = results
            .into_iter()
            .next()
            .expect("at least one baby step is always produced");
        let meta = metas
            .into_iter()
            .next()
            .expect("at least one baby step is always produced");
        Ok((result, meta))
    }

    /// Pre-computes the same decomposition's final `(level, scale)` purely
    /// over [`SimOperand`]s, independent of any real ciphertext: the offline
    /// counterpart [`Self::evaluate`]'s real path is checked against.
    fn simulate_full(
        &self,
        poly: &Polynomial,
        s: usize,
        x_scale: f64,
        input: SimOperand,
    ) -> SimOperand {
        let chunks = chunk_into_baby_steps(poly, s);
        let leads: Vec<bool> = chunks.iter().map(|chunk| chunk.lead).collect();
        self.simulate_full_from_leads(&leads, s, x_scale, input)
    }

    /// The same computation as [`Self::simulate_full`], taking the
    /// baby-step leading-fragment flags directly instead of re-deriving them
    /// from a materialized [`Polynomial`] — shared by the scalar and vector
    /// evaluation paths, which decompose different things into the same
    /// flat chunk layout.
    fn simulate_full_from_leads(
        &self,
        leads: &[bool],
        s: usize,
        x_scale: f64,
        input: SimOperand,
    ) -> SimOperand {
        let mut metas: Vec<SimOperand> = leads
            .iter()
            .map(|&lead| self.sim.update_baby_step(lead, input))
            .collect();
        let mut leads: Vec<bool> = leads.to_vec();

        let mut step = 1usize;
        while metas.len() > 1 {
            let mut next_metas = Vec::with_capacity(metas.len().div_ceil(2));
            let mut next_leads = Vec::with_capacity(metas.len().div_ceil(2));
            let x_pow_scale = x_scale.powi((step * s) as i32);

            let mut i = 0;
            while i < metas.len() {
                if i + 1 < metas.len() {
                    let lead = leads[i + 1];
                    let merged = self.sim.update_giant_step(lead, metas[i], x_pow_scale);
                    next_metas.push(merged);
                    next_leads.push(lead);
                    i += 2;
                } else {
                    next_metas.push(metas[i]);
                    next_leads.push(leads[i]);
                    i += 1;
                }
            }

            metas = next_metas;
            leads = next_leads;
            step *= 2;
        }

        metas.into_iter().next().unwrap_or(input)
    }

    /// Compares [`Self::simulate_full`]'s prediction against the scale
    /// `merge_baby_steps` stamped onto the result. Both derive from the same
    /// `Simulator` bookkeeping and the power basis's `x.scale^n` growth, so
    /// today this is a structural invariant on the bookkeeping rather than an
    /// independent check against a physically rescaled ciphertext — there is
    /// no real fixed-point encoder here (see the module doc) to rescale
    /// against. It still guards against the two code paths above drifting
    /// out of sync with each other as the evaluator evolves.
    fn check_scale(&self, expected: f64, actual: f64) -> Result<()> {
        let tol_bits = self.scale_precision_bits.saturating_sub(12);
        let tol = 2f64.powi(-(tol_bits.min(1000) as i32));
        let rel_err = if expected == 0.0 {
            actual.abs()
        } else {
            ((actual - expected) / expected).abs()
        };
        if rel_err > tol {
            return Err(CoreError::ScaleMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
                tolerance_bits: tol_bits,
            }
            .into());
        }
        Ok(())
    }
}

/// Smallest power of two `s` with `s*s >= degree + 1`, the baby-step count
/// for the square-root-balanced split every Paterson-Stockmeyer
/// implementation uses.
fn baby_step_threshold(degree: usize) -> usize {
    let mut s = 1usize;
    while s * s < degree + 1 {
        s <<= 1;
    }
    s
}

/// Flat Paterson-Stockmeyer decomposition: peel off the bottom `s`
/// coefficients as one baby-step fragment at a time, so that
/// `poly(X) = Σ_i chunks[i](X) * X^{i*s}` — equivalent to recursively
/// splitting `P(X) = P_q(X)*X^{2^k} + P_r(X)`, unrolled into the flat chunk
/// list the giant-step loop below merges. The final chunk (the one fitting
/// in fewer than `s` coefficients) retains the original polynomial's `lead`
/// flag; every earlier chunk is non-leading.
fn chunk_into_baby_steps(poly: &Polynomial, s: usize) -> Vec<Polynomial> {
    let mut chunks = Vec::new();
    let mut remaining = poly.clone();
    loop {
        if remaining.degree() < s {
            chunks.push(remaining);
            break;
        }
        let (low, high) = remaining.split_at(s);
        chunks.push(low);
        remaining = high;
    }
    chunks
}

/// The `(start, len, lead)` layout [`chunk_into_baby_steps`] would produce
/// for a polynomial of the given `degree`, without needing a materialized
/// [`Polynomial`] — used by the vector evaluation path, where each mapped
/// slot's polynomial shares one layout derived from the widest of them.
fn chunk_layout(degree: usize, s: usize) -> Vec<(usize, usize, bool)> {
    let mut layout = Vec::new();
    let mut start = 0usize;
    let mut remaining_degree = degree;
    loop {
        if remaining_degree < s {
            layout.push((start, remaining_degree + 1, true));
            break;
        }
        layout.push((start, s, false));
        start += s;
        remaining_degree -= s;
    }
    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{BgvInvariant, BgvStandard};
    use crate::errors::Error;
    use crate::polynomial::{Polynomial, PolynomialVector};
    use rand::thread_rng;
    use rlwe_core::crs::sample_crp_matrix;
    use rlwe_core::params::{NoiseDistribution, RingType};
    use rlwe_core::protocols::rkg::{RelinKeyGenerator, RelinKeyShare, R1};
    use rlwe_core::{Aggregate, Ciphertext, PublicKey, SecretKey};

    fn test_params(q_len: usize) -> Arc<RlweParameters> {
        let moduli = vec![0x3fffffff000001u64, 0x3ffffffef4001, 0x3ffffffeac001];
        Arc::new(
            RlweParameters::try_new(
                10,
                moduli[..q_len].to_vec(),
                vec![0x3fffffff000001],
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

    fn test_rk(par: &Arc<RlweParameters>, sk: &SecretKey) -> rlwe_core::RelinearizationKey {
        let mut rng = thread_rng();
        let crp = sample_crp_matrix(par, 0, &mut rng).unwrap();
        let generator = RelinKeyGenerator::new(sk, &crp, 0, &mut rng).unwrap();
        let r1 = generator.round_1(&mut rng).unwrap();
        let r1_agg = RelinKeyShare::<R1>::aggregate(vec![r1]).unwrap();
        let r2 = generator.round_2(&r1_agg, &mut rng).unwrap();
        Aggregate::aggregate(vec![r2]).unwrap()
    }

    fn encrypt_constant(par: &Arc<RlweParameters>, pk: &PublicKey, value: i64) -> Ciphertext {
        let mut rng = thread_rng();
        let mut plaintext = vec![0i64; par.degree()];
        plaintext[0] = value;
        Ciphertext::encrypt(pk, &plaintext, 1.0, &mut rng).unwrap()
    }

    #[test]
    fn baby_step_threshold_is_square_root_balanced() {
        assert_eq!(baby_step_threshold(3), 2);
        assert_eq!(baby_step_threshold(5), 4);
        assert_eq!(baby_step_threshold(15), 4);
        assert_eq!(baby_step_threshold(16), 8);
    }

    #[test]
    fn evaluates_square_of_a_constant() {
        let par = test_params(1);
        let mut rng = thread_rng();
        let sk = SecretKey::random(&par, &mut rng);
        let pk = PublicKey::new(&sk, &mut rng).unwrap();
        let rk = test_rk(&par, &sk);
        let ct = encrypt_constant(&par, &pk, 5);

        let poly = Polynomial::monomial(vec![0.0, 0.0, 1.0]); // X^2
        let evaluator = PsEvaluator::new(par.clone(), BgvInvariant);
        let result = evaluator.evaluate(&ct, &poly, &rk).unwrap();
        let decrypted = result.decrypt(&sk).unwrap();

        assert_eq!(decrypted[0], 25);
        assert_eq!(evaluator.state(), EvalState::Finalized);
    }

    #[test]
    fn evaluates_degree_five_polynomial_via_chunked_baby_and_giant_steps() {
        let par = test_params(1);
        let mut rng = thread_rng();
        let sk = SecretKey::random(&par, &mut rng);
        let pk = PublicKey::new(&sk, &mut rng).unwrap();
        let rk = test_rk(&par, &sk);
        let ct = encrypt_constant(&par, &pk, 2);

        // P(X) = 1 + 2X + 3X^2 + X^3 + X^4 + X^5; P(2) = 1+4+12+8+16+32 = 73.
        let poly = Polynomial::monomial(vec![1.0, 2.0, 3.0, 1.0, 1.0, 1.0]);
        let evaluator = PsEvaluator::new(par.clone(), BgvInvariant);
        let result = evaluator.evaluate(&ct, &poly, &rk).unwrap();
        let decrypted = result.decrypt(&sk).unwrap();

        assert_eq!(decrypted[0], 73);
    }

    #[test]
    fn constant_polynomial_needs_no_power_basis_multiplication() {
        let par = test_params(1);
        let mut rng = thread_rng();
        let sk = SecretKey::random(&par, &mut rng);
        let pk = PublicKey::new(&sk, &mut rng).unwrap();
        let rk = test_rk(&par, &sk);
        let ct = encrypt_constant(&par, &pk, 9);

        let poly = Polynomial::monomial(vec![42.0]);
        let evaluator = PsEvaluator::new(par.clone(), BgvInvariant);
        let result = evaluator.evaluate(&ct, &poly, &rk).unwrap();
        let decrypted = result.decrypt(&sk).unwrap();

        assert_eq!(decrypted[0], 42);
    }

    #[test]
    fn insufficient_levels_is_reported() {
        let par = test_params(1);
        let mut rng = thread_rng();
        let sk = SecretKey::random(&par, &mut rng);
        let pk = PublicKey::new(&sk, &mut rng).unwrap();
        let rk = test_rk(&par, &sk);
        let ct = encrypt_constant(&par, &pk, 2);

        // Degree 2 costs one level under BgvStandard's non-invariant
        // tracking, but this parameter set has only one modulus (max_level
        // == 0), so the evaluator must refuse before touching a ciphertext.
        let poly = Polynomial::monomial(vec![0.0, 0.0, 1.0]);
        let evaluator = PsEvaluator::new(par.clone(), BgvStandard);
        let err = evaluator.evaluate(&ct, &poly, &rk).unwrap_err();

        assert!(matches!(
            err,
            Error::CoreError(rlwe_core::Error::InsufficientLevels { .. })
        ));
        assert_eq!(evaluator.state(), EvalState::Fresh);
    }

    #[test]
    fn evaluate_vector_routes_disjoint_polynomials_per_slot() {
        let par = test_params(1);
        let mut rng = thread_rng();
        let sk = SecretKey::random(&par, &mut rng);
        let pk = PublicKey::new(&sk, &mut rng).unwrap();
        let rk = test_rk(&par, &sk);

        let mut plaintext = vec![0i64; par.degree()];
        plaintext[0] = 3;
        plaintext[1] = 5;
        let ct = Ciphertext::encrypt(&pk, &plaintext, 1.0, &mut rng).unwrap();

        // Slot 0: X^2 (3^2 = 9). Slot 1: 1 + X (1 + 5 = 6). Slot 2 unmapped.
        let square = Polynomial::monomial(vec![0.0, 0.0, 1.0]);
        let linear = Polynomial::monomial(vec![1.0, 1.0]);
        let mut mapping = vec![None; par.degree()];
        mapping[0] = Some(0);
        mapping[1] = Some(1);
        let pv = PolynomialVector::try_new(mapping, vec![square, linear]).unwrap();

        let evaluator = PsEvaluator::new(par.clone(), BgvInvariant);
        let result = evaluator.evaluate_vector(&ct, &pv, &rk).unwrap();
        let decrypted = result.decrypt(&sk).unwrap();

        assert_eq!(decrypted[0], 9);
        assert_eq!(decrypted[1], 6);
        assert_eq!(decrypted[2], 0);
        assert_eq!(evaluator.state(), EvalState::Finalized);
    }

    #[test]
    fn evaluate_vector_rejects_mapping_length_mismatch() {
        let par = test_params(1);
        let mut rng = thread_rng();
        let sk = SecretKey::random(&par, &mut rng);
        let pk = PublicKey::new(&sk, &mut rng).unwrap();
        let rk = test_rk(&par, &sk);
        let ct = encrypt_constant(&par, &pk, 2);

        let poly = Polynomial::monomial(vec![0.0, 1.0]);
        let pv = PolynomialVector::try_new(vec![Some(0)], vec![poly]).unwrap();

        let evaluator = PsEvaluator::new(par.clone(), BgvInvariant);
        let err = evaluator.evaluate_vector(&ct, &pv, &rk).unwrap_err();

        assert!(matches!(
            err,
            Error::CoreError(rlwe_core::Error::ShapeMismatch(_))
        ));
    }
}
