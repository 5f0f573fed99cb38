//! Pre-computes the level and scale of every intermediate in a
//! Paterson-Stockmeyer evaluation without touching a real ciphertext, so the
//! evaluator can detect a drifted scale (`ScaleMismatch`) as soon as it
//! happens rather than after the fact.

use std::sync::Arc;

use rlwe_core::params::RlweParameters;

use crate::capability::{EvalCapability, SimOperand};

/// Wraps an [`EvalCapability`] with the parameter set it operates against.
pub struct Simulator<C> {
    par: Arc<RlweParameters>,
    capability: C,
}

impl<C: EvalCapability> Simulator<C> {
    /// Build a simulator for the given parameters and scheme capability.
    pub fn new(par: Arc<RlweParameters>, capability: C) -> Self {
        Self { par, capability }
    }

    /// The wrapped capability.
    pub fn capability(&self) -> &C {
        &self.capability
    }

    /// The parameters this simulator operates against.
    pub fn par(&self) -> &Arc<RlweParameters> {
        &self.par
    }

    /// `Rescale(op)`.
    pub fn rescale(&self, op: &mut SimOperand) {
        self.capability.rescale(&self.par, op)
    }

    /// `MulNew(a, b)`.
    pub fn mul_new(&self, a: &SimOperand, b: &SimOperand) -> SimOperand {
        self.capability.mul_new(a, b)
    }

    /// `UpdateLevelAndScaleBabyStep`.
    pub fn update_baby_step(&self, lead: bool, op: SimOperand) -> SimOperand {
        let (level, scale) = self
            .capability
            .update_level_and_scale_baby_step(&self.par, lead, op.level, op.scale);
        SimOperand { level, scale }
    }

    /// `UpdateLevelAndScaleGiantStep`.
    pub fn update_giant_step(&self, lead: bool, op: SimOperand, x_pow_scale: f64) -> SimOperand {
        let (level, scale) = self.capability.update_level_and_scale_giant_step(
            &self.par,
            lead,
            op.level,
            op.scale,
            x_pow_scale,
        );
        SimOperand { level, scale }
    }

    /// `PolynomialDepth(degree)`: number of levels a degree-`d` polynomial's
    /// evaluation consumes.
    pub fn polynomial_depth(&self, degree: usize) -> usize {
        self.capability.polynomial_depth(degree)
    }

    /// Whether this scheme tracks scale explicitly across rescales.
    pub fn is_invariant(&self) -> bool {
        self.capability.is_invariant()
    }

    /// Number of RNS primes one rescale consumes.
    pub fn levels_per_rescale(&self) -> usize {
        self.capability.levels_per_rescale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{BgvInvariant, CkksStandard};
    use rlwe_core::params::{NoiseDistribution, RingType};

    fn test_params(plaintext_modulus: Option<u64>) -> Arc<RlweParameters> {
        Arc::new(
            RlweParameters::try_new(
                10,
                vec![0x3fffffff000001, 0x3ffffffef4001, 0x3ffffffeac001],
                vec![],
                0,
                NoiseDistribution::Ternary {
                    hamming_weight: None,
                    probability: None,
                },
                NoiseDistribution::DiscreteGaussian { sigma: 3.2 },
                RingType::Standard,
                plaintext_modulus,
                Some(1u64 << 45),
            )
            .unwrap(),
        )
    }

    #[test]
    fn ckks_rescale_divides_scale_and_advances_level() {
        let par = test_params(None);
        let sim = Simulator::new(par.clone(), CkksStandard);
        let mut op = SimOperand { level: 0, scale: (1u64 << 90) as f64 };
        sim.rescale(&mut op);
        assert_eq!(op.level, 1);
        assert!((op.scale - (1u64 << 90) as f64 / par.moduli()[0] as f64).abs() < 1.0);
    }

    #[test]
    fn bgv_invariant_rescale_is_a_noop() {
        let par = test_params(Some(0x101));
        let sim = Simulator::new(par, BgvInvariant);
        let mut op = SimOperand { level: 0, scale: 1.0 };
        sim.rescale(&mut op);
        assert_eq!(op, SimOperand { level: 0, scale: 1.0 });
    }

    #[test]
    fn mul_new_multiplies_scales_and_takes_min_level() {
        let par = test_params(None);
        let sim = Simulator::new(par, CkksStandard);
        let a = SimOperand { level: 1, scale: 2.0 };
        let b = SimOperand { level: 0, scale: 3.0 };
        let out = sim.mul_new(&a, &b);
        assert_eq!(out.level, 0);
        assert_eq!(out.scale, 6.0);
    }
}
