//! The scheme-capability object the PS simulator and evaluator dispatch
//! through: a tagged variant (`BgvStandard`, `BgvInvariant`, `CkksStandard`,
//! `CkksMultiRescale`) carrying the four level/scale-tracking operations, so
//! the simulator and evaluator never special-case a scheme directly.

use rlwe_core::params::RlweParameters;

/// Level and scale of one simulated (or real) evaluation intermediate.
///
/// `level` here counts *dropped* primes from the bottom of the chain
/// (`rlwe_core::keys::Ciphertext`'s convention: `ctx_at_level(0)` is the full
/// chain, `rescale` increments `level`), so every rule below increments where
/// "highest surviving prime" framing would decrement, and indexes `Q[level]`
/// where that framing means "the prime being dropped".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimOperand {
    /// Current level (index of the highest-surviving prime).
    pub level: usize,
    /// Current scale.
    pub scale: f64,
}

/// The four level/scale-tracking rules a scheme must supply, plus the
/// polynomial-depth rule.
pub trait EvalCapability {
    /// `true` for scale-invariant schemes (BGV invariant mode, BGV-style
    /// plaintext-modulus arithmetic): rescaling changes level but not scale.
    fn is_invariant(&self) -> bool;

    /// Number of RNS primes consumed per rescale (`1` except CKKS
    /// multi-rescale).
    fn levels_per_rescale(&self) -> usize;

    /// `op.scale /= Q[op.level]; op.level -= levelsPerRescale` in
    /// non-invariant mode; a no-op in invariant mode.
    fn rescale(&self, par: &RlweParameters, op: &mut SimOperand);

    /// Level and scale of a fresh ciphertext-ciphertext product.
    fn mul_new(&self, a: &SimOperand, b: &SimOperand) -> SimOperand;

    /// Level/scale after folding a baby-step coefficient into the
    /// accumulator: unchanged, except the leading fragment's scale is
    /// multiplied by `Q[level]` in non-invariant mode.
    fn update_level_and_scale_baby_step(
        &self,
        par: &RlweParameters,
        lead: bool,
        level: usize,
        scale: f64,
    ) -> (usize, f64);

    /// Level/scale after a giant-step combination `babyStep_i +
    /// babyStep_{i+1}·X^{2^k}`.
    fn update_level_and_scale_giant_step(
        &self,
        par: &RlweParameters,
        lead: bool,
        level: usize,
        scale: f64,
        x_pow_scale: f64,
    ) -> (usize, f64);

    /// Number of levels a degree-`d` polynomial's evaluation consumes.
    fn polynomial_depth(&self, degree: usize) -> usize;
}

fn log2_floor(n: usize) -> u32 {
    (usize::BITS - 1) - n.max(1).leading_zeros()
}

/// BFV/BGV-style evaluation where scale is tracked explicitly and rescaling
/// (modulus switching) divides it by the dropped prime.
#[derive(Debug, Clone, Copy, Default)]
pub struct BgvStandard;

impl EvalCapability for BgvStandard {
    fn is_invariant(&self) -> bool {
        false
    }

    fn levels_per_rescale(&self) -> usize {
        1
    }

    fn rescale(&self, par: &RlweParameters, op: &mut SimOperand) {
        op.scale /= par.moduli()[op.level] as f64;
        op.level += 1;
    }

    fn mul_new(&self, a: &SimOperand, b: &SimOperand) -> SimOperand {
        SimOperand {
            level: a.level.min(b.level),
            scale: a.scale * b.scale,
        }
    }

    fn update_level_and_scale_baby_step(
        &self,
        par: &RlweParameters,
        lead: bool,
        level: usize,
        scale: f64,
    ) -> (usize, f64) {
        let scale = if lead { scale * par.moduli()[level] as f64 } else { scale };
        (level, scale)
    }

    fn update_level_and_scale_giant_step(
        &self,
        par: &RlweParameters,
        lead: bool,
        level: usize,
        scale: f64,
        x_pow_scale: f64,
    ) -> (usize, f64) {
        let mut scale = scale / x_pow_scale;
        let q = if lead { par.moduli()[level] } else { par.moduli()[level + 1] };
        scale *= q as f64;
        (level + 1, scale)
    }

    fn polynomial_depth(&self, degree: usize) -> usize {
        log2_floor(degree.max(1)) as usize
    }
}

/// BGV evaluation in scale-invariant (plaintext-modulus) mode: rescaling
/// changes level only, multiplication never grows the scale, and the
/// polynomial's evaluation is free of level cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct BgvInvariant;

impl EvalCapability for BgvInvariant {
    fn is_invariant(&self) -> bool {
        true
    }

    fn levels_per_rescale(&self) -> usize {
        1
    }

    fn rescale(&self, _par: &RlweParameters, _op: &mut SimOperand) {}

    fn mul_new(&self, a: &SimOperand, b: &SimOperand) -> SimOperand {
        SimOperand {
            level: a.level.min(b.level),
            scale: a.scale,
        }
    }

    fn update_level_and_scale_baby_step(
        &self,
        _par: &RlweParameters,
        _lead: bool,
        level: usize,
        scale: f64,
    ) -> (usize, f64) {
        (level, scale)
    }

    fn update_level_and_scale_giant_step(
        &self,
        par: &RlweParameters,
        _lead: bool,
        level: usize,
        scale: f64,
        x_pow_scale: f64,
    ) -> (usize, f64) {
        let t = par.plaintext_modulus().unwrap_or(1) as f64;
        let neg_q_mod_t = t - (par.moduli()[level] as f64 % t);
        ((level), (scale / x_pow_scale) * neg_q_mod_t)
    }

    fn polynomial_depth(&self, _degree: usize) -> usize {
        0
    }
}

/// CKKS evaluation with one prime consumed per rescale.
#[derive(Debug, Clone, Copy, Default)]
pub struct CkksStandard;

impl EvalCapability for CkksStandard {
    fn is_invariant(&self) -> bool {
        false
    }

    fn levels_per_rescale(&self) -> usize {
        1
    }

    fn rescale(&self, par: &RlweParameters, op: &mut SimOperand) {
        op.scale /= par.moduli()[op.level] as f64;
        op.level += 1;
    }

    fn mul_new(&self, a: &SimOperand, b: &SimOperand) -> SimOperand {
        SimOperand {
            level: a.level.min(b.level),
            scale: a.scale * b.scale,
        }
    }

    fn update_level_and_scale_baby_step(
        &self,
        par: &RlweParameters,
        lead: bool,
        level: usize,
        scale: f64,
    ) -> (usize, f64) {
        let scale = if lead { scale * par.moduli()[level] as f64 } else { scale };
        (level, scale)
    }

    fn update_level_and_scale_giant_step(
        &self,
        par: &RlweParameters,
        lead: bool,
        level: usize,
        scale: f64,
        x_pow_scale: f64,
    ) -> (usize, f64) {
        let mut scale = scale / x_pow_scale;
        let q = if lead { par.moduli()[level] } else { par.moduli()[level + 1] };
        scale *= q as f64;
        (level + 1, scale)
    }

    fn polynomial_depth(&self, degree: usize) -> usize {
        log2_floor(degree.max(1)) as usize
    }
}

/// CKKS evaluation where each rescale consumes `levels_per_rescale` primes
/// at once (a precision-boosting variant: wider primes, fewer rescales).
#[derive(Debug, Clone, Copy)]
pub struct CkksMultiRescale {
    levels_per_rescale: usize,
}

impl CkksMultiRescale {
    /// Build a multi-rescale capability consuming `k` primes per rescale.
    pub fn new(levels_per_rescale: usize) -> Self {
        Self {
            levels_per_rescale: levels_per_rescale.max(1),
        }
    }
}

impl EvalCapability for CkksMultiRescale {
    fn is_invariant(&self) -> bool {
        false
    }

    fn levels_per_rescale(&self) -> usize {
        self.levels_per_rescale
    }

    fn rescale(&self, par: &RlweParameters, op: &mut SimOperand) {
        let mut product = 1.0f64;
        for k in 0..self.levels_per_rescale {
            product *= par.moduli()[op.level + k] as f64;
        }
        op.scale /= product;
        op.level += self.levels_per_rescale;
    }

    fn mul_new(&self, a: &SimOperand, b: &SimOperand) -> SimOperand {
        SimOperand {
            level: a.level.min(b.level),
            scale: a.scale * b.scale,
        }
    }

    fn update_level_and_scale_baby_step(
        &self,
        par: &RlweParameters,
        lead: bool,
        level: usize,
        scale: f64,
    ) -> (usize, f64) {
        let scale = if lead { scale * par.moduli()[level] as f64 } else { scale };
        (level, scale)
    }

    fn update_level_and_scale_giant_step(
        &self,
        par: &RlweParameters,
        lead: bool,
        level: usize,
        scale: f64,
        x_pow_scale: f64,
    ) -> (usize, f64) {
        let mut scale = scale / x_pow_scale;
        let q = if lead { par.moduli()[level] } else { par.moduli()[level + 1] };
        scale *= q as f64;
        (level + 1, scale)
    }

    fn polynomial_depth(&self, degree: usize) -> usize {
        self.levels_per_rescale * log2_floor(degree.max(1)) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log2_floor_matches_expected() {
        assert_eq!(log2_floor(1), 0);
        assert_eq!(log2_floor(7), 2);
        assert_eq!(log2_floor(8), 3);
    }

    #[test]
    fn bgv_invariant_never_consumes_depth() {
        assert_eq!(BgvInvariant.polynomial_depth(1023), 0);
    }

    #[test]
    fn multi_rescale_scales_depth_by_k() {
        let standard = CkksStandard.polynomial_depth(16);
        let multi = CkksMultiRescale::new(2).polynomial_depth(16);
        assert_eq!(multi, 2 * standard);
    }
}
