//! Parameter description for a multiparty RLWE deployment.

use std::sync::Arc;

use fhe_math::rq::Context;

use crate::errors::{Error, Result};

/// How a party's error/smudging polynomials are sampled.
///
/// An explicit enum rather than a raw sigma float, queried through
/// [`NoiseDistribution::variance`] at every sampling call site.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoiseDistribution {
    /// A centered discrete Gaussian with the given standard deviation.
    DiscreteGaussian {
        /// Standard deviation of the error distribution.
        sigma: f64,
    },
    /// A ternary distribution, either fixed Hamming weight or per-coefficient
    /// probability of being nonzero.
    Ternary {
        /// Fixed number of nonzero coefficients, if using a fixed-weight
        /// ternary sampler.
        hamming_weight: Option<usize>,
        /// Per-coefficient probability of being nonzero, if using a
        /// probabilistic ternary sampler. Ignored when `hamming_weight` is set.
        probability: Option<f64>,
    },
}

impl NoiseDistribution {
    /// The variance implied by this distribution, used wherever the
    /// underlying ring facade wants a variance rather than a full
    /// distribution object (matching `fhe::bfv::BfvParameters::variance`).
    pub fn variance(&self) -> f64 {
        match self {
            NoiseDistribution::DiscreteGaussian { sigma } => sigma * sigma,
            NoiseDistribution::Ternary {
                hamming_weight: Some(h),
                ..
            } => *h as f64,
            NoiseDistribution::Ternary {
                probability: Some(p),
                ..
            } => *p,
            NoiseDistribution::Ternary { .. } => 2.0 / 3.0,
        }
    }
}

/// Cyclotomic ring flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingType {
    /// The standard power-of-two cyclotomic ring `Z[X]/(X^N + 1)`.
    Standard,
    /// The conjugate-invariant ring, used for real-valued CKKS slots.
    ConjugateInvariant,
}

/// Runtime configuration shared by every party in a protocol run.
///
/// Mirrors the field/method surface `fhe::bfv::BfvParameters` exposes
/// (`par.variance`, `par.moduli`, `par.ctx_at_level`, `par.max_level`,
/// `par.degree`), generalized off any BFV-specific encoding fields so the
/// same parameter set serves BGV, CKKS, and the plain multiparty protocols.
#[derive(Debug)]
pub struct RlweParameters {
    log_n: usize,
    q_moduli: Vec<u64>,
    p_moduli: Vec<u64>,
    pow2_base: u32,
    noise: NoiseDistribution,
    smudging: NoiseDistribution,
    ring_type: RingType,
    plaintext_modulus: Option<u64>,
    default_scale: Option<f64>,
    ctx_chain: Vec<Arc<Context>>,
    ctx_p: Option<Arc<Context>>,
}

impl RlweParameters {
    /// Construct and validate a new parameter set.
    ///
    /// Rejects `logN < 10`, an empty `Q` chain, and a nonzero `pow2Base` that
    /// doesn't divide evenly into 64 (the only decomposition bases this
    /// gadget-matrix layout supports).
    #[allow(clippy::too_many_arguments)]
    pub fn try_new(
        log_n: usize,
        q_moduli: Vec<u64>,
        p_moduli: Vec<u64>,
        pow2_base: u32,
        noise: NoiseDistribution,
        smudging: NoiseDistribution,
        ring_type: RingType,
        plaintext_modulus: Option<u64>,
        default_scale: Option<f64>,
    ) -> Result<Self> {
        if log_n < 10 {
            return Err(Error::InvalidParameters(format!(
                "logN must be >= 10, got {log_n}"
            )));
        }
        if q_moduli.is_empty() {
            return Err(Error::InvalidParameters(
                "Q modulus chain must not be empty".to_string(),
            ));
        }
        if pow2_base != 0 && 64 % pow2_base.max(1) != 0 {
            return Err(Error::InvalidParameters(format!(
                "pow2Base must divide 64 or be 0, got {pow2_base}"
            )));
        }
        let degree = 1usize << log_n;
        let mut ctx_chain = Vec::with_capacity(q_moduli.len());
        for level in 0..q_moduli.len() {
            let moduli = &q_moduli[level..];
            let ctx = Context::new(moduli, degree)
                .map_err(|e| Error::InvalidParameters(format!("building Q context: {e}")))?;
            ctx_chain.push(Arc::new(ctx));
        }
        let ctx_p = if p_moduli.is_empty() {
            None
        } else {
            let ctx = Context::new(&p_moduli, degree)
                .map_err(|e| Error::InvalidParameters(format!("building P context: {e}")))?;
            Some(Arc::new(ctx))
        };
        Ok(Self {
            log_n,
            q_moduli,
            p_moduli,
            pow2_base,
            noise,
            smudging,
            ring_type,
            plaintext_modulus,
            default_scale,
            ctx_chain,
            ctx_p,
        })
    }

    /// Ring degree, `N = 2^logN`.
    pub fn degree(&self) -> usize {
        1 << self.log_n
    }

    /// The `logN` exponent.
    pub fn log_n(&self) -> usize {
        self.log_n
    }

    /// The ciphertext modulus chain `Q`.
    pub fn moduli(&self) -> &[u64] {
        &self.q_moduli
    }

    /// The auxiliary modulus chain `P` (empty when key-switching is
    /// single-modulus).
    pub fn p_moduli(&self) -> &[u64] {
        &self.p_moduli
    }

    /// Power-of-two decomposition base for gadget keys; `0` disables
    /// power-of-two decomposition (RNS-only decomposition).
    pub fn pow2_base(&self) -> u32 {
        self.pow2_base
    }

    /// The highest valid level index (`Q.len() - 1`).
    pub fn max_level(&self) -> usize {
        self.q_moduli.len() - 1
    }

    /// The ring context at the given level (dropping the top `level` primes).
    pub fn ctx_at_level(&self, level: usize) -> Result<&Arc<Context>> {
        self.ctx_chain.get(level).ok_or_else(|| {
            Error::InvalidParameters(format!(
                "level {level} out of range (max {})",
                self.max_level()
            ))
        })
    }

    /// The auxiliary `P` context, if any.
    pub fn ctx_p(&self) -> Option<&Arc<Context>> {
        self.ctx_p.as_ref()
    }

    /// Encryption-noise variance, read through the configured
    /// [`NoiseDistribution`].
    pub fn variance(&self) -> f64 {
        self.noise.variance()
    }

    /// The configured noise distribution.
    pub fn noise_distribution(&self) -> NoiseDistribution {
        self.noise
    }

    /// Smudging-noise variance, distinct from fresh encryption noise.
    pub fn smudging_variance(&self) -> f64 {
        self.smudging.variance()
    }

    /// The configured ring type.
    pub fn ring_type(&self) -> RingType {
        self.ring_type
    }

    /// Plaintext modulus, meaningful for BGV/BFV-flavored callers only.
    pub fn plaintext_modulus(&self) -> Option<u64> {
        self.plaintext_modulus
    }

    /// Default encoding scale, meaningful for CKKS-flavored callers only.
    pub fn default_scale(&self) -> Option<f64> {
        self.default_scale
    }

    /// Number of RNS decomposition cells at a given level (`decompRNS`).
    pub fn decomp_rns(&self, level: usize) -> usize {
        self.q_moduli.len() - level
    }

    /// Number of power-of-two decomposition cells (`decompPw2`); `1` when
    /// `pow2Base == 0`.
    pub fn decomp_pw2(&self) -> usize {
        if self.pow2_base == 0 {
            1
        } else {
            (64 / self.pow2_base as usize).max(1)
        }
    }
}
