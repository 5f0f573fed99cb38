//! The Paterson-Stockmeyer polynomial model: a coefficient list tagged with
//! the bookkeeping the evaluator needs to decide when relinearization/
//! rescaling is required and which fragment carries the original leading
//! coefficient.

use rlwe_core::errors::{Error, Result};

/// Basis a [`Polynomial`]'s coefficients are expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    /// Standard monomial basis: `coeffs[k]` is the coefficient of `X^k`.
    Monomial,
    /// Chebyshev basis: `coeffs[k]` is the coefficient of `T_k(X)`.
    Chebyshev,
}

/// A (possibly partial, post-split) univariate polynomial fragment, tagged
/// with the level/scale the simulator has computed for it.
#[derive(Debug, Clone)]
pub struct Polynomial {
    coeffs: Vec<f64>,
    basis: Basis,
    /// `true` iff this fragment contains the original polynomial's leading
    /// (highest-degree) coefficient.
    pub lead: bool,
    /// `true` iff relinearization of the ciphertext this fragment eventually
    /// produces may be deferred.
    pub lazy: bool,
    /// Level the simulator assigned this fragment.
    pub level: usize,
    /// Scale the simulator assigned this fragment.
    pub scale: f64,
}

impl Polynomial {
    /// Build a polynomial from monomial coefficients (index `k` ↔ `X^k`).
    pub fn monomial(coeffs: Vec<f64>) -> Self {
        Self {
            coeffs,
            basis: Basis::Monomial,
            lead: true,
            lazy: false,
            level: 0,
            scale: 1.0,
        }
    }

    /// Build a polynomial from Chebyshev coefficients.
    pub fn chebyshev(coeffs: Vec<f64>) -> Self {
        Self {
            coeffs,
            basis: Basis::Chebyshev,
            lead: true,
            lazy: false,
            level: 0,
            scale: 1.0,
        }
    }

    /// This polynomial's basis.
    pub fn basis(&self) -> Basis {
        self.basis
    }

    /// Coefficient of `X^k` (or `T_k`), `0` past the stored degree.
    pub fn coeff(&self, k: usize) -> f64 {
        self.coeffs.get(k).copied().unwrap_or(0.0)
    }

    /// Degree: the highest index carrying a nonzero coefficient (`0` for the
    /// zero polynomial).
    pub fn degree(&self) -> usize {
        self.coeffs
            .iter()
            .rposition(|&c| c != 0.0)
            .unwrap_or(0)
    }

    /// All coefficients up to [`Self::degree`], inclusive.
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// `true` iff every odd-indexed coefficient is zero.
    pub fn is_even(&self) -> bool {
        self.coeffs.iter().skip(1).step_by(2).all(|&c| c == 0.0)
    }

    /// `true` iff every even-indexed coefficient (other than possibly the
    /// constant term) is zero and at least one odd coefficient is nonzero.
    pub fn is_odd(&self) -> bool {
        self.coeffs.iter().step_by(2).all(|&c| c == 0.0)
    }

    /// Split at coefficient index `at`: the low fragment keeps `[0, at)`,
    /// the high fragment keeps `[at, ..)` re-indexed from zero. Used by the
    /// Paterson-Stockmeyer decomposition: `P(X) = P_q(X)*X^{2^k} + P_r(X)`.
    pub fn split_at(&self, at: usize) -> (Polynomial, Polynomial) {
        let low: Vec<f64> = (0..at).map(|k| self.coeff(k)).collect();
        let high: Vec<f64> = (at..=self.degree().max(at)).map(|k| self.coeff(k)).collect();
        let mut low = Polynomial {
            coeffs: low,
            basis: self.basis,
            lead: false,
            lazy: self.lazy,
            level: self.level,
            scale: self.scale,
        };
        let mut high = Polynomial {
            coeffs: high,
            basis: self.basis,
            lead: self.lead,
            lazy: self.lazy,
            level: self.level,
            scale: self.scale,
        };
        low.lead = false;
        high.lead = self.lead;
        (low, high)
    }
}

/// Maps slot index → polynomial index, letting disjoint polynomials be
/// evaluated on disjoint slot ranges of one ciphertext. Unmapped slots
/// decode to zero.
pub struct PolynomialVector {
    /// `mapping[slot] == Some(i)` routes that slot through
    /// `polynomials[i]`; `None` means the slot decodes to zero.
    mapping: Vec<Option<usize>>,
    polynomials: Vec<Polynomial>,
}

impl PolynomialVector {
    /// Build a polynomial vector, validating every mapped index is in range.
    pub fn try_new(mapping: Vec<Option<usize>>, polynomials: Vec<Polynomial>) -> Result<Self> {
        for slot in &mapping {
            if let Some(i) = slot {
                if *i >= polynomials.len() {
                    return Err(Error::ShapeMismatch(format!(
                        "slot mapping references polynomial {i}, only {} present",
                        polynomials.len()
                    )));
                }
            }
        }
        Ok(Self { mapping, polynomials })
    }

    /// The slot → polynomial-index mapping.
    pub fn mapping(&self) -> &[Option<usize>] {
        &self.mapping
    }

    /// The distinct polynomials referenced by the mapping.
    pub fn polynomials(&self) -> &[Polynomial] {
        &self.polynomials
    }

    /// The highest degree among the mapped polynomials, used to size the
    /// shared power basis.
    pub fn max_degree(&self) -> usize {
        self.polynomials.iter().map(Polynomial::degree).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degree_ignores_trailing_zeros() {
        let p = Polynomial::monomial(vec![1.0, 0.0, 3.0, 0.0]);
        assert_eq!(p.degree(), 2);
    }

    #[test]
    fn split_at_preserves_coefficients() {
        let p = Polynomial::monomial(vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let (low, high) = p.split_at(2);
        assert_eq!(low.coeffs(), &[1.0, 2.0]);
        assert_eq!(high.coeffs(), &[3.0, 4.0, 5.0]);
        assert!(high.lead);
        assert!(!low.lead);
    }

    #[test]
    fn even_odd_detection() {
        assert!(Polynomial::monomial(vec![1.0, 0.0, 3.0]).is_even());
        assert!(Polynomial::monomial(vec![0.0, 2.0, 0.0, 4.0]).is_odd());
    }

    #[test]
    fn polynomial_vector_rejects_out_of_range_mapping() {
        let polys = vec![Polynomial::monomial(vec![1.0])];
        let err = PolynomialVector::try_new(vec![Some(5)], polys).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch(_)));
    }
}
