//! Power-basis construction: given ciphertext `X`, materializes
//! `{X^1, X^2, ..., X^n}` on demand, memoizing each power along with whether
//! it still needs relinearization or rescaling before it can be consumed.
//! Each [`PowerBasisEntry`] carries a `needs_relin`/`needs_rescale` flag; any
//! consumer that requires relinearized/rescaled input requests the entry in
//! that form and the basis object memoizes the updated state.

use std::collections::HashMap;
use std::sync::Arc;

use rlwe_core::errors::{Error, Result};
use rlwe_core::keys::{Ciphertext, RelinearizationKey};
use rlwe_core::params::RlweParameters;

use crate::polynomial::Basis;

/// One materialized power, with lazy relinearization/rescaling state.
#[derive(Clone)]
pub struct PowerBasisEntry {
    /// The power's ciphertext. Degree 3 (unrelinearized) iff `needs_relin`.
    pub ciphertext: Ciphertext,
    /// `true` while this entry is a fresh, unrelinearized tensor product.
    pub needs_relin: bool,
    /// `true` while this entry's scale has grown past the next rescale
    /// boundary and hasn't yet been brought back down.
    pub needs_rescale: bool,
}

/// Memoized powers of one ciphertext `X`, built on demand.
pub struct PowerBasis {
    par: Arc<RlweParameters>,
    basis: Basis,
    entries: HashMap<usize, PowerBasisEntry>,
}

impl PowerBasis {
    /// Seed a power basis with `X^1`. A user-supplied basis missing `X^1`
    /// is `InvalidPowerBasis`.
    pub fn try_new(par: Arc<RlweParameters>, x: Ciphertext, basis: Basis) -> Result<Self> {
        if x.c.len() != 2 {
            return Err(Error::InvalidPowerBasis(
                "X^1 must be a degree-1 ciphertext".to_string(),
            ));
        }
        let mut entries = HashMap::new();
        entries.insert(
            1,
            PowerBasisEntry {
                ciphertext: x,
                needs_relin: false,
                needs_rescale: false,
            },
        );
        Ok(Self { par, basis, entries })
    }

    /// The basis (monomial/Chebyshev) this power basis was constructed for.
    pub fn basis(&self) -> Basis {
        self.basis
    }

    /// `true` iff `X^n` has already been materialized.
    pub fn contains(&self, n: usize) -> bool {
        self.entries.contains_key(&n)
    }

    /// Materialize (if needed) and return `X^n`, fully relinearized — the
    /// form every consumer outside this module receives.
    pub fn power(&mut self, n: usize, rk: &RelinearizationKey) -> Result<&Ciphertext> {
        self.ensure(n, rk)?;
        self.resolve_relin(n, rk)?;
        Ok(&self.entries[&n].ciphertext)
    }

    /// Materialize `X^n` without forcing relinearization, exposing the raw
    /// entry so a caller (e.g. a giant step) can decide when to pay for
    /// relinearize/rescale.
    pub fn entry(&mut self, n: usize, rk: &RelinearizationKey) -> Result<&PowerBasisEntry> {
        self.ensure(n, rk)?;
        Ok(&self.entries[&n])
    }

    fn ensure(&mut self, n: usize, rk: &RelinearizationKey) -> Result<()> {
        if self.entries.contains_key(&n) {
            return Ok(());
        }
        if n == 0 {
            return Err(Error::InvalidPowerBasis(
                "X^0 is the implicit identity, not a materialized power".to_string(),
            ));
        }
        let (a, b) = optimal_split(n);
        self.ensure(a, rk)?;
        self.resolve_relin(a, rk)?;
        self.ensure(b, rk)?;
        self.resolve_relin(b, rk)?;

        let xa = self.entries[&a].ciphertext.clone();
        let xb = self.entries[&b].ciphertext.clone();
        let mut product = xa.multiply(&xb)?;

        if self.basis == Basis::Chebyshev {
            // T_n via 2*T_a*T_b - T_{|a-b|}, X^0 == 1 handled as the
            // implicit identity. The subtraction below needs matching
            // shapes, so this branch relinearizes eagerly rather than
            // deferring like the monomial case.
            if product.c.len() > 2 {
                product = product.relinearize(&rk.0)?;
            }
            let diff = a.abs_diff(b);
            product = product.add(&product)?;
            if diff > 0 {
                self.ensure(diff, rk)?;
                self.resolve_relin(diff, rk)?;
                let x_diff = &self.entries[&diff].ciphertext;
                product = subtract(&product, x_diff)?;
            }
        }

        self.entries.insert(
            n,
            PowerBasisEntry {
                needs_relin: product.c.len() > 2,
                needs_rescale: false,
                ciphertext: product,
            },
        );
        Ok(())
    }

    fn resolve_relin(&mut self, n: usize, rk: &RelinearizationKey) -> Result<()> {
        let entry = self.entries.get(&n).expect("power already materialized");
        if !entry.needs_relin {
            return Ok(());
        }
        let relinearized = entry.ciphertext.relinearize(&rk.0)?;
        let entry = self.entries.get_mut(&n).expect("power already materialized");
        entry.ciphertext = relinearized;
        entry.needs_relin = false;
        Ok(())
    }

    /// The parameters this basis was built against.
    pub fn par(&self) -> &Arc<RlweParameters> {
        &self.par
    }
}

fn subtract(a: &Ciphertext, b: &Ciphertext) -> Result<Ciphertext> {
    let negated_c: Vec<_> = b.c.iter().map(|p| -p).collect();
    let negated = Ciphertext::new(negated_c, &b.par, b.level, b.scale)?;
    a.add(&negated)
}

/// Choose `(a, b)` with `a + b = n`, minimizing `|a - b|` and preferring `a`
/// odd when `n` is not a power of two. Ciphertext multiplication of `X^a` and
/// `X^b` produces `X^{a+b}`, the operation the recursion actually performs,
/// so the split is additive rather than multiplicative for composite `n`.
fn optimal_split(n: usize) -> (usize, usize) {
    if n.is_power_of_two() {
        let half = n / 2;
        return (half, half);
    }
    let mut a = n / 2;
    if a % 2 == 0 {
        a += 1;
    }
    let b = n - a;
    (a, b)
}
