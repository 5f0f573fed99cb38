//! Polynomial ring facade.
//!
//! A uniform adapter over `fhe-math`'s `Poly`/`Context`/RNS types. The NTT,
//! modular multiplication and CRT machinery themselves live in `fhe-math` —
//! this module only exposes the handful of ring-level operations the
//! multiparty protocols and the PS evaluator actually call, so that callers
//! never reach for `fhe-math` internals directly.

use fhe_math::rns::RnsContext;
use fhe_math::rq::{traits::TryConvertFrom, Context, Poly, Representation};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::errors::{Error, Result};

/// Build a polynomial from signed coefficients (e.g. a secret key's ternary
/// coefficients), landing in NTT representation ready for ring arithmetic.
///
/// Mirrors the conversion every protocol share constructor performs on a
/// secret key share before using it (`Poly::try_convert_from(..., false,
/// Representation::PowerBasis)` then `change_representation(Ntt)`).
pub fn poly_from_coeffs(coeffs: &[i64], ctx: &Context) -> Result<Poly> {
    let mut p = Poly::try_convert_from(coeffs, ctx, false, Representation::PowerBasis)
        .map_err(|e| Error::DefaultError(format!("converting coefficients to Poly: {e}")))?;
    p.change_representation(Representation::Ntt);
    Ok(p)
}

/// Sample a uniformly random NTT-form polynomial — the common reference
/// polynomial primitive.
pub fn sample_uniform<R: RngCore + CryptoRng>(ctx: &Context, rng: &mut R) -> Poly {
    Poly::random(ctx, Representation::Ntt, rng)
}

/// Sample a small (error/smudging) NTT-form polynomial of the given variance.
pub fn sample_small<R: RngCore + CryptoRng>(
    ctx: &Context,
    variance: f64,
    rng: &mut R,
) -> Result<Zeroizing<Poly>> {
    Ok(Zeroizing::new(
        Poly::small(ctx, Representation::Ntt, variance, rng)
            .map_err(|e| Error::DefaultError(format!("sampling small polynomial: {e}")))?,
    ))
}

/// The `i`-th Garner (CRT) basis weight for an RNS context built from the
/// given modulus chain, used as the `w_{i,j} = P · 2^{jβ}` decomposition
/// weight in RKG/GKG.
pub fn garner_weight(moduli: &[u64], i: usize) -> Result<num_bigint::BigUint> {
    let rns = RnsContext::new(moduli)
        .map_err(|e| Error::DefaultError(format!("building RNS context: {e}")))?;
    rns.get_garner(i)
        .cloned()
        .ok_or_else(|| Error::DefaultError(format!("no Garner weight for index {i}")))
}

/// Apply the Galois automorphism `X -> X^g` to `p`, in the standard
/// negacyclic ring `Z[X]/(X^N+1)`. `g` must be odd and coprime to `2N`.
///
/// Implemented directly against the coefficient representation rather than
/// assumed to exist as a named `fhe-math` method: coefficient `a_i` moves to
/// index `(g*i) mod 2N`, negated if that index lands past `N`.
pub fn automorphism(p: &Poly, g: u64, ctx: &Context) -> Result<Poly> {
    let degree = ctx.degree();
    let two_n = 2 * degree as u64;
    if g % 2 == 0 || num_integer::gcd(g, two_n) != 1 {
        return Err(Error::InvalidGaloisElement(format!(
            "Galois element {g} is not coprime to 2N={two_n}"
        )));
    }
    let was_ntt = p.representation() == Representation::Ntt;
    let mut src = p.clone();
    if was_ntt {
        src.change_representation(Representation::PowerBasis);
    }

    let moduli = ctx.moduli();
    let mut out = src.clone();
    {
        let src_coeffs = src.coefficients();
        let mut out_coeffs = out.coefficients_mut();
        for row in 0..moduli.len() {
            let q = moduli[row];
            for col in 0..degree {
                out_coeffs[[row, col]] = 0;
            }
            for col in 0..degree {
                let v = src_coeffs[[row, col]];
                if v == 0 {
                    continue;
                }
                let dest = ((g as u128 * col as u128) % two_n as u128) as u64;
                if dest < degree as u64 {
                    out_coeffs[[row, dest as usize]] = v;
                } else {
                    let idx = (dest - degree as u64) as usize;
                    out_coeffs[[row, idx]] = (q - v % q) % q;
                }
            }
        }
    }
    if was_ntt {
        out.change_representation(Representation::Ntt);
    }
    Ok(out)
}

/// The full gadget decomposition weight `w_{i,j} = garner_i * 2^(j*pow2Base)`
/// for cell `(i, j)` of an RKG/GKG gadget matrix. `pow2_base == 0` collapses
/// to the pure RNS (Garner-only) decomposition.
pub fn gadget_weight(moduli: &[u64], i: usize, j: usize, pow2_base: u32) -> Result<num_bigint::BigUint> {
    use num_traits::One;
    let base = garner_weight(moduli, i)?;
    if pow2_base == 0 || j == 0 {
        return Ok(base);
    }
    let shift = (j as u32) * pow2_base;
    Ok(base * (num_bigint::BigUint::one() << shift))
}

/// Multiply a polynomial by an RNS scalar weight (e.g. a Garner / gadget
/// decomposition weight).
pub fn scalar_mul(weight: &num_bigint::BigUint, p: &Poly) -> Poly {
    weight * p
}

/// Modular inverse of `g` with respect to `2N`, used to compute `s' =
/// phi_{g^-1}(s_i)` in Galois-key generation.
pub fn inverse_galois_element(g: u64, degree: usize) -> Result<u64> {
    let two_n = 2 * degree as u64;
    mod_inverse(g, two_n).ok_or_else(|| {
        Error::InvalidGaloisElement(format!("{g} has no inverse modulo {two_n}"))
    })
}

/// Modular inverse of `a` with respect to `modulus`, or `None` if they are
/// not coprime. Used both for the Galois element inverse above and for the
/// per-prime inversions the Shamir combiner needs for its Lagrange
/// coefficients: the modular inverse of `(x_k - x_j)` is computed per RNS
/// prime.
pub fn mod_inverse(a: u64, modulus: u64) -> Option<u64> {
    let (gcd, x, _) = extended_gcd(a as i128, modulus as i128);
    if gcd != 1 {
        return None;
    }
    let m = modulus as i128;
    Some((((x % m) + m) % m) as u64)
}

fn extended_gcd(a: i128, b: i128) -> (i128, i128, i128) {
    if b == 0 {
        (a, 1, 0)
    } else {
        let (g, x1, y1) = extended_gcd(b, a % b);
        (g, y1, x1 - (a / b) * y1)
    }
}

/// Multiply `p` by a different scalar per RNS row (modulus), used by the
/// Shamir combiner's Lagrange reconstruction where each Lagrange
/// coefficient is a distinct value modulo each prime in the chain rather
/// than one coherent multi-precision scalar. Works directly against the
/// coefficient array, the same technique [`automorphism`] uses for the one
/// other ring op with no single-scalar `fhe-math` equivalent.
pub fn scalar_mul_rowwise(weights: &[u64], p: &Poly, ctx: &Context) -> Result<Poly> {
    let moduli = ctx.moduli();
    if weights.len() != moduli.len() {
        return Err(Error::ShapeMismatch(format!(
            "expected {} row weights, got {}",
            moduli.len(),
            weights.len()
        )));
    }
    let degree = ctx.degree();
    let mut out = p.clone();
    {
        let src = p.coefficients();
        let mut dst = out.coefficients_mut();
        for (row, (&q, &w)) in moduli.iter().zip(weights.iter()).enumerate() {
            let w = w as u128;
            for col in 0..degree {
                dst[[row, col]] = ((src[[row, col]] as u128 * w) % q as u128) as u64;
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn galois_inverse_is_involutive_on_identity() {
        assert_eq!(inverse_galois_element(1, 8).unwrap(), 1);
    }

    #[test]
    fn galois_inverse_roundtrips() {
        let degree = 8;
        let two_n = 2 * degree as u64;
        for g in [3u64, 5, 7, 9, 11, 13, 15] {
            if num_integer::gcd(g, two_n) != 1 {
                continue;
            }
            let g_inv = inverse_galois_element(g, degree).unwrap();
            assert_eq!((g * g_inv) % two_n, 1);
        }
    }

    #[test]
    fn rejects_non_coprime_galois_element() {
        assert!(inverse_galois_element(4, 8).is_err());
    }

    #[test]
    fn mod_inverse_roundtrips() {
        let modulus = 0x3fffffff000001u64;
        let a = 12345u64;
        let inv = mod_inverse(a, modulus).unwrap();
        assert_eq!(
            ((a as u128 * inv as u128) % modulus as u128) as u64,
            1
        );
    }

    #[test]
    fn mod_inverse_rejects_non_coprime() {
        assert!(mod_inverse(4, 8).is_none());
    }
}
