//! Share algebra — typed containers for each protocol's share, with binary
//! wire encodings for transmission between parties.
//!
//! Every concrete share below needs a ring [`Context`] to decode (the wire
//! format stores raw RNS residues, not the moduli themselves — those are
//! shared out of band as part of the parameters both parties already agree
//! on), so [`Share::decode`] takes one explicitly.

use fhe_math::rq::{traits::TryConvertFrom, Context, Poly, Representation};

use crate::errors::{Error, Result};

/// Every share exposes this surface: add another share of the same shape in
/// place, measure and perform its binary encoding, and compare for equality.
/// Aggregation via repeated [`Share::add_assign`] is commutative and
/// associative, so callers may fold incoming shares in any order.
pub trait Share: Sized {
    /// Add `other` into `self` in place. Returns `ShapeMismatch` if the
    /// shapes disagree.
    fn add_assign(&mut self, other: &Self) -> Result<()>;

    /// Number of bytes [`Share::encode`] will write.
    fn binary_size(&self) -> usize;

    /// Append this share's binary encoding to `buf`.
    fn encode(&self, buf: &mut Vec<u8>);

    /// Decode a share from the front of `bytes`, given the ring context (and
    /// representation) its polynomials live over. Returns the share and the
    /// number of bytes consumed.
    fn decode(bytes: &[u8], ctx: &Context, representation: Representation) -> Result<(Self, usize)>;

    /// Structural equality (used to test that aggregation is order-independent).
    fn equals(&self, other: &Self) -> bool;
}

/// Encode a single polynomial: `uint8 numModuli`, then for each modulus
/// `uint32 N`, `N*8` bytes of coefficients.
pub fn encode_poly(p: &Poly, buf: &mut Vec<u8>) {
    let coeffs = p.coefficients();
    let num_moduli = coeffs.nrows();
    let degree = coeffs.ncols();
    buf.push(num_moduli as u8);
    for row in 0..num_moduli {
        buf.extend_from_slice(&(degree as u32).to_le_bytes());
        for col in 0..degree {
            buf.extend_from_slice(&coeffs[[row, col]].to_le_bytes());
        }
    }
}

/// Number of bytes [`encode_poly`] will write for a polynomial over `ctx`.
pub fn poly_binary_size(ctx: &Context) -> usize {
    1 + ctx.moduli().len() * (4 + ctx.degree() * 8)
}

/// Decode a polynomial encoded by [`encode_poly`], reconstructing it over
/// `ctx` in the given representation.
pub fn decode_poly(
    bytes: &[u8],
    ctx: &Context,
    representation: Representation,
) -> Result<(Poly, usize)> {
    if bytes.is_empty() {
        return Err(Error::IoError(
            "empty buffer decoding polynomial".to_string(),
        ));
    }
    let num_moduli = bytes[0] as usize;
    if num_moduli != ctx.moduli().len() {
        return Err(Error::ShapeMismatch(format!(
            "polynomial encodes {num_moduli} moduli, context has {}",
            ctx.moduli().len()
        )));
    }
    let mut offset = 1;
    let mut raw = Vec::with_capacity(num_moduli * ctx.degree());
    for _ in 0..num_moduli {
        if bytes.len() < offset + 4 {
            return Err(Error::IoError("truncated polynomial length".to_string()));
        }
        let n = u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
        offset += 4;
        if n != ctx.degree() {
            return Err(Error::ShapeMismatch(format!(
                "polynomial encodes degree {n}, context has degree {}",
                ctx.degree()
            )));
        }
        for _ in 0..n {
            if bytes.len() < offset + 8 {
                return Err(Error::IoError("truncated polynomial coefficient".to_string()));
            }
            let v = u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap());
            raw.push(v);
            offset += 8;
        }
    }
    let poly = Poly::try_convert_from(raw.as_slice(), ctx, false, representation)
        .map_err(|e| Error::IoError(format!("decoding polynomial: {e}")))?;
    Ok((poly, offset))
}

fn polys_equal(a: &Poly, b: &Poly) -> bool {
    a.representation() == b.representation() && a.coefficients() == b.coefficients()
}

/// CKG share: one polynomial over QP.
#[derive(Clone)]
pub struct CkgShare {
    pub poly: Poly,
}

impl Share for CkgShare {
    fn add_assign(&mut self, other: &Self) -> Result<()> {
        self.poly += &other.poly;
        Ok(())
    }

    fn binary_size(&self) -> usize {
        1 + self.poly.coefficients().nrows() * (4 + self.poly.coefficients().ncols() * 8)
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        encode_poly(&self.poly, buf);
    }

    fn decode(bytes: &[u8], ctx: &Context, representation: Representation) -> Result<(Self, usize)> {
        let (poly, consumed) = decode_poly(bytes, ctx, representation)?;
        Ok((Self { poly }, consumed))
    }

    fn equals(&self, other: &Self) -> bool {
        polys_equal(&self.poly, &other.poly)
    }
}

/// RKG share, either round: `uint8 decompRNS`, `uint8
/// decompPw2`, then `decompRNS*decompPw2` pairs of polynomials over QP.
#[derive(Clone)]
pub struct RkgShare {
    pub decomp_rns: u8,
    pub decomp_pw2: u8,
    pub cells: Vec<(Poly, Poly)>,
}

impl Share for RkgShare {
    fn add_assign(&mut self, other: &Self) -> Result<()> {
        if self.decomp_rns != other.decomp_rns
            || self.decomp_pw2 != other.decomp_pw2
            || self.cells.len() != other.cells.len()
        {
            return Err(Error::ShapeMismatch(
                "RKG shares have different decomposition shapes".to_string(),
            ));
        }
        for ((a0, a1), (b0, b1)) in self.cells.iter_mut().zip(other.cells.iter()) {
            *a0 += b0;
            *a1 += b1;
        }
        Ok(())
    }

    fn binary_size(&self) -> usize {
        let mut n = 2;
        for (a, _) in &self.cells {
            n += 2 * poly_binary_size_of(a);
        }
        n
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.decomp_rns);
        buf.push(self.decomp_pw2);
        for (a, b) in &self.cells {
            encode_poly(a, buf);
            encode_poly(b, buf);
        }
    }

    fn decode(bytes: &[u8], ctx: &Context, representation: Representation) -> Result<(Self, usize)> {
        if bytes.len() < 2 {
            return Err(Error::IoError("truncated RKG share header".to_string()));
        }
        let decomp_rns = bytes[0];
        let decomp_pw2 = bytes[1];
        let mut offset = 2;
        let mut cells = Vec::with_capacity(decomp_rns as usize * decomp_pw2 as usize);
        for _ in 0..(decomp_rns as usize * decomp_pw2 as usize) {
            let (a, consumed) = decode_poly(&bytes[offset..], ctx, representation)?;
            offset += consumed;
            let (b, consumed) = decode_poly(&bytes[offset..], ctx, representation)?;
            offset += consumed;
            cells.push((a, b));
        }
        Ok((
            Self {
                decomp_rns,
                decomp_pw2,
                cells,
            },
            offset,
        ))
    }

    fn equals(&self, other: &Self) -> bool {
        self.decomp_rns == other.decomp_rns
            && self.decomp_pw2 == other.decomp_pw2
            && self.cells.len() == other.cells.len()
            && self
                .cells
                .iter()
                .zip(other.cells.iter())
                .all(|((a0, a1), (b0, b1))| polys_equal(a0, b0) && polys_equal(a1, b1))
    }
}

fn poly_binary_size_of(p: &Poly) -> usize {
    1 + p.coefficients().nrows() * (4 + p.coefficients().ncols() * 8)
}

/// GKG / EKG share: `uint64 galoisElement`, matrix of
/// polynomials over QP (single element per cell).
#[derive(Clone)]
pub struct GkgShare {
    pub galois_element: u64,
    pub decomp_rns: u8,
    pub decomp_pw2: u8,
    pub cells: Vec<Poly>,
}

impl Share for GkgShare {
    fn add_assign(&mut self, other: &Self) -> Result<()> {
        if self.galois_element != other.galois_element {
            return Err(Error::InvalidGaloisElement(format!(
                "aggregating GKG shares for different Galois elements: {} vs {}",
                self.galois_element, other.galois_element
            )));
        }
        if self.decomp_rns != other.decomp_rns
            || self.decomp_pw2 != other.decomp_pw2
            || self.cells.len() != other.cells.len()
        {
            return Err(Error::ShapeMismatch(
                "GKG shares have different decomposition shapes".to_string(),
            ));
        }
        for (a, b) in self.cells.iter_mut().zip(other.cells.iter()) {
            *a += b;
        }
        Ok(())
    }

    fn binary_size(&self) -> usize {
        10 + self.cells.iter().map(poly_binary_size_of).sum::<usize>()
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.galois_element.to_le_bytes());
        buf.push(self.decomp_rns);
        buf.push(self.decomp_pw2);
        for p in &self.cells {
            encode_poly(p, buf);
        }
    }

    fn decode(bytes: &[u8], ctx: &Context, representation: Representation) -> Result<(Self, usize)> {
        if bytes.len() < 10 {
            return Err(Error::IoError("truncated GKG share header".to_string()));
        }
        let galois_element = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
        let decomp_rns = bytes[8];
        let decomp_pw2 = bytes[9];
        let mut offset = 10;
        let mut cells = Vec::with_capacity(decomp_rns as usize * decomp_pw2 as usize);
        for _ in 0..(decomp_rns as usize * decomp_pw2 as usize) {
            let (p, consumed) = decode_poly(&bytes[offset..], ctx, representation)?;
            offset += consumed;
            cells.push(p);
        }
        Ok((
            Self {
                galois_element,
                decomp_rns,
                decomp_pw2,
                cells,
            },
            offset,
        ))
    }

    fn equals(&self, other: &Self) -> bool {
        self.galois_element == other.galois_element
            && self.decomp_rns == other.decomp_rns
            && self.decomp_pw2 == other.decomp_pw2
            && self
                .cells
                .iter()
                .zip(other.cells.iter())
                .all(|(a, b)| polys_equal(a, b))
    }
}

/// CKS share: one polynomial over Q at the claimed level.
#[derive(Clone)]
pub struct CksShare {
    pub level: u8,
    pub poly: Poly,
}

impl Share for CksShare {
    fn add_assign(&mut self, other: &Self) -> Result<()> {
        if self.level != other.level {
            return Err(Error::ShapeMismatch(format!(
                "CKS shares at different levels: {} vs {}",
                self.level, other.level
            )));
        }
        self.poly += &other.poly;
        Ok(())
    }

    fn binary_size(&self) -> usize {
        1 + poly_binary_size_of(&self.poly)
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.level);
        encode_poly(&self.poly, buf);
    }

    fn decode(bytes: &[u8], ctx: &Context, representation: Representation) -> Result<(Self, usize)> {
        if bytes.is_empty() {
            return Err(Error::IoError("truncated CKS share header".to_string()));
        }
        let level = bytes[0];
        let (poly, consumed) = decode_poly(&bytes[1..], ctx, representation)?;
        Ok((Self { level, poly }, 1 + consumed))
    }

    fn equals(&self, other: &Self) -> bool {
        self.level == other.level && polys_equal(&self.poly, &other.poly)
    }
}

/// PKS share: two polynomials over Q at the claimed level.
#[derive(Clone)]
pub struct PksShare {
    pub level: u8,
    pub h0: Poly,
    pub h1: Poly,
}

impl Share for PksShare {
    fn add_assign(&mut self, other: &Self) -> Result<()> {
        if self.level != other.level {
            return Err(Error::ShapeMismatch(format!(
                "PKS shares at different levels: {} vs {}",
                self.level, other.level
            )));
        }
        self.h0 += &other.h0;
        self.h1 += &other.h1;
        Ok(())
    }

    fn binary_size(&self) -> usize {
        1 + poly_binary_size_of(&self.h0) + poly_binary_size_of(&self.h1)
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        buf.push(self.level);
        encode_poly(&self.h0, buf);
        encode_poly(&self.h1, buf);
    }

    fn decode(bytes: &[u8], ctx: &Context, representation: Representation) -> Result<(Self, usize)> {
        if bytes.is_empty() {
            return Err(Error::IoError("truncated PKS share header".to_string()));
        }
        let level = bytes[0];
        let (h0, consumed) = decode_poly(&bytes[1..], ctx, representation)?;
        let offset = 1 + consumed;
        let (h1, consumed) = decode_poly(&bytes[offset..], ctx, representation)?;
        Ok((Self { level, h0, h1 }, offset + consumed))
    }

    fn equals(&self, other: &Self) -> bool {
        self.level == other.level
            && polys_equal(&self.h0, &other.h0)
            && polys_equal(&self.h1, &other.h1)
    }
}

/// A Shamir secret share: one polynomial over QP.
#[derive(Clone)]
pub struct ShamirShare {
    pub poly: Poly,
}

impl Share for ShamirShare {
    fn add_assign(&mut self, other: &Self) -> Result<()> {
        self.poly += &other.poly;
        Ok(())
    }

    fn binary_size(&self) -> usize {
        poly_binary_size_of(&self.poly)
    }

    fn encode(&self, buf: &mut Vec<u8>) {
        encode_poly(&self.poly, buf);
    }

    fn decode(bytes: &[u8], ctx: &Context, representation: Representation) -> Result<(Self, usize)> {
        let (poly, consumed) = decode_poly(bytes, ctx, representation)?;
        Ok((Self { poly }, consumed))
    }

    fn equals(&self, other: &Self) -> bool {
        polys_equal(&self.poly, &other.poly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::thread_rng;

    fn ctx() -> std::sync::Arc<Context> {
        std::sync::Arc::new(Context::new(&[0x3fffffff000001, 0x3ffffffef4001], 8).unwrap())
    }

    #[test]
    fn poly_round_trips() {
        let ctx = ctx();
        let mut rng = thread_rng();
        let p = Poly::random(&ctx, Representation::Ntt, &mut rng);
        let mut buf = Vec::new();
        encode_poly(&p, &mut buf);
        assert_eq!(buf.len(), poly_binary_size(&ctx));
        let (decoded, consumed) = decode_poly(&buf, &ctx, Representation::Ntt).unwrap();
        assert_eq!(consumed, buf.len());
        assert_eq!(decoded.coefficients(), p.coefficients());
    }

    #[test]
    fn ckg_share_round_trips_and_aggregates() {
        let ctx = ctx();
        let mut rng = thread_rng();
        let a = CkgShare {
            poly: Poly::random(&ctx, Representation::Ntt, &mut rng),
        };
        let b = CkgShare {
            poly: Poly::random(&ctx, Representation::Ntt, &mut rng),
        };
        let mut buf = Vec::new();
        a.encode(&mut buf);
        assert_eq!(buf.len(), a.binary_size());
        let (decoded, consumed) = CkgShare::decode(&buf, &ctx, Representation::Ntt).unwrap();
        assert_eq!(consumed, buf.len());
        assert!(decoded.equals(&a));

        let mut agg1 = a.clone();
        agg1.add_assign(&b).unwrap();
        let mut agg2 = b.clone();
        agg2.add_assign(&a).unwrap();
        assert!(agg1.equals(&agg2), "aggregation must be commutative");
    }

    #[test]
    fn cks_share_round_trips() {
        let ctx = ctx();
        let mut rng = thread_rng();
        let share = CksShare {
            level: 0,
            poly: Poly::random(&ctx, Representation::Ntt, &mut rng),
        };
        let mut bytes = Vec::new();
        share.encode(&mut bytes);
        let (decoded, consumed) = CksShare::decode(&bytes, &ctx, Representation::Ntt).unwrap();
        assert_eq!(consumed, bytes.len());
        assert!(decoded.equals(&share));
    }

    #[test]
    fn rkg_share_round_trips() {
        let ctx = ctx();
        let mut rng = thread_rng();
        let cells = (0..4)
            .map(|_| {
                (
                    Poly::random(&ctx, Representation::Ntt, &mut rng),
                    Poly::random(&ctx, Representation::Ntt, &mut rng),
                )
            })
            .collect();
        let share = RkgShare {
            decomp_rns: 2,
            decomp_pw2: 2,
            cells,
        };
        let mut bytes = Vec::new();
        share.encode(&mut bytes);
        let (decoded, consumed) = RkgShare::decode(&bytes, &ctx, Representation::Ntt).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(decoded.decomp_rns, 2);
        assert_eq!(decoded.decomp_pw2, 2);
        assert!(decoded.equals(&share));
    }

    #[test]
    fn gkg_share_rejects_mismatched_galois_element() {
        let ctx = ctx();
        let mut rng = thread_rng();
        let mut a = GkgShare {
            galois_element: 3,
            decomp_rns: 1,
            decomp_pw2: 1,
            cells: vec![Poly::random(&ctx, Representation::Ntt, &mut rng)],
        };
        let b = GkgShare {
            galois_element: 5,
            decomp_rns: 1,
            decomp_pw2: 1,
            cells: vec![Poly::random(&ctx, Representation::Ntt, &mut rng)],
        };
        assert!(a.add_assign(&b).is_err());
    }
}
