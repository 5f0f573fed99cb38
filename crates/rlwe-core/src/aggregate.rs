//! Generic share-aggregation trait shared by every multiparty protocol.

use crate::errors::Result;

/// Aggregate shares produced by a single round of an MPC protocol.
///
/// Aggregation must be commutative and associative: for any permutation of
/// the same shares, `aggregate` produces a bitwise-identical output. This
/// lets callers fold in shares incrementally as they arrive over the network,
/// in any order, rather than buffering the whole round.
pub trait Aggregate {
    /// The result of aggregating a full round of shares.
    type Output;

    /// Aggregate a round of shares into the finalized output.
    ///
    /// Returns [`crate::errors::Error::TooFewValues`] if `shares` is empty,
    /// and a [`crate::errors::Error::ShapeMismatch`] if any two shares
    /// disagree in shape.
    fn aggregate<I>(shares: I) -> Result<Self::Output>
    where
        I: IntoIterator<Item = Self>;
}
