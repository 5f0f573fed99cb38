use thiserror::Error;

/// The `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum encapsulating all the errors this crate can return.
///
/// This is the taxonomy a multiparty RLWE core needs: construction-time
/// rejection, shape mismatches during share aggregation, and the evaluator's
/// own failure modes. Nothing here is retried internally; every variant is
/// surfaced to the caller at the point it's detected.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    /// Rejected at construction: bad moduli, an out-of-range level, or an
    /// internally inconsistent parameter set.
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    /// Two shares being combined (or a share against a finalized key)
    /// disagree in level, P-level, decomposition shape, or similar.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// Galois-key aggregation attempted across shares for different Galois
    /// elements, or the Galois element is incompatible with the ring type.
    #[error("invalid Galois element: {0}")]
    InvalidGaloisElement(String),

    /// A ciphertext arrives at the PS evaluator with fewer levels remaining
    /// than the polynomial's required depth.
    #[error("insufficient levels: need {needed}, have {available}")]
    InsufficientLevels {
        /// Levels required by the polynomial being evaluated.
        needed: usize,
        /// Levels actually available on the input operand.
        available: usize,
    },

    /// A user-supplied power basis is missing `X^1`.
    #[error("invalid power basis: {0}")]
    InvalidPowerBasis(String),

    /// Two Shamir parties share a public point, or the difference between
    /// two points fails to invert modulo some RNS prime.
    #[error("invalid Shamir point: {0}")]
    InvalidShamirPoint(String),

    /// The PS evaluator's simulated scale diverged from the runtime scale
    /// beyond tolerance. Indicates an implementation bug rather than a
    /// recoverable runtime condition; callers may choose to treat this as a
    /// panic, per spec.
    #[error("scale mismatch: expected {expected}, got {actual} (tolerance {tolerance_bits} bits)")]
    ScaleMismatch {
        /// The scale the simulator predicted, as a string (arbitrary precision).
        expected: String,
        /// The scale the evaluator actually produced.
        actual: String,
        /// The relative-error tolerance, in bits, that was exceeded.
        tolerance_bits: u32,
    },

    /// An error occurred while encoding or decoding a share.
    #[error("I/O error: {0}")]
    IoError(String),

    /// Too few values were supplied where at least one was required (e.g.
    /// aggregating zero shares).
    #[error("expected at least {1} value(s), found {0}")]
    TooFewValues(usize, usize),

    /// A catch-all for conditions not covered by a dedicated variant.
    #[error("{0}")]
    DefaultError(String),
}
