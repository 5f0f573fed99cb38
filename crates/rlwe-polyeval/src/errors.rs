use thiserror::Error;

/// The `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while simulating or evaluating a Paterson-Stockmeyer
/// polynomial.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// An error from the underlying `rlwe-core` library was encountered.
    #[error("{0}")]
    CoreError(#[from] rlwe_core::Error),
}
