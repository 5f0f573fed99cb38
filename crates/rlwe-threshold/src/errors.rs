use thiserror::Error;

/// The Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

/// Enum encapsulating all the possible errors from this library.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Indicates that an error from the underlying rlwe-core library was
    /// encountered.
    #[error("{0}")]
    CoreError(#[from] rlwe_core::Error),
}
