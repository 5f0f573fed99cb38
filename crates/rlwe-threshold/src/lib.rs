//! Shamir threshold secret-sharing, layered over [`rlwe_core`]'s multiparty
//! protocols: a `t`-out-of-`N` replacement for the `N`-out-of-`N` additive
//! secret sharing the base protocols assume.

pub mod errors;
pub mod thresholdizer;

pub use errors::{Error, Result};
pub use thresholdizer::{Combiner, ShamirParams, Thresholdizer};
