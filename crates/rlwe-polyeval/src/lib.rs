//! Paterson-Stockmeyer polynomial evaluation over the ciphertext/key
//! substrate defined in `rlwe-core`: a scheme-agnostic simulator that
//! predicts level/scale ahead of time, a memoizing power basis, and the
//! evaluator that ties them together.

pub mod capability;
pub mod errors;
pub mod evaluator;
pub mod polynomial;
pub mod power_basis;
pub mod simulator;

pub use capability::{BgvInvariant, BgvStandard, CkksMultiRescale, CkksStandard, EvalCapability, SimOperand};
pub use errors::{Error, Result};
pub use evaluator::{EvalState, PsEvaluator};
pub use polynomial::{Basis, Polynomial, PolynomialVector};
pub use power_basis::{PowerBasis, PowerBasisEntry};
pub use simulator::Simulator;
