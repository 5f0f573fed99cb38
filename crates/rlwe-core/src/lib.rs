//! Core RLWE ring arithmetic, keys, and multiparty key-generation /
//! key-switching protocols.
//!
//! The module layout mirrors the component table in the crate's design
//! document: [`params`] and [`ring`] are the shared substrate (components A
//! and the parameter surface), [`keys`] is the key/ciphertext data model
//! (component contract of §3.2), [`crs`] and [`shares`] are the common
//! reference string and share-algebra primitives (components B and C), and
//! [`protocols`] holds one submodule per multiparty protocol (components D
//! through H).

pub mod aggregate;
pub mod crs;
pub mod errors;
pub mod keys;
pub mod params;
pub mod protocols;
pub mod ring;
pub mod shares;

pub use aggregate::Aggregate;
pub use errors::{Error, Result};
pub use keys::{
    Ciphertext, EvaluationKey, GadgetCiphertext, GaloisKey, PublicKey, RelinearizationKey,
    SecretKey,
};
pub use params::{NoiseDistribution, RingType, RlweParameters};
