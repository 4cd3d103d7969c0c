//! Cryptographic types and functions.

pub mod asymmetric_key;
pub mod hash;

pub use asymmetric_key::{sign, verify, Error, SignatureAlgorithm};
pub use hash::Digest;
