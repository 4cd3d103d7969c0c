//! Asymmetric-key functionality for verifying block and deploy signatures.
//!
//! Keys and signatures cross the wire as raw byte strings tagged with an algorithm name; this
//! module parses them for the closed set of supported algorithms. Key generation and storage are
//! not this layer's concern.

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use ed25519_dalek as ed25519;
use k256::ecdsa;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use signature::{Signature as _, Signer, Verifier};
use thiserror::Error;

/// Cryptographic errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The signature algorithm is not one of the supported ones.
    #[error("unsupported signature algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The key could not be parsed for the given algorithm.
    #[error("malformed {algorithm} key of {byte_count} bytes")]
    MalformedKey {
        /// The algorithm the key was tagged with.
        algorithm: SignatureAlgorithm,
        /// The length of the raw key.
        byte_count: usize,
    },

    /// The signature could not be parsed for the given algorithm.
    #[error("malformed {algorithm} signature of {byte_count} bytes")]
    MalformedSignature {
        /// The algorithm the signature was tagged with.
        algorithm: SignatureAlgorithm,
        /// The length of the raw signature.
        byte_count: usize,
    },

    /// The signature did not verify against the given key and data.
    #[error("signature verification failed")]
    SignatureInvalid,
}

/// The closed set of signature algorithms understood by this node.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SignatureAlgorithm {
    /// Ed25519 over Curve25519.
    Ed25519,
    /// ECDSA over secp256k1 with SHA-256.
    Secp256k1,
}

impl SignatureAlgorithm {
    /// The wire name of the algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            SignatureAlgorithm::Ed25519 => "ed25519",
            SignatureAlgorithm::Secp256k1 => "secp256k1",
        }
    }
}

impl Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for SignatureAlgorithm {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "ed25519" => Ok(SignatureAlgorithm::Ed25519),
            "secp256k1" => Ok(SignatureAlgorithm::Secp256k1),
            other => Err(Error::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Verifies `signature` over `data` with the raw `public_key`, using the named algorithm.
///
/// Returns `Ok(())` only if the algorithm is supported, key and signature parse, and the
/// signature verifies.
pub fn verify(
    data: &[u8],
    signature: &[u8],
    public_key: &[u8],
    algorithm_name: &str,
) -> Result<(), Error> {
    let algorithm = SignatureAlgorithm::from_str(algorithm_name)?;
    match algorithm {
        SignatureAlgorithm::Ed25519 => {
            let key =
                ed25519::PublicKey::from_bytes(public_key).map_err(|_| Error::MalformedKey {
                    algorithm,
                    byte_count: public_key.len(),
                })?;
            let signature =
                ed25519::Signature::from_bytes(signature).map_err(|_| Error::MalformedSignature {
                    algorithm,
                    byte_count: signature.len(),
                })?;
            key.verify(data, &signature)
                .map_err(|_| Error::SignatureInvalid)
        }
        SignatureAlgorithm::Secp256k1 => {
            let key = ecdsa::VerifyingKey::from_sec1_bytes(public_key).map_err(|_| {
                Error::MalformedKey {
                    algorithm,
                    byte_count: public_key.len(),
                }
            })?;
            let signature =
                ecdsa::Signature::from_bytes(signature).map_err(|_| Error::MalformedSignature {
                    algorithm,
                    byte_count: signature.len(),
                })?;
            key.verify(data, &signature)
                .map_err(|_| Error::SignatureInvalid)
        }
    }
}

/// Signs `data` with the raw `secret_key` under the given algorithm.
///
/// Returns the raw signature bytes together with the raw public key belonging to the secret key.
pub fn sign(
    data: &[u8],
    secret_key: &[u8],
    algorithm: SignatureAlgorithm,
) -> Result<(Vec<u8>, Vec<u8>), Error> {
    match algorithm {
        SignatureAlgorithm::Ed25519 => {
            let secret =
                ed25519::SecretKey::from_bytes(secret_key).map_err(|_| Error::MalformedKey {
                    algorithm,
                    byte_count: secret_key.len(),
                })?;
            let public = ed25519::PublicKey::from(&secret);
            let expanded = ed25519::ExpandedSecretKey::from(&secret);
            let signature = expanded.sign(data, &public);
            Ok((signature.to_bytes().to_vec(), public.to_bytes().to_vec()))
        }
        SignatureAlgorithm::Secp256k1 => {
            let secret = ecdsa::SigningKey::from_bytes(secret_key).map_err(|_| {
                Error::MalformedKey {
                    algorithm,
                    byte_count: secret_key.len(),
                }
            })?;
            let signature: ecdsa::Signature = secret.sign(data);
            let public = secret
                .verifying_key()
                .to_encoded_point(true)
                .as_bytes()
                .to_vec();
            Ok((signature.as_ref().to_vec(), public))
        }
    }
}
