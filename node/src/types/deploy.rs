use std::fmt::{self, Display, Formatter};

use datasize::DataSize;
use serde::{Deserialize, Serialize};

use crate::{
    crypto::hash::{self, Digest},
    types::{TimeDiff, Timestamp},
};

/// A cryptographic hash identifying a [`Deploy`](struct.Deploy.html).
#[derive(
    Copy,
    Clone,
    DataSize,
    Default,
    Ord,
    PartialOrd,
    Eq,
    PartialEq,
    Hash,
    Serialize,
    Deserialize,
    Debug,
)]
pub struct DeployHash(Digest);

impl DeployHash {
    /// Constructs a new `DeployHash`.
    pub fn new(hash: Digest) -> Self {
        DeployHash(hash)
    }

    /// Returns the wrapped inner hash.
    pub fn inner(&self) -> &Digest {
        &self.0
    }
}

impl Display for DeployHash {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "deploy-hash({})", self.0)
    }
}

/// The header portion of a [`Deploy`](struct.Deploy.html); the deploy hash is computed over its
/// canonical encoding.
#[derive(Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct DeployHeader {
    /// When the deploy was created.
    pub(crate) timestamp: Timestamp,
    /// How long after `timestamp` the deploy may still be included in a block.
    pub(crate) ttl: TimeDiff,
    /// Hashes of deploys that must already be present in the past of any block including this
    /// one. Each entry must be exactly 32 bytes.
    pub(crate) dependencies: Vec<Vec<u8>>,
    /// The chain this deploy is valid on; empty means any chain.
    pub(crate) chain_name: String,
    /// The hash of the deploy's body.
    pub(crate) body_hash: Digest,
}

impl DeployHeader {
    /// When the deploy was created.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// How long after the timestamp the deploy may still be included in a block.
    pub fn ttl(&self) -> TimeDiff {
        self.ttl
    }

    /// The deploy's dependencies.
    pub fn dependencies(&self) -> &Vec<Vec<u8>> {
        &self.dependencies
    }

    /// The chain this deploy is valid on.
    pub fn chain_name(&self) -> &str {
        &self.chain_name
    }

    /// The hash of the deploy's body.
    pub fn body_hash(&self) -> &Digest {
        &self.body_hash
    }

    /// Hash of the canonical encoding of the deploy header.
    pub fn hash(&self) -> DeployHash {
        let serialized = rmp_serde::to_vec(self)
            .unwrap_or_else(|error| panic!("should serialize deploy header: {}", error));
        DeployHash::new(hash::hash(&serialized))
    }
}

/// The opaque payload of a deploy; the execution engine interprets it, this layer only hashes it.
#[derive(Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct DeployBody(#[serde(with = "serde_bytes")] Vec<u8>);

impl DeployBody {
    /// Constructs a new `DeployBody` from raw payload bytes.
    pub fn new(payload: Vec<u8>) -> Self {
        DeployBody(payload)
    }

    /// Hash of the deploy body.
    pub fn hash(&self) -> Digest {
        hash::hash(&self.0)
    }
}

/// An approval of a deploy: a signature over the deploy hash.
#[derive(Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct Approval {
    /// The public key of the approver.
    #[serde(with = "serde_bytes")]
    pub(crate) signer: Vec<u8>,
    /// The approver's signature over the deploy hash.
    #[serde(with = "serde_bytes")]
    pub(crate) signature: Vec<u8>,
    /// The wire name of the signature algorithm.
    pub(crate) signature_algorithm: String,
}

impl Approval {
    /// Constructs a new `Approval`.
    pub fn new(signer: Vec<u8>, signature: Vec<u8>, signature_algorithm: String) -> Self {
        Approval {
            signer,
            signature,
            signature_algorithm,
        }
    }

    /// The public key of the approver.
    pub fn signer(&self) -> &[u8] {
        &self.signer
    }

    /// The approver's signature over the deploy hash.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The wire name of the signature algorithm.
    pub fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }
}

/// A deploy: a unit of work sent by a client, included in blocks and executed by the execution
/// engine.
#[derive(Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct Deploy {
    /// The deploy's identity; the hash of the canonical encoding of the header.
    pub(crate) deploy_hash: DeployHash,
    /// The deploy header.
    pub(crate) header: DeployHeader,
    /// The deploy body.
    pub(crate) body: DeployBody,
    /// At least one approval is required for a deploy to be valid.
    pub(crate) approvals: Vec<Approval>,
}

impl Deploy {
    /// The deploy's identity.
    pub fn deploy_hash(&self) -> &DeployHash {
        &self.deploy_hash
    }

    /// The deploy header.
    pub fn header(&self) -> &DeployHeader {
        &self.header
    }

    /// The deploy body.
    pub fn body(&self) -> &DeployBody {
        &self.body
    }

    /// The deploy's approvals.
    pub fn approvals(&self) -> &Vec<Approval> {
        &self.approvals
    }
}

impl Display for Deploy {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "deploy {}, timestamp {}, ttl {}",
            self.deploy_hash, self.header.timestamp, self.header.ttl
        )
    }
}
