use std::fmt::{self, Debug, Display, Formatter};

use datasize::DataSize;
use hex_fmt::HexFmt;
use serde::{Deserialize, Serialize};

use crate::{
    crypto::hash::{self, Digest},
    types::{Deploy, Timestamp},
    utils::DisplayIter,
};

/// A cryptographic hash identifying a [`Block`](struct.Block.html).
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
pub struct BlockHash(Digest);

impl BlockHash {
    /// Constructs a new `BlockHash`.
    pub fn new(hash: Digest) -> Self {
        BlockHash(hash)
    }

    /// Returns the wrapped inner hash.
    pub fn inner(&self) -> &Digest {
        &self.0
    }

    /// Returns `true` if this is the all-zero hash, used where no block is referenced.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl Display for BlockHash {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "block-hash({})", self.0)
    }
}

impl From<Digest> for BlockHash {
    fn from(digest: Digest) -> Self {
        Self(digest)
    }
}

impl AsRef<[u8]> for BlockHash {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

/// The public key identifying the creator of a message; empty for genesis-like messages.
#[derive(
    Clone, DataSize, Default, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize,
)]
pub struct ValidatorId(#[serde(with = "serde_bytes")] Vec<u8>);

impl ValidatorId {
    /// Constructs a new `ValidatorId` from raw public key bytes.
    pub fn new(bytes: Vec<u8>) -> Self {
        ValidatorId(bytes)
    }

    /// Returns the raw public key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` for the empty (genesis-like) identity.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for ValidatorId {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "validator({:10})", HexFmt(&self.0))
    }
}

impl Debug for ValidatorId {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "ValidatorId({})", HexFmt(&self.0))
    }
}

/// A message's explicit reference to the latest message of another validator it had seen.
#[derive(Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct Justification {
    /// The validator whose message is cited.
    pub validator_id: ValidatorId,
    /// The cited message.
    pub latest_block_hash: BlockHash,
}

impl Display for Justification {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "justification({}, {})",
            self.validator_id, self.latest_block_hash
        )
    }
}

/// A validator's stake, as recorded in a block's post-state.
#[derive(Clone, DataSize, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct Bond {
    /// The bonded validator.
    pub validator_id: ValidatorId,
    /// The bonded amount.
    pub stake: u64,
}

/// The active protocol version at a given rank.
#[derive(Copy, Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct ProtocolVersion {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch version.
    pub patch: u32,
}

impl ProtocolVersion {
    /// Constructs a new `ProtocolVersion`.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        ProtocolVersion {
            major,
            minor,
            patch,
        }
    }
}

impl Display for ProtocolVersion {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Whether a message carries deploys or is merely a vote.
#[derive(Copy, Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub enum MessageType {
    /// A full block, carrying deploys and modifying state.
    Block,
    /// A vote with exactly one parent and no deploys.
    Ballot,
}

impl Display for MessageType {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        match self {
            MessageType::Block => write!(formatter, "block"),
            MessageType::Ballot => write!(formatter, "ballot"),
        }
    }
}

/// The header portion of a [`Block`](struct.Block.html).
///
/// The canonical MessagePack encoding of the header is what the block hash is computed over;
/// peers must agree on it byte for byte.
#[derive(Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct BlockHeader {
    /// Hashes of the parent blocks; the first entry is the main parent. Empty only for
    /// genesis-like messages.
    pub(crate) parent_hashes: Vec<BlockHash>,
    /// The latest messages of other validators seen by the creator.
    pub(crate) justifications: Vec<Justification>,
    /// The hash of the block's body.
    pub(crate) body_hash: Digest,
    /// The root hash of the global state before executing this block.
    pub(crate) pre_state_hash: Digest,
    /// The root hash of the global state after executing this block.
    pub(crate) post_state_hash: Digest,
    /// The validators bonded at this block's post-state.
    pub(crate) bonds: Vec<Bond>,
    /// The creator of this block; empty for genesis-like messages.
    pub(crate) validator_id: ValidatorId,
    /// The number of earlier messages by the same creator.
    pub(crate) validator_seq_num: u64,
    /// The creator's previous message, absent iff `validator_seq_num` is `0`.
    pub(crate) validator_prev_block_hash: Option<BlockHash>,
    /// 1 plus the maximum rank over parents and justifications; `0` for genesis-like messages.
    pub(crate) rank: u64,
    /// The same computation restricted to justifications.
    pub(crate) j_rank: u64,
    /// When the block was proposed.
    pub(crate) timestamp: Timestamp,
    /// The name of the chain this block belongs to.
    pub(crate) chain_name: String,
    /// The protocol version the block was created under.
    pub(crate) protocol_version: ProtocolVersion,
    /// The number of deploys in the block's body.
    pub(crate) deploy_count: u32,
    /// The key block identifying the era this message belongs to; zero for genesis-like
    /// messages.
    pub(crate) key_block_hash: BlockHash,
    /// Whether this message is a block or a ballot.
    pub(crate) message_type: MessageType,
}

impl BlockHeader {
    /// The parent block hashes; the first entry is the main parent.
    pub fn parent_hashes(&self) -> &Vec<BlockHash> {
        &self.parent_hashes
    }

    /// The justifications cited by this block.
    pub fn justifications(&self) -> &Vec<Justification> {
        &self.justifications
    }

    /// The hash of the block's body.
    pub fn body_hash(&self) -> &Digest {
        &self.body_hash
    }

    /// The root hash of the global state before executing this block.
    pub fn pre_state_hash(&self) -> &Digest {
        &self.pre_state_hash
    }

    /// The root hash of the global state after executing this block.
    pub fn post_state_hash(&self) -> &Digest {
        &self.post_state_hash
    }

    /// The validators bonded at this block's post-state.
    pub fn bonds(&self) -> &Vec<Bond> {
        &self.bonds
    }

    /// The creator of this block.
    pub fn validator_id(&self) -> &ValidatorId {
        &self.validator_id
    }

    /// The number of earlier messages by the same creator.
    pub fn validator_seq_num(&self) -> u64 {
        self.validator_seq_num
    }

    /// The creator's previous message hash, if any.
    pub fn validator_prev_block_hash(&self) -> Option<&BlockHash> {
        self.validator_prev_block_hash.as_ref()
    }

    /// The rank of this block.
    pub fn rank(&self) -> u64 {
        self.rank
    }

    /// The justification-only rank of this block.
    pub fn j_rank(&self) -> u64 {
        self.j_rank
    }

    /// When the block was proposed.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The name of the chain this block belongs to.
    pub fn chain_name(&self) -> &str {
        &self.chain_name
    }

    /// The protocol version the block was created under.
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    /// The number of deploys in the block's body.
    pub fn deploy_count(&self) -> u32 {
        self.deploy_count
    }

    /// The era key block this message belongs to.
    pub fn key_block_hash(&self) -> &BlockHash {
        &self.key_block_hash
    }

    /// Whether this message is a block or a ballot.
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    // Serialize the block header.
    fn serialize(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    /// Hash of the canonical encoding of the block header.
    pub fn hash(&self) -> BlockHash {
        let serialized_header = Self::serialize(self)
            .unwrap_or_else(|error| panic!("should serialize block header: {}", error));
        BlockHash::new(hash::hash(&serialized_header))
    }
}

impl Display for BlockHeader {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "block header by {}, parents [{}], rank {}, seq {}, era {}, timestamp {}",
            self.validator_id,
            DisplayIter::new(self.parent_hashes.iter()),
            self.rank,
            self.validator_seq_num,
            self.key_block_hash,
            self.timestamp,
        )
    }
}

/// The body portion of a [`Block`](struct.Block.html).
#[derive(Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct BlockBody {
    /// The deploys included in this block, in execution order.
    pub(crate) deploys: Vec<Deploy>,
}

impl BlockBody {
    /// Constructs a new `BlockBody`.
    pub fn new(deploys: Vec<Deploy>) -> Self {
        BlockBody { deploys }
    }

    /// The deploys included in this block.
    pub fn deploys(&self) -> &Vec<Deploy> {
        &self.deploys
    }

    /// Hash of the canonical encoding of the block body.
    pub fn hash(&self) -> Digest {
        let serialized_body = rmp_serde::to_vec(self)
            .unwrap_or_else(|error| panic!("should serialize block body: {}", error));
        hash::hash(&serialized_body)
    }
}

/// The header-only form of a block, exchanged during initial synchronization and validated
/// before the full block is downloaded.
#[derive(Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct BlockSummary {
    /// The block's identity; the hash of the canonical encoding of the header.
    pub(crate) block_hash: BlockHash,
    /// The block header.
    pub(crate) header: BlockHeader,
    /// The creator's signature over the block hash; empty for genesis-like messages.
    #[serde(with = "serde_bytes")]
    pub(crate) signature: Vec<u8>,
    /// The wire name of the signature algorithm; empty for genesis-like messages.
    pub(crate) signature_algorithm: String,
}

impl BlockSummary {
    /// The block's identity.
    pub fn block_hash(&self) -> &BlockHash {
        &self.block_hash
    }

    /// The block header.
    pub fn header(&self) -> &BlockHeader {
        &self.header
    }

    /// The creator's signature over the block hash.
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// The wire name of the signature algorithm.
    pub fn signature_algorithm(&self) -> &str {
        &self.signature_algorithm
    }

    /// Returns `true` if this summary has the shape of a genesis-like message: no creator and no
    /// parents.
    pub fn is_genesis_like(&self) -> bool {
        self.header.validator_id.is_empty() && self.header.parent_hashes.is_empty()
    }

    /// The rank of this block.
    pub fn rank(&self) -> u64 {
        self.header.rank
    }
}

impl Display for BlockSummary {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "block summary {}, {}",
            self.block_hash, self.header
        )
    }
}

/// A full block: summary plus body.
///
/// The body is optional because a block received from the network may not have been downloaded in
/// full yet; full validation requires it.
#[derive(Clone, DataSize, Eq, PartialEq, Hash, Serialize, Deserialize, Debug)]
pub struct Block {
    pub(crate) summary: BlockSummary,
    pub(crate) body: Option<BlockBody>,
}

impl Block {
    /// Constructs a new `Block` from a summary and a body.
    pub fn new(summary: BlockSummary, body: Option<BlockBody>) -> Self {
        Block { summary, body }
    }

    /// The block's identity.
    pub fn block_hash(&self) -> &BlockHash {
        &self.summary.block_hash
    }

    /// The header-only form of this block.
    pub fn summary(&self) -> &BlockSummary {
        &self.summary
    }

    /// The block header.
    pub fn header(&self) -> &BlockHeader {
        &self.summary.header
    }

    /// The block body, if it has been downloaded.
    pub fn body(&self) -> Option<&BlockBody> {
        self.body.as_ref()
    }
}

impl Display for Block {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "block {}, {}", self.summary.block_hash, self.summary.header)?;
        if let Some(body) = &self.body {
            write!(formatter, ", deploys [{}]", DisplayIter::new(body.deploys.iter()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, TestRng};

    #[test]
    fn header_hash_is_stable() {
        let mut rng = TestRng::new();
        let summary = testing::genesis_summary(&mut rng);
        assert_eq!(summary.header().hash(), *summary.block_hash());
        // A different header yields a different hash.
        let mut other = summary.header().clone();
        other.rank = 1;
        assert_ne!(other.hash(), *summary.block_hash());
    }
}
