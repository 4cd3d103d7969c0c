use std::{
    cmp::Ordering,
    collections::HashSet,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};

use datasize::DataSize;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    types::{BlockHash, BlockSummary, MessageType, Timestamp, ValidatorId},
    utils::DisplayIter,
};

/// An error while converting a block summary into a [`Message`](struct.Message.html).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A non-genesis message must cite at least one parent.
    #[error("message {0} has no parents but is not genesis-like")]
    NoParents(BlockHash),

    /// A ballot votes for exactly one block.
    #[error("ballot {hash} has {parent_count} parents instead of one")]
    BallotParents {
        /// The offending message.
        hash: BlockHash,
        /// How many parents it cited.
        parent_count: usize,
    },
}

/// A vertex of the block DAG.
///
/// Constructed only from a validated block summary and immutable afterwards; the DAG storage
/// hands out shared references to it.
#[derive(Clone, DataSize, Eq, PartialEq, Serialize, Deserialize, Debug)]
pub struct Message {
    /// The message's identity.
    hash: BlockHash,
    /// The creator; empty for genesis-like messages.
    validator_id: ValidatorId,
    /// Parent hashes; the first entry is the main parent.
    parents: Vec<BlockHash>,
    /// Hashes of all messages the creator had seen when creating this one.
    justifications: HashSet<BlockHash>,
    /// 1 plus the maximum rank over parents and justifications; `0` for genesis-like messages.
    rank: u64,
    /// The same computation restricted to justifications.
    j_rank: u64,
    /// The number of earlier messages by the same creator.
    sequence_number: u64,
    /// The creator's previous message, absent iff `sequence_number` is `0`.
    validator_prev_block_hash: Option<BlockHash>,
    /// When the message was created.
    timestamp: Timestamp,
    /// The key block identifying the era this message belongs to.
    key_block_hash: BlockHash,
    /// Whether this message is a block or a ballot.
    message_type: MessageType,
}

impl Message {
    /// Converts a validated block summary into the DAG's vertex representation.
    ///
    /// Fails if the summary cites no parents without being genesis-like, or if it is a ballot
    /// with more than one parent.
    pub fn from_block_summary(summary: &BlockSummary) -> Result<Message, Error> {
        let header = summary.header();
        let hash = *summary.block_hash();
        if header.parent_hashes().is_empty() && !summary.is_genesis_like() {
            return Err(Error::NoParents(hash));
        }
        if header.message_type() == MessageType::Ballot && header.parent_hashes().len() != 1 {
            return Err(Error::BallotParents {
                hash,
                parent_count: header.parent_hashes().len(),
            });
        }
        let justifications = header
            .justifications()
            .iter()
            .map(|justification| justification.latest_block_hash)
            .collect();
        Ok(Message {
            hash,
            validator_id: header.validator_id().clone(),
            parents: header.parent_hashes().clone(),
            justifications,
            rank: header.rank(),
            j_rank: header.j_rank(),
            sequence_number: header.validator_seq_num(),
            validator_prev_block_hash: header.validator_prev_block_hash().copied(),
            timestamp: header.timestamp(),
            key_block_hash: *header.key_block_hash(),
            message_type: header.message_type(),
        })
    }

    /// The message's identity.
    pub fn hash(&self) -> &BlockHash {
        &self.hash
    }

    /// The creator of this message.
    pub fn validator_id(&self) -> &ValidatorId {
        &self.validator_id
    }

    /// Parent hashes; the first entry is the main parent.
    pub fn parents(&self) -> &Vec<BlockHash> {
        &self.parents
    }

    /// The main parent, if any.
    pub fn main_parent(&self) -> Option<&BlockHash> {
        self.parents.first()
    }

    /// Hashes of all messages the creator had seen when creating this one.
    pub fn justifications(&self) -> &HashSet<BlockHash> {
        &self.justifications
    }

    /// The rank of this message.
    pub fn rank(&self) -> u64 {
        self.rank
    }

    /// The justification-only rank of this message.
    pub fn j_rank(&self) -> u64 {
        self.j_rank
    }

    /// The number of earlier messages by the same creator.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    /// The creator's previous message, if any.
    pub fn validator_prev_block_hash(&self) -> Option<&BlockHash> {
        self.validator_prev_block_hash.as_ref()
    }

    /// When the message was created.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The key block identifying the era this message belongs to.
    pub fn key_block_hash(&self) -> &BlockHash {
        &self.key_block_hash
    }

    /// Whether this message is a block or a ballot.
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// Returns `true` for genesis-like messages.
    pub fn is_genesis_like(&self) -> bool {
        self.validator_id.is_empty() && self.parents.is_empty()
    }
}

// Identity, ordering and hashing all follow the content-addressed message hash.
impl Hash for Message {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

impl Ord for Message {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hash.cmp(&other.hash)
    }
}

impl PartialOrd for Message {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Message {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(
            formatter,
            "message {} by {}, parents [{}], rank {}, seq {}, era {}",
            self.hash,
            self.validator_id,
            DisplayIter::new(self.parents.iter()),
            self.rank,
            self.sequence_number,
            self.key_block_hash,
        )
    }
}
