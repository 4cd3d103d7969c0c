use thiserror::Error;

use crate::types::{BlockHash, DeployHash};

/// The reason a block failed validation.
///
/// Every check in the pipeline signals its own kind; the first failure aborts the remaining
/// checks. Apart from `MissingBlocks` (retry once the dependencies arrive) and
/// `InvalidUnslashableBlock` (drop without penalty), all kinds are slashable: the block is
/// recorded as invalid and its creator penalized per protocol.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BlockError {
    /// Dependencies of the block are not in storage yet; stash the block and request them.
    #[error("block dependencies missing: [{}]", crate::utils::DisplayIter::new(.0.iter()))]
    MissingBlocks(Vec<BlockHash>),

    /// The block is invalid in a way its creator cannot be penalized for; drop it silently.
    #[error("unslashable block: {0}")]
    InvalidUnslashableBlock(String),

    /// The block hash does not match the header, or the body hash does not match the body.
    #[error("block hash does not match the block contents")]
    InvalidBlockHash,

    /// The block's rank does not equal 1 plus the maximum rank of its dependencies.
    #[error("block rank does not match its parents and justifications")]
    InvalidBlockNumber,

    /// The block's sequence number is not the successor of its predecessor's.
    #[error("block sequence number does not follow the creator's previous message")]
    InvalidSequenceNumber,

    /// The creator's previous block hash does not resolve to the creator's previous message.
    #[error("previous block hash does not match the creator's swimlane")]
    InvalidPrevBlockHash,

    /// The block cites more than one tip of its equivocating creator's swimlane.
    #[error("the j-past-cone of the block merges the creator's swimlane")]
    SwimlaneMerged,

    /// The block's parents are not the ones fork choice selects from its justifications.
    #[error("block parents do not match the fork choice")]
    InvalidParents,

    /// A deploy's hash does not match its header, or its body hash its body.
    #[error("deploy {0} hash does not match its contents")]
    InvalidDeployHash(DeployHash),

    /// A deploy has no approvals or one of them does not verify.
    #[error("deploy {0} signature invalid")]
    InvalidDeploySignature(DeployHash),

    /// A deploy header violates the TTL, dependency or chain rules.
    #[error("deploy {0} header invalid: {1}")]
    InvalidDeployHeader(DeployHash, String),

    /// The header's deploy count does not match the body.
    #[error("deploy count does not match the block body")]
    InvalidDeployCount,

    /// A deploy appears twice in the block or was already included in the block's p-past-cone.
    #[error("deploy {0} is repeated")]
    InvalidRepeatDeploy(DeployHash),

    /// A deploy's time to live had run out at the block's timestamp.
    #[error("deploy {0} expired")]
    DeployExpired(DeployHash),

    /// A deploy is timestamped after the block including it.
    #[error("deploy {0} is from the future")]
    DeployFromFuture(DeployHash),

    /// A deploy dependency is not present in the block's p-past-cone.
    #[error("deploy {0} dependency not met")]
    DeployDependencyNotMet(DeployHash),

    /// The block names a different chain than this node's.
    #[error("wrong chain name: {0}")]
    InvalidChainName(String),

    /// The bonds in the block header do not match the execution engine's result.
    #[error("block bonds do not match the execution result")]
    InvalidBondsCache,

    /// The pre-state hash in the block header does not match the computed pre-state.
    #[error("block pre-state hash does not match")]
    InvalidPreStateHash,

    /// The post-state hash in the block header does not match the execution result.
    #[error("block post-state hash does not match")]
    InvalidPostStateHash,

    /// The execution engine failed to commit the block's effects.
    #[error("transaction commit failed: {0}")]
    InvalidTransaction(String),

    /// A ballot cites a number of parents other than one.
    #[error("ballot does not have exactly one target")]
    InvalidTargetHash,

    /// The block fails to slash an offence visible in its justifications.
    ///
    /// Raised by the consensus layer when auditing finalized evidence, not by this pipeline.
    #[error("block neglects a visible offence")]
    NeglectedInvalidBlock,
}

impl BlockError {
    /// Returns `true` if the creator is to be penalized for this block.
    pub fn is_slashable(&self) -> bool {
        !matches!(
            self,
            BlockError::MissingBlocks(_) | BlockError::InvalidUnslashableBlock(_)
        )
    }

    /// Returns `true` if validation can be retried once missing dependencies have arrived.
    pub fn is_retriable(&self) -> bool {
        matches!(self, BlockError::MissingBlocks(_))
    }
}
