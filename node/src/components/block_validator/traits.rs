//! The external services block validation consumes.
//!
//! Raw block persistence, state execution and fork choice live outside this layer; the
//! validator reaches them through these seams. Backend failures that make a service unusable
//! (corrupt databases and the like) are fatal to the process and surface from the
//! implementations themselves.

use std::{collections::HashSet, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::{
    components::block_dag::DagRepresentation,
    crypto::Digest,
    types::{Block, BlockHash, Bond, DeployHash, Justification, ProtocolVersion},
};

/// The persistent store of raw blocks.
#[async_trait]
pub trait BlockStorage: Send + Sync {
    /// Returns whether the store holds the given block.
    async fn contains(&self, block_hash: &BlockHash) -> bool;

    /// Returns the given block, if stored.
    async fn get(&self, block_hash: &BlockHash) -> Option<Block>;

    /// Returns the hashes of all stored blocks that include the given deploy.
    async fn find_block_hashes_with_deploy_hash(
        &self,
        deploy_hash: &DeployHash,
    ) -> HashSet<BlockHash>;
}

/// An opaque batch of execution effects, produced by executing a block's deploys and consumed by
/// [`ExecutionEngine::commit`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecutionEffects(pub Vec<u8>);

/// The outcome of committing a block's effects on top of a pre-state.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommitResult {
    /// The root hash of the resulting global state.
    pub post_state_hash: Digest,
    /// The validators bonded in the resulting global state.
    pub bonded_validators: Vec<Bond>,
}

/// An error reported by the execution engine.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{0}")]
pub struct EngineError(pub String);

/// The execution engine, reached over RPC in production.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Commits the given effects on top of `pre_state_hash`, returning the resulting post-state
    /// hash and bonded validator set.
    async fn commit(
        &self,
        pre_state_hash: Digest,
        effects: &ExecutionEffects,
        protocol_version: ProtocolVersion,
    ) -> Result<CommitResult, EngineError>;
}

/// The protocol version schedule: which version is active at which rank.
pub trait ProtocolVersions: Send + Sync {
    /// The protocol version active at the given rank, or `None` if the rank is outside every
    /// configured interval.
    fn version_at(&self, rank: u64) -> Option<ProtocolVersion>;
}

#[async_trait]
impl<T: BlockStorage + ?Sized> BlockStorage for Arc<T> {
    async fn contains(&self, block_hash: &BlockHash) -> bool {
        (**self).contains(block_hash).await
    }

    async fn get(&self, block_hash: &BlockHash) -> Option<Block> {
        (**self).get(block_hash).await
    }

    async fn find_block_hashes_with_deploy_hash(
        &self,
        deploy_hash: &DeployHash,
    ) -> HashSet<BlockHash> {
        (**self).find_block_hashes_with_deploy_hash(deploy_hash).await
    }
}

#[async_trait]
impl<T: ExecutionEngine + ?Sized> ExecutionEngine for Arc<T> {
    async fn commit(
        &self,
        pre_state_hash: Digest,
        effects: &ExecutionEffects,
        protocol_version: ProtocolVersion,
    ) -> Result<CommitResult, EngineError> {
        (**self).commit(pre_state_hash, effects, protocol_version).await
    }
}

/// Fork choice, to the extent validation needs it: computing the parents a correct block would
/// have chosen given its justifications.
#[async_trait]
pub trait ForkChoice: Send + Sync {
    /// Runs fork choice from the latest messages visible in `justifications` and returns the
    /// expected parent list, main parent first.
    async fn expected_parents(
        &self,
        genesis_block_hash: &BlockHash,
        justifications: &[Justification],
        dag: &DagRepresentation,
    ) -> Vec<BlockHash>;
}

#[async_trait]
impl<T: ForkChoice + ?Sized> ForkChoice for Arc<T> {
    async fn expected_parents(
        &self,
        genesis_block_hash: &BlockHash,
        justifications: &[Justification],
        dag: &DagRepresentation,
    ) -> Vec<BlockHash> {
        (**self)
            .expected_parents(genesis_block_hash, justifications, dag)
            .await
    }
}
