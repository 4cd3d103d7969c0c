//! Block validator
//!
//! The ordered, short-circuiting checks a block goes through before it is admitted to the DAG.
//! Summaries (headers only) are checked before the full block is downloaded; the full check is
//! DAG-aware and consumes the external services behind the seams in [`traits`].
//!
//! Every failure carries a typed reason. Reasons fall into three classes: `MissingBlocks` is
//! retried once the dependencies arrive, `InvalidUnslashableBlock` is dropped without penalty,
//! and everything else is evidence against the block's creator. The split matters: rejecting a
//! correct block would fork this node off the network, so no check may produce false positives.

pub mod traits;

mod config;
mod error;

use std::collections::{HashMap, HashSet};
use std::convert::TryFrom;

use itertools::Itertools;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::{
    components::block_dag::DagRepresentation,
    crypto::{self, hash::Digest},
    types::{
        Block, BlockBody, BlockHash, BlockSummary, Deploy, DeployHash, MessageType, Timestamp,
        ValidatorId,
    },
};
pub use config::Config;
pub use error::BlockError;
use traits::{BlockStorage, ExecutionEffects, ExecutionEngine, ForkChoice, ProtocolVersions};

/// The block validation component.
///
/// Stateless apart from the per-validator equivocation memoization; distinct blocks may be
/// validated concurrently against the same DAG.
#[derive(Debug)]
pub struct BlockValidator<S, E, V, F> {
    config: Config,
    block_storage: S,
    execution_engine: E,
    protocol_versions: V,
    fork_choice: F,
    /// The smallest rank among each validator's known equivocating messages, cached so swimlane
    /// walks need not re-scan the tips on every block.
    min_base_ranks: Mutex<HashMap<ValidatorId, u64>>,
}

impl<S, E, V, F> BlockValidator<S, E, V, F>
where
    S: BlockStorage,
    E: ExecutionEngine,
    V: ProtocolVersions,
    F: ForkChoice,
{
    /// Creates a new block validator instance.
    pub fn new(
        config: Config,
        block_storage: S,
        execution_engine: E,
        protocol_versions: V,
        fork_choice: F,
    ) -> Self {
        BlockValidator {
            config,
            block_storage,
            execution_engine,
            protocol_versions,
            fork_choice,
            min_base_ranks: Mutex::new(HashMap::new()),
        }
    }

    /// Validates a block summary: everything that can be checked before downloading the body.
    pub fn validate_summary(&self, summary: &BlockSummary) -> Result<(), BlockError> {
        match self.do_validate_summary(summary) {
            Err(error) => {
                warn!(block_hash = %summary.block_hash(), %error, "invalid block summary");
                Err(error)
            }
            Ok(()) => Ok(()),
        }
    }

    /// Validates a full block against the DAG.
    ///
    /// `pre_state_hash` and `effects` come from executing the block's deploys on top of its
    /// parents; the final check commits them through the execution engine and compares the
    /// outcome with what the block claims.
    pub async fn validate_block(
        &self,
        block: &Block,
        dag: &DagRepresentation,
        pre_state_hash: Digest,
        effects: &ExecutionEffects,
    ) -> Result<(), BlockError> {
        match self.do_validate_block(block, dag, pre_state_hash, effects).await {
            Err(error) => {
                warn!(block_hash = %block.block_hash(), %error, "invalid block");
                Err(error)
            }
            Ok(()) => {
                debug!(block_hash = %block.block_hash(), "block fully validated");
                Ok(())
            }
        }
    }

    fn do_validate_summary(&self, summary: &BlockSummary) -> Result<(), BlockError> {
        let header = summary.header();
        let treat_as_genesis = summary.is_genesis_like();

        // Field format.
        if summary.block_hash().is_zero() {
            return Err(unslashable("empty block hash"));
        }
        if header.chain_name().is_empty() {
            return Err(unslashable("empty chain name"));
        }
        if header.post_state_hash().is_zero() || header.body_hash().is_zero() {
            return Err(unslashable("empty state or body hash"));
        }
        let has_signature =
            !summary.signature().is_empty() && !summary.signature_algorithm().is_empty();
        if treat_as_genesis && has_signature {
            return Err(unslashable("genesis-like block must not be signed"));
        }
        if !treat_as_genesis
            && (summary.signature().is_empty() || summary.signature_algorithm().is_empty())
        {
            return Err(unslashable("missing signature or algorithm"));
        }

        // Protocol version, against the configured schedule.
        match self.protocol_versions.version_at(header.rank()) {
            Some(version) if version == header.protocol_version() => (),
            Some(version) => {
                return Err(unslashable(&format!(
                    "protocol version {} expected at rank {}",
                    version,
                    header.rank()
                )));
            }
            None => {
                return Err(unslashable(&format!(
                    "no protocol version configured at rank {}",
                    header.rank()
                )));
            }
        }

        // Signature; an unsupported algorithm fails here as well.
        if !treat_as_genesis {
            crypto::verify(
                summary.block_hash().as_ref(),
                summary.signature(),
                header.validator_id().as_bytes(),
                summary.signature_algorithm(),
            )
            .map_err(|error| unslashable(&format!("signature check failed: {}", error)))?;
        }

        // Summary hash.
        if header.hash() != *summary.block_hash() {
            return Err(BlockError::InvalidBlockHash);
        }

        // Chain identifier.
        if header.chain_name() != self.config.chain_name {
            return Err(BlockError::InvalidChainName(header.chain_name().to_string()));
        }

        // Ballot shape.
        if header.message_type() == MessageType::Ballot && header.parent_hashes().len() != 1 {
            return Err(BlockError::InvalidTargetHash);
        }

        Ok(())
    }

    async fn do_validate_block(
        &self,
        block: &Block,
        dag: &DagRepresentation,
        pre_state_hash: Digest,
        effects: &ExecutionEffects,
    ) -> Result<(), BlockError> {
        self.do_validate_summary(block.summary())?;

        let header = block.header();
        let treat_as_genesis = block.summary().is_genesis_like();

        let body = block
            .body()
            .ok_or_else(|| unslashable("block body not downloaded"))?;

        // An unbonded creator has no stake to slash, so its blocks are merely dropped.
        if !treat_as_genesis {
            let bonded = header
                .bonds()
                .iter()
                .any(|bond| bond.validator_id == *header.validator_id() && bond.stake > 0);
            if !bonded {
                return Err(unslashable("creator is not bonded"));
            }
        }

        self.validate_dependencies_present(block, dag).await?;
        self.validate_timestamp(block, dag)?;
        self.validate_rank(block, dag)?;
        self.validate_swimlane_predecessor(block, dag)?;
        self.validate_sequence_number(block, dag)?;
        self.validate_swimlane_not_merged(block, dag)?;

        // Body hash; the summary hash was already covered above.
        if body.hash() != *header.body_hash() {
            return Err(BlockError::InvalidBlockHash);
        }

        if header.deploy_count() as usize != body.deploys().len() {
            return Err(BlockError::InvalidDeployCount);
        }

        self.validate_deploy_hashes(body)?;
        self.validate_deploy_signatures(body)?;
        self.validate_deploy_headers(block, body, dag).await?;
        self.validate_deploy_uniqueness(block, body, dag).await?;
        self.validate_parents(block, dag).await?;

        if *header.pre_state_hash() != pre_state_hash {
            return Err(BlockError::InvalidPreStateHash);
        }

        let commit_result = self
            .execution_engine
            .commit(pre_state_hash, effects, header.protocol_version())
            .await
            .map_err(|error| BlockError::InvalidTransaction(error.to_string()))?;
        if commit_result.post_state_hash != *header.post_state_hash() {
            return Err(BlockError::InvalidPostStateHash);
        }
        let expected_bonds: Vec<_> = commit_result.bonded_validators.iter().sorted().collect();
        let actual_bonds: Vec<_> = header.bonds().iter().sorted().collect();
        if expected_bonds != actual_bonds {
            return Err(BlockError::InvalidBondsCache);
        }

        Ok(())
    }

    /// Every parent and justification must be in block storage and in the DAG.
    async fn validate_dependencies_present(
        &self,
        block: &Block,
        dag: &DagRepresentation,
    ) -> Result<(), BlockError> {
        let mut missing = Vec::new();
        for dependency in dependencies(block) {
            if missing.contains(&dependency) {
                continue;
            }
            if !self.block_storage.contains(&dependency).await || !dag.contains(&dependency) {
                missing.push(dependency);
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(BlockError::MissingBlocks(missing))
        }
    }

    /// The block timestamp must not precede any dependency and must not be too far in the
    /// future. Both violations are beyond proof of malice (clocks drift), so they are dropped
    /// without penalty.
    fn validate_timestamp(
        &self,
        block: &Block,
        dag: &DagRepresentation,
    ) -> Result<(), BlockError> {
        if block.summary().is_genesis_like() {
            return Ok(());
        }
        let timestamp = block.header().timestamp();
        let latest_dependency = dependencies(block)
            .filter_map(|dependency| dag.lookup(&dependency))
            .map(|message| message.timestamp())
            .max()
            .unwrap_or_else(Timestamp::zero);
        if timestamp < latest_dependency {
            return Err(unslashable("block is timestamped before its dependencies"));
        }
        let cutoff = Timestamp::now() + self.config.max_clock_drift;
        if timestamp > cutoff {
            return Err(unslashable("block timestamp is in the future"));
        }
        Ok(())
    }

    /// Recomputes the rank and justification-rank from the dependencies.
    fn validate_rank(&self, block: &Block, dag: &DagRepresentation) -> Result<(), BlockError> {
        let header = block.header();
        if block.summary().is_genesis_like() {
            if header.rank() != 0 || header.j_rank() != 0 {
                return Err(BlockError::InvalidBlockNumber);
            }
            return Ok(());
        }

        let rank_of = |hash: &BlockHash| dag.lookup(hash).map(|message| message.rank());
        let expected_rank = dependencies(block)
            .collect::<HashSet<_>>()
            .iter()
            .map(|hash| rank_of(hash).ok_or_else(|| BlockError::MissingBlocks(vec![*hash])))
            .try_fold(0, |max: u64, rank| rank.map(|rank| max.max(rank)))?
            + 1;
        if header.rank() != expected_rank {
            return Err(BlockError::InvalidBlockNumber);
        }

        let justification_hashes: HashSet<BlockHash> = header
            .justifications()
            .iter()
            .map(|justification| justification.latest_block_hash)
            .collect();
        let expected_j_rank = if justification_hashes.is_empty() {
            0
        } else {
            justification_hashes
                .iter()
                .map(|hash| rank_of(hash).ok_or_else(|| BlockError::MissingBlocks(vec![*hash])))
                .try_fold(0, |max: u64, rank| rank.map(|rank| max.max(rank)))?
                + 1
        };
        if header.j_rank() != expected_j_rank {
            return Err(BlockError::InvalidBlockNumber);
        }
        Ok(())
    }

    /// The previous block hash must resolve to a message by the same creator that the block's
    /// j-past-cone actually reaches.
    fn validate_swimlane_predecessor(
        &self,
        block: &Block,
        dag: &DagRepresentation,
    ) -> Result<(), BlockError> {
        let header = block.header();
        match header.validator_prev_block_hash() {
            None => {
                if header.validator_seq_num() != 0 {
                    return Err(BlockError::InvalidPrevBlockHash);
                }
            }
            Some(_) if block.summary().is_genesis_like() => {
                return Err(BlockError::InvalidPrevBlockHash);
            }
            Some(previous_hash) => {
                if header.validator_seq_num() == 0 {
                    return Err(BlockError::InvalidPrevBlockHash);
                }
                let previous = dag
                    .lookup(previous_hash)
                    .ok_or_else(|| BlockError::MissingBlocks(vec![*previous_hash]))?;
                if previous.validator_id() != header.validator_id() {
                    return Err(BlockError::InvalidPrevBlockHash);
                }
                let justification_hashes: HashSet<BlockHash> = header
                    .justifications()
                    .iter()
                    .map(|justification| justification.latest_block_hash)
                    .collect();
                if !dag.j_past_cone_contains(&justification_hashes, previous_hash) {
                    return Err(BlockError::InvalidPrevBlockHash);
                }
            }
        }
        Ok(())
    }

    fn validate_sequence_number(
        &self,
        block: &Block,
        dag: &DagRepresentation,
    ) -> Result<(), BlockError> {
        let header = block.header();
        match header.validator_prev_block_hash() {
            None => {
                // Covered by the predecessor check: no previous hash forces sequence number 0.
                Ok(())
            }
            Some(previous_hash) => {
                let previous = dag
                    .lookup(previous_hash)
                    .ok_or_else(|| BlockError::MissingBlocks(vec![*previous_hash]))?;
                if header.validator_seq_num() != previous.sequence_number() + 1 {
                    return Err(BlockError::InvalidSequenceNumber);
                }
                Ok(())
            }
        }
    }

    /// A known equivocator must not cite more than one tip of its own forked swimlane: a block
    /// doing so would merge the forks and launder the equivocation.
    fn validate_swimlane_not_merged(
        &self,
        block: &Block,
        dag: &DagRepresentation,
    ) -> Result<(), BlockError> {
        let header = block.header();
        let creator = header.validator_id();

        // Collect the creator's equivocating latest messages across all known eras.
        let mut equivocating = Vec::new();
        for key_block_hash in dag.eras() {
            let mut equivocations = dag.latest_in_era(key_block_hash).equivocations();
            if let Some(messages) = equivocations.remove(creator) {
                equivocating.extend(messages);
            }
        }
        if equivocating.len() < 2 {
            return Ok(());
        }

        let prior_latest: HashSet<BlockHash> = equivocating
            .iter()
            .map(|message| *message.hash())
            .collect();
        let computed_base_rank = equivocating
            .iter()
            .map(|message| message.rank())
            .min()
            .unwrap_or(0);
        let min_base_rank = {
            let mut cache = self.min_base_ranks.lock();
            let entry = cache
                .entry(creator.clone())
                .or_insert(computed_base_rank);
            *entry = (*entry).min(computed_base_rank);
            *entry
        };

        // Walk the j-past-cone downward, stopping below the oldest equivocation; count how many
        // of the forked tips it reaches.
        let mut cited_tips: HashSet<BlockHash> = HashSet::new();
        let mut to_visit: Vec<BlockHash> = header
            .justifications()
            .iter()
            .map(|justification| justification.latest_block_hash)
            .collect();
        let mut added_to_to_visit: HashSet<BlockHash> = to_visit.iter().copied().collect();
        while let Some(hash) = to_visit.pop() {
            if prior_latest.contains(&hash) {
                cited_tips.insert(hash);
                if cited_tips.len() >= 2 {
                    return Err(BlockError::SwimlaneMerged);
                }
            }
            let message = match dag.lookup(&hash) {
                Some(message) => message,
                None => continue,
            };
            if message.rank() <= min_base_rank {
                continue;
            }
            to_visit.extend(
                message
                    .justifications()
                    .iter()
                    .filter(|justification| added_to_to_visit.insert(**justification)),
            );
        }
        Ok(())
    }

    fn validate_deploy_hashes(&self, body: &BlockBody) -> Result<(), BlockError> {
        for deploy in body.deploys() {
            if deploy.header().hash() != *deploy.deploy_hash()
                || deploy.body().hash() != *deploy.header().body_hash()
            {
                return Err(BlockError::InvalidDeployHash(*deploy.deploy_hash()));
            }
        }
        Ok(())
    }

    fn validate_deploy_signatures(&self, body: &BlockBody) -> Result<(), BlockError> {
        for deploy in body.deploys() {
            if deploy.approvals().is_empty() {
                return Err(BlockError::InvalidDeploySignature(*deploy.deploy_hash()));
            }
            for approval in deploy.approvals() {
                crypto::verify(
                    deploy.deploy_hash().inner().as_ref(),
                    approval.signature(),
                    approval.signer(),
                    approval.signature_algorithm(),
                )
                .map_err(|_| BlockError::InvalidDeploySignature(*deploy.deploy_hash()))?;
            }
        }
        Ok(())
    }

    async fn validate_deploy_headers(
        &self,
        block: &Block,
        body: &BlockBody,
        dag: &DagRepresentation,
    ) -> Result<(), BlockError> {
        let block_timestamp = block.header().timestamp();
        let parent_cone = dag.p_past_cone(block.header().parent_hashes());
        for deploy in body.deploys() {
            self.validate_deploy_header_shape(block, deploy)?;

            let deploy_hash = *deploy.deploy_hash();
            let deploy_timestamp = deploy.header().timestamp();
            if block_timestamp < deploy_timestamp {
                return Err(BlockError::DeployFromFuture(deploy_hash));
            }
            if block_timestamp > deploy_timestamp + deploy.header().ttl() {
                return Err(BlockError::DeployExpired(deploy_hash));
            }

            for dependency in deploy.header().dependencies() {
                let dependency_hash = DeployHash::new(
                    Digest::try_from(dependency.as_slice())
                        .map_err(|_| BlockError::DeployDependencyNotMet(deploy_hash))?,
                );
                let including_blocks = self
                    .block_storage
                    .find_block_hashes_with_deploy_hash(&dependency_hash)
                    .await;
                if !including_blocks
                    .iter()
                    .any(|block_hash| parent_cone.contains(block_hash))
                {
                    return Err(BlockError::DeployDependencyNotMet(deploy_hash));
                }
            }
        }
        Ok(())
    }

    fn validate_deploy_header_shape(
        &self,
        block: &Block,
        deploy: &Deploy,
    ) -> Result<(), BlockError> {
        let deploy_hash = *deploy.deploy_hash();
        let header = deploy.header();
        if header.ttl() < self.config.min_deploy_ttl || header.ttl() > self.config.max_deploy_ttl
        {
            return Err(BlockError::InvalidDeployHeader(
                deploy_hash,
                format!("ttl {} out of bounds", header.ttl()),
            ));
        }
        if header.dependencies().len() > self.config.max_deploy_dependencies {
            return Err(BlockError::InvalidDeployHeader(
                deploy_hash,
                format!("{} dependencies", header.dependencies().len()),
            ));
        }
        if header
            .dependencies()
            .iter()
            .any(|dependency| dependency.len() != Digest::LENGTH)
        {
            return Err(BlockError::InvalidDeployHeader(
                deploy_hash,
                "dependency hash is not 32 bytes".to_string(),
            ));
        }
        if !header.chain_name().is_empty()
            && header.chain_name() != block.header().chain_name()
        {
            return Err(BlockError::InvalidDeployHeader(
                deploy_hash,
                format!("wrong chain name {}", header.chain_name()),
            ));
        }
        Ok(())
    }

    /// No deploy may occur twice in the block, nor anywhere in the block's p-past-cone.
    async fn validate_deploy_uniqueness(
        &self,
        block: &Block,
        body: &BlockBody,
        dag: &DagRepresentation,
    ) -> Result<(), BlockError> {
        let parent_cone = dag.p_past_cone(block.header().parent_hashes());
        let mut seen = HashSet::new();
        for deploy in body.deploys() {
            let deploy_hash = *deploy.deploy_hash();
            if !seen.insert(deploy_hash) {
                return Err(BlockError::InvalidRepeatDeploy(deploy_hash));
            }
            let including_blocks = self
                .block_storage
                .find_block_hashes_with_deploy_hash(&deploy_hash)
                .await;
            if including_blocks
                .iter()
                .any(|block_hash| parent_cone.contains(block_hash))
            {
                return Err(BlockError::InvalidRepeatDeploy(deploy_hash));
            }
        }
        Ok(())
    }

    /// With a known genesis, the parents must be exactly what fork choice selects from the
    /// block's justifications.
    async fn validate_parents(
        &self,
        block: &Block,
        dag: &DagRepresentation,
    ) -> Result<(), BlockError> {
        if block.summary().is_genesis_like() {
            return Ok(());
        }
        let genesis_block_hash = match self.config.genesis_block_hash {
            Some(genesis_block_hash) => genesis_block_hash,
            None => return Ok(()),
        };
        let expected = self
            .fork_choice
            .expected_parents(&genesis_block_hash, block.header().justifications(), dag)
            .await;
        if *block.header().parent_hashes() != expected {
            return Err(BlockError::InvalidParents);
        }
        Ok(())
    }
}

/// All DAG dependencies of a block: parents and justification targets.
fn dependencies(block: &Block) -> impl Iterator<Item = BlockHash> + '_ {
    let header = block.header();
    header.parent_hashes().iter().copied().chain(
        header
            .justifications()
            .iter()
            .map(|justification| justification.latest_block_hash),
    )
}

fn unslashable(reason: &str) -> BlockError {
    BlockError::InvalidUnslashableBlock(reason.to_string())
}
