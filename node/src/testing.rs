//! Testing utilities.
//!
//! Contains a seedable random number generator and builders for hand-constructing blocks and
//! deploys in tests.

mod test_rng;

use rand::Rng;

pub(crate) use test_rng::TestRng;

use crate::{
    crypto::{
        self,
        hash::{self, Digest},
        SignatureAlgorithm,
    },
    types::{
        Approval, Block, BlockBody, BlockHash, BlockHeader, BlockSummary, Bond, Deploy,
        DeployBody, DeployHeader, Justification, MessageType, ProtocolVersion, TimeDiff,
        Timestamp, ValidatorId,
    },
};

/// The chain name used throughout the tests.
pub(crate) const TEST_CHAIN_NAME: &str = "casper-test";

/// A test validator: an Ed25519 keypair whose public key doubles as the validator ID.
#[derive(Clone, Debug)]
pub(crate) struct TestValidator {
    secret_key: [u8; 32],
    validator_id: ValidatorId,
}

impl TestValidator {
    pub(crate) fn random(rng: &mut TestRng) -> Self {
        let secret_key: [u8; 32] = rng.gen();
        let (_, public_key) = crypto::sign(b"probe", &secret_key, SignatureAlgorithm::Ed25519)
            .expect("should derive public key");
        TestValidator {
            secret_key,
            validator_id: ValidatorId::new(public_key),
        }
    }

    pub(crate) fn id(&self) -> &ValidatorId {
        &self.validator_id
    }

    pub(crate) fn sign(&self, data: &[u8]) -> Vec<u8> {
        let (signature, _) = crypto::sign(data, &self.secret_key, SignatureAlgorithm::Ed25519)
            .expect("should sign");
        signature
    }

    /// A bond of the given stake for this validator.
    pub(crate) fn bond(&self, stake: u64) -> Bond {
        Bond {
            validator_id: self.validator_id.clone(),
            stake,
        }
    }
}

/// Returns a fresh genesis-like block summary: no creator, no parents, rank zero.
pub(crate) fn genesis_summary(rng: &mut TestRng) -> BlockSummary {
    BlockBuilder::new()
        .post_state(Digest::random(rng))
        .build()
        .summary()
        .clone()
}

/// Builder for test blocks.
///
/// Defaults produce a genesis-like block; setting a validator makes it a signed non-genesis
/// block. All DAG-positional fields (parents, rank, sequence number) are explicit so tests can
/// build both valid and deliberately broken blocks.
#[derive(Clone, Debug)]
pub(crate) struct BlockBuilder {
    validator: Option<TestValidator>,
    parents: Vec<BlockHash>,
    justifications: Vec<Justification>,
    rank: u64,
    j_rank: Option<u64>,
    seq_num: u64,
    prev: Option<BlockHash>,
    timestamp: Timestamp,
    key_block_hash: BlockHash,
    message_type: MessageType,
    deploys: Vec<Deploy>,
    bonds: Vec<Bond>,
    chain_name: String,
    protocol_version: ProtocolVersion,
    pre_state_hash: Digest,
    post_state_hash: Digest,
}

impl BlockBuilder {
    pub(crate) fn new() -> Self {
        BlockBuilder {
            validator: None,
            parents: vec![],
            justifications: vec![],
            rank: 0,
            j_rank: None,
            seq_num: 0,
            prev: None,
            timestamp: Timestamp::from(1_596_763_000_000),
            key_block_hash: BlockHash::default(),
            message_type: MessageType::Block,
            deploys: vec![],
            bonds: vec![],
            chain_name: TEST_CHAIN_NAME.to_string(),
            protocol_version: ProtocolVersion::new(1, 0, 0),
            pre_state_hash: hash::hash(b"pre-state"),
            post_state_hash: hash::hash(b"post-state"),
        }
    }

    pub(crate) fn validator(mut self, validator: &TestValidator) -> Self {
        self.validator = Some(validator.clone());
        self
    }

    pub(crate) fn parents(mut self, parents: Vec<BlockHash>) -> Self {
        self.parents = parents;
        self
    }

    /// Sets the justifications from `(creator, hash)` pairs.
    pub(crate) fn justifications(mut self, cited: Vec<(ValidatorId, BlockHash)>) -> Self {
        self.justifications = cited
            .into_iter()
            .map(|(validator_id, latest_block_hash)| Justification {
                validator_id,
                latest_block_hash,
            })
            .collect();
        self
    }

    pub(crate) fn rank(mut self, rank: u64) -> Self {
        self.rank = rank;
        self
    }

    pub(crate) fn j_rank(mut self, j_rank: u64) -> Self {
        self.j_rank = Some(j_rank);
        self
    }

    pub(crate) fn seq_num(mut self, seq_num: u64) -> Self {
        self.seq_num = seq_num;
        self
    }

    pub(crate) fn prev(mut self, prev: BlockHash) -> Self {
        self.prev = Some(prev);
        self
    }

    pub(crate) fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub(crate) fn era(mut self, key_block_hash: BlockHash) -> Self {
        self.key_block_hash = key_block_hash;
        self
    }

    pub(crate) fn ballot(mut self) -> Self {
        self.message_type = MessageType::Ballot;
        self
    }

    pub(crate) fn deploys(mut self, deploys: Vec<Deploy>) -> Self {
        self.deploys = deploys;
        self
    }

    pub(crate) fn bonds(mut self, bonds: Vec<Bond>) -> Self {
        self.bonds = bonds;
        self
    }

    pub(crate) fn chain_name(mut self, chain_name: &str) -> Self {
        self.chain_name = chain_name.to_string();
        self
    }

    pub(crate) fn protocol_version(mut self, protocol_version: ProtocolVersion) -> Self {
        self.protocol_version = protocol_version;
        self
    }

    pub(crate) fn pre_state(mut self, pre_state_hash: Digest) -> Self {
        self.pre_state_hash = pre_state_hash;
        self
    }

    pub(crate) fn post_state(mut self, post_state_hash: Digest) -> Self {
        self.post_state_hash = post_state_hash;
        self
    }

    pub(crate) fn build(&self) -> Block {
        let body = BlockBody::new(self.deploys.clone());
        let header = BlockHeader {
            parent_hashes: self.parents.clone(),
            justifications: self.justifications.clone(),
            body_hash: body.hash(),
            pre_state_hash: self.pre_state_hash,
            post_state_hash: self.post_state_hash,
            bonds: self.bonds.clone(),
            validator_id: self
                .validator
                .as_ref()
                .map(|validator| validator.id().clone())
                .unwrap_or_default(),
            validator_seq_num: self.seq_num,
            validator_prev_block_hash: self.prev,
            rank: self.rank,
            j_rank: self.j_rank.unwrap_or(self.rank),
            timestamp: self.timestamp,
            chain_name: self.chain_name.clone(),
            protocol_version: self.protocol_version,
            deploy_count: self.deploys.len() as u32,
            key_block_hash: self.key_block_hash,
            message_type: self.message_type,
        };
        let block_hash = header.hash();
        let (signature, signature_algorithm) = match &self.validator {
            Some(validator) => (
                validator.sign(block_hash.as_ref()),
                SignatureAlgorithm::Ed25519.name().to_string(),
            ),
            None => (vec![], String::new()),
        };
        Block::new(
            BlockSummary {
                block_hash,
                header,
                signature,
                signature_algorithm,
            },
            Some(body),
        )
    }
}

/// Builder for test deploys.
#[derive(Clone, Debug)]
pub(crate) struct DeployBuilder {
    timestamp: Timestamp,
    ttl: TimeDiff,
    dependencies: Vec<Vec<u8>>,
    chain_name: String,
}

impl DeployBuilder {
    pub(crate) fn new(timestamp: Timestamp) -> Self {
        DeployBuilder {
            timestamp,
            ttl: TimeDiff::from_seconds(2 * 60 * 60),
            dependencies: vec![],
            chain_name: TEST_CHAIN_NAME.to_string(),
        }
    }

    pub(crate) fn ttl(mut self, ttl: TimeDiff) -> Self {
        self.ttl = ttl;
        self
    }

    pub(crate) fn dependencies(mut self, dependencies: Vec<Vec<u8>>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub(crate) fn chain_name(mut self, chain_name: &str) -> Self {
        self.chain_name = chain_name.to_string();
        self
    }

    pub(crate) fn build(&self, rng: &mut TestRng) -> Deploy {
        let payload: [u8; 32] = rng.gen();
        let body = DeployBody::new(payload.to_vec());
        let header = DeployHeader {
            timestamp: self.timestamp,
            ttl: self.ttl,
            dependencies: self.dependencies.clone(),
            chain_name: self.chain_name.clone(),
            body_hash: body.hash(),
        };
        let deploy_hash = header.hash();
        let approver = TestValidator::random(rng);
        let approvals = vec![Approval::new(
            approver.id().as_bytes().to_vec(),
            approver.sign(deploy_hash.inner().as_ref()),
            SignatureAlgorithm::Ed25519.name().to_string(),
        )];
        Deploy {
            deploy_hash,
            header,
            body,
            approvals,
        }
    }
}
