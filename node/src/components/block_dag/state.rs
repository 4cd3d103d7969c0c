use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};

use tracing::{debug, trace};

use super::error::{Error, Result};
use crate::types::{BlockHash, BlockSummary, Message, ValidatorId};

/// The in-memory DAG state: message records plus every index maintained alongside them.
///
/// All mutation happens under the storage's write lock, which is what makes a single insert
/// atomic with respect to all index updates.
#[derive(Debug, Default)]
pub(super) struct DagState {
    /// All messages, by identity.
    messages: HashMap<BlockHash, Arc<Message>>,
    /// First-hop children, keyed by parent.
    children: HashMap<BlockHash, Vec<BlockHash>>,
    /// Messages naming a given hash in their justifications.
    justification_to_blocks: HashMap<BlockHash, Vec<BlockHash>>,
    /// Per-era latest messages: era key block -> validator -> hashes of the validator's messages
    /// in that era not transitively cited by any other of the validator's messages in that era.
    latest_messages: HashMap<BlockHash, HashMap<ValidatorId, HashSet<BlockHash>>>,
    /// Message hashes grouped by rank; within a rank, insertion order.
    topo_index: BTreeMap<u64, Vec<BlockHash>>,
}

impl DagState {
    /// Inserts a message into the DAG and updates all indices.
    ///
    /// Idempotent for a message that is already present. Fails with `MissingDependency` if a
    /// parent, justification or key block is absent, and with `Corrupt` if the summary's
    /// identity does not match its header.
    pub(super) fn insert(&mut self, summary: &BlockSummary) -> Result<()> {
        let block_hash = *summary.block_hash();

        let actual = summary.header().hash();
        if actual != block_hash {
            return Err(Error::Corrupt { block_hash, actual });
        }

        // The hash is content-addressed, so an existing entry under the same hash is the same
        // message: repeated inserts are no-ops.
        if self.messages.contains_key(&block_hash) {
            trace!(%block_hash, "repeated insert ignored");
            return Ok(());
        }

        let message = Arc::new(Message::from_block_summary(summary)?);

        if !message.is_genesis_like() {
            for dependency in message.parents().iter().chain(message.justifications()) {
                if !self.messages.contains_key(dependency) {
                    return Err(Error::MissingDependency(*dependency));
                }
            }
            let key_block_hash = message.key_block_hash();
            if !key_block_hash.is_zero() && !self.messages.contains_key(key_block_hash) {
                return Err(Error::MissingDependency(*key_block_hash));
            }
        }

        debug_assert!(
            message.is_genesis_like()
                || Some(message.rank())
                    == self.expected_rank(message.parents().iter().chain(message.justifications())),
            "rank invariant violated for {}",
            block_hash
        );

        for parent in message.parents() {
            self.children.entry(*parent).or_default().push(block_hash);
        }
        for justification in message.justifications() {
            self.justification_to_blocks
                .entry(*justification)
                .or_default()
                .push(block_hash);
        }
        self.topo_index
            .entry(message.rank())
            .or_default()
            .push(block_hash);
        self.update_latest_messages(&message);
        self.messages.insert(block_hash, message);

        debug!(%block_hash, "inserted message into the DAG");
        Ok(())
    }

    /// Removes all state.
    ///
    /// Test support; never called on a running node.
    pub(super) fn clear(&mut self) {
        *self = DagState::default();
    }

    pub(super) fn get(&self, hash: &BlockHash) -> Option<Arc<Message>> {
        self.messages.get(hash).cloned()
    }

    pub(super) fn contains(&self, hash: &BlockHash) -> bool {
        self.messages.contains_key(hash)
    }

    pub(super) fn children(&self, hash: &BlockHash) -> Vec<BlockHash> {
        self.children.get(hash).cloned().unwrap_or_default()
    }

    pub(super) fn justification_to_blocks(&self, hash: &BlockHash) -> Vec<BlockHash> {
        self.justification_to_blocks
            .get(hash)
            .cloned()
            .unwrap_or_default()
    }

    /// The key block hashes of all eras with at least one recorded latest message.
    pub(super) fn eras(&self) -> Vec<BlockHash> {
        self.latest_messages.keys().copied().collect()
    }

    /// The latest messages of one era, resolved to message records and sorted by hash.
    pub(super) fn latest_in_era(
        &self,
        key_block_hash: &BlockHash,
    ) -> BTreeMap<ValidatorId, Vec<Arc<Message>>> {
        match self.latest_messages.get(key_block_hash) {
            None => BTreeMap::new(),
            Some(per_validator) => per_validator
                .iter()
                .map(|(validator_id, hashes)| {
                    (validator_id.clone(), self.resolve_sorted(hashes))
                })
                .collect(),
        }
    }

    pub(super) fn hashes_at_rank(&self, rank: u64) -> Vec<BlockHash> {
        self.topo_index.get(&rank).cloned().unwrap_or_default()
    }

    pub(super) fn max_rank(&self) -> Option<u64> {
        self.topo_index.keys().next_back().copied()
    }

    /// Returns whether any message in `start` transitively cites `target` through
    /// justifications, following citations only through messages of the given era.
    pub(super) fn cites_transitively(
        &self,
        start: &HashSet<BlockHash>,
        target: &BlockHash,
        key_block_hash: &BlockHash,
    ) -> bool {
        let mut to_visit: Vec<BlockHash> = start.iter().copied().collect();
        let mut added_to_to_visit: HashSet<BlockHash> = start.clone();
        while let Some(hash) = to_visit.pop() {
            if hash == *target {
                return true;
            }
            let message = match self.messages.get(&hash) {
                Some(message) => message,
                None => continue,
            };
            if message.key_block_hash() != key_block_hash {
                continue;
            }
            to_visit.extend(
                message
                    .justifications()
                    .iter()
                    .filter(|justification| added_to_to_visit.insert(**justification)),
            );
        }
        false
    }

    /// Returns whether `target` is among `start` or transitively cited by any of them through
    /// justifications, across era boundaries.
    pub(super) fn j_past_cone_contains(
        &self,
        start: &HashSet<BlockHash>,
        target: &BlockHash,
    ) -> bool {
        let mut to_visit: Vec<BlockHash> = start.iter().copied().collect();
        let mut added_to_to_visit: HashSet<BlockHash> = start.clone();
        while let Some(hash) = to_visit.pop() {
            if hash == *target {
                return true;
            }
            if let Some(message) = self.messages.get(&hash) {
                to_visit.extend(
                    message
                        .justifications()
                        .iter()
                        .filter(|justification| added_to_to_visit.insert(**justification)),
                );
            }
        }
        false
    }

    /// The transitive closure of the given hashes over parent edges, including the starting
    /// hashes themselves.
    pub(super) fn p_past_cone(&self, start: &[BlockHash]) -> HashSet<BlockHash> {
        let mut to_visit: Vec<BlockHash> = start.to_vec();
        let mut cone: HashSet<BlockHash> = to_visit.iter().copied().collect();
        while let Some(hash) = to_visit.pop() {
            if let Some(message) = self.messages.get(&hash) {
                to_visit.extend(
                    message
                        .parents()
                        .iter()
                        .filter(|parent| cone.insert(**parent)),
                );
            }
        }
        cone
    }

    fn resolve_sorted(&self, hashes: &HashSet<BlockHash>) -> Vec<Arc<Message>> {
        let mut messages: Vec<Arc<Message>> = hashes
            .iter()
            .filter_map(|hash| self.messages.get(hash).cloned())
            .collect();
        messages.sort();
        messages
    }

    /// Recomputes the expected rank over a dependency set; `None` if any dependency is absent.
    fn expected_rank<'a>(
        &self,
        dependencies: impl Iterator<Item = &'a BlockHash>,
    ) -> Option<u64> {
        let mut max_rank = None;
        for dependency in dependencies {
            let rank = self.messages.get(dependency)?.rank();
            max_rank = Some(max_rank.map_or(rank, |max: u64| max.max(rank)));
        }
        max_rank.map(|max| max + 1)
    }

    /// Applies the latest-message update rule for a newly inserted message: drop every prior
    /// latest message of the creator that the new message transitively cites within its era,
    /// then record the new message.
    fn update_latest_messages(&mut self, message: &Message) {
        if message.is_genesis_like() {
            return;
        }
        let key_block_hash = *message.key_block_hash();
        let validator_id = message.validator_id().clone();
        let prior = self
            .latest_messages
            .get(&key_block_hash)
            .and_then(|per_validator| per_validator.get(&validator_id))
            .cloned()
            .unwrap_or_default();

        let mut latest: HashSet<BlockHash> = prior
            .into_iter()
            .filter(|prior_hash| {
                !self.cites_transitively(message.justifications(), prior_hash, &key_block_hash)
            })
            .collect();
        latest.insert(*message.hash());
        if latest.len() > 1 {
            debug!(%validator_id, era = %key_block_hash, "validator has equivocated");
        }

        self.latest_messages
            .entry(key_block_hash)
            .or_default()
            .insert(validator_id, latest);
    }
}
