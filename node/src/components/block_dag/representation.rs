use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use parking_lot::RwLock;

use super::{
    observed_behavior::EraObservedBehavior,
    state::DagState,
    tips::{EraTips, GlobalTips},
};
use crate::types::{BlockHash, Message, MessageType, Timestamp, ValidatorId};

/// A lightweight record of one DAG vertex, as produced by the topological enumeration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BlockInfo {
    /// The message's identity.
    pub block_hash: BlockHash,
    /// The creator of the message.
    pub validator_id: ValidatorId,
    /// The message's parents.
    pub parent_hashes: Vec<BlockHash>,
    /// The message's rank.
    pub rank: u64,
    /// When the message was created.
    pub timestamp: Timestamp,
    /// The era the message belongs to.
    pub key_block_hash: BlockHash,
    /// Whether the message is a block or a ballot.
    pub message_type: MessageType,
}

impl BlockInfo {
    fn from_message(message: &Message) -> Self {
        BlockInfo {
            block_hash: *message.hash(),
            validator_id: message.validator_id().clone(),
            parent_hashes: message.parents().clone(),
            rank: message.rank(),
            timestamp: message.timestamp(),
            key_block_hash: *message.key_block_hash(),
            message_type: message.message_type(),
        }
    }
}

/// A query handle onto the DAG.
///
/// The handle is cheap to clone and does not pin a snapshot: each individual query observes a
/// consistent state including every insert that happened before it, but two queries may observe
/// different states. Callers needing a fixed view take one query and keep its result.
#[derive(Clone, Debug)]
pub struct DagRepresentation {
    pub(super) state: Arc<RwLock<DagState>>,
}

impl DagRepresentation {
    /// Looks up a message by hash.
    pub fn lookup(&self, hash: &BlockHash) -> Option<Arc<Message>> {
        self.state.read().get(hash)
    }

    /// Returns whether the DAG contains the given message.
    pub fn contains(&self, hash: &BlockHash) -> bool {
        self.state.read().contains(hash)
    }

    /// The messages listing `hash` among their parents.
    pub fn children(&self, hash: &BlockHash) -> Vec<BlockHash> {
        self.state.read().children(hash)
    }

    /// The messages naming `hash` in their justifications.
    pub fn justification_to_blocks(&self, hash: &BlockHash) -> Vec<BlockHash> {
        self.state.read().justification_to_blocks(hash)
    }

    /// The latest-message view of a single era; the basis for equivocation detection there.
    pub fn latest_in_era(&self, key_block_hash: BlockHash) -> EraTips {
        let latest = self.state.read().latest_in_era(&key_block_hash);
        EraTips::new(key_block_hash, latest)
    }

    /// The union of latest messages over all eras.
    ///
    /// The storage itself treats every era as active; pass a predicate via
    /// [`latest_global_filtered`](Self::latest_global_filtered) to restrict the view to the
    /// consumer's notion of active eras.
    pub fn latest_global(&self) -> GlobalTips {
        self.latest_global_filtered(|_| true)
    }

    /// The union of latest messages over the eras accepted by `is_active`.
    pub fn latest_global_filtered<F: FnMut(&BlockHash) -> bool>(
        &self,
        mut is_active: F,
    ) -> GlobalTips {
        let state = self.state.read();
        let mut merged: BTreeMap<ValidatorId, Vec<Arc<Message>>> = BTreeMap::new();
        for key_block_hash in state.eras() {
            if !is_active(&key_block_hash) {
                continue;
            }
            for (validator_id, messages) in state.latest_in_era(&key_block_hash) {
                merged.entry(validator_id).or_default().extend(messages);
            }
        }
        for messages in merged.values_mut() {
            messages.sort();
            messages.dedup();
        }
        GlobalTips::new(merged)
    }

    /// Classifies observed validator behavior for the given eras.
    pub fn observed_behavior(
        &self,
        key_block_hashes: &[BlockHash],
    ) -> EraObservedBehavior<Arc<Message>> {
        let state = self.state.read();
        let latest = key_block_hashes
            .iter()
            .map(|key_block_hash| {
                let per_validator = state
                    .latest_in_era(key_block_hash)
                    .into_iter()
                    .map(|(validator_id, messages)| {
                        (validator_id, messages.into_iter().collect::<BTreeSet<_>>())
                    })
                    .collect::<HashMap<_, _>>();
                (*key_block_hash, per_validator)
            })
            .collect();
        EraObservedBehavior::new(latest)
    }

    /// The validators seen equivocating in any era known to the DAG.
    pub fn known_equivocators(&self) -> HashSet<ValidatorId> {
        let eras: Vec<BlockHash> = self.state.read().eras();
        let mut equivocators = HashSet::new();
        for key_block_hash in eras {
            equivocators.extend(self.latest_in_era(key_block_hash).equivocators());
        }
        equivocators
    }

    /// Lazily enumerates the DAG one rank at a time, in ascending rank order, for all ranks in
    /// `start_rank..=end_rank`.
    ///
    /// Each item is the group of messages at one rank; within a group, order is the insertion
    /// order of the underlying storage. The stream is finite and can simply be dropped to
    /// cancel it.
    pub fn topo_sort(&self, start_rank: u64, end_rank: u64) -> TopoSortIter {
        TopoSortIter {
            state: Arc::clone(&self.state),
            next_rank: start_rank,
            end_rank,
        }
    }

    /// Enumerates the top `tail_length` ranks of the DAG.
    pub fn topo_sort_tail(&self, tail_length: u64) -> TopoSortIter {
        let max_rank = self.state.read().max_rank().unwrap_or(0);
        let start_rank = max_rank.saturating_sub(tail_length.saturating_sub(1));
        self.topo_sort(start_rank, max_rank)
    }

    /// The highest rank present in the DAG, if any message has been inserted.
    pub fn max_rank(&self) -> Option<u64> {
        self.state.read().max_rank()
    }

    /// The key block hashes of all eras with at least one recorded latest message.
    pub fn eras(&self) -> Vec<BlockHash> {
        self.state.read().eras()
    }

    /// Returns whether `target` is among `start` or transitively cited by any of them through
    /// justifications, across era boundaries.
    pub fn j_past_cone_contains(&self, start: &HashSet<BlockHash>, target: &BlockHash) -> bool {
        self.state.read().j_past_cone_contains(start, target)
    }

    /// Returns whether any message in `start` transitively cites `target` through
    /// justifications within the given era.
    pub fn cites_transitively(
        &self,
        start: &HashSet<BlockHash>,
        target: &BlockHash,
        key_block_hash: &BlockHash,
    ) -> bool {
        self.state
            .read()
            .cites_transitively(start, target, key_block_hash)
    }

    /// The transitive closure of the given hashes over parent edges, including the hashes
    /// themselves.
    pub fn p_past_cone(&self, start: &[BlockHash]) -> HashSet<BlockHash> {
        self.state.read().p_past_cone(start)
    }
}

/// Iterator produced by [`DagRepresentation::topo_sort`].
///
/// Groups are read from the live storage rank by rank, so the whole range is never
/// materialized at once.
#[derive(Debug)]
pub struct TopoSortIter {
    state: Arc<RwLock<DagState>>,
    next_rank: u64,
    end_rank: u64,
}

impl Iterator for TopoSortIter {
    type Item = Vec<BlockInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_rank > self.end_rank {
            return None;
        }
        let rank = self.next_rank;
        self.next_rank += 1;
        let state = self.state.read();
        let group = state
            .hashes_at_rank(rank)
            .iter()
            .filter_map(|hash| state.get(hash))
            .map(|message| BlockInfo::from_message(&message))
            .collect();
        Some(group)
    }
}
