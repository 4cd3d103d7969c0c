use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use crate::types::{BlockHash, Message, ValidatorId};

/// The latest messages of a single era.
///
/// This is the only correct view for equivocation detection: a validator equivocated in an era
/// exactly if it has two or more latest messages there.
#[derive(Clone, Debug)]
pub struct EraTips {
    key_block_hash: BlockHash,
    latest: BTreeMap<ValidatorId, Vec<Arc<Message>>>,
}

impl EraTips {
    pub(super) fn new(
        key_block_hash: BlockHash,
        latest: BTreeMap<ValidatorId, Vec<Arc<Message>>>,
    ) -> Self {
        EraTips {
            key_block_hash,
            latest,
        }
    }

    /// The era this view is restricted to.
    pub fn key_block_hash(&self) -> &BlockHash {
        &self.key_block_hash
    }

    /// The hashes of the given validator's latest messages.
    pub fn latest_message_hash(&self, validator_id: &ValidatorId) -> HashSet<BlockHash> {
        self.latest
            .get(validator_id)
            .map(|messages| messages.iter().map(|message| *message.hash()).collect())
            .unwrap_or_default()
    }

    /// The given validator's latest messages.
    pub fn latest_message(&self, validator_id: &ValidatorId) -> HashSet<Arc<Message>> {
        self.latest
            .get(validator_id)
            .map(|messages| messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The hashes of every validator's latest messages.
    pub fn latest_message_hashes(&self) -> HashMap<ValidatorId, HashSet<BlockHash>> {
        self.latest
            .iter()
            .map(|(validator_id, messages)| {
                (
                    validator_id.clone(),
                    messages.iter().map(|message| *message.hash()).collect(),
                )
            })
            .collect()
    }

    /// Every validator's latest messages.
    pub fn latest_messages(&self) -> HashMap<ValidatorId, HashSet<Arc<Message>>> {
        self.latest
            .iter()
            .map(|(validator_id, messages)| {
                (validator_id.clone(), messages.iter().cloned().collect())
            })
            .collect()
    }

    /// The validators with two or more latest messages in this era.
    pub fn equivocators(&self) -> HashSet<ValidatorId> {
        self.latest
            .iter()
            .filter(|(_, messages)| messages.len() >= 2)
            .map(|(validator_id, _)| validator_id.clone())
            .collect()
    }

    /// The equivocating validators together with their conflicting latest messages.
    pub fn equivocations(&self) -> HashMap<ValidatorId, BTreeSet<Arc<Message>>> {
        self.latest
            .iter()
            .filter(|(_, messages)| messages.len() >= 2)
            .map(|(validator_id, messages)| {
                (validator_id.clone(), messages.iter().cloned().collect())
            })
            .collect()
    }
}

/// The union of latest messages over eras, as used by fork choice and gossip.
///
/// A validator may legitimately have several latest messages across sibling eras, so this view
/// deliberately exposes no equivocation queries; use [`EraTips`](struct.EraTips.html) for those.
#[derive(Clone, Debug)]
pub struct GlobalTips {
    latest: BTreeMap<ValidatorId, Vec<Arc<Message>>>,
}

impl GlobalTips {
    pub(super) fn new(latest: BTreeMap<ValidatorId, Vec<Arc<Message>>>) -> Self {
        GlobalTips { latest }
    }

    /// The hashes of the given validator's latest messages across all included eras.
    pub fn latest_message_hash(&self, validator_id: &ValidatorId) -> HashSet<BlockHash> {
        self.latest
            .get(validator_id)
            .map(|messages| messages.iter().map(|message| *message.hash()).collect())
            .unwrap_or_default()
    }

    /// The given validator's latest messages across all included eras.
    pub fn latest_message(&self, validator_id: &ValidatorId) -> HashSet<Arc<Message>> {
        self.latest
            .get(validator_id)
            .map(|messages| messages.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// The hashes of every validator's latest messages across all included eras.
    pub fn latest_message_hashes(&self) -> HashMap<ValidatorId, HashSet<BlockHash>> {
        self.latest
            .iter()
            .map(|(validator_id, messages)| {
                (
                    validator_id.clone(),
                    messages.iter().map(|message| *message.hash()).collect(),
                )
            })
            .collect()
    }

    /// Every validator's latest messages across all included eras.
    pub fn latest_messages(&self) -> HashMap<ValidatorId, HashSet<Arc<Message>>> {
        self.latest
            .iter()
            .map(|(validator_id, messages)| {
                (validator_id.clone(), messages.iter().cloned().collect())
            })
            .collect()
    }
}
