use std::collections::{BTreeSet, HashMap, HashSet};

use crate::types::{BlockHash, ValidatorId};

/// What the node has observed of one validator within one era.
///
/// Two witnesses are all the evidence equivocation ever needs; further equivocating messages add
/// no information and are not retained here.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ObservedValidatorBehavior<T> {
    /// The validator has produced no message in the era.
    Empty,
    /// The validator has exactly one latest message.
    Honest(T),
    /// The validator has two or more latest messages; these are the two smallest by hash.
    Equivocated(T, T),
}

impl<T> ObservedValidatorBehavior<T> {
    /// Returns `true` if the validator was seen equivocating.
    pub fn is_equivocated(&self) -> bool {
        matches!(self, ObservedValidatorBehavior::Equivocated(_, _))
    }

    /// Returns `true` if the validator produced no message.
    pub fn is_empty(&self) -> bool {
        matches!(self, ObservedValidatorBehavior::Empty)
    }
}

/// Per-era observed validator behavior, derived from the latest messages of each era.
#[derive(Clone, Debug, Default)]
pub struct EraObservedBehavior<T> {
    data: HashMap<BlockHash, HashMap<ValidatorId, ObservedValidatorBehavior<T>>>,
    /// The raw latest messages the classification was derived from.
    latest: HashMap<BlockHash, HashMap<ValidatorId, BTreeSet<T>>>,
}

impl<T: Clone + Ord> EraObservedBehavior<T> {
    /// Classifies the latest messages of each `(era, validator)` pair by cardinality: none seen,
    /// one seen, or at least two seen.
    ///
    /// When there are more than two witnesses, the two smallest are kept, so the choice is
    /// deterministic for any iteration order of the input.
    pub fn new(latest: HashMap<BlockHash, HashMap<ValidatorId, BTreeSet<T>>>) -> Self {
        let data = latest
            .iter()
            .map(|(key_block_hash, per_validator)| {
                let classified = per_validator
                    .iter()
                    .map(|(validator_id, messages)| {
                        let mut witnesses = messages.iter();
                        let behavior = match (witnesses.next(), witnesses.next()) {
                            (None, _) => ObservedValidatorBehavior::Empty,
                            (Some(single), None) => {
                                ObservedValidatorBehavior::Honest(single.clone())
                            }
                            (Some(first), Some(second)) => {
                                ObservedValidatorBehavior::Equivocated(
                                    first.clone(),
                                    second.clone(),
                                )
                            }
                        };
                        (validator_id.clone(), behavior)
                    })
                    .collect();
                (*key_block_hash, classified)
            })
            .collect();
        EraObservedBehavior { data, latest }
    }

    /// The key block hashes of all eras the behavior was derived for.
    pub fn key_block_hashes(&self) -> Vec<BlockHash> {
        self.data.keys().copied().collect()
    }

    /// The validators with any observed behavior in the given era.
    pub fn validators_in_era(&self, key_block_hash: &BlockHash) -> Vec<ValidatorId> {
        self.data
            .get(key_block_hash)
            .map(|per_validator| per_validator.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// The behavior observed of one validator in one era.
    pub fn status(
        &self,
        key_block_hash: &BlockHash,
        validator_id: &ValidatorId,
    ) -> ObservedValidatorBehavior<&T> {
        match self
            .data
            .get(key_block_hash)
            .and_then(|per_validator| per_validator.get(validator_id))
        {
            None | Some(ObservedValidatorBehavior::Empty) => ObservedValidatorBehavior::Empty,
            Some(ObservedValidatorBehavior::Honest(message)) => {
                ObservedValidatorBehavior::Honest(message)
            }
            Some(ObservedValidatorBehavior::Equivocated(first, second)) => {
                ObservedValidatorBehavior::Equivocated(first, second)
            }
        }
    }

    /// The union of equivocators across the requested eras.
    pub fn equivocators_visible_in_eras(
        &self,
        key_block_hashes: &HashSet<BlockHash>,
    ) -> HashSet<ValidatorId> {
        self.data
            .iter()
            .filter(|(key_block_hash, _)| key_block_hashes.contains(key_block_hash))
            .flat_map(|(_, per_validator)| {
                per_validator
                    .iter()
                    .filter(|(_, behavior)| behavior.is_equivocated())
                    .map(|(validator_id, _)| validator_id.clone())
            })
            .collect()
    }

    /// The raw latest messages of one era the classification was derived from.
    pub fn latest_messages_in_era(
        &self,
        key_block_hash: &BlockHash,
    ) -> HashMap<ValidatorId, BTreeSet<T>> {
        self.latest
            .get(key_block_hash)
            .cloned()
            .unwrap_or_default()
    }
}
