//! # casper-blockdag
//!
//! The block DAG layer of a Casper blockchain node: storage and
//! representation of the block DAG, per-era tip tracking and equivocation
//! detection, the block validation pipeline, and initial DAG synchronization
//! with peers.
//!
//! The crate deliberately stops at the DAG layer's edges. Raw block
//! persistence, cryptographic key management, the execution engine and node
//! discovery are consumed through the traits in
//! [`components::block_validator::traits`] and
//! [`components::initial_synchronizer::traits`].

#![doc(html_root_url = "https://docs.rs/casper-blockdag/0.1.0")]

pub mod components;
pub mod crypto;
#[cfg(test)]
pub(crate) mod testing;
pub mod types;
pub mod utils;

pub use components::{
    block_dag::{DagRepresentation, DagStorage, EraObservedBehavior, ObservedValidatorBehavior},
    block_validator::{BlockError, BlockValidator},
    initial_synchronizer::{InitialSynchronizer, SynchronizationError},
};
pub use types::{
    Block, BlockHash, BlockHeader, BlockSummary, Deploy, DeployHash, Message, TimeDiff, Timestamp,
    ValidatorId,
};
