//! Block DAG storage
//!
//! The append-only store of consensus messages, kept as vertices of a directed acyclic graph.
//! Alongside the raw message records the storage maintains the indices the rest of the node
//! queries: first-hop children, reverse justification lookup, per-era latest messages and a
//! topological rank index.
//!
//! Latest messages are the heart of tip tracking: on every insert of a message `m` by validator
//! `v` in era `e`, any previous latest message of `v` that `m` transitively cites within `e` is
//! dropped, and `m` is added. A validator with two or more latest messages in a single era has
//! equivocated in that era; the same validator legitimately has several latest messages across
//! sibling eras, which is why the per-era and global views are distinct types.

mod error;
mod observed_behavior;
mod representation;
mod state;
mod tips;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::types::BlockSummary;
pub use error::Error;
pub(crate) use error::Result;
pub use observed_behavior::{EraObservedBehavior, ObservedValidatorBehavior};
pub use representation::{BlockInfo, DagRepresentation, TopoSortIter};
pub use tips::{EraTips, GlobalTips};

use state::DagState;

/// The block DAG storage component.
///
/// Inserts are serialized through a write lock, making each one atomic with respect to all
/// index updates; readers work through cheap [`DagRepresentation`](struct.DagRepresentation.html)
/// handles.
#[derive(Debug, Default)]
pub struct DagStorage {
    state: Arc<RwLock<DagState>>,
}

impl DagStorage {
    /// Creates an empty DAG storage.
    pub fn new() -> Self {
        DagStorage::default()
    }

    /// Inserts a validated block summary into the DAG and returns an updated representation
    /// handle.
    ///
    /// The operation is idempotent for identical repeated inserts. It fails with
    /// [`Error::MissingDependency`](enum.Error.html) if a parent, justification or key block is
    /// absent, and with [`Error::Corrupt`](enum.Error.html) if the summary's identity does not
    /// match its header.
    pub fn insert(&self, summary: &BlockSummary) -> Result<DagRepresentation> {
        self.state.write().insert(summary)?;
        Ok(self.get_representation())
    }

    /// Returns a query handle onto the DAG.
    pub fn get_representation(&self) -> DagRepresentation {
        DagRepresentation {
            state: Arc::clone(&self.state),
        }
    }

    /// Durability barrier.
    ///
    /// The DAG index is kept in memory and rebuilt from the raw block store on restart; the raw
    /// blocks themselves are persisted by the block storage this layer consumes. There is
    /// nothing further to flush here, so the barrier always succeeds.
    pub fn checkpoint(&self) -> Result<()> {
        Ok(())
    }

    /// Removes all state.
    ///
    /// Test support; never called on a running node.
    pub fn clear(&self) {
        info!("clearing block DAG storage");
        self.state.write().clear();
    }
}
