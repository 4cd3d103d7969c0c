//! The external services initial synchronization consumes.

use std::{
    fmt::{Debug, Display},
    hash::Hash,
};

use async_trait::async_trait;
use futures::{future::BoxFuture, stream::BoxStream};

use super::SynchronizationError;
use crate::types::BlockSummary;

/// A peer identifier.
pub trait NodeIdT: Clone + Debug + Display + Eq + Hash + Send + Sync + 'static {}

impl<T> NodeIdT for T where T: Clone + Debug + Display + Eq + Hash + Send + Sync + 'static {}

/// Node discovery, to the extent synchronization needs it.
#[async_trait]
pub trait NodeDiscovery<I>: Send + Sync {
    /// The peers that recently responded to liveness checks.
    async fn recently_alive_peers(&self) -> Vec<I>;
}

/// A stream of block summaries from one peer's DAG slice.
pub type SummaryStream = BoxStream<'static, Result<BlockSummary, SynchronizationError>>;

/// The gossip-layer request for a DAG slice: all block summaries a peer holds with ranks in the
/// requested window.
#[async_trait]
pub trait DagSliceSource<I>: Send + Sync {
    /// Requests the summaries with `start_rank <= rank <= end_rank` from the given peer.
    async fn stream_dag_slice(
        &self,
        peer: I,
        start_rank: u64,
        end_rank: u64,
    ) -> Result<SummaryStream, SynchronizationError>;
}

/// The download pipeline summaries are handed to once they pass the window checks; dependency
/// resolution and validation happen there.
pub trait DownloadScheduler<I>: Send + Sync {
    /// Schedules the full block behind `summary` for download from `source`.
    ///
    /// The returned future resolves once the download has completed; dropping it must cancel
    /// the download, so that cancelling a sync handle propagates.
    fn schedule(&self, summary: BlockSummary, source: I) -> BoxFuture<'static, ()>;
}
