//! Initial synchronizer
//!
//! Pulls the block DAG from peers in rank windows when the node joins the network. Each round
//! requests one window from every candidate peer in parallel, enforces that the streamed
//! summaries stay within the window, and hands them to the download pipeline; a peer whose
//! stream ends without reaching the window's end is fully synced for that round. Once enough
//! peers report a fully synced DAG the rounds stop, and the caller is left with a handle that
//! completes when all scheduled downloads have.
//!
//! Faulty peers are tolerated: a peer that violates the window, times out or fails its stream
//! is recorded and, depending on configuration, retried or excluded. Synchronization as a whole
//! only fails once the candidate list can no longer produce the required number of successes.

pub mod traits;

mod config;

use std::collections::HashSet;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{
    future::{self, BoxFuture},
    stream::FuturesUnordered,
    Future, FutureExt, StreamExt,
};
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::types::BlockHash;
pub use config::Config;
use traits::{DagSliceSource, DownloadScheduler, NodeDiscovery, NodeIdT};

/// An error during initial DAG synchronization.
///
/// All variants but `PeersExhausted` describe the failure of a single peer; they are recorded
/// against that peer while synchronization continues with the rest.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SynchronizationError {
    /// A peer streamed a summary whose rank lies outside the requested window.
    #[error(
        "peer {peer} returned block {block_hash} with rank {rank} outside [{start_rank}, {end_rank}]"
    )]
    RankOutsideWindow {
        /// The offending peer.
        peer: String,
        /// The offending summary.
        block_hash: BlockHash,
        /// The summary's rank.
        rank: u64,
        /// The window's inclusive lower bound.
        start_rank: u64,
        /// The window's inclusive upper bound.
        end_rank: u64,
    },

    /// A peer streamed the same summary twice within one window.
    #[error("peer {peer} returned duplicate block {block_hash} within one window")]
    DuplicateSummary {
        /// The offending peer.
        peer: String,
        /// The repeated summary.
        block_hash: BlockHash,
    },

    /// A peer's stream produced no message within the configured timeout.
    #[error("stream from peer {peer} timed out")]
    StreamTimeout {
        /// The unresponsive peer.
        peer: String,
    },

    /// A peer's stream failed.
    #[error("stream from peer {peer} failed: {reason}")]
    Stream {
        /// The failing peer.
        peer: String,
        /// The transport-level reason.
        reason: String,
    },

    /// The candidate list ran out before enough peers reported a fully synced DAG.
    #[error("ran out of peers before {min_successful} of them reported a fully synced DAG")]
    PeersExhausted {
        /// The required number of fully synced peers.
        min_successful: usize,
    },
}

/// The outcome of streaming one window from one peer.
struct PeerRound {
    /// The highest rank the peer returned in this window, if any.
    max_rank: Option<u64>,
    /// Whether the stream ended without reaching the window's end.
    fully_synced: bool,
    /// The downloads scheduled for the streamed summaries.
    downloads: Vec<BoxFuture<'static, ()>>,
}

/// Completes once every download scheduled during synchronization has completed.
///
/// Dropping the handle drops the scheduled downloads, cancelling them.
pub struct SyncHandle {
    downloads: BoxFuture<'static, ()>,
}

impl SyncHandle {
    fn new(downloads: Vec<BoxFuture<'static, ()>>) -> Self {
        let downloads = async move {
            let mut pending: FuturesUnordered<_> = downloads.into_iter().collect();
            while pending.next().await.is_some() {}
        }
        .boxed();
        SyncHandle { downloads }
    }
}

impl Future for SyncHandle {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, ctx: &mut Context<'_>) -> Poll<Self::Output> {
        self.downloads.as_mut().poll_unpin(ctx)
    }
}

/// The initial synchronizer component.
#[derive(Debug)]
pub struct InitialSynchronizer<D, S, W> {
    config: Config,
    node_discovery: D,
    slice_source: S,
    download_scheduler: W,
}

impl<D, S, W> InitialSynchronizer<D, S, W> {
    /// Creates a new initial synchronizer instance.
    pub fn new(config: Config, node_discovery: D, slice_source: S, download_scheduler: W) -> Self {
        InitialSynchronizer {
            config,
            node_discovery,
            slice_source,
            download_scheduler,
        }
    }

    /// Synchronizes the DAG slice by slice until `min_successful` peers report it fully synced.
    ///
    /// Returns a handle completing when all scheduled downloads have completed. Dropping the
    /// future returned by this method cancels the in-flight peer streams; dropping the handle
    /// cancels the scheduled downloads.
    pub async fn sync<I>(&self) -> Result<SyncHandle, SynchronizationError>
    where
        I: NodeIdT,
        D: NodeDiscovery<I>,
        S: DagSliceSource<I>,
        W: DownloadScheduler<I>,
    {
        let memoized: Option<Vec<I>> = if self.config.memoize_nodes {
            Some(self.node_discovery.recently_alive_peers().await)
        } else {
            None
        };
        let mut excluded: HashSet<I> = HashSet::new();
        let mut start_rank = self.config.rank_start_from;
        let mut downloads: Vec<BoxFuture<'static, ()>> = Vec::new();

        loop {
            let candidates: Vec<I> = match &memoized {
                Some(peers) => peers.clone(),
                None => self.node_discovery.recently_alive_peers().await,
            }
            .into_iter()
            .filter(|peer| !excluded.contains(peer))
            .collect();
            if candidates.len() < self.config.min_successful {
                return Err(SynchronizationError::PeersExhausted {
                    min_successful: self.config.min_successful,
                });
            }

            let end_rank = start_rank + self.config.step;
            info!(
                start_rank,
                end_rank,
                peers = candidates.len(),
                "requesting DAG slice"
            );
            let round = future::join_all(candidates.into_iter().map(|peer| async move {
                let result = self.pull_slice(peer.clone(), start_rank, end_rank).await;
                (peer, result)
            }))
            .await;

            let mut fully_synced_peers = 0;
            let mut max_rank_seen: Option<u64> = None;
            for (peer, result) in round {
                match result {
                    Ok(mut peer_round) => {
                        downloads.append(&mut peer_round.downloads);
                        if let Some(rank) = peer_round.max_rank {
                            max_rank_seen =
                                Some(max_rank_seen.map_or(rank, |max: u64| max.max(rank)));
                        }
                        if peer_round.fully_synced {
                            fully_synced_peers += 1;
                        }
                    }
                    Err(error) => {
                        warn!(%peer, %error, "peer failed during initial synchronization");
                        if self.config.skip_failed_nodes_in_next_rounds {
                            excluded.insert(peer);
                        }
                    }
                }
            }

            if fully_synced_peers >= self.config.min_successful {
                info!(
                    fully_synced_peers,
                    downloads = downloads.len(),
                    "initial synchronization complete"
                );
                return Ok(SyncHandle::new(downloads));
            }

            // Continue from the highest rank any successful peer reached.
            if let Some(rank) = max_rank_seen {
                if rank > start_rank {
                    start_rank = rank;
                }
            }
        }
    }

    /// Streams one window from one peer, scheduling a download per summary.
    async fn pull_slice<I>(
        &self,
        peer: I,
        start_rank: u64,
        end_rank: u64,
    ) -> Result<PeerRound, SynchronizationError>
    where
        I: NodeIdT,
        S: DagSliceSource<I>,
        W: DownloadScheduler<I>,
    {
        let mut stream = self
            .slice_source
            .stream_dag_slice(peer.clone(), start_rank, end_rank)
            .await?;
        let mut seen: HashSet<BlockHash> = HashSet::new();
        let mut max_rank: Option<u64> = None;
        let mut fully_synced = true;
        let mut downloads = Vec::new();

        loop {
            let item = timeout(self.config.stream_timeout.into(), stream.next())
                .await
                .map_err(|_| SynchronizationError::StreamTimeout {
                    peer: peer.to_string(),
                })?;
            let summary = match item {
                None => break,
                Some(Ok(summary)) => summary,
                Some(Err(error)) => return Err(error),
            };

            let rank = summary.rank();
            if rank < start_rank || rank > end_rank {
                return Err(SynchronizationError::RankOutsideWindow {
                    peer: peer.to_string(),
                    block_hash: *summary.block_hash(),
                    rank,
                    start_rank,
                    end_rank,
                });
            }
            if !seen.insert(*summary.block_hash()) {
                return Err(SynchronizationError::DuplicateSummary {
                    peer: peer.to_string(),
                    block_hash: *summary.block_hash(),
                });
            }
            // A summary at the window's end means the peer has more: another round is needed.
            if rank >= end_rank {
                fully_synced = false;
            }
            max_rank = Some(max_rank.map_or(rank, |max: u64| max.max(rank)));
            debug!(%peer, block_hash = %summary.block_hash(), rank, "scheduling block download");
            downloads.push(self.download_scheduler.schedule(summary, peer.clone()));
        }

        Ok(PeerRound {
            max_rank,
            fully_synced,
            downloads,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::Arc,
    };

    use async_trait::async_trait;
    use datasize::DataSize;
    use derive_more::Display;
    use futures::stream;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        testing::{BlockBuilder, TestRng},
        types::{BlockSummary, TimeDiff, Timestamp},
    };

    #[derive(DataSize, Debug, Ord, PartialOrd, Copy, Clone, Display, Hash, Eq, PartialEq)]
    struct NodeId(u8);

    struct TestDiscovery(Vec<NodeId>);

    #[async_trait]
    impl NodeDiscovery<NodeId> for TestDiscovery {
        async fn recently_alive_peers(&self) -> Vec<NodeId> {
            self.0.clone()
        }
    }

    /// Serves each peer's configured summaries, window-filtered for honest peers and unfiltered
    /// for misbehaving ones.
    #[derive(Default)]
    struct TestSliceSource {
        summaries: HashMap<NodeId, Vec<BlockSummary>>,
        misbehaving: HashSet<NodeId>,
    }

    #[async_trait]
    impl DagSliceSource<NodeId> for TestSliceSource {
        async fn stream_dag_slice(
            &self,
            peer: NodeId,
            start_rank: u64,
            end_rank: u64,
        ) -> Result<traits::SummaryStream, SynchronizationError> {
            let all = self.summaries.get(&peer).cloned().unwrap_or_default();
            let served: Vec<BlockSummary> = if self.misbehaving.contains(&peer) {
                all
            } else {
                all.into_iter()
                    .filter(|summary| summary.rank() >= start_rank && summary.rank() <= end_rank)
                    .collect()
            };
            Ok(stream::iter(served.into_iter().map(Ok)).boxed())
        }
    }

    #[derive(Clone, Default)]
    struct TestScheduler {
        scheduled: Arc<Mutex<Vec<BlockHash>>>,
    }

    impl DownloadScheduler<NodeId> for TestScheduler {
        fn schedule(&self, summary: BlockSummary, _source: NodeId) -> BoxFuture<'static, ()> {
            self.scheduled.lock().push(*summary.block_hash());
            future::ready(()).boxed()
        }
    }

    /// A chain of distinct summaries with ranks `0..=max_rank`.
    fn summaries_up_to(rng: &mut TestRng, max_rank: u64) -> Vec<BlockSummary> {
        (0..=max_rank)
            .map(|rank| {
                BlockBuilder::new()
                    .rank(rank)
                    .timestamp(Timestamp::from(1_596_763_000_000 + rank))
                    .build()
                    .summary()
                    .clone()
            })
            .collect()
    }

    fn synchronizer(
        config: Config,
        peers: Vec<NodeId>,
        slice_source: TestSliceSource,
    ) -> (
        InitialSynchronizer<TestDiscovery, TestSliceSource, TestScheduler>,
        TestScheduler,
    ) {
        let scheduler = TestScheduler::default();
        let synchronizer = InitialSynchronizer::new(
            config,
            TestDiscovery(peers),
            slice_source,
            scheduler.clone(),
        );
        (synchronizer, scheduler)
    }

    #[tokio::test]
    async fn two_well_behaved_peers_sync_in_one_round() {
        let mut rng = TestRng::new();
        let chain = summaries_up_to(&mut rng, 10);
        let mut slice_source = TestSliceSource::default();
        slice_source.summaries.insert(NodeId(0), chain.clone());
        slice_source.summaries.insert(NodeId(1), chain.clone());

        let config = Config {
            min_successful: 1,
            step: 100,
            ..Default::default()
        };
        let (synchronizer, scheduler) =
            synchronizer(config, vec![NodeId(0), NodeId(1)], slice_source);

        let handle = synchronizer.sync().await.expect("sync should complete");
        handle.await;

        // Every summary was scheduled; both peers contributed, deduplication across peers is
        // the download pipeline's job.
        let scheduled = scheduler.scheduled.lock();
        for summary in &chain {
            assert!(scheduled.contains(summary.block_hash()));
        }
        assert_eq!(2 * chain.len(), scheduled.len());
    }

    #[tokio::test]
    async fn sync_advances_in_rank_windows() {
        let mut rng = TestRng::new();
        let chain = summaries_up_to(&mut rng, 25);
        let mut slice_source = TestSliceSource::default();
        slice_source.summaries.insert(NodeId(0), chain.clone());

        let config = Config {
            min_successful: 1,
            step: 10,
            ..Default::default()
        };
        let (synchronizer, scheduler) = synchronizer(config, vec![NodeId(0)], slice_source);

        let handle = synchronizer.sync().await.expect("sync should complete");
        handle.await;

        let scheduled = scheduler.scheduled.lock();
        for summary in &chain {
            assert!(scheduled.contains(summary.block_hash()));
        }
    }

    #[tokio::test]
    async fn out_of_window_peer_is_excluded_but_sync_completes() {
        let mut rng = TestRng::new();
        let chain = summaries_up_to(&mut rng, 5);
        let mut slice_source = TestSliceSource::default();
        slice_source.summaries.insert(NodeId(0), chain.clone());
        // Peer 1 serves a summary far beyond the window, unfiltered.
        slice_source
            .summaries
            .insert(NodeId(1), summaries_up_to(&mut rng, 999));
        slice_source.misbehaving.insert(NodeId(1));

        let config = Config {
            min_successful: 1,
            step: 10,
            skip_failed_nodes_in_next_rounds: true,
            ..Default::default()
        };
        let (synchronizer, scheduler) =
            synchronizer(config, vec![NodeId(0), NodeId(1)], slice_source);

        let handle = synchronizer.sync().await.expect("sync should complete");
        handle.await;

        let scheduled = scheduler.scheduled.lock();
        for summary in &chain {
            assert!(scheduled.contains(summary.block_hash()));
        }
    }

    #[tokio::test]
    async fn duplicate_summary_fails_the_peer() {
        let mut rng = TestRng::new();
        let mut chain = summaries_up_to(&mut rng, 3);
        chain.push(chain[0].clone());
        let mut slice_source = TestSliceSource::default();
        slice_source.summaries.insert(NodeId(0), chain);

        let config = Config {
            min_successful: 1,
            step: 10,
            ..Default::default()
        };
        let (synchronizer, _scheduler) = synchronizer(config, vec![NodeId(0)], slice_source);

        assert_eq!(
            Err(SynchronizationError::PeersExhausted { min_successful: 1 }),
            synchronizer.sync().await.map(|_| ())
        );
    }

    #[tokio::test]
    async fn sync_fails_once_peers_are_exhausted() {
        let mut rng = TestRng::new();
        let mut slice_source = TestSliceSource::default();
        slice_source
            .summaries
            .insert(NodeId(0), summaries_up_to(&mut rng, 999));
        slice_source.misbehaving.insert(NodeId(0));

        let config = Config {
            min_successful: 1,
            step: 10,
            skip_failed_nodes_in_next_rounds: true,
            ..Default::default()
        };
        let (synchronizer, _scheduler) = synchronizer(config, vec![NodeId(0)], slice_source);

        assert_eq!(
            Err(SynchronizationError::PeersExhausted { min_successful: 1 }),
            synchronizer.sync().await.map(|_| ())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_times_out() {
        struct SilentSliceSource;

        #[async_trait]
        impl DagSliceSource<NodeId> for SilentSliceSource {
            async fn stream_dag_slice(
                &self,
                _peer: NodeId,
                _start_rank: u64,
                _end_rank: u64,
            ) -> Result<traits::SummaryStream, SynchronizationError> {
                Ok(stream::pending().boxed())
            }
        }

        let config = Config {
            min_successful: 1,
            stream_timeout: TimeDiff::from_seconds(1),
            ..Default::default()
        };
        let scheduler = TestScheduler::default();
        let synchronizer = InitialSynchronizer::new(
            config,
            TestDiscovery(vec![NodeId(0)]),
            SilentSliceSource,
            scheduler,
        );

        assert_eq!(
            Err(SynchronizationError::PeersExhausted { min_successful: 1 }),
            synchronizer.sync().await.map(|_| ())
        );
    }
}
