use datasize::DataSize;
use serde::{Deserialize, Serialize};

use crate::types::TimeDiff;

/// Initial synchronizer configuration.
#[derive(Clone, DataSize, Debug, Deserialize, Serialize)]
pub struct Config {
    /// How many peers must report a fully synced DAG before synchronization completes.
    pub min_successful: usize,
    /// Whether to keep querying the initially selected peers, instead of re-selecting from the
    /// currently alive peers every round.
    pub memoize_nodes: bool,
    /// Whether peers that failed a round are excluded from later rounds, instead of retried.
    pub skip_failed_nodes_in_next_rounds: bool,
    /// The width of the rank window requested per round.
    pub step: u64,
    /// The rank the first round starts from.
    pub rank_start_from: u64,
    /// How long to wait for each message of a peer's slice stream before giving up on the peer.
    pub stream_timeout: TimeDiff,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            min_successful: 1,
            memoize_nodes: false,
            skip_failed_nodes_in_next_rounds: true,
            step: 100,
            rank_start_from: 0,
            stream_timeout: TimeDiff::from_seconds(10),
        }
    }
}
