use datasize::DataSize;
use serde::{Deserialize, Serialize};

use crate::types::{BlockHash, TimeDiff};

/// Block validator configuration.
#[derive(Clone, DataSize, Debug, Deserialize, Serialize)]
pub struct Config {
    /// The chain name every accepted block must carry.
    pub chain_name: String,
    /// The genesis block hash, once known. Enables the parents-canonicality check; blocks
    /// validated before genesis is known skip it.
    pub genesis_block_hash: Option<BlockHash>,
    /// How far into the future a block timestamp may lie before the block is dropped.
    pub max_clock_drift: TimeDiff,
    /// The smallest time to live a deploy may declare.
    pub min_deploy_ttl: TimeDiff,
    /// The largest time to live a deploy may declare.
    pub max_deploy_ttl: TimeDiff,
    /// The largest number of dependencies a deploy may declare.
    pub max_deploy_dependencies: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            chain_name: "casper".to_string(),
            genesis_block_hash: None,
            max_clock_drift: TimeDiff::from_seconds(15),
            min_deploy_ttl: TimeDiff::from_seconds(60 * 60),
            max_deploy_ttl: TimeDiff::from_seconds(24 * 60 * 60),
            max_deploy_dependencies: 10,
        }
    }
}
