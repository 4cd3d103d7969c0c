use thiserror::Error;

use crate::types::{BlockHash, MessageError};

/// Block DAG storage errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A parent, justification or key block referenced by the inserted message is not present in
    /// the DAG. The caller should fetch the dependency and retry.
    #[error("missing DAG dependency: {0}")]
    MissingDependency(BlockHash),

    /// The message's identity does not match the hash of its header. This indicates corrupted
    /// input or storage and is fatal to the process.
    #[error("corrupt block {block_hash}: header hashes to {actual}")]
    Corrupt {
        /// The identity the message claimed.
        block_hash: BlockHash,
        /// The hash its header actually has.
        actual: BlockHash,
    },

    /// The summary could not be converted into a DAG vertex. Validation rejects such summaries
    /// before insertion, so hitting this means the caller skipped validation.
    #[error(transparent)]
    Malformed(#[from] MessageError),
}

/// Result type for DAG storage operations.
pub type Result<T> = std::result::Result<T, Error>;
