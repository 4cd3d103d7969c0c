//! Common types used across multiple components.

mod block;
mod deploy;
mod message;
mod timestamp;

pub use block::{
    Block, BlockBody, BlockHash, BlockHeader, BlockSummary, Bond, Justification, MessageType,
    ProtocolVersion, ValidatorId,
};
pub use deploy::{Approval, Deploy, DeployBody, DeployHash, DeployHeader};
pub use message::{Error as MessageError, Message};
pub use timestamp::{TimeDiff, Timestamp};
