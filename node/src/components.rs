//! Components of the block DAG layer.
//!
//! Each component lives in its own module and is a plain struct: the DAG storage is shared
//! behind cheap clones of its representation handle, the validator and synchronizer borrow the
//! external services they need through the traits in their `traits` submodules.

pub mod block_dag;
pub mod block_validator;
pub mod initial_synchronizer;
