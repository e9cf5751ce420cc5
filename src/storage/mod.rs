//! Storage backends: the local snapshot cache and the remote store contract.

pub mod memory;
pub mod sqlite;
pub mod traits;
