//! Command implementations

pub mod self_cmd;
pub mod version;
