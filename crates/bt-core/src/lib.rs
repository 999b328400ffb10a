//! # bt-core
//!
//! Core library for the bt CLI providing:
//! - Runtime configuration types (network, retry, hosting, install)
//! - Hierarchical configuration loading (embedded defaults, file, environment)
//! - Retry execution engine with policy-based configuration

pub mod config;
pub mod error;
pub mod retry;
pub mod types;

pub use config::HierarchicalConfigLoader;
pub use error::{Error, Result};
pub use types::RuntimeConfig;
