//! Type definitions shared across bt crates

mod runtime_config;

pub use runtime_config::*;
