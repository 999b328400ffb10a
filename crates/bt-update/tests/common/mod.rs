//! Common test utilities for bt-update
//!
//! This module provides shared test infrastructure including:
//! - Constants for tags, commits and artifact names
//! - An in-memory release source with scripted failures
//! - Archive builders for release artifacts
//! - Fixtures for configuration and fake installations
//! - wiremock helpers shaped like the GitHub API

#![allow(dead_code)]
#![allow(unused_imports)]

pub mod archives;
pub mod constants;
pub mod fake_source;
pub mod fixtures;
pub mod mock_server;

pub use archives::*;
pub use constants::*;
pub use fake_source::*;
pub use fixtures::*;
pub use mock_server::*;
