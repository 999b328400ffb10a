//! Retry execution engine with policy-based configuration
//!
//! Every network operation in bt (release lookups, artifact and checksum
//! downloads) runs through this engine so that attempts, backoff and logging
//! behave the same everywhere.
//!
//! # Features
//!
//! - Strategies: None, Fixed, Exponential backoff with a delay cap
//! - Optional jitter
//! - Predicates that stop retrying on permanent errors
//! - Observable attempts via the `RetryObserver` trait
//! - Injectable `Sleeper` so tests never wait on a real clock
//!
//! # Example
//!
//! ```rust,no_run
//! use bt_core::retry::{RetryError, RetryExecutorBuilder, TracingObserver};
//! use bt_core::types::RetryPolicy;
//!
//! async fn example() -> Result<String, RetryError<std::io::Error>> {
//!     RetryExecutorBuilder::new()
//!         .with_policy(RetryPolicy::default())
//!         .with_observer(TracingObserver::new("list releases"))
//!         .build()
//!         .execute(|| async { Ok("success".to_string()) })
//!         .await
//! }
//! ```

mod error;
mod executor;
mod observer;
mod sleeper;
mod strategies;

pub use error::RetryError;
pub use executor::{RetryExecutor, RetryExecutorBuilder};
pub use observer::{NoOpObserver, RetryObserver, TracingObserver};
pub use sleeper::{RecordingSleeper, Sleeper, TokioSleeper};
pub use strategies::{calculate_delay, AlwaysRetry, RetryPredicate};
