//! # fitsync testkit
//!
//! Test utilities for fitsync.
//!
//! This crate provides:
//! - JSON fixtures shaped like the API's records
//! - Property-based test generators using proptest
//! - A scripted synchronizer harness over [`MockTransport`](fitsync_engine::MockTransport)
//! - Tracing initialisation for test binaries
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fitsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn feed_is_cached() {
//!     let h = Harness::logged_in();
//!     h.transport.respond(HttpMethod::Get, "/posts/feed/", page(vec![post(1, "hi")]));
//!     h.sync.posts().feed(&FeedFilter::default()).await.unwrap();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::harness::*;
    pub use crate::init_tracing;
}

pub use fixtures::*;
pub use generators::*;
pub use harness::*;

/// Installs a `tracing` subscriber filtered by `RUST_LOG` (default `warn`).
///
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
