//! # fitsync engine
//!
//! Keeps the fitsync query cache consistent with the fitness API.
//!
//! This crate provides:
//! - the auth gate and session lifecycle (login, logout, purge)
//! - an [`ApiTransport`] abstraction with an HTTP adapter and a scripted mock
//! - cached reads with stale checks, retry and fetch cancellation
//! - confirm-then-update and optimistic writes with snapshot rollback
//! - the cross-entity cascade table
//! - per-entity handles building the reads and writes of each entity type
//!
//! ## Architecture
//!
//! Every cache change is expressed as [`CacheRule`](fitsync_cache::CacheRule)
//! data and executed by the cache in one exclusive section. Writes follow
//! one of two paths:
//! 1. Confirm-then-update: call, then apply reconcile and cascade rules
//! 2. Optimistic: lock the touched roots, snapshot, apply speculative rules,
//!    call, then reconcile or restore the snapshot
//!
//! ## Key Invariants
//!
//! - No network call is made for an authenticated operation without a token
//! - A failed optimistic write leaves the cache exactly as it found it
//! - A read cancelled or purged while in flight never stores its result
//! - Nothing cascades that is not in [`CASCADES`]
//! - Notification counters never go negative

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod cascade;
mod config;
pub mod entities;
mod error;
mod http;
mod session;
mod state;
mod sync;
mod transport;

pub use auth::{CredentialStore, MemoryCredentialStore, Navigator, NoopNavigator, SessionToken};
pub use cascade::{CascadeTarget, Trigger, CASCADES};
pub use config::{RetryConfig, SyncConfig};
pub use entities::group_workouts::{GroupWorkoutFilter, GroupWorkouts};
pub use entities::gyms::Gyms;
pub use entities::logs::{LogFilter, Logs};
pub use entities::notifications::{NotificationFilter, Notifications};
pub use entities::posts::{FeedFilter, Posts};
pub use entities::programs::Programs;
pub use entities::users::Users;
pub use entities::workouts::Workouts;
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpRequest, HttpResponse, HttpTransport};
pub use state::{SessionState, SyncStats};
pub use sync::{Mutation, ReadQuery, Reconcile, Speculate, Synchronizer, WriteMode};
pub use transport::{ApiTransport, MockReply, MockTransport, RecordedCall};
