//! Client-side entity cache and synchronization layer.
//!
//! Keeps three independently fetched collections consistent with each other
//! and with the server of record:
//!
//! - `businesses:list`
//! - `businesses:{id}:branches`
//! - `businesses:{id}:settings`
//!
//! # Components
//!
//! | Type | Role |
//! |---|---|
//! | [`CacheKey`] | Canonical hierarchical key; absent parents map to the `unknown` sentinel |
//! | [`EntityStore`] | Single writer of cache entries; atomic entry replacement and per-key generations |
//! | [`QueryOrchestrator`] | Read path: staleness policy, single-flight fetches, subscriptions |
//! | [`MutationCoordinator`] | Write path: local guards, one transport write, one application of cache effects |
//! | [`CacheSession`] | Session-scoped owner of the above; torn down on logout |
//!
//! The transport collaborator is the [`DashboardTransport`] trait. It owns wire
//! format, credentials and retries; this crate only sees parsed entities or a
//! classified [`TransportError`].

mod config;
mod error;
mod fetch;
mod key;
mod session;
mod transport;
mod value;

pub mod mutation;
pub mod query;
pub mod store;

mod invariants;

pub use config::{CacheConfig, ConfigError};
pub use error::{Error, Result, TransportError};
pub use key::{CacheKey, Collection, ParentRef, SENTINEL_SEGMENT, key_for};
pub use mutation::{MutationCoordinator, SettingsUpdate};
pub use query::{PendingFetch, QueryOrchestrator, QueryRead, ReadOptions};
pub use session::CacheSession;
pub use store::{CacheEffect, EntityStore, EntrySnapshot, FetchStatus};
pub use transport::DashboardTransport;
pub use value::EntityValue;
