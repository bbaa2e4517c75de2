//! Read path over the [`EntityStore`].
//!
//! # Purpose
//!
//! * Decides when a read must fetch (absent, idle or stale entries).
//! * Collapses concurrent reads of one key into a single in-flight fetch.
//! * Surfaces fetch failures on the entry instead of the caller's control flow.
//!
//! # Mental model
//!
//! * [`QueryOrchestrator::read`] never blocks. It returns the entry as it is
//!   now plus, when a fetch is running, a [`PendingFetch`] that resolves with
//!   the settled entry.
//! * The first reader of a stale key becomes the fetch leader: its fetcher is
//!   spawned and the outcome is published to every reader that joined.
//! * A stale value stays visible while its refetch runs and after the refetch
//!   fails.
//!
//! # Concurrency & ordering
//!
//! * Fetch tasks are spawned on the current Tokio runtime; the store lock is
//!   never held across their await points.
//! * Only the most recently initiated fetch of a key may write it. Older
//!   responses settle their readers with the current entry and are dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use crate::store::{EntityStore, EntrySnapshot, FetchTicket, Settlement};
use crate::{CacheEffect, CacheKey, TransportError};

/// Per-read fetch policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadOptions {
	/// Disabled reads never fetch and abandon any fetch already running.
	pub enabled: bool,
	/// Freshness window; older values are refetched on the next read.
	pub stale_after: Duration,
}

impl Default for ReadOptions {
	fn default() -> Self {
		Self {
			enabled: true,
			stale_after: Duration::ZERO,
		}
	}
}

impl ReadOptions {
	/// Enabled read with the given freshness window.
	pub fn fresh_for(stale_after: Duration) -> Self {
		Self {
			enabled: true,
			stale_after,
		}
	}

	pub fn disabled() -> Self {
		Self {
			enabled: false,
			..Self::default()
		}
	}

	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}
}

/// Result of a non-blocking read.
pub struct QueryRead<V: Clone + Send + Sync + 'static> {
	/// The entry at the time of the read.
	pub snapshot: EntrySnapshot<V>,
	/// Set while a fetch for the key is in flight.
	pub pending: Option<PendingFetch<V>>,
}

impl<V: Clone + Send + Sync + 'static> QueryRead<V> {
	/// Waits for the in-flight fetch, if any, and returns the settled entry.
	pub async fn settled(self) -> EntrySnapshot<V> {
		match self.pending {
			Some(pending) => pending.settled().await,
			None => self.snapshot,
		}
	}
}

/// Outcome of the fetch a reader is attached to.
pub struct PendingFetch<V: Clone + Send + Sync + 'static> {
	key: CacheKey,
	outcome: watch::Receiver<Option<EntrySnapshot<V>>>,
	store: Arc<EntityStore<V>>,
}

impl<V: Clone + Send + Sync + 'static> PendingFetch<V> {
	/// Resolves once the fetch settles, is superseded, or its leader is dropped.
	pub async fn settled(mut self) -> EntrySnapshot<V> {
		loop {
			let current = self.outcome.borrow_and_update().clone();
			if let Some(snapshot) = current {
				return snapshot;
			}
			if self.outcome.changed().await.is_err() {
				return self.store.snapshot(&self.key);
			}
		}
	}
}

/// Drives the fetch lifecycle of every cache key.
pub struct QueryOrchestrator<V> {
	store: Arc<EntityStore<V>>,
}

impl<V: Clone + Send + Sync + 'static> Default for QueryOrchestrator<V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<V: Clone + Send + Sync + 'static> QueryOrchestrator<V> {
	pub fn new() -> Self {
		Self::with_store(Arc::new(EntityStore::new()))
	}

	pub fn with_store(store: Arc<EntityStore<V>>) -> Self {
		Self { store }
	}

	pub fn store(&self) -> &Arc<EntityStore<V>> {
		&self.store
	}

	/// Reads `key`, starting a fetch when the entry is absent, idle or stale.
	///
	/// `fetcher` is only called when this read leads a new fetch. Must be called
	/// from within a Tokio runtime.
	pub fn read<F, Fut>(&self, key: &CacheKey, fetcher: F, options: ReadOptions) -> QueryRead<V>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<V, TransportError>> + Send + 'static,
	{
		if !options.enabled {
			if self.store.abandon(key) {
				tracing::debug!(key = %key, "cache.fetch.abandoned");
			}
			let generation = self.store.snapshot(key).generation;
			return QueryRead {
				snapshot: EntrySnapshot::idle(key.clone(), generation),
				pending: None,
			};
		}

		match self.store.begin_fetch(key, Instant::now(), options.stale_after) {
			FetchTicket::Fresh(snapshot) | FetchTicket::Sentinel(snapshot) => QueryRead { snapshot, pending: None },
			FetchTicket::Joined { snapshot, outcome } => QueryRead {
				snapshot,
				pending: Some(self.pending(key, outcome)),
			},
			FetchTicket::Started { snapshot, lease } => {
				tracing::debug!(key = %key, generation = lease.generation(), "cache.fetch.start");
				let pending = self.pending(key, lease.outcome());
				let fetch = fetcher();
				tokio::spawn(async move {
					let result = fetch.await;
					if let Settlement::Applied(settled) = lease.settle(result, Instant::now()) {
						tracing::debug!(key = %settled.key, status = ?settled.status, "cache.fetch.settled");
					}
				});
				QueryRead {
					snapshot,
					pending: Some(pending),
				}
			}
		}
	}

	/// Reads `key` and waits for any resulting fetch to settle.
	pub async fn fetch<F, Fut>(&self, key: &CacheKey, fetcher: F, options: ReadOptions) -> EntrySnapshot<V>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<V, TransportError>> + Send + 'static,
	{
		self.read(key, fetcher, options).settled().await
	}

	/// Marks `key` stale without clearing the displayed value.
	pub fn invalidate(&self, key: &CacheKey) {
		tracing::debug!(key = %key, "cache.invalidate");
		self.store.invalidate(key);
	}

	/// Writes `value` as the authoritative entry for `key`.
	pub fn set_value(&self, key: &CacheKey, value: V) {
		tracing::debug!(key = %key, "cache.set_value");
		self.store.set(key, value, Instant::now());
	}

	/// Applies cache effects as one atomic batch.
	pub fn apply_effects(&self, effects: Vec<CacheEffect<V>>) {
		if effects.is_empty() {
			return;
		}
		self.store.apply(effects, Instant::now());
	}

	pub fn snapshot(&self, key: &CacheKey) -> EntrySnapshot<V> {
		self.store.snapshot(key)
	}

	pub fn subscribe(&self, key: &CacheKey) -> watch::Receiver<EntrySnapshot<V>> {
		self.store.subscribe(key)
	}

	/// Drops every entry; in-flight responses are discarded when they arrive.
	pub fn clear(&self) {
		self.store.clear();
	}

	fn pending(&self, key: &CacheKey, outcome: watch::Receiver<Option<EntrySnapshot<V>>>) -> PendingFetch<V> {
		PendingFetch {
			key: key.clone(),
			outcome,
			store: Arc::clone(&self.store),
		}
	}
}
