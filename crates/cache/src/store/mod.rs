//! Single-writer entity store.
//!
//! # Purpose
//!
//! * Owns every cache entry: last-known value, fetch status, last success time,
//!   last classified error and the in-flight fetch slot.
//! * Owns the per-key generation counter used to discard superseded fetches.
//! * Publishes each entry replacement to per-key subscribers.
//!
//! # Mental model
//!
//! * Every operation takes the state lock once, replaces whole entry records
//!   and releases the lock before returning. The lock is never held across an
//!   await point, so readers never observe a half-written entry.
//! * A generation is advanced whenever something newer than an in-flight fetch
//!   happens to its key: a new fetch, an invalidation, a direct write, a
//!   removal, or an abandoned (disabled) read. A fetch result is applied only
//!   if its generation is still current.
//!
//! # Invariants
//!
//! * Sentinel keys never hold an entry and never start a fetch.
//! * A failed fetch keeps the last-known value visible and flags the error.
//! * Removing a key retires its generation, so a late response cannot
//!   resurrect it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use branchline_model::BusinessId;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::{CacheKey, TransportError};

/// Fetch lifecycle status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchStatus {
	/// Never fetched, or removed.
	Idle,
	/// A fetch is in flight.
	Loading,
	/// The last fetch (or direct write) succeeded.
	Success,
	/// The last fetch failed; any previous value is still present.
	Error,
}

/// Immutable copy of one entry at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot<V> {
	pub key: CacheKey,
	pub value: Option<V>,
	pub status: FetchStatus,
	/// Time of the last successful fetch or direct write.
	pub fetched_at: Option<Instant>,
	/// Error of the last failed fetch, cleared by the next success.
	pub error: Option<TransportError>,
	/// Set by explicit invalidation until the next successful fetch.
	pub invalidated: bool,
	/// True while a fetch for the current generation is in flight.
	pub fetching: bool,
	/// Current generation of the key.
	pub generation: u64,
}

impl<V> EntrySnapshot<V> {
	/// Snapshot of a key with no entry.
	pub fn idle(key: CacheKey, generation: u64) -> Self {
		Self {
			key,
			value: None,
			status: FetchStatus::Idle,
			fetched_at: None,
			error: None,
			invalidated: false,
			fetching: false,
			generation,
		}
	}

	/// Returns true when the value is due for a refetch.
	///
	/// Entries without a successful fetch are always stale.
	pub fn is_stale(&self, now: Instant, stale_after: Duration) -> bool {
		if self.invalidated {
			return true;
		}
		match self.fetched_at {
			Some(at) => now.saturating_duration_since(at) > stale_after,
			None => true,
		}
	}
}

type Outcome<V> = Option<EntrySnapshot<V>>;

/// Entry record. Replaced wholesale under the store lock.
struct CacheEntry<V> {
	value: Option<V>,
	status: FetchStatus,
	fetched_at: Option<Instant>,
	error: Option<TransportError>,
	invalidated: bool,
	in_flight: Option<InFlight<V>>,
}

/// Handle on the fetch currently attached to an entry.
struct InFlight<V> {
	generation: u64,
	outcome: watch::Receiver<Outcome<V>>,
}

impl<V> CacheEntry<V> {
	fn idle() -> Self {
		Self {
			value: None,
			status: FetchStatus::Idle,
			fetched_at: None,
			error: None,
			invalidated: false,
			in_flight: None,
		}
	}

	/// Status an entry falls back to once no fetch is attached.
	fn settled_status(&self) -> FetchStatus {
		match (&self.error, &self.value) {
			(Some(_), _) => FetchStatus::Error,
			(None, Some(_)) => FetchStatus::Success,
			(None, None) => FetchStatus::Idle,
		}
	}

	fn detach(&mut self) {
		self.in_flight = None;
		self.status = self.settled_status();
	}
}

/// Cache write applied by [`EntityStore::apply`].
pub enum CacheEffect<V> {
	/// Authoritative replacement of a value.
	Set(CacheKey, V),
	/// Rewrites the present value; skipped when the key holds no value.
	/// Returning `None` leaves the value untouched.
	Patch(CacheKey, Box<dyn FnOnce(&V) -> Option<V> + Send>),
	/// Marks the entry stale without clearing its value.
	Invalidate(CacheKey),
	/// Drops the entry.
	Remove(CacheKey),
	/// Drops every entry scoped under a business.
	RemoveDescendants(BusinessId),
}

impl<V> CacheEffect<V> {
	/// Builds a [`CacheEffect::Patch`].
	pub fn patch<F>(key: CacheKey, f: F) -> Self
	where
		F: FnOnce(&V) -> Option<V> + Send + 'static,
	{
		Self::Patch(key, Box::new(f))
	}
}

impl<V> fmt::Debug for CacheEffect<V> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Set(key, _) => f.debug_tuple("Set").field(key).finish_non_exhaustive(),
			Self::Patch(key, _) => f.debug_tuple("Patch").field(key).finish_non_exhaustive(),
			Self::Invalidate(key) => f.debug_tuple("Invalidate").field(key).finish(),
			Self::Remove(key) => f.debug_tuple("Remove").field(key).finish(),
			Self::RemoveDescendants(id) => f.debug_tuple("RemoveDescendants").field(id).finish(),
		}
	}
}

/// Result of trying to start a fetch.
pub enum FetchTicket<V: Clone + Send + Sync + 'static> {
	/// The entry is fresh; no fetch is needed.
	Fresh(EntrySnapshot<V>),
	/// A fetch is already in flight; the receiver resolves with its outcome.
	Joined {
		snapshot: EntrySnapshot<V>,
		outcome: watch::Receiver<Outcome<V>>,
	},
	/// The caller leads a new fetch and must settle the lease.
	Started {
		snapshot: EntrySnapshot<V>,
		lease: FetchLease<V>,
	},
	/// Sentinel keys are never fetched.
	Sentinel(EntrySnapshot<V>),
}

/// Result of settling a fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement<V> {
	/// The response was written to the entry.
	Applied(EntrySnapshot<V>),
	/// A newer generation exists; the response was discarded.
	Superseded(EntrySnapshot<V>),
}

impl<V> Settlement<V> {
	pub fn into_snapshot(self) -> EntrySnapshot<V> {
		match self {
			Self::Applied(snapshot) | Self::Superseded(snapshot) => snapshot,
		}
	}
}

/// Lock-protected store state.
///
/// Generations are drawn from one store-wide counter, so a key whose
/// generation record was pruned can never hand a new fetch the generation of
/// an outstanding one.
struct StoreState<V> {
	entries: HashMap<CacheKey, CacheEntry<V>>,
	generations: HashMap<CacheKey, u64>,
	channels: HashMap<CacheKey, watch::Sender<EntrySnapshot<V>>>,
	next_generation: u64,
}

impl<V: Clone> StoreState<V> {
	fn new() -> Self {
		Self {
			entries: HashMap::new(),
			generations: HashMap::new(),
			channels: HashMap::new(),
			next_generation: 0,
		}
	}

	fn generation(&self, key: &CacheKey) -> u64 {
		self.generations.get(key).copied().unwrap_or(0)
	}

	fn bump(&mut self, key: &CacheKey) -> u64 {
		self.next_generation += 1;
		self.generations.insert(key.clone(), self.next_generation);
		self.next_generation
	}

	/// Forgets bookkeeping for a key that holds no entry and has no live subscribers.
	fn prune(&mut self, key: &CacheKey) {
		if self.entries.contains_key(key) {
			return;
		}
		if self.channels.get(key).is_some_and(|tx| tx.receiver_count() > 0) {
			return;
		}
		self.channels.remove(key);
		self.generations.remove(key);
	}

	fn snapshot(&self, key: &CacheKey) -> EntrySnapshot<V> {
		let generation = self.generation(key);
		match self.entries.get(key) {
			Some(entry) => EntrySnapshot {
				key: key.clone(),
				value: entry.value.clone(),
				status: entry.status,
				fetched_at: entry.fetched_at,
				error: entry.error.clone(),
				invalidated: entry.invalidated,
				fetching: entry.in_flight.is_some(),
				generation,
			},
			None => EntrySnapshot::idle(key.clone(), generation),
		}
	}

	fn publish(&self, key: &CacheKey) {
		if let Some(tx) = self.channels.get(key) {
			tx.send_replace(self.snapshot(key));
		}
	}

	fn set(&mut self, key: &CacheKey, value: V, now: Instant) {
		if key.is_sentinel() {
			tracing::warn!(key = %key, "cache.store.sentinel_write_ignored");
			return;
		}
		self.bump(key);
		self.entries.insert(
			key.clone(),
			CacheEntry {
				value: Some(value),
				status: FetchStatus::Success,
				fetched_at: Some(now),
				error: None,
				invalidated: false,
				in_flight: None,
			},
		);
		self.publish(key);
	}

	fn patch(&mut self, key: &CacheKey, f: Box<dyn FnOnce(&V) -> Option<V> + Send>) {
		let Some(next) = self.entries.get(key).and_then(|e| e.value.as_ref()).and_then(f) else {
			tracing::trace!(key = %key, "cache.store.patch_skipped");
			return;
		};
		self.bump(key);
		if let Some(entry) = self.entries.get_mut(key) {
			entry.value = Some(next);
			entry.detach();
		}
		self.publish(key);
	}

	fn invalidate(&mut self, key: &CacheKey) {
		if !self.entries.contains_key(key) {
			return;
		}
		self.bump(key);
		if let Some(entry) = self.entries.get_mut(key) {
			entry.invalidated = true;
			entry.detach();
		}
		self.publish(key);
	}

	fn remove(&mut self, key: &CacheKey) {
		self.bump(key);
		self.entries.remove(key);
		self.publish(key);
		self.prune(key);
	}

	fn remove_descendants(&mut self, business_id: &BusinessId) {
		let keys: Vec<CacheKey> = self
			.entries
			.keys()
			.chain(self.channels.keys())
			.filter(|k| k.descends_from(business_id))
			.cloned()
			.collect();
		for key in keys {
			self.remove(&key);
		}
	}
}

/// Per-key entity cache. The only writer of cache entries.
pub struct EntityStore<V> {
	state: Mutex<StoreState<V>>,
}

impl<V: Clone + Send + Sync + 'static> Default for EntityStore<V> {
	fn default() -> Self {
		Self::new()
	}
}

impl<V: Clone + Send + Sync + 'static> EntityStore<V> {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(StoreState::new()),
		}
	}

	/// Returns a copy of the entry for `key`.
	pub fn snapshot(&self, key: &CacheKey) -> EntrySnapshot<V> {
		self.state.lock().snapshot(key)
	}

	/// Subscribes to every replacement of the entry for `key`.
	pub fn subscribe(&self, key: &CacheKey) -> watch::Receiver<EntrySnapshot<V>> {
		let mut state = self.state.lock();
		let snapshot = state.snapshot(key);
		state
			.channels
			.entry(key.clone())
			.or_insert_with(|| watch::channel(snapshot).0)
			.subscribe()
	}

	/// Number of keys holding an entry.
	pub fn len(&self) -> usize {
		self.state.lock().entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Attaches to the in-flight fetch for `key`, or starts one if the entry is
	/// absent, idle or stale.
	pub fn begin_fetch(self: &Arc<Self>, key: &CacheKey, now: Instant, stale_after: Duration) -> FetchTicket<V> {
		let mut state = self.state.lock();
		if key.is_sentinel() {
			return FetchTicket::Sentinel(EntrySnapshot::idle(key.clone(), state.generation(key)));
		}

		if let Some(entry) = state.entries.get(key) {
			if let Some(in_flight) = &entry.in_flight {
				tracing::trace!(key = %key, generation = in_flight.generation, "cache.fetch.join");
				let outcome = in_flight.outcome.clone();
				return FetchTicket::Joined {
					snapshot: state.snapshot(key),
					outcome,
				};
			}
			let snapshot = state.snapshot(key);
			if entry.status != FetchStatus::Idle && !snapshot.is_stale(now, stale_after) {
				return FetchTicket::Fresh(snapshot);
			}
		}

		let generation = state.bump(key);
		let (tx, rx) = watch::channel(None);
		let entry = state.entries.entry(key.clone()).or_insert_with(CacheEntry::idle);
		entry.status = FetchStatus::Loading;
		entry.in_flight = Some(InFlight { generation, outcome: rx });
		state.publish(key);

		FetchTicket::Started {
			snapshot: state.snapshot(key),
			lease: FetchLease {
				store: Arc::clone(self),
				key: key.clone(),
				generation,
				outcome: tx,
				completed: false,
			},
		}
	}

	/// Writes a fetch response if `generation` is still current.
	pub fn complete_fetch(&self, key: &CacheKey, generation: u64, result: Result<V, TransportError>, now: Instant) -> Settlement<V> {
		let mut state = self.state.lock();
		let current = state.generation(key);
		if current != generation {
			tracing::debug!(key = %key, generation, current, "cache.fetch.superseded");
			return Settlement::Superseded(state.snapshot(key));
		}

		let previous = state.entries.remove(key).unwrap_or_else(CacheEntry::idle);
		let next = match result {
			Ok(value) => CacheEntry {
				value: Some(value),
				status: FetchStatus::Success,
				fetched_at: Some(now),
				error: None,
				invalidated: false,
				in_flight: None,
			},
			Err(error) => {
				if error.is_auth() {
					tracing::warn!(key = %key, generation, error = %error, "cache.fetch.auth_rejected");
				} else {
					tracing::warn!(key = %key, generation, error = %error, "cache.fetch.failed");
				}
				CacheEntry {
					value: previous.value,
					status: FetchStatus::Error,
					fetched_at: previous.fetched_at,
					error: Some(error),
					invalidated: previous.invalidated,
					in_flight: None,
				}
			}
		};
		state.entries.insert(key.clone(), next);
		state.publish(key);
		Settlement::Applied(state.snapshot(key))
	}

	/// Frees the in-flight slot of a fetch that ended without a response.
	fn release_fetch(&self, key: &CacheKey, generation: u64) -> EntrySnapshot<V> {
		let mut state = self.state.lock();
		if state.generation(key) == generation
			&& let Some(entry) = state.entries.get_mut(key)
		{
			entry.detach();
			state.publish(key);
		}
		state.snapshot(key)
	}

	/// Detaches the in-flight fetch of `key` so its response is discarded.
	///
	/// Returns true if a fetch was detached.
	pub fn abandon(&self, key: &CacheKey) -> bool {
		let mut state = self.state.lock();
		if !state.entries.get(key).is_some_and(|e| e.in_flight.is_some()) {
			return false;
		}
		state.bump(key);
		if let Some(entry) = state.entries.get_mut(key) {
			entry.detach();
		}
		state.publish(key);
		true
	}

	/// Direct write; marks the entry fresh and successful.
	pub fn set(&self, key: &CacheKey, value: V, now: Instant) {
		self.state.lock().set(key, value, now);
	}

	/// Marks the entry stale, keeping its value visible.
	pub fn invalidate(&self, key: &CacheKey) {
		self.state.lock().invalidate(key);
	}

	/// Drops the entry for `key`.
	pub fn remove(&self, key: &CacheKey) {
		self.state.lock().remove(key);
	}

	/// Applies a batch of effects under one lock acquisition.
	pub fn apply(&self, effects: Vec<CacheEffect<V>>, now: Instant) {
		let mut state = self.state.lock();
		for effect in effects {
			tracing::debug!(effect = ?effect, "cache.effect.apply");
			match effect {
				CacheEffect::Set(key, value) => state.set(&key, value, now),
				CacheEffect::Patch(key, f) => state.patch(&key, f),
				CacheEffect::Invalidate(key) => state.invalidate(&key),
				CacheEffect::Remove(key) => state.remove(&key),
				CacheEffect::RemoveDescendants(business_id) => state.remove_descendants(&business_id),
			}
		}
	}

	/// Drops every entry and advances every known generation.
	pub fn clear(&self) {
		let mut state = self.state.lock();
		let keys: Vec<CacheKey> = state.entries.keys().chain(state.generations.keys()).cloned().collect();
		for key in &keys {
			state.bump(key);
		}
		state.entries.clear();
		let channels: Vec<CacheKey> = state.channels.keys().cloned().collect();
		for key in &channels {
			state.publish(key);
		}
		for key in &keys {
			state.prune(key);
		}
		state.channels.retain(|_, tx| tx.receiver_count() > 0);
	}

	/// Number of keys with generation bookkeeping.
	#[cfg(test)]
	fn tracked_keys(&self) -> usize {
		self.state.lock().generations.len()
	}
}

/// Leadership over one fetch generation.
///
/// Settling publishes the outcome to every joined reader. Dropping an unsettled
/// lease frees the in-flight slot and releases joined readers with the entry
/// as it stands, so a cancelled leader cannot wedge the key.
pub struct FetchLease<V: Clone + Send + Sync + 'static> {
	store: Arc<EntityStore<V>>,
	key: CacheKey,
	generation: u64,
	outcome: watch::Sender<Outcome<V>>,
	completed: bool,
}

impl<V: Clone + Send + Sync + 'static> FetchLease<V> {
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn key(&self) -> &CacheKey {
		&self.key
	}

	/// Receiver resolving with this fetch's settled snapshot.
	pub fn outcome(&self) -> watch::Receiver<Outcome<V>> {
		self.outcome.subscribe()
	}

	/// Writes the response (if still current) and wakes joined readers.
	pub fn settle(mut self, result: Result<V, TransportError>, now: Instant) -> Settlement<V> {
		self.completed = true;
		let settlement = self.store.complete_fetch(&self.key, self.generation, result, now);
		let snapshot = match &settlement {
			Settlement::Applied(snapshot) | Settlement::Superseded(snapshot) => snapshot.clone(),
		};
		self.outcome.send_replace(Some(snapshot));
		settlement
	}
}

impl<V: Clone + Send + Sync + 'static> Drop for FetchLease<V> {
	fn drop(&mut self) {
		if self.completed {
			return;
		}
		tracing::debug!(key = %self.key, generation = self.generation, "cache.fetch.lease_dropped");
		let snapshot = self.store.release_fetch(&self.key, self.generation);
		self.outcome.send_replace(Some(snapshot));
	}
}

#[cfg(test)]
mod tests;
