use std::sync::Arc;
use std::time::Duration;

use branchline_model::BusinessId;
use pretty_assertions::assert_eq;
use tokio::time::Instant;

use super::*;
use crate::{Collection, key_for};

const WINDOW: Duration = Duration::from_secs(30);

fn store() -> Arc<EntityStore<String>> {
	Arc::new(EntityStore::new())
}

fn start(store: &Arc<EntityStore<String>>, key: &CacheKey, now: Instant) -> FetchLease<String> {
	match store.begin_fetch(key, now, WINDOW) {
		FetchTicket::Started { lease, .. } => lease,
		_ => panic!("expected a new fetch for {key}"),
	}
}

#[test]
fn concurrent_begin_joins_the_in_flight_fetch() {
	let store = store();
	let key = CacheKey::BusinessList;
	let now = Instant::now();

	let lease = start(&store, &key, now);
	assert_eq!(store.snapshot(&key).status, FetchStatus::Loading);

	let FetchTicket::Joined { outcome, .. } = store.begin_fetch(&key, now, WINDOW) else {
		panic!("second begin must join");
	};
	assert!(outcome.borrow().is_none());

	lease.settle(Ok("list".into()), now);
	let settled = outcome.borrow().clone().expect("joined reader receives outcome");
	assert_eq!(settled.value.as_deref(), Some("list"));
	assert_eq!(settled.status, FetchStatus::Success);
}

#[test]
fn fresh_entry_is_not_refetched_until_window_elapses() {
	let store = store();
	let key = CacheKey::BusinessList;
	let now = Instant::now();

	start(&store, &key, now).settle(Ok("v1".into()), now);
	assert_eq!(store.snapshot(&key).fetched_at, Some(now));

	assert!(matches!(store.begin_fetch(&key, now + WINDOW, WINDOW), FetchTicket::Fresh(_)));
	assert!(matches!(
		store.begin_fetch(&key, now + WINDOW + Duration::from_millis(1), WINDOW),
		FetchTicket::Started { .. }
	));
}

#[test]
fn later_initiated_fetch_wins_regardless_of_arrival_order() {
	let store = store();
	let key = CacheKey::branches(&BusinessId::new("b-1"));
	let now = Instant::now();

	let first = start(&store, &key, now);
	store.invalidate(&key);
	let second = start(&store, &key, now);
	assert!(second.generation() > first.generation());

	assert!(matches!(second.settle(Ok("second".into()), now), Settlement::Applied(_)));
	let late = first.settle(Ok("first".into()), now);
	assert!(matches!(late, Settlement::Superseded(_)));
	assert_eq!(store.snapshot(&key).value.as_deref(), Some("second"));
}

#[test]
fn failed_fetch_keeps_last_known_value() {
	let store = store();
	let key = CacheKey::settings(&BusinessId::new("b-1"));
	let now = Instant::now();

	start(&store, &key, now).settle(Ok("v1".into()), now);
	let later = now + WINDOW * 2;
	start(&store, &key, later).settle(Err(TransportError::Network("offline".into())), later);

	let snapshot = store.snapshot(&key);
	assert_eq!(snapshot.status, FetchStatus::Error);
	assert_eq!(snapshot.value.as_deref(), Some("v1"));
	assert_eq!(snapshot.fetched_at, Some(now));
	assert_eq!(snapshot.error, Some(TransportError::Network("offline".into())));
}

#[test]
fn sentinel_keys_never_fetch_or_hold_values() {
	let store = store();
	let key = key_for(Collection::Branches, None);
	let now = Instant::now();

	assert!(matches!(store.begin_fetch(&key, now, WINDOW), FetchTicket::Sentinel(_)));
	store.set(&key, "ghost".into(), now);

	let snapshot = store.snapshot(&key);
	assert_eq!(snapshot.status, FetchStatus::Idle);
	assert_eq!(snapshot.value, None);
	assert!(store.is_empty());
}

#[test]
fn removing_descendants_discards_late_responses() {
	let store = store();
	let b1 = BusinessId::new("b-1");
	let b2 = BusinessId::new("b-2");
	let now = Instant::now();

	store.set(&CacheKey::BusinessList, "list".into(), now);
	store.set(&CacheKey::settings(&b1), "settings-1".into(), now);
	store.set(&CacheKey::branches(&b2), "branches-2".into(), now);
	let in_flight = start(&store, &CacheKey::branches(&b1), now);

	store.apply(vec![CacheEffect::RemoveDescendants(b1.clone())], now);

	assert!(in_flight.settle(Ok("branches-1".into()), now).into_snapshot().value.is_none());
	assert_eq!(store.snapshot(&CacheKey::branches(&b1)).status, FetchStatus::Idle);
	assert_eq!(store.snapshot(&CacheKey::settings(&b1)).value, None);
	assert_eq!(store.snapshot(&CacheKey::branches(&b2)).value.as_deref(), Some("branches-2"));
	assert_eq!(store.snapshot(&CacheKey::BusinessList).value.as_deref(), Some("list"));
}

#[test]
fn patch_rewrites_present_values_only() {
	let store = store();
	let key = CacheKey::BusinessList;
	let now = Instant::now();

	store.apply(vec![CacheEffect::patch(key.clone(), |v: &String| Some(format!("{v}!")))], now);
	assert_eq!(store.snapshot(&key).value, None);

	store.set(&key, "list".into(), now);
	store.apply(vec![CacheEffect::patch(key.clone(), |v: &String| Some(format!("{v}!")))], now);
	assert_eq!(store.snapshot(&key).value.as_deref(), Some("list!"));
}

#[test]
fn invalidate_keeps_value_and_forces_refetch() {
	let store = store();
	let key = CacheKey::BusinessList;
	let now = Instant::now();

	store.set(&key, "list".into(), now);
	store.invalidate(&key);

	let snapshot = store.snapshot(&key);
	assert!(snapshot.invalidated);
	assert_eq!(snapshot.value.as_deref(), Some("list"));
	assert!(matches!(store.begin_fetch(&key, now, WINDOW), FetchTicket::Started { .. }));
}

#[test]
fn dropped_lease_releases_slot_and_waiters() {
	let store = store();
	let key = CacheKey::BusinessList;
	let now = Instant::now();

	let lease = start(&store, &key, now);
	let FetchTicket::Joined { outcome, .. } = store.begin_fetch(&key, now, WINDOW) else {
		panic!("expected join");
	};
	drop(lease);

	assert_eq!(outcome.borrow().as_ref().map(|s| s.status), Some(FetchStatus::Idle));
	assert!(!store.snapshot(&key).fetching);
	assert!(matches!(store.begin_fetch(&key, now, WINDOW), FetchTicket::Started { .. }));
}

#[test]
fn abandon_detaches_in_flight_fetch() {
	let store = store();
	let key = CacheKey::BusinessList;
	let now = Instant::now();

	let lease = start(&store, &key, now);
	assert!(store.abandon(&key));
	assert!(!store.abandon(&key));

	assert!(matches!(lease.settle(Ok("late".into()), now), Settlement::Superseded(_)));
	assert_eq!(store.snapshot(&key).value, None);
}

#[test]
fn subscribers_observe_whole_entry_replacements() {
	let store = store();
	let key = CacheKey::BusinessList;
	let now = Instant::now();
	let rx = store.subscribe(&key);
	assert_eq!(rx.borrow().status, FetchStatus::Idle);

	start(&store, &key, now).settle(Ok("list".into()), now);
	let seen = rx.borrow().clone();
	assert_eq!(seen.status, FetchStatus::Success);
	assert_eq!(seen.value.as_deref(), Some("list"));
	assert_eq!(seen.fetched_at, Some(now));

	store.clear();
	assert_eq!(rx.borrow().status, FetchStatus::Idle);
	assert!(store.is_empty());
}

#[test]
fn removed_keys_release_generation_bookkeeping() {
	let store = store();
	let b1 = BusinessId::new("b-1");
	let now = Instant::now();

	store.set(&CacheKey::settings(&b1), "settings-1".into(), now);
	let in_flight = start(&store, &CacheKey::branches(&b1), now);
	assert_eq!(store.tracked_keys(), 2);

	store.apply(vec![CacheEffect::RemoveDescendants(b1.clone())], now);
	assert_eq!(store.tracked_keys(), 0);

	let refetch = start(&store, &CacheKey::branches(&b1), now);
	assert!(refetch.generation() > in_flight.generation());
	assert!(in_flight.settle(Ok("stale".into()), now).into_snapshot().value.is_none());
	assert_eq!(refetch.settle(Ok("fresh".into()), now).into_snapshot().value.as_deref(), Some("fresh"));

	store.clear();
	assert_eq!(store.tracked_keys(), 0);
}

#[test]
fn live_subscribers_keep_their_key_tracked() {
	let store = store();
	let key = CacheKey::BusinessList;
	let now = Instant::now();
	let rx = store.subscribe(&key);

	store.set(&key, "list".into(), now);
	store.remove(&key);
	assert_eq!(store.tracked_keys(), 1);
	assert_eq!(rx.borrow().status, FetchStatus::Idle);

	drop(rx);
	store.clear();
	assert_eq!(store.tracked_keys(), 0);
}

#[test]
fn auth_rejection_is_recorded_on_the_entry() {
	let store = store();
	let key = CacheKey::BusinessList;
	let now = Instant::now();

	start(&store, &key, now).settle(Err(TransportError::Auth("expired".into())), now);

	let snapshot = store.snapshot(&key);
	assert_eq!(snapshot.status, FetchStatus::Error);
	assert!(snapshot.error.as_ref().is_some_and(TransportError::is_auth));
}
