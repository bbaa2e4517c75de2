//! Invariant catalog for the entity cache.
#![allow(dead_code)]

/// Must run at most one fetch per cache key at a time.
///
/// - Enforced in: [`crate::EntityStore::begin_fetch`]
/// - Tested by: `store::tests::concurrent_begin_joins_the_in_flight_fetch`, `query::tests::concurrent_reads_share_one_fetch`
/// - Failure symptom: Duplicate requests per screen render and flickering entries as responses land.
pub(crate) const SINGLE_FLIGHT_FETCH_PER_KEY: () = ();

/// Only the most recently initiated fetch of a key may write it.
///
/// - Enforced in: [`crate::EntityStore::complete_fetch`], `StoreState::bump`
/// - Tested by: `store::tests::later_initiated_fetch_wins_regardless_of_arrival_order`, `query::tests::superseded_response_is_discarded`
/// - Failure symptom: A slow stale response overwrites newer data or a direct write.
pub(crate) const LATEST_INITIATED_FETCH_WINS: () = ();

/// Must remove every business-scoped entry when the business is deleted.
///
/// - Enforced in: [`crate::MutationCoordinator::delete_business`], `StoreState::remove_descendants`
/// - Tested by: `store::tests::removing_descendants_discards_late_responses`, `tests/mutations.rs::deleting_business_filters_list_and_drops_descendants`
/// - Failure symptom: Branches or settings of a deleted business reappear from cache or from a late response.
pub(crate) const BUSINESS_DELETION_DROPS_DESCENDANTS: () = ();

/// Sentinel keys never fetch and never hold a value.
///
/// - Enforced in: [`crate::EntityStore::begin_fetch`], `StoreState::set`, [`crate::CacheConfig::read_options`]
/// - Tested by: `store::tests::sentinel_keys_never_fetch_or_hold_values`, `query::tests::sentinel_key_is_never_fetched`
/// - Failure symptom: Requests to `businesses/unknown/...` and data shared between unrelated unscoped screens.
pub(crate) const SENTINEL_KEYS_STAY_IDLE: () = ();

/// A failed fetch must keep the last-known value visible.
///
/// - Enforced in: [`crate::EntityStore::complete_fetch`]
/// - Tested by: `store::tests::failed_fetch_keeps_last_known_value`, `query::tests::failed_refetch_keeps_stale_value_visible`
/// - Failure symptom: Lists blank out on transient network errors.
pub(crate) const FAILED_FETCH_KEEPS_VALUE: () = ();

/// A failed write must not touch the cache.
///
/// - Enforced in: `MutationCoordinator::run`
/// - Tested by: `tests/mutations.rs::failed_write_applies_no_effects`
/// - Failure symptom: The UI shows a change the server never accepted.
pub(crate) const FAILED_WRITE_APPLIES_NO_EFFECTS: () = ();

/// Settings writes must not reference a branch outside the business's collection.
///
/// - Enforced in: [`crate::MutationCoordinator::update_settings`], [`branchline_model::guard::validate_default_branch`]
/// - Tested by: `tests/mutations.rs::dangling_default_branch_is_rejected_before_write`
/// - Failure symptom: Settings point at a deleted or foreign branch and transfers route nowhere.
pub(crate) const DEFAULT_BRANCH_REFERENCE_RESOLVES: () = ();
