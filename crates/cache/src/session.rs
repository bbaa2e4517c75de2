use std::sync::Arc;

use branchline_model::BusinessId;
use tokio::sync::watch;

use crate::fetch::fetcher;
use crate::{
	CacheConfig, CacheKey, Collection, DashboardTransport, EntityValue, EntrySnapshot, MutationCoordinator, QueryOrchestrator, QueryRead,
	key_for,
};

/// Cache state scoped to one authenticated session.
///
/// Owns the store, the read path and the write path. Dropping the session, or
/// calling [`CacheSession::logout`], discards every entry; fetches still in
/// flight settle into nothing.
pub struct CacheSession {
	queries: Arc<QueryOrchestrator<EntityValue>>,
	mutations: MutationCoordinator,
	transport: Arc<dyn DashboardTransport>,
	config: CacheConfig,
}

impl CacheSession {
	pub fn new(transport: Arc<dyn DashboardTransport>, config: CacheConfig) -> Self {
		let queries = Arc::new(QueryOrchestrator::new());
		let mutations = MutationCoordinator::new(Arc::clone(&queries), Arc::clone(&transport), config.clone());
		tracing::info!(
			businesses_stale_ms = config.businesses_stale_ms,
			branches_stale_ms = config.branches_stale_ms,
			settings_stale_ms = config.settings_stale_ms,
			"cache.session.start"
		);
		Self {
			queries,
			mutations,
			transport,
			config,
		}
	}

	/// Reads `businesses:list`.
	pub fn businesses(&self) -> QueryRead<EntityValue> {
		self.read(&CacheKey::BusinessList)
	}

	/// Reads the branches of `business_id`. An absent parent yields an idle read.
	pub fn branches(&self, business_id: Option<&BusinessId>) -> QueryRead<EntityValue> {
		self.read(&key_for(Collection::Branches, business_id))
	}

	/// Reads the settings of `business_id`. An absent parent yields an idle read.
	pub fn settings(&self, business_id: Option<&BusinessId>) -> QueryRead<EntityValue> {
		self.read(&key_for(Collection::Settings, business_id))
	}

	/// Reads `key` with the configured freshness window.
	pub fn read(&self, key: &CacheKey) -> QueryRead<EntityValue> {
		self.queries.read(key, fetcher(&self.transport, key), self.config.read_options(key))
	}

	/// Reads `key` and waits for the entry to settle.
	pub async fn fetch(&self, key: &CacheKey) -> EntrySnapshot<EntityValue> {
		self.read(key).settled().await
	}

	pub fn invalidate(&self, key: &CacheKey) {
		self.queries.invalidate(key);
	}

	pub fn set_value(&self, key: &CacheKey, value: EntityValue) {
		self.queries.set_value(key, value);
	}

	pub fn snapshot(&self, key: &CacheKey) -> EntrySnapshot<EntityValue> {
		self.queries.snapshot(key)
	}

	pub fn subscribe(&self, key: &CacheKey) -> watch::Receiver<EntrySnapshot<EntityValue>> {
		self.queries.subscribe(key)
	}

	pub fn mutations(&self) -> &MutationCoordinator {
		&self.mutations
	}

	pub fn queries(&self) -> &QueryOrchestrator<EntityValue> {
		&self.queries
	}

	pub fn config(&self) -> &CacheConfig {
		&self.config
	}

	/// Tears the session down, discarding all cached entities.
	pub fn logout(self) {
		let entries = self.queries.store().len();
		self.queries.clear();
		tracing::info!(entries, "cache.session.logout");
	}
}
