//! Fetchers mapping cache keys onto transport reads.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use branchline_model::{Normalize, normalize_branches, settings_or_defaults};

use crate::{CacheKey, DashboardTransport, EntityValue, ParentRef, TransportError};

pub(crate) type LoadFuture = Pin<Box<dyn Future<Output = Result<EntityValue, TransportError>> + Send>>;

/// Reads the value behind `key` and normalizes it for the store.
pub(crate) async fn load(transport: Arc<dyn DashboardTransport>, key: CacheKey) -> Result<EntityValue, TransportError> {
	match &key {
		CacheKey::BusinessList => {
			let businesses = transport.list_businesses().await?;
			Ok(EntityValue::businesses(businesses.normalize()))
		}
		CacheKey::Branches(ParentRef::Business(id)) => {
			let branches = transport.list_branches(id).await?;
			Ok(EntityValue::branches(normalize_branches(id, branches)))
		}
		CacheKey::Settings(ParentRef::Business(id)) => {
			let settings = transport.get_settings(id).await?;
			Ok(EntityValue::settings(settings_or_defaults(id, settings)))
		}
		CacheKey::Branches(ParentRef::Unknown) | CacheKey::Settings(ParentRef::Unknown) => Err(TransportError::NotFound(key.to_string())),
	}
}

/// Builds a fetcher closure for [`crate::QueryOrchestrator::read`].
pub(crate) fn fetcher(transport: &Arc<dyn DashboardTransport>, key: &CacheKey) -> impl FnOnce() -> LoadFuture + use<> {
	let transport = Arc::clone(transport);
	let key = key.clone();
	move || -> LoadFuture { Box::pin(load(transport, key)) }
}
