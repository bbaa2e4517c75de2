//! Write path.
//!
//! # Purpose
//!
//! * Runs local guards ([`branchline_model::guard`],
//!   [`branchline_model::reconcile`]) before any write is sent.
//! * Issues exactly one transport write per call.
//! * Applies the declared cache effects once, atomically, after the write succeeds.
//!
//! # Invariants
//!
//! * A failed write applies no cache effect and returns the transport error unchanged.
//! * Local guard failures are raised before any network call.
//! * Deleting a business filters it out of `businesses:list` immediately and
//!   drops its branches and settings entries in the same batch.
//!
//! # Failure modes & recovery
//!
//! * Guard context (settings, branches) missing from the cache is loaded through
//!   the [`QueryOrchestrator`], sharing any fetch already in flight.
//! * Roles are checked only when the business list is cached; the server stays
//!   authoritative otherwise.

use std::future::Future;
use std::sync::Arc;

use branchline_model::guard::{
	ensure_branch_admin, ensure_branch_deletable, main_branch, merge_branch, promote_main, validate_default_branch,
};
use branchline_model::reconcile::reconcile;
use branchline_model::{
	Branch, BranchId, BranchPatch, BranchSettings, Business, BusinessId, NewBranch, NewBusiness, Normalize, Reconciliation,
	Role, SettingsForm,
};

use crate::fetch::fetcher;
use crate::{CacheConfig, CacheEffect, CacheKey, DashboardTransport, EntityValue, Error, QueryOrchestrator, Result, TransportError};

/// Outcome of a settings submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsUpdate {
	/// The form matched the last-known settings; nothing was sent.
	Unchanged,
	/// The server accepted the partial update.
	Updated(BranchSettings),
}

type Effects = Vec<CacheEffect<EntityValue>>;

/// Executes writes against the transport and reconciles the cache afterwards.
pub struct MutationCoordinator {
	queries: Arc<QueryOrchestrator<EntityValue>>,
	transport: Arc<dyn DashboardTransport>,
	config: CacheConfig,
}

impl MutationCoordinator {
	pub fn new(queries: Arc<QueryOrchestrator<EntityValue>>, transport: Arc<dyn DashboardTransport>, config: CacheConfig) -> Self {
		Self {
			queries,
			transport,
			config,
		}
	}

	/// Creates a business and appends it to the cached list.
	pub async fn create_business(&self, payload: &NewBusiness) -> Result<Business> {
		let write = async { self.transport.create_business(payload).await.map(Normalize::normalize) };
		self.run("create_business", write, |business| {
			let created = business.clone();
			vec![CacheEffect::patch(CacheKey::BusinessList, move |value: &EntityValue| {
				let mut next: Vec<Business> = value.as_businesses()?.iter().filter(|b| b.id != created.id).cloned().collect();
				next.push(created);
				Some(EntityValue::businesses(next))
			})]
		})
		.await
	}

	/// Deletes a business, drops it from the cached list and removes its scoped entries.
	pub async fn delete_business(&self, business_id: &BusinessId) -> Result<()> {
		ensure_known(business_id)?;
		let write = self.transport.delete_business(business_id);
		self.run("delete_business", write, |_| {
			let deleted = business_id.clone();
			vec![
				CacheEffect::patch(CacheKey::BusinessList, {
					let deleted = deleted.clone();
					move |value: &EntityValue| {
						let remaining: Vec<Business> = value.as_businesses()?.iter().filter(|b| b.id != deleted).cloned().collect();
						Some(EntityValue::businesses(remaining))
					}
				}),
				CacheEffect::RemoveDescendants(deleted),
			]
		})
		.await
	}

	/// Creates a branch, merges it into the cached collection and schedules a refetch.
	pub async fn create_branch(&self, business_id: &BusinessId, payload: &NewBranch) -> Result<Branch> {
		ensure_known(business_id)?;
		self.ensure_admin(business_id)?;
		let write = async { self.transport.create_branch(business_id, payload).await.map(Normalize::normalize) };
		self.run("create_branch", write, |branch| {
			let key = CacheKey::branches(business_id);
			vec![merge_effect(key.clone(), branch.clone()), CacheEffect::Invalidate(key)]
		})
		.await
	}

	/// Applies a partial branch update and merges the stored branch into the cache.
	pub async fn update_branch(&self, business_id: &BusinessId, branch_id: &BranchId, patch: &BranchPatch) -> Result<Branch> {
		ensure_known(business_id)?;
		self.ensure_admin(business_id)?;
		let write = async { self.transport.update_branch(business_id, branch_id, patch).await.map(Normalize::normalize) };
		self.run("update_branch", write, |branch| vec![merge_effect(CacheKey::branches(business_id), branch.clone())])
			.await
	}

	/// Makes `branch_id` the main branch of its business.
	///
	/// The target must be part of the last-known branch collection. After the
	/// write, the cached collection shows the target as the only main branch
	/// until the scheduled refetch returns the server's view.
	pub async fn promote_main_branch(&self, business_id: &BusinessId, branch_id: &BranchId) -> Result<Branch> {
		ensure_known(business_id)?;
		self.ensure_admin(business_id)?;
		let branches = self.branches_context(business_id).await?;
		promote_main(&branches, branch_id).inspect_err(|error| rejected("promote_main_branch", error))?;
		tracing::debug!(
			business_id = %business_id,
			from = ?main_branch(&branches).map(|b| b.id.as_str()),
			to = %branch_id,
			"cache.mutation.promote_main"
		);

		let patch = BranchPatch::promote_main();
		let write = async { self.transport.update_branch(business_id, branch_id, &patch).await.map(Normalize::normalize) };
		self.run("promote_main_branch", write, |branch| {
			let key = CacheKey::branches(business_id);
			let promoted = branch.clone();
			vec![
				CacheEffect::patch(key.clone(), move |value: &EntityValue| {
					let current = value.as_branches()?;
					let view = promote_main(current, &promoted.id).unwrap_or_else(|_| current.to_vec());
					Some(EntityValue::branches(merge_branch(&view, promoted)))
				}),
				CacheEffect::Invalidate(key),
			]
		})
		.await
	}

	/// Deletes a branch unless it is the recorded default branch.
	pub async fn delete_branch(&self, business_id: &BusinessId, branch_id: &BranchId) -> Result<()> {
		ensure_known(business_id)?;
		self.ensure_admin(business_id)?;
		let settings = self.settings_context(business_id).await?;
		ensure_branch_deletable(&settings, branch_id).inspect_err(|error| rejected("delete_branch", error))?;

		let write = self.transport.delete_branch(business_id, branch_id);
		self.run("delete_branch", write, |_| {
			let deleted = branch_id.clone();
			vec![
				CacheEffect::patch(CacheKey::branches(business_id), move |value: &EntityValue| {
					let remaining: Vec<Branch> = value.as_branches()?.iter().filter(|b| b.id != deleted).cloned().collect();
					Some(EntityValue::branches(remaining))
				}),
				CacheEffect::Invalidate(CacheKey::settings(business_id)),
			]
		})
		.await
	}

	/// Submits the fields of `form` that differ from the last-known settings.
	///
	/// Nothing is sent when the form matches. A default-branch reference that
	/// does not resolve in the branch collection fails with
	/// [`branchline_model::GuardError::DanglingReference`] before any write.
	pub async fn update_settings(&self, business_id: &BusinessId, form: &SettingsForm) -> Result<SettingsUpdate> {
		ensure_known(business_id)?;
		self.ensure_admin(business_id)?;
		let current = self.settings_context(business_id).await?;

		let patch = match reconcile(&current, form) {
			Reconciliation::NoOp => {
				tracing::debug!(business_id = %business_id, "cache.mutation.settings_unchanged");
				return Ok(SettingsUpdate::Unchanged);
			}
			Reconciliation::Submit(patch) => patch,
		};

		let prospective = patch.apply_to(&current);
		if prospective.default_branch_id.is_some() {
			let branches = self.branches_context(business_id).await?;
			validate_default_branch(&prospective, &branches).inspect_err(|error| rejected("update_settings", error))?;
		}

		let write = async { self.transport.update_settings(business_id, &patch).await.map(Normalize::normalize) };
		let stored = self
			.run("update_settings", write, |settings| {
				vec![CacheEffect::Set(CacheKey::settings(business_id), EntityValue::settings(settings.clone()))]
			})
			.await?;
		Ok(SettingsUpdate::Updated(stored))
	}

	/// Awaits one write and applies its effects if it succeeded.
	async fn run<T, W, E>(&self, mutation: &'static str, write: W, effects: E) -> Result<T>
	where
		W: Future<Output = Result<T, TransportError>>,
		E: FnOnce(&T) -> Effects,
	{
		tracing::debug!(mutation, "cache.mutation.start");
		let output = match write.await {
			Ok(output) => output,
			Err(error) if error.is_auth() => {
				tracing::warn!(mutation, error = %error, "cache.mutation.auth_rejected");
				return Err(error.into());
			}
			Err(error) => {
				tracing::warn!(mutation, error = %error, "cache.mutation.failed");
				return Err(error.into());
			}
		};
		let effects = effects(&output);
		tracing::debug!(mutation, effects = effects.len(), "cache.mutation.applied");
		self.queries.apply_effects(effects);
		Ok(output)
	}

	/// Returns the cached value of `key`, fetching it if nothing is cached.
	async fn context(&self, key: &CacheKey) -> Result<EntityValue> {
		if let Some(value) = self.queries.snapshot(key).value {
			return Ok(value);
		}
		let settled = self.queries.fetch(key, fetcher(&self.transport, key), self.config.read_options(key)).await;
		match (settled.value, settled.error) {
			(Some(value), _) => Ok(value),
			(None, Some(error)) => Err(error.into()),
			(None, None) => Err(Error::NotLoaded(key.clone())),
		}
	}

	async fn settings_context(&self, business_id: &BusinessId) -> Result<Arc<BranchSettings>> {
		let key = CacheKey::settings(business_id);
		match self.context(&key).await? {
			EntityValue::Settings(settings) => Ok(settings),
			_ => Err(Error::NotLoaded(key)),
		}
	}

	async fn branches_context(&self, business_id: &BusinessId) -> Result<Arc<[Branch]>> {
		let key = CacheKey::branches(business_id);
		match self.context(&key).await? {
			EntityValue::Branches(branches) => Ok(branches),
			_ => Err(Error::NotLoaded(key)),
		}
	}

	fn cached_role(&self, business_id: &BusinessId) -> Option<Role> {
		let list = self.queries.snapshot(&CacheKey::BusinessList).value?;
		list.as_businesses()?.iter().find(|b| &b.id == business_id).map(|b| b.role)
	}

	fn ensure_admin(&self, business_id: &BusinessId) -> Result<()> {
		if let Some(role) = self.cached_role(business_id) {
			ensure_branch_admin(role).inspect_err(|error| rejected("branch_admin", error))?;
		}
		Ok(())
	}
}

fn ensure_known(business_id: &BusinessId) -> Result<()> {
	if business_id.is_blank() {
		return Err(Error::UnknownParent);
	}
	Ok(())
}

fn rejected(mutation: &'static str, error: &branchline_model::GuardError) {
	tracing::debug!(mutation, error = %error, "cache.mutation.rejected");
}

/// Merges `branch` into the cached collection under `key`.
fn merge_effect(key: CacheKey, branch: Branch) -> CacheEffect<EntityValue> {
	CacheEffect::patch(key, move |value: &EntityValue| Some(EntityValue::branches(merge_branch(value.as_branches()?, branch))))
}
