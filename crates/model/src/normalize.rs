//! One-time normalization of values entering the cache.

use crate::{Branch, BranchId, BranchSettings, Business, BusinessId};

/// Canonicalizes a value as it crosses the cache boundary.
///
/// Implementations must be idempotent.
pub trait Normalize {
	/// Returns the canonical form of `self`.
	fn normalize(self) -> Self;
}

fn non_blank(value: Option<String>) -> Option<String> {
	value.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

pub(crate) fn non_blank_branch(value: Option<BranchId>) -> Option<BranchId> {
	value.filter(|id| !id.is_blank()).map(|id| BranchId::new(id.as_str().trim()))
}

impl Normalize for Business {
	fn normalize(mut self) -> Self {
		self.name = self.name.trim().to_owned();
		self.description = non_blank(self.description);
		self
	}
}

impl Normalize for Branch {
	fn normalize(mut self) -> Self {
		self.name = self.name.trim().to_owned();
		self.code = non_blank(self.code);
		self.address = non_blank(self.address);
		self
	}
}

impl Normalize for BranchSettings {
	fn normalize(mut self) -> Self {
		self.default_branch_id = non_blank_branch(self.default_branch_id);
		self
	}
}

impl<T: Normalize> Normalize for Vec<T> {
	fn normalize(self) -> Self {
		self.into_iter().map(Normalize::normalize).collect()
	}
}

/// Resolves a possibly-missing settings record into the value the cache stores.
///
/// A missing record becomes [`BranchSettings::defaults_for`] the business.
pub fn settings_or_defaults(business_id: &BusinessId, settings: Option<BranchSettings>) -> BranchSettings {
	match settings {
		Some(settings) => settings.normalize(),
		None => BranchSettings::defaults_for(business_id.clone()),
	}
}

/// Normalizes a fetched branch collection.
///
/// More than one main branch is reported but kept as-is; the server is the
/// authority and the next promotion restores the invariant.
pub fn normalize_branches(business_id: &BusinessId, branches: Vec<Branch>) -> Vec<Branch> {
	let branches = branches.normalize();
	let mains = branches.iter().filter(|b| b.is_main).count();
	if mains > 1 {
		tracing::warn!(business_id = %business_id, mains, "model.branches.multiple_main");
	}
	branches
}
