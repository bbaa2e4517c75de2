//! Branch consistency guards.
//!
//! Local checks that keep a business's branch set coherent before writes are
//! sent. Results of [`promote_main`] are an optimistic view only; the server's
//! response stays authoritative.

use crate::{Branch, BranchId, BranchSettings, GuardError, Role};

/// Returns the main branch of the collection, if any.
pub fn main_branch(branches: &[Branch]) -> Option<&Branch> {
	branches.iter().find(|b| b.is_main)
}

/// Flags `target` as the only main branch.
///
/// # Errors
///
/// Returns [`GuardError::MainBranchMissing`] if `target` is not in `branches`.
pub fn promote_main(branches: &[Branch], target: &BranchId) -> Result<Vec<Branch>, GuardError> {
	if !branches.iter().any(|b| &b.id == target) {
		return Err(GuardError::MainBranchMissing { branch_id: target.clone() });
	}

	Ok(branches
		.iter()
		.map(|b| Branch {
			is_main: &b.id == target,
			..b.clone()
		})
		.collect())
}

/// Replaces (or appends) `updated` in the collection, keeping at most one main branch.
pub fn merge_branch(branches: &[Branch], updated: Branch) -> Vec<Branch> {
	let mut merged: Vec<Branch> = branches.to_vec();
	match merged.iter_mut().find(|b| b.id == updated.id) {
		Some(slot) => *slot = updated.clone(),
		None => merged.push(updated.clone()),
	}

	if updated.is_main {
		for branch in merged.iter_mut().filter(|b| b.id != updated.id) {
			branch.is_main = false;
		}
	}
	merged
}

/// Checks that the default-branch reference of `settings` resolves in `branches`.
///
/// # Errors
///
/// Returns [`GuardError::DanglingReference`] when the reference is set and the
/// branch is absent.
pub fn validate_default_branch(settings: &BranchSettings, branches: &[Branch]) -> Result<(), GuardError> {
	match &settings.default_branch_id {
		Some(id) if !branches.iter().any(|b| &b.id == id) => Err(GuardError::DanglingReference { branch_id: id.clone() }),
		_ => Ok(()),
	}
}

/// Rejects deleting the branch currently recorded as default.
///
/// # Errors
///
/// Returns [`GuardError::DefaultBranchDeletion`] when `branch_id` is the default.
pub fn ensure_branch_deletable(settings: &BranchSettings, branch_id: &BranchId) -> Result<(), GuardError> {
	if settings.default_branch_id.as_ref() == Some(branch_id) {
		return Err(GuardError::DefaultBranchDeletion {
			branch_id: branch_id.clone(),
		});
	}
	Ok(())
}

/// Rejects branch administration for roles that cannot perform it.
///
/// # Errors
///
/// Returns [`GuardError::InsufficientRole`] for staff and unknown roles.
pub fn ensure_branch_admin(role: Role) -> Result<(), GuardError> {
	if role.can_manage_branches() {
		Ok(())
	} else {
		Err(GuardError::InsufficientRole { role })
	}
}
