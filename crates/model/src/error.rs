use thiserror::Error;

use crate::{BranchId, Role};

/// Failures raised by local consistency guards before any write is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
	/// The default-branch reference names a branch that is not in the branch collection.
	#[error("default branch {branch_id} does not exist in this business")]
	DanglingReference {
		/// The unresolved branch reference.
		branch_id: BranchId,
	},

	/// The branch is the recorded default branch and cannot be deleted.
	#[error("branch {branch_id} is the default branch; choose another default before deleting it")]
	DefaultBranchDeletion {
		/// The branch that was targeted for deletion.
		branch_id: BranchId,
	},

	/// The branch chosen as main is not part of the branch collection.
	#[error("branch {branch_id} is not part of this business")]
	MainBranchMissing {
		/// The requested main branch.
		branch_id: BranchId,
	},

	/// The caller's role does not allow branch administration.
	#[error("role {role} cannot administer branches")]
	InsufficientRole {
		/// The caller's role in the business.
		role: Role,
	},
}
