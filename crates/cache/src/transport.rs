use async_trait::async_trait;
use branchline_model::{Branch, BranchId, BranchPatch, BranchSettings, Business, BusinessId, NewBranch, NewBusiness, SettingsPatch};

use crate::TransportError;

/// Request functions exposed by the server-of-record collaborator.
///
/// Implementations own wire format, credentials and any retry policy. Each
/// call resolves with parsed entities or a classified [`TransportError`].
#[async_trait]
pub trait DashboardTransport: Send + Sync {
	/// Lists every business visible to the caller.
	async fn list_businesses(&self) -> Result<Vec<Business>, TransportError>;

	/// Lists the branches of a business.
	async fn list_branches(&self, business_id: &BusinessId) -> Result<Vec<Branch>, TransportError>;

	/// Fetches branch settings; `None` when the business has no record yet.
	async fn get_settings(&self, business_id: &BusinessId) -> Result<Option<BranchSettings>, TransportError>;

	/// Creates a business owned by the caller.
	async fn create_business(&self, payload: &NewBusiness) -> Result<Business, TransportError>;

	/// Deletes a business and everything scoped under it.
	async fn delete_business(&self, business_id: &BusinessId) -> Result<(), TransportError>;

	/// Creates a branch.
	async fn create_branch(&self, business_id: &BusinessId, payload: &NewBranch) -> Result<Branch, TransportError>;

	/// Applies a partial branch update and returns the stored branch.
	async fn update_branch(&self, business_id: &BusinessId, branch_id: &BranchId, patch: &BranchPatch) -> Result<Branch, TransportError>;

	/// Deletes a branch.
	async fn delete_branch(&self, business_id: &BusinessId, branch_id: &BranchId) -> Result<(), TransportError>;

	/// Applies a partial settings update and returns the stored settings.
	async fn update_settings(&self, business_id: &BusinessId, patch: &SettingsPatch) -> Result<BranchSettings, TransportError>;
}
