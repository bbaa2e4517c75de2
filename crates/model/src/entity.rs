use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{BranchId, BusinessId};

/// The caller's relationship to a business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
	Owner,
	Admin,
	Staff,
	/// Any role this client does not know about.
	#[serde(other)]
	Unknown,
}

impl Role {
	/// Returns true when the role may create, edit, promote or delete branches.
	pub const fn can_manage_branches(self) -> bool {
		matches!(self, Self::Owner | Self::Admin)
	}

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Owner => "owner",
			Self::Admin => "admin",
			Self::Staff => "staff",
			Self::Unknown => "unknown",
		}
	}
}

impl fmt::Display for Role {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A business the caller belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Business {
	pub id: BusinessId,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	pub created_at: DateTime<Utc>,
	pub role: Role,
}

/// A branch (physical or logical location) of a business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
	pub id: BranchId,
	pub business_id: BusinessId,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
	#[serde(default = "default_active")]
	pub active: bool,
	#[serde(default)]
	pub is_main: bool,
}

fn default_active() -> bool {
	true
}

/// Where inventory is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryMode {
	PerBranch,
	Centralized,
}

/// Where services are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServicesMode {
	PerBranch,
	Centralized,
}

/// Whether branches share one product catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogMode {
	PerBranch,
	Shared,
}

/// Operational settings of a business's branches.
///
/// `auto_confirm_transfers` is only meaningful while `allow_transfers` is set.
/// `default_branch_id`, when present, must name a branch of the same business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchSettings {
	pub business_id: BusinessId,
	pub inventory_mode: InventoryMode,
	pub services_mode: ServicesMode,
	pub catalog_mode: CatalogMode,
	pub allow_transfers: bool,
	pub auto_confirm_transfers: bool,
	#[serde(default)]
	pub default_branch_id: Option<BranchId>,
	/// Absent when the server has no settings record for this business yet.
	#[serde(default)]
	pub updated_at: Option<DateTime<Utc>>,
}

impl BranchSettings {
	/// Settings assumed for a business whose server record does not exist yet.
	pub fn defaults_for(business_id: BusinessId) -> Self {
		Self {
			business_id,
			inventory_mode: InventoryMode::PerBranch,
			services_mode: ServicesMode::PerBranch,
			catalog_mode: CatalogMode::Shared,
			allow_transfers: false,
			auto_confirm_transfers: false,
			default_branch_id: None,
			updated_at: None,
		}
	}

	/// Returns true when this value was synthesized from a missing server record.
	pub fn is_unsaved(&self) -> bool {
		self.updated_at.is_none()
	}
}

/// Payload for creating a business.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBusiness {
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

/// Payload for creating a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBranch {
	pub name: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub address: Option<String>,
	pub active: bool,
	pub is_main: bool,
}

/// Partial branch update. Absent fields are left untouched by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchPatch {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub code: Option<Option<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub address: Option<Option<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub active: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub is_main: Option<bool>,
}

impl BranchPatch {
	/// Patch that only flags the branch as main.
	pub fn promote_main() -> Self {
		Self {
			is_main: Some(true),
			..Self::default()
		}
	}
}
