//! Settings form reconciliation.
//!
//! Turns an edited settings form into the smallest partial update that moves
//! the server from its last-known state to the edited state.
//!
//! # Invariants
//!
//! * A form with transfers disabled never yields `autoConfirmTransfers = true`.
//! * Default-branch references compare after normalization, so an empty string
//!   and an absent reference are the same value.
//! * `apply(current, diff(current, edited))` equals the normalized edit for any
//!   pair of states, in either direction.
//! * `current` is compared exactly as the server stored it. A record that
//!   breaks the transfer rule still has its raw flags diffed, so the patch
//!   corrects the server instead of trusting a cleaned-up copy.

use serde::Serialize;

use crate::normalize::non_blank_branch;
use crate::{BranchId, BranchSettings, CatalogMode, InventoryMode, ServicesMode};

/// Locally edited settings, as held by a settings form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsForm {
	pub inventory_mode: InventoryMode,
	pub services_mode: ServicesMode,
	pub catalog_mode: CatalogMode,
	pub allow_transfers: bool,
	pub auto_confirm_transfers: bool,
	/// Raw select value; empty means "no default branch".
	pub default_branch_id: Option<BranchId>,
}

impl From<&BranchSettings> for SettingsForm {
	/// Form state shown for `settings`. A stored record with transfers off and
	/// auto-confirm on is shown with auto-confirm off.
	fn from(settings: &BranchSettings) -> Self {
		Self {
			inventory_mode: settings.inventory_mode,
			services_mode: settings.services_mode,
			catalog_mode: settings.catalog_mode,
			allow_transfers: settings.allow_transfers,
			auto_confirm_transfers: settings.auto_confirm_transfers,
			default_branch_id: settings.default_branch_id.clone(),
		}
		.normalized()
	}
}

impl SettingsForm {
	/// Applies cross-field normalization.
	///
	/// Disabling transfers forces auto-confirm off even if the user never
	/// touched that field.
	pub fn normalized(mut self) -> Self {
		if !self.allow_transfers {
			self.auto_confirm_transfers = false;
		}
		self.default_branch_id = non_blank_branch(self.default_branch_id);
		self
	}
}

/// Partial settings update. Only present fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub inventory_mode: Option<InventoryMode>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub services_mode: Option<ServicesMode>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub catalog_mode: Option<CatalogMode>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub allow_transfers: Option<bool>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub auto_confirm_transfers: Option<bool>,
	/// `Some(None)` clears the default branch.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub default_branch_id: Option<Option<BranchId>>,
}

impl SettingsPatch {
	pub fn is_empty(&self) -> bool {
		self == &Self::default()
	}

	/// Projects the patch onto `settings`, as the server would apply it.
	pub fn apply_to(&self, settings: &BranchSettings) -> BranchSettings {
		let mut next = settings.clone();
		if let Some(mode) = self.inventory_mode {
			next.inventory_mode = mode;
		}
		if let Some(mode) = self.services_mode {
			next.services_mode = mode;
		}
		if let Some(mode) = self.catalog_mode {
			next.catalog_mode = mode;
		}
		if let Some(allow) = self.allow_transfers {
			next.allow_transfers = allow;
		}
		if let Some(auto) = self.auto_confirm_transfers {
			next.auto_confirm_transfers = auto;
		}
		if let Some(default) = &self.default_branch_id {
			next.default_branch_id = default.clone();
		}
		next
	}
}

/// Outcome of reconciling a form against server state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
	/// Nothing changed; the submission must be skipped.
	NoOp,
	/// The minimal partial update to send.
	Submit(SettingsPatch),
}

fn changed<T: PartialEq + Clone>(current: &T, edited: &T) -> Option<T> {
	(current != edited).then(|| edited.clone())
}

/// Computes the fields of `edited` that differ from `current`.
///
/// `edited` is normalized first, so the result may contain fields the user did
/// not touch (auto-confirm is forced off together with transfers).
pub fn diff(current: &BranchSettings, edited: &SettingsForm) -> SettingsPatch {
	let edited = edited.clone().normalized();
	let current_default = non_blank_branch(current.default_branch_id.clone());

	SettingsPatch {
		inventory_mode: changed(&current.inventory_mode, &edited.inventory_mode),
		services_mode: changed(&current.services_mode, &edited.services_mode),
		catalog_mode: changed(&current.catalog_mode, &edited.catalog_mode),
		allow_transfers: changed(&current.allow_transfers, &edited.allow_transfers),
		auto_confirm_transfers: changed(&current.auto_confirm_transfers, &edited.auto_confirm_transfers),
		default_branch_id: changed(&current_default, &edited.default_branch_id),
	}
}

/// Diffs and classifies the result as a no-op or a submission.
pub fn reconcile(current: &BranchSettings, edited: &SettingsForm) -> Reconciliation {
	let patch = diff(current, edited);
	if patch.is_empty() {
		Reconciliation::NoOp
	} else {
		Reconciliation::Submit(patch)
	}
}
